//! Hex listing parser.
//!
//! Two listing layouts are in use. The word layout puts up to four bytes on
//! the labelled line and continues with one word per `|` line:
//!
//! ```text
//! <main> 00000000 93 02 50 00 ; li t0, 5
//! | 13 00 00 00
//! ```
//!
//! The older byte layout puts a single byte on the labelled line, followed by
//! the disassembly, and continues with one byte per `|` line:
//!
//! ```text
//! <main> 00000000 93 ; li t0, 5
//! | 02
//! | 50
//! | 00
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    BINARY_EXTENSION, INITIALIZER_EXTENSION, ImageError, LISTING_EXTENSION, MemoryImage, Result,
};

/// Listing layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Four bytes per line.
    Word,
    /// One byte per line.
    Byte,
}

impl Dialect {
    /// Any labelled line whose fourth token is `;` marks the byte layout.
    pub fn detect(text: &str) -> Self {
        let byte_layout = text.lines().any(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            tokens.len() > 3 && is_labelled(&tokens) && tokens[3] == ";"
        });
        if byte_layout { Self::Byte } else { Self::Word }
    }
}

fn is_labelled(tokens: &[&str]) -> bool {
    tokens.len() >= 2 && tokens[0].starts_with('<') && !tokens[1].starts_with(';')
}

fn is_continuation(tokens: &[&str]) -> bool {
    tokens.first().is_some_and(|token| token.starts_with('|'))
}

fn parse_address(token: &str) -> Option<u64> {
    let token = token.strip_suffix('!').unwrap_or(token);
    let digits = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

/// Byte tokens up to the first comment.
fn data_tokens<'a>(tokens: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
    tokens
        .iter()
        .copied()
        .take_while(|token| !token.starts_with(';'))
}

/// Place consecutive bytes starting at `addr`; malformed tokens leave a zero.
fn place_bytes<'a>(
    image: &mut MemoryImage,
    addr: u64,
    tokens: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<u64> {
    let mut next = addr;
    for token in tokens {
        match u8::from_str_radix(token, 16) {
            Ok(byte) => image.place(next, byte, line)?,
            Err(_) => warn!(line, token, "invalid byte in listing"),
        }
        next += 1;
    }
    Ok(next)
}

/// Parse a listing into a memory image of `limit_words` words.
pub fn parse_listing(text: &str, limit_words: u64) -> Result<MemoryImage> {
    let dialect = Dialect::detect(text);
    debug!(?dialect, "parsing listing");

    let mut image = MemoryImage::new(limit_words);
    // Word index of the last labelled/continued word (word layout) or the
    // next byte address (byte layout).
    let mut cursor: Option<u64> = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();

        if is_labelled(&tokens) {
            let Some(addr) = parse_address(tokens[1]) else {
                warn!(line = line_no, address = tokens[1], "invalid address in listing");
                cursor = None;
                continue;
            };
            cursor = Some(match dialect {
                Dialect::Word => {
                    place_bytes(&mut image, addr, data_tokens(&tokens[2..]).take(4), line_no)?;
                    addr / 4
                }
                Dialect::Byte => {
                    place_bytes(&mut image, addr, data_tokens(&tokens[2..]).take(1), line_no)?
                }
            });
        } else if is_continuation(&tokens) {
            let Some(position) = cursor else {
                warn!(line = line_no, "continuation line without a labelled line");
                continue;
            };
            cursor = Some(match dialect {
                Dialect::Word => {
                    let word = position + 1;
                    place_bytes(
                        &mut image,
                        word * 4,
                        data_tokens(&tokens[1..]).take(4),
                        line_no,
                    )?;
                    word
                }
                Dialect::Byte => {
                    place_bytes(&mut image, position, data_tokens(&tokens[1..]).take(1), line_no)?
                }
            });
        }
    }

    Ok(image)
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ImageError + use<> {
    let path = path.to_path_buf();
    move |source| ImageError::Io { path, source }
}

/// Files written by [`convert_file`].
#[derive(Debug, Clone)]
pub struct Converted {
    pub binary: PathBuf,
    pub initializer: Option<PathBuf>,
    pub words: usize,
}

/// Convert one `.e` listing into `<out_dir>/<stem>.b` and, if asked, a
/// `<out_dir>/<stem>.txt` initializer.
pub fn convert_file(
    input: &Path,
    out_dir: &Path,
    initializer: bool,
    limit_words: u64,
) -> Result<Converted> {
    if input.extension().and_then(|ext| ext.to_str()) != Some(LISTING_EXTENSION) {
        return Err(ImageError::NotAListing(input.to_path_buf()));
    }
    let stem = input
        .file_stem()
        .ok_or_else(|| ImageError::NotAListing(input.to_path_buf()))?;

    let text = fs::read_to_string(input).map_err(io_err(input))?;
    let image = parse_listing(&text, limit_words)?;

    fs::create_dir_all(out_dir).map_err(io_err(out_dir))?;
    let binary = out_dir.join(stem).with_extension(BINARY_EXTENSION);
    let words = image.words();
    fs::write(&binary, image.to_binary()).map_err(io_err(&binary))?;

    let initializer = if initializer {
        let path = out_dir.join(stem).with_extension(INITIALIZER_EXTENSION);
        fs::write(&path, image.to_initializer()).map_err(io_err(&path))?;
        Some(path)
    } else {
        None
    };

    debug!(input = %input.display(), words = words.len(), "converted listing");
    Ok(Converted {
        binary,
        initializer,
        words: words.len(),
    })
}
