//! Line readers feeding the controller's queue.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::debug;

/// One of the child's output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stream {
    Stdout,
    #[default]
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// A line read from one stream.
pub(super) type Line = (Stream, String);

/// Forward every line of `stream` to `tx` until the stream closes or the
/// receiving side goes away. Invalid UTF-8 is replaced, not fatal.
pub(super) fn spawn(
    owner: &str,
    tag: Stream,
    stream: impl Read + Send + 'static,
    tx: Sender<Line>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{owner}-{tag}"))
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\n', '\r']).to_string();
                        if tx.send((tag, line)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        debug!(%tag, "read failed: {err}");
                        break;
                    }
                }
            }
        })
}
