//! Memory images for FRISC-V test programs.
//!
//! Test programs are assembled to a hex listing (`.e` files) whose lines
//! carry a label, a byte address and the bytes placed there. This crate turns
//! such listings into a packed little-endian binary (`.b`) and into a
//! SystemVerilog initializer for the simulation memory.

mod image;
mod listing;

pub use image::*;
pub use listing::*;

use std::path::PathBuf;

use thiserror::Error;

/// Default memory size of the simulated core, in 32-bit words.
pub const DEFAULT_MEMORY_WORDS: u64 = 1024;

/// Extension of hex listings.
pub const LISTING_EXTENSION: &str = "e";
/// Extension of packed binary images.
pub const BINARY_EXTENSION: &str = "b";
/// Extension of SystemVerilog initializers.
pub const INITIALIZER_EXTENSION: &str = "txt";

/// Image conversion errors.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("word address {word} exceeds memory of {limit} words (line {line})")]
    AddressOutOfRange { word: u64, limit: u64, line: usize },
    #[error("not a hex listing: {0}")]
    NotAListing(PathBuf),
}

pub type Result<T> = std::result::Result<T, ImageError>;
