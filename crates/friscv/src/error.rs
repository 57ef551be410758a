use std::path::PathBuf;

use thiserror::Error;

use crate::source::{EndReason, Side};

/// Subprocess lifecycle errors.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is already running")]
    AlreadyStarted(String),
    #[error("{0} did not provide a {1} pipe")]
    MissingPipe(String, &'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A co-simulation that could not reach a verdict.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error("{side} {reason}")]
    Terminated { side: Side, reason: EndReason },
    #[error("{side} ended without a termination reason")]
    Unaccounted { side: Side },
}

/// Toolchain configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {what} `{value}`")]
    Invalid { what: &'static str, value: String },
}

impl ConfigError {
    pub(crate) fn invalid(what: &'static str, value: impl Into<String>) -> Self {
        Self::Invalid {
            what,
            value: value.into(),
        }
    }
}

/// Co-simulation toolchain errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Image(#[from] friscv_image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read RTL trace {}: {source}", path.display())]
    Trace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("build failed: {0}")]
    BuildFailed(String),
    #[error("no RTL source configured")]
    NoRtlSource,
}

pub type Result<T> = std::result::Result<T, Error>;
