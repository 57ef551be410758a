//! RTL commit sources.
//!
//! The RTL side only has to produce the same commit log format as the
//! reference. Two adapters are provided: a simulator command that prints the
//! log while it runs, and a log captured by an earlier simulation run.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use friscv_trace::{State, parse_commits};
use tracing::debug;

use crate::process::{ProcessController, ProcessOptions, Stream};
use crate::source::{CommitSource, EndReason};

/// Placeholder replaced by the image path in [`RtlCommand`] templates.
pub const IMAGE_PLACEHOLDER: &str = "{image}";

/// Extension of captured RTL commit logs.
pub const TRACE_EXTENSION: &str = "log";

/// A simulator run through `sh -c`, printing its commit log on stdout.
#[derive(Debug, Clone)]
pub struct RtlCommand {
    pub template: String,
    pub trace_stream: Stream,
}

impl RtlCommand {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            trace_stream: Stream::Stdout,
        }
    }

    #[must_use]
    pub const fn with_trace_stream(mut self, stream: Stream) -> Self {
        self.trace_stream = stream;
        self
    }

    /// Shell command line for `image`.
    pub fn command_line(&self, image: &Path) -> String {
        self.template
            .replace(IMAGE_PLACEHOLDER, &shell_quote(&image.to_string_lossy()))
    }

    /// An unstarted, free-running controller for `image`.
    pub fn controller(&self, image: &Path) -> ProcessController {
        let mut command = Command::new("sh");
        command.arg("-c").arg(self.command_line(image));
        let options = ProcessOptions::default().with_trace_stream(self.trace_stream);
        ProcessController::new("rtl", command, options)
    }
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Commits read from a finished log.
pub struct TraceReplay {
    name: String,
    states: VecDeque<State>,
    end: Option<EndReason>,
}

impl TraceReplay {
    pub fn new(name: impl Into<String>, states: Vec<State>) -> Self {
        Self {
            name: name.into(),
            states: states.into(),
            end: None,
        }
    }

    /// Load a commit log from disk.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let states = parse_commits(BufReader::new(File::open(path)?))?;
        debug!(path = %path.display(), commits = states.len(), "loaded trace");
        Ok(Self::new(path.display().to_string(), states))
    }

    /// Captured log for `image` inside `dir`: `<dir>/<image stem>.log`.
    pub fn path_for(dir: &Path, image: &Path) -> PathBuf {
        let stem = image.file_stem().unwrap_or(image.as_os_str());
        dir.join(stem).with_extension(TRACE_EXTENSION)
    }

    pub fn remaining(&self) -> usize {
        self.states.len()
    }
}

impl CommitSource for TraceReplay {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_commit(&mut self, _timeout: Duration) -> Option<State> {
        let state = self.states.pop_front();
        if state.is_none() {
            self.end = Some(EndReason::Finished);
        }
        state
    }

    fn end_reason(&self) -> Option<EndReason> {
        self.end
    }
}
