//! The commit-producing side of a co-simulation.

use std::fmt;
use std::time::Duration;

use friscv_trace::State;
use serde::Serialize;

/// Why a source stopped producing commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The program ran to completion and the producer exited cleanly.
    Finished,
    /// The producer exited with a failure status (`None` when killed by a signal).
    Exited { code: Option<i32> },
    /// No output arrived within the fetch timeout.
    #[serde(serialize_with = "serialize_duration")]
    TimedOut(Duration),
    /// The source was stopped before it ran out of commits.
    Stopped,
    /// The producer closed its output streams but did not exit.
    OutputClosed,
}

impl EndReason {
    /// Only a finished program counts as a clean end of trace.
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "finished"),
            Self::Exited { code: Some(code) } => write!(f, "exited with status {code}"),
            Self::Exited { code: None } => write!(f, "was killed by a signal"),
            Self::TimedOut(timeout) => write!(f, "produced no output for {timeout:?}"),
            Self::Stopped => write!(f, "was stopped"),
            Self::OutputClosed => write!(f, "closed its output but kept running"),
        }
    }
}

fn serialize_duration<S: serde::Serializer>(
    timeout: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
}

/// Which side of the comparison a source plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Reference,
    Rtl,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Rtl => write!(f, "RTL"),
        }
    }
}

/// Anything that yields retired instructions one at a time.
///
/// `next_commit` returns `None` once no further commit is available;
/// [`end_reason`](Self::end_reason) then tells a finished program apart from
/// a hang or a crash.
pub trait CommitSource {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Fetch the next retired instruction, waiting at most `timeout` for it
    /// to start arriving.
    fn next_commit(&mut self, timeout: Duration) -> Option<State>;

    /// Set once `next_commit` has returned `None`.
    fn end_reason(&self) -> Option<EndReason>;
}

impl<S: CommitSource + ?Sized> CommitSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_commit(&mut self, timeout: Duration) -> Option<State> {
        (**self).next_commit(timeout)
    }

    fn end_reason(&self) -> Option<EndReason> {
        (**self).end_reason()
    }
}
