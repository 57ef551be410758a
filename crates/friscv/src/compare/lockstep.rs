//! Lock-step comparison of two commit sources.

use std::fmt;
use std::time::Duration;

use friscv_trace::State;
use serde::Serialize;
use tracing::{debug, info};

use super::policy::{ComparePolicy, Facet};
use crate::error::RunError;
use crate::metrics;
use crate::source::{CommitSource, EndReason, Side};

/// Default per-fetch timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Kind of divergence between reference and RTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// Both sides retired an instruction and they disagree.
    Mismatch,
    /// The reference ended while the RTL kept retiring instructions.
    ReferenceFinishedFirst,
    /// The RTL ended while the reference kept retiring instructions.
    RtlFinishedFirst,
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch => write!(f, "state mismatch"),
            Self::ReferenceFinishedFirst => write!(f, "RTL has more instructions"),
            Self::RtlFinishedFirst => write!(f, "reference has more instructions"),
        }
    }
}

/// A retired instruction on which the two sides disagree.
#[derive(Debug, Clone, Serialize)]
pub struct Divergence {
    /// Zero-based ordinal of the retired instruction.
    pub index: u64,
    pub kind: DivergenceKind,
    /// Reference state, absent when the reference had already finished.
    pub expected: Option<State>,
    /// RTL state, absent when the RTL had already finished.
    pub actual: Option<State>,
    /// Facets that disagreed; empty for length divergences.
    pub facets: Vec<Facet>,
    /// Commits the longer side produced past the end of the shorter one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<u64>,
}

/// Result of a lock-step run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompareResult {
    /// Instruction pairs compared.
    pub compared: u64,
    pub divergences: Vec<Divergence>,
    /// The run stopped at the commit limit before either side ended.
    pub limit_reached: bool,
    /// Commits past the shorter trace accepted under the tolerance.
    pub tolerated: u64,
    pub reference_end: Option<EndReason>,
    pub rtl_end: Option<EndReason>,
}

impl CompareResult {
    pub fn passed(&self) -> bool {
        self.divergences.is_empty()
    }

    pub fn first_divergence(&self) -> Option<&Divergence> {
        self.divergences.first()
    }
}

/// Drives a reference source and an RTL source in lock step.
#[derive(Debug, Clone)]
pub struct Comparator {
    policy: ComparePolicy,
    timeout: Duration,
    max_commits: Option<u64>,
}

impl Comparator {
    pub const fn new(policy: ComparePolicy) -> Self {
        Self {
            policy,
            timeout: DEFAULT_TIMEOUT,
            max_commits: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_commits(mut self, max: Option<u64>) -> Self {
        self.max_commits = max;
        self
    }

    pub const fn policy(&self) -> &ComparePolicy {
        &self.policy
    }

    /// Compare until both sides end, a divergence halts the run, or the
    /// commit limit is reached.
    ///
    /// A side that stops producing commits for any reason other than a
    /// finished program aborts the run with [`RunError`]; it never counts as
    /// agreement.
    pub fn run(
        &self,
        reference: &mut dyn CommitSource,
        rtl: &mut dyn CommitSource,
    ) -> Result<CompareResult, RunError> {
        let mut result = CompareResult::default();
        let limit = self.max_commits.unwrap_or(u64::MAX);

        loop {
            if result.compared >= limit {
                info!(commits = result.compared, "commit limit reached");
                result.limit_reached = true;
                break;
            }
            let index = result.compared;

            let Some(expected) = reference.next_commit(self.timeout) else {
                result.reference_end = Some(clean_end(Side::Reference, reference)?);
                match rtl.next_commit(self.timeout) {
                    None => result.rtl_end = Some(clean_end(Side::Rtl, rtl)?),
                    Some(actual) => {
                        let (extra, end) = self.count_tail(Side::Rtl, rtl)?;
                        result.rtl_end = end;
                        self.settle_tail(&mut result, index, extra, None, Some(actual));
                    }
                }
                break;
            };

            let Some(actual) = rtl.next_commit(self.timeout) else {
                result.rtl_end = Some(clean_end(Side::Rtl, rtl)?);
                let (extra, end) = self.count_tail(Side::Reference, reference)?;
                result.reference_end = end;
                self.settle_tail(&mut result, index, extra, Some(expected), None);
                break;
            };

            result.compared += 1;
            metrics::record_commit();

            let facets = self.policy.compare(&expected, &actual);
            if !facets.is_empty() {
                debug!(index, pc = %format!("0x{:08x}", expected.pc()), ?facets, "divergence");
                metrics::record_divergence();
                result.divergences.push(Divergence {
                    index,
                    kind: DivergenceKind::Mismatch,
                    expected: Some(expected),
                    actual: Some(actual),
                    facets,
                    extra: None,
                });
                if self.policy.stop_on_first {
                    break;
                }
            }
        }

        info!(
            compared = result.compared,
            divergences = result.divergences.len(),
            "comparison finished"
        );
        Ok(result)
    }

    /// Count commits the longer side still produces, one already taken.
    /// Stops counting as soon as the tolerance is exceeded.
    fn count_tail(
        &self,
        side: Side,
        source: &mut dyn CommitSource,
    ) -> Result<(u64, Option<EndReason>), RunError> {
        let mut extra = 1;
        while extra <= self.policy.tolerance {
            if source.next_commit(self.timeout).is_none() {
                return Ok((extra, Some(clean_end(side, source)?)));
            }
            extra += 1;
        }
        Ok((extra, None))
    }

    fn settle_tail(
        &self,
        result: &mut CompareResult,
        index: u64,
        extra: u64,
        expected: Option<State>,
        actual: Option<State>,
    ) {
        if extra <= self.policy.tolerance {
            debug!(extra, "trace length difference within tolerance");
            result.tolerated = extra;
            return;
        }
        let kind = if expected.is_some() {
            DivergenceKind::RtlFinishedFirst
        } else {
            DivergenceKind::ReferenceFinishedFirst
        };
        debug!(index, %kind, "divergence");
        metrics::record_divergence();
        result.divergences.push(Divergence {
            index,
            kind,
            expected,
            actual,
            facets: Vec::new(),
            extra: Some(extra),
        });
    }
}

/// The end reason of a source that returned no commit, if it is clean.
fn clean_end(side: Side, source: &dyn CommitSource) -> Result<EndReason, RunError> {
    match source.end_reason() {
        Some(reason) if reason.is_clean() => Ok(reason),
        Some(reason) => Err(RunError::Terminated { side, reason }),
        None => Err(RunError::Unaccounted { side }),
    }
}
