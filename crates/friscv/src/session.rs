//! One co-simulation: reference and RTL on the same image.

use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span};

use crate::compare::{CompareResult, Comparator};
use crate::error::{Error, Result};
use crate::rtl::{RtlCommand, TraceReplay};
use crate::source::CommitSource;
use crate::spike::SpikeConfig;

/// Where the RTL commit log comes from.
#[derive(Debug, Clone)]
pub enum RtlSource {
    /// Run a simulator for every image.
    Command(RtlCommand),
    /// Replay `<dir>/<image stem>.log` captured by an earlier run.
    TraceDir(PathBuf),
}

impl RtlSource {
    /// Open the RTL side for `image`. Processes are started here.
    fn open(&self, image: &Path) -> Result<Box<dyn CommitSource>> {
        match self {
            Self::Command(command) => {
                let mut controller = command.controller(image);
                debug!(command = %command.command_line(image), "starting RTL");
                controller.start()?;
                Ok(Box::new(controller))
            }
            Self::TraceDir(dir) => {
                let path = TraceReplay::path_for(dir, image);
                let replay =
                    TraceReplay::open(&path).map_err(|source| Error::Trace { path, source })?;
                Ok(Box::new(replay))
            }
        }
    }
}

/// Everything needed to co-simulate one image.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub spike: SpikeConfig,
    pub rtl: Option<RtlSource>,
    pub comparator: Comparator,
}

impl SessionConfig {
    pub const fn new(spike: SpikeConfig, comparator: Comparator) -> Self {
        Self {
            spike,
            rtl: None,
            comparator,
        }
    }

    #[must_use]
    pub fn with_rtl(mut self, rtl: RtlSource) -> Self {
        self.rtl = Some(rtl);
        self
    }
}

/// Co-simulate `image` and compare the two commit streams.
///
/// Both sides are shut down before returning, whether the comparison
/// finished, diverged or failed.
pub fn run_session(image: &Path, config: &SessionConfig) -> Result<CompareResult> {
    let name = image
        .file_name()
        .map_or_else(|| image.display().to_string(), |n| n.to_string_lossy().into_owned());
    let _span = info_span!("session", image = %name).entered();

    let rtl_source = config.rtl.as_ref().ok_or(Error::NoRtlSource)?;
    let mut rtl = rtl_source.open(image)?;

    let mut reference = config.spike.controller(image);
    debug!(path = %config.spike.path.display(), "starting reference");
    reference.start()?;

    let result = config.comparator.run(&mut reference, rtl.as_mut());

    reference.stop();
    debug!(
        commits = reference.commits(),
        anomalies = reference.anomalies(),
        "reference stopped"
    );
    drop(rtl);

    let result = result?;
    info!(
        compared = result.compared,
        passed = result.passed(),
        "session finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::ComparePolicy;

    fn config() -> SessionConfig {
        SessionConfig::new(
            SpikeConfig::default().with_path("/nonexistent/spike"),
            Comparator::new(ComparePolicy::default()),
        )
    }

    #[test]
    fn test_missing_rtl_source() {
        let err = run_session(Path::new("a.elf"), &config()).unwrap_err();
        assert!(matches!(err, Error::NoRtlSource));
    }

    #[test]
    fn test_missing_trace() {
        let dir = tempfile::tempdir().unwrap();
        let config = config().with_rtl(RtlSource::TraceDir(dir.path().to_path_buf()));
        let err = run_session(Path::new("bin/alu.elf"), &config).unwrap_err();
        match err {
            Error::Trace { path, .. } => assert_eq!(path, dir.path().join("alu.log")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reference_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alu.log"), "").unwrap();
        let config = config().with_rtl(RtlSource::TraceDir(dir.path().to_path_buf()));
        let err = run_session(Path::new("alu.elf"), &config).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/spike"), "{err}");
    }
}
