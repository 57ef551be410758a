//! Batch co-simulation over many images.
//!
//! Images run on a bounded rayon pool. Results come back in input order
//! whatever order the runs finish in.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::compile::IMAGE_EXTENSION;
use crate::error::Result;
use crate::metrics;
use crate::report;
use crate::session::{SessionConfig, run_session};

/// Verdict for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Traces agreed.
    Pass,
    /// Traces diverged.
    Fail,
    /// No verdict: a side crashed, hung, or could not be started.
    Error,
}

/// Result of co-simulating a single image.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Image file name.
    pub name: String,
    pub status: TestStatus,
    /// First divergence or error message.
    pub detail: Option<String>,
    /// Instruction pairs compared.
    pub compared: u64,
    pub seconds: f64,
}

impl TestResult {
    pub fn pass(name: impl Into<String>, compared: u64) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Pass,
            detail: None,
            compared,
            seconds: 0.0,
        }
    }

    pub fn fail(name: impl Into<String>, compared: u64, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Fail,
            detail: Some(detail.into()),
            compared,
            seconds: 0.0,
        }
    }

    pub fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Error,
            detail: Some(detail.into()),
            compared: 0,
            seconds: 0.0,
        }
    }

    #[must_use]
    const fn with_seconds(mut self, seconds: f64) -> Self {
        self.seconds = seconds;
        self
    }
}

/// Aggregated batch results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestSummary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Every result that did not pass, in input order.
    pub failures: Vec<TestResult>,
}

impl TestSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add(result.clone());
        }
        summary
    }

    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.errored
    }

    pub const fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    pub fn add(&mut self, result: TestResult) {
        match result.status {
            TestStatus::Pass => self.passed += 1,
            TestStatus::Fail => {
                self.failed += 1;
                self.failures.push(result);
            }
            TestStatus::Error => {
                self.errored += 1;
                self.failures.push(result);
            }
        }
    }
}

/// How a batch is scheduled.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Concurrent images; 0 uses one per CPU.
    pub jobs: usize,
    /// Run one image at a time on the calling thread.
    pub sequential: bool,
    /// Image extension picked up when scanning directories.
    pub extension: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            sequential: false,
            extension: IMAGE_EXTENSION.to_string(),
        }
    }
}

impl BatchConfig {
    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    #[must_use]
    pub const fn with_sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn effective_jobs(&self) -> usize {
        if self.sequential {
            1
        } else if self.jobs == 0 {
            num_cpus::get().max(1)
        } else {
            self.jobs
        }
    }
}

/// Expand `paths` into images: files are taken as given, directories are
/// searched recursively for `extension`. Directory hits are sorted; the
/// overall order follows `paths`.
pub fn discover_images(paths: &[PathBuf], extension: &str) -> Vec<PathBuf> {
    let mut images = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            discover_recursive(path, extension, &mut found);
            found.sort();
            debug!(dir = %path.display(), count = found.len(), "discovered images");
            images.extend(found);
        } else {
            images.push(path.clone());
        }
    }
    images
}

fn discover_recursive(dir: &Path, extension: &str, images: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            discover_recursive(&path, extension, images);
        } else if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            images.push(path);
        }
    }
}

/// Co-simulate one image and classify the outcome.
pub fn run_image(image: &Path, session: &SessionConfig) -> TestResult {
    let name = image
        .file_name()
        .map_or_else(|| image.display().to_string(), |n| n.to_string_lossy().into_owned());
    let start = Instant::now();

    let result = match run_session(image, session) {
        Ok(outcome) if outcome.passed() => TestResult::pass(name, outcome.compared),
        Ok(outcome) => TestResult::fail(name, outcome.compared, report::headline(&outcome)),
        Err(err) => TestResult::error(name, err.to_string()),
    };

    let seconds = start.elapsed().as_secs_f64();
    metrics::record_image(result.status, seconds);
    result.with_seconds(seconds)
}

/// Run every image and return results in input order. `on_result` is called
/// as each image completes, from whichever thread ran it.
pub fn run_batch<F>(
    images: &[PathBuf],
    session: &SessionConfig,
    config: &BatchConfig,
    on_result: F,
) -> Result<Vec<TestResult>>
where
    F: Fn(&TestResult) + Sync,
{
    let jobs = config.effective_jobs();
    info!(images = images.len(), jobs, "starting batch");

    let run = |image: &PathBuf| {
        let result = run_image(image, session);
        on_result(&result);
        result
    };

    if jobs == 1 {
        return Ok(images.iter().map(run).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|index| format!("friscv-batch-{index}"))
        .build()?;
    Ok(pool.install(|| images.par_iter().map(run).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let results = vec![
            TestResult::pass("a.elf", 10),
            TestResult::fail("b.elf", 3, "FAIL: state mismatch at instruction 2"),
            TestResult::error("c.elf", "spike produced no output for 1s"),
            TestResult::pass("d.elf", 7),
        ];
        let summary = TestSummary::from_results(&results);
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errored, 1);
        assert!(!summary.all_passed());
        let names: Vec<_> = summary.failures.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b.elf", "c.elf"]);
    }

    #[test]
    fn test_effective_jobs() {
        assert_eq!(BatchConfig::default().with_jobs(3).effective_jobs(), 3);
        assert_eq!(
            BatchConfig::default()
                .with_jobs(3)
                .with_sequential(true)
                .effective_jobs(),
            1
        );
        assert!(BatchConfig::default().effective_jobs() >= 1);
    }

    #[test]
    fn test_discover_images() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("rv32");
        fs::create_dir(&nested).unwrap();
        for name in ["b.elf", "a.elf", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::write(nested.join("c.elf"), "").unwrap();

        let explicit = PathBuf::from("/tmp/first.elf");
        let images = discover_images(&[explicit.clone(), dir.path().to_path_buf()], "elf");
        assert_eq!(
            images,
            vec![
                explicit,
                dir.path().join("a.elf"),
                dir.path().join("b.elf"),
                nested.join("c.elf"),
            ]
        );
    }

    #[test]
    fn test_batch_errors_keep_order() {
        use crate::compare::{ComparePolicy, Comparator};
        use crate::spike::SpikeConfig;

        let session = SessionConfig::new(
            SpikeConfig::default(),
            Comparator::new(ComparePolicy::default()),
        );
        let images: Vec<PathBuf> = (0..6).map(|i| PathBuf::from(format!("t{i}.elf"))).collect();
        let seen = std::sync::atomic::AtomicUsize::new(0);
        let results = run_batch(&images, &session, &BatchConfig::default().with_jobs(3), |_| {
            seen.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        })
        .unwrap();

        assert_eq!(seen.into_inner(), 6);
        let names: Vec<_> = results.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["t0.elf", "t1.elf", "t2.elf", "t3.elf", "t4.elf", "t5.elf"]);
        assert!(results.iter().all(|r| r.status == TestStatus::Error));
        assert!(results[0].detail.as_deref().unwrap().contains("no RTL source"));
    }
}
