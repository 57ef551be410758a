//! Metrics collection and reporting using metrics-rs.
//!
//! Counters are recorded through the `metrics` facade; the CLI installs
//! [`CliRecorder`] to print them after a run.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_histogram, histogram,
};
use parking_lot::RwLock;

use crate::runner::TestStatus;

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "friscv_commits_compared_total",
        Unit::Count,
        "Retired instructions compared in lock step"
    );
    describe_counter!(
        "friscv_divergences_total",
        Unit::Count,
        "Divergences between reference and RTL"
    );
    describe_counter!("friscv_images_passed_total", Unit::Count, "Images that passed");
    describe_counter!("friscv_images_failed_total", Unit::Count, "Images that diverged");
    describe_counter!(
        "friscv_images_errored_total",
        Unit::Count,
        "Images whose run could not reach a verdict"
    );
    describe_histogram!(
        "friscv_image_duration_seconds",
        Unit::Seconds,
        "Co-simulation wall-clock time per image"
    );
}

pub fn record_commit() {
    counter!("friscv_commits_compared_total").increment(1);
}

pub fn record_divergence() {
    counter!("friscv_divergences_total").increment(1);
}

/// Record the verdict and duration of one image.
pub fn record_image(status: TestStatus, seconds: f64) {
    match status {
        TestStatus::Pass => counter!("friscv_images_passed_total").increment(1),
        TestStatus::Fail => counter!("friscv_images_failed_total").increment(1),
        TestStatus::Error => counter!("friscv_images_errored_total").increment(1),
    }
    histogram!("friscv_image_duration_seconds").record(seconds);
}

#[derive(Default)]
struct Storage {
    counters: RwLock<HashMap<String, u64>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    storage: Arc<Storage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        *self
            .storage
            .counters
            .write()
            .entry(self.key.clone())
            .or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.storage
            .counters
            .write()
            .insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    storage: Arc<Storage>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        self.storage
            .histograms
            .write()
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

/// Recorder that keeps counters and histograms in memory for terminal output.
#[derive(Default)]
pub struct CliRecorder {
    storage: Arc<Storage>,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder. `None` if one is already installed.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let storage = Arc::clone(&self.storage);
        metrics::set_global_recorder(self).ok()?;
        Some(CliRecorderHandle { storage })
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.storage),
        }))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            storage: Arc::clone(&self.storage),
        }))
    }
}

/// Access to the metrics collected by an installed [`CliRecorder`].
pub struct CliRecorderHandle {
    storage: Arc<Storage>,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.storage.counters.read().get(key).copied()
    }

    /// Print all collected metrics.
    pub fn print_summary(&self) {
        let counters = self.storage.counters.read();
        let histograms = self.storage.histograms.read();

        if counters.is_empty() && histograms.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        println!();

        if !counters.is_empty() {
            println!("### Counters");
            let mut entries: Vec<_> = counters.iter().collect();
            entries.sort();
            for (key, value) in entries {
                println!("  {key}: {value}");
            }
            println!();
        }

        if !histograms.is_empty() {
            println!("### Histograms");
            let mut keys: Vec<_> = histograms.keys().collect();
            keys.sort();
            for key in keys {
                let values = &histograms[key];
                if values.is_empty() {
                    continue;
                }
                let sum: f64 = values.iter().sum();
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                #[allow(clippy::cast_precision_loss)]
                let mean = sum / values.len() as f64;
                println!(
                    "  {key}: count={} min={min:.3} mean={mean:.3} max={max:.3}",
                    values.len()
                );
            }
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_counts() {
        let recorder = CliRecorder::new();
        let storage = Arc::clone(&recorder.storage);
        let handle = CliRecorderHandle { storage };

        metrics::with_local_recorder(&recorder, || {
            record_commit();
            record_commit();
            record_divergence();
            record_image(TestStatus::Fail, 0.5);
        });

        assert_eq!(handle.get_counter("friscv_commits_compared_total"), Some(2));
        assert_eq!(handle.get_counter("friscv_divergences_total"), Some(1));
        assert_eq!(handle.get_counter("friscv_images_failed_total"), Some(1));
        assert_eq!(handle.get_counter("friscv_images_passed_total"), None);
    }
}
