//! Batch command.

use std::path::PathBuf;

use friscv::report;
use friscv::runner::{BatchConfig, TestResult, TestStatus, TestSummary, discover_images, run_batch};
use friscv::session::SessionConfig;
use serde::Serialize;
use tracing::error;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, OutputFormat};
use crate::terminal::{self, Alignment, Progress, Table};

#[derive(Serialize)]
struct BatchReport<'a> {
    results: &'a [TestResult],
    summary: &'a TestSummary,
}

/// Handle the `batch` command.
pub fn cmd_batch(
    paths: &[PathBuf],
    session: &SessionConfig,
    config: &BatchConfig,
    format: OutputFormat,
    silent: bool,
) -> i32 {
    let images = discover_images(paths, &config.extension);
    if images.is_empty() {
        terminal::error("no images found");
        return EXIT_FAILURE;
    }

    let quiet = silent || format == OutputFormat::Json;
    if !quiet {
        terminal::info(&format!(
            "Co-simulating {} images on {} workers",
            images.len(),
            config.effective_jobs()
        ));
    }

    let progress = if quiet {
        Progress::hidden()
    } else {
        Progress::new(images.len() as u64, "Running")
    };
    let results = run_batch(&images, session, config, |result| {
        if result.status != TestStatus::Pass {
            progress.println(&format!(
                "{} {} ({})",
                terminal::status_label(result.status),
                result.name,
                result.detail.as_deref().unwrap_or("unknown")
            ));
        }
        progress.inc(1);
    });
    progress.finish();

    let results = match results {
        Ok(results) => results,
        Err(e) => {
            error!(error = %e, "batch failed");
            terminal::error(&e.to_string());
            return EXIT_FAILURE;
        }
    };
    let summary = TestSummary::from_results(&results);

    match format {
        OutputFormat::Text => {
            if !silent {
                print_table(&results);
            }
            print_summary(&summary);
        }
        OutputFormat::Json => {
            let report = BatchReport {
                results: &results,
                summary: &summary,
            };
            match report::render_json(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    terminal::error(&format!("failed to serialize report: {e}"));
                    return EXIT_FAILURE;
                }
            }
        }
    }

    if summary.all_passed() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

fn print_table(results: &[TestResult]) {
    let mut table = Table::new(vec!["Image", "Status", "Compared", "Time", "Detail"])
        .with_alignments(vec![
            Alignment::Left,
            Alignment::Left,
            Alignment::Right,
            Alignment::Right,
            Alignment::Left,
        ]);
    for result in results {
        let status = match result.status {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Error => "ERROR",
        };
        table.add_row(vec![
            result.name.clone(),
            status.to_string(),
            result.compared.to_string(),
            format!("{:.2}s", result.seconds),
            result.detail.clone().unwrap_or_default(),
        ]);
    }
    println!();
    table.print();
}

fn print_summary(summary: &TestSummary) {
    println!();
    println!("================================");
    println!(
        "{}: {}",
        terminal::status_label(TestStatus::Pass),
        summary.passed
    );
    println!(
        "{}: {}",
        terminal::status_label(TestStatus::Fail),
        summary.failed
    );
    println!(
        "{}: {}",
        terminal::status_label(TestStatus::Error),
        summary.errored
    );
    println!();

    if !summary.failures.is_empty() {
        println!("Failures:");
        for failure in &summary.failures {
            let detail = failure.detail.as_deref().unwrap_or("unknown");
            println!("  {} ({detail})", failure.name);
        }
        println!();
    }
}
