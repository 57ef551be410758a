//! Run command.

use std::path::Path;
use std::time::Instant;

use friscv::report;
use friscv::runner::TestStatus;
use friscv::session::{SessionConfig, run_session};
use tracing::error;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, OutputFormat};
use crate::terminal::{self, Spinner};

/// Handle the `run` command.
pub fn cmd_run(image: &Path, session: &SessionConfig, format: OutputFormat, silent: bool) -> i32 {
    let spinner = if silent || format == OutputFormat::Json {
        Spinner::hidden()
    } else {
        Spinner::new(format!("Co-simulating {}", image.display()))
    };

    let start = Instant::now();
    let result = match run_session(image, session) {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_and_clear();
            friscv::metrics::record_image(TestStatus::Error, start.elapsed().as_secs_f64());
            error!(error = %e, image = %image.display(), "co-simulation failed");
            terminal::error(&e.to_string());
            return EXIT_FAILURE;
        }
    };
    let status = if result.passed() {
        TestStatus::Pass
    } else {
        TestStatus::Fail
    };
    friscv::metrics::record_image(status, start.elapsed().as_secs_f64());

    match format {
        OutputFormat::Text => {
            let headline = report::headline(&result);
            if result.passed() {
                spinner.finish_with_success(&headline);
            } else {
                spinner.finish_with_failure(&headline);
            }
            if !silent {
                println!(
                    "{}",
                    report::render_text(&result, session.comparator.policy())
                );
            }
        }
        OutputFormat::Json => match report::render_json(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                terminal::error(&format!("failed to serialize report: {e}"));
                return EXIT_FAILURE;
            }
        },
    }

    if result.passed() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}
