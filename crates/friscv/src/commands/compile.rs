//! Compile command.

use std::path::Path;

use friscv::compile::compile_tests;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Spinner};

/// Handle the `compile` command.
pub fn cmd_compile(
    script: &Path,
    src_dir: &Path,
    output: &Path,
    riscv_path: Option<&Path>,
    silent: bool,
) -> i32 {
    let spinner = if silent {
        Spinner::hidden()
    } else {
        Spinner::new(format!("Building tests from {}", src_dir.display()))
    };

    match compile_tests(script, src_dir, output, riscv_path) {
        Ok(images) => {
            spinner.finish_with_success(&format!("Built {} images", images.len()));
            if !silent {
                for image in &images {
                    terminal::path_output(image);
                }
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            spinner.finish_with_failure(&e.to_string());
            EXIT_FAILURE
        }
    }
}
