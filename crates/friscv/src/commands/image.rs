//! Image command.

use std::path::{Path, PathBuf};

use friscv_image::convert_file;
use tracing::error;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Handle the `image` command. Every listing is attempted; the exit code
/// reports whether all of them converted.
pub fn cmd_image(files: &[PathBuf], output: Option<&Path>, sv: bool, words: u64) -> i32 {
    let mut failed = 0usize;

    for file in files {
        let out_dir = output
            .map(Path::to_path_buf)
            .or_else(|| file.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        match convert_file(file, &out_dir, sv, words) {
            Ok(converted) => {
                terminal::success(&format!(
                    "{}: {} words",
                    file.display(),
                    converted.words
                ));
                terminal::path_output(&converted.binary);
                if let Some(path) = &converted.initializer {
                    terminal::path_output(path);
                }
            }
            Err(e) => {
                error!(error = %e, file = %file.display(), "conversion failed");
                terminal::error(&format!("{}: {e}", file.display()));
                failed += 1;
            }
        }
    }

    if failed == 0 {
        EXIT_SUCCESS
    } else {
        terminal::warning(&format!("{failed} of {} listings failed", files.len()));
        EXIT_FAILURE
    }
}
