//! Building test images with the external build script.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, error, info, info_span};

use crate::error::{Error, Result};

/// Directory under the output directory where the script leaves images.
pub const IMAGE_DIR: &str = "bin";

/// Extension of compiled images.
pub const IMAGE_EXTENSION: &str = "elf";

/// Run `script <src_dir> <out_dir>` and return the images it produced.
///
/// Both directories are passed as absolute paths. `RISCV_PATH` is set for the
/// script when `riscv_path` is given, otherwise the inherited environment
/// decides.
pub fn compile_tests(
    script: &Path,
    src_dir: &Path,
    out_dir: &Path,
    riscv_path: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let _span = info_span!("compile_tests").entered();

    std::fs::create_dir_all(out_dir)?;
    let src_dir = std::fs::canonicalize(src_dir)?;
    let out_dir = std::fs::canonicalize(out_dir)?;

    let mut cmd = Command::new("sh");
    cmd.arg(script)
        .arg(&src_dir)
        .arg(&out_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(path) = riscv_path {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        debug!(path = %path.display(), "setting RISCV_PATH");
        cmd.env("RISCV_PATH", path);
    }

    info!(
        script = %script.display(),
        src = %src_dir.display(),
        out = %out_dir.display(),
        "running build script"
    );
    let output = cmd.output().map_err(|e| {
        error!(error = %e, "failed to run build script");
        Error::BuildFailed(format!("failed to run {}: {e}", script.display()))
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stdout.lines() {
        debug!("{line}");
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        if stderr.is_empty() {
            error!(exit_code = code, "build script failed");
        } else {
            error!(exit_code = code, stderr = %stderr, "build script failed");
        }
        let first_error = stderr
            .lines()
            .next()
            .or_else(|| stdout.lines().next())
            .unwrap_or("unknown error");
        return Err(Error::BuildFailed(format!(
            "exit status {code}: {first_error}"
        )));
    }
    for line in stderr.lines() {
        debug!("{line}");
    }

    let images = list_images(&out_dir.join(IMAGE_DIR))?;
    info!(count = images.len(), "build finished");
    Ok(images)
}

/// Compiled images in `dir`, sorted by path. A missing directory yields none.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == IMAGE_EXTENSION) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_compile_lists_images() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        fs::create_dir(&src).unwrap();
        let script = dir.path().join("build.sh");
        fs::write(
            &script,
            "mkdir -p \"$2/bin\"\n\
             touch \"$2/bin/b.elf\" \"$2/bin/a.elf\" \"$2/bin/a.hex\"\n\
             echo \"$RISCV_PATH\" > \"$2/riscv_path\"\n",
        )
        .unwrap();

        let images = compile_tests(&script, &src, &out, Some(dir.path())).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.elf", "b.elf"]);

        let recorded = fs::read_to_string(out.join("riscv_path")).unwrap();
        assert_eq!(
            recorded.trim(),
            fs::canonicalize(dir.path()).unwrap().to_string_lossy()
        );
    }

    #[test]
    fn test_compile_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build.sh");
        fs::write(&script, "echo 'missing toolchain' >&2\nexit 2\n").unwrap();

        let err = compile_tests(&script, dir.path(), &dir.path().join("out"), None).unwrap_err();
        match err {
            Error::BuildFailed(msg) => assert!(msg.contains("missing toolchain"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_list_missing_dir() {
        assert!(list_images(Path::new("/nonexistent/bin")).unwrap().is_empty());
    }
}
