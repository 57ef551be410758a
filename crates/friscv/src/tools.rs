//! Locating and probing external tools.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

/// Find an executable named `name` in `PATH`.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|path| is_executable(path))
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Locate Spike: `<custom>/spike`, then `<custom>/bin/spike`, else `PATH`.
///
/// An explicit directory that holds neither is an error, not a reason to
/// fall back to `PATH`.
pub fn find_spike(custom: Option<&Path>) -> Option<PathBuf> {
    match custom {
        Some(dir) => {
            let found = [dir.join("spike"), dir.join("bin").join("spike")]
                .into_iter()
                .find(|path| is_executable(path));
            if found.is_none() {
                warn!(path = %dir.display(), "no spike executable in custom path");
            }
            found
        }
        None => find_in_path("spike"),
    }
}

/// Whether `spike --help` runs successfully.
pub fn spike_available(path: &Path) -> bool {
    match Command::new(path).arg("--help").output() {
        Ok(output) => output.status.success(),
        Err(err) => {
            debug!(path = %path.display(), "spike probe failed: {err}");
            false
        }
    }
}

/// Locate Vivado: `<custom>/bin/vivado`, else `PATH`.
pub fn find_vivado(custom: Option<&Path>) -> Option<PathBuf> {
    match custom {
        Some(dir) => {
            let path = dir.join("bin").join("vivado");
            if is_executable(&path) {
                Some(path)
            } else {
                warn!(path = %dir.display(), "no vivado executable in custom path");
                None
            }
        }
        None => find_in_path("vivado"),
    }
}

/// First line printed by `vivado -version`.
pub fn vivado_version(path: &Path) -> Option<String> {
    let output = match Command::new(path).arg("-version").output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            debug!(status = %output.status, "vivado -version failed");
            return None;
        }
        Err(err) => {
            debug!(path = %path.display(), "vivado probe failed: {err}");
            return None;
        }
    };
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

/// The first supported version contained in `version`.
pub fn supported_version<'a>(version: &str, supported: &'a [String]) -> Option<&'a str> {
    supported
        .iter()
        .map(String::as_str)
        .find(|candidate| version.contains(candidate))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[cfg(unix)]
    fn write_script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_supported_version() {
        let supported = vec!["v2023.2".to_string(), "v2024.1".to_string()];
        assert_eq!(
            supported_version("Vivado v2024.1 (64-bit)", &supported),
            Some("v2024.1")
        );
        assert_eq!(supported_version("Vivado v2022.1 (64-bit)", &supported), None);
        assert_eq!(supported_version("Vivado v2024.1", &[]), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_find_spike_custom_bin() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        let spike = dir.path().join("bin").join("spike");
        write_script(&spike, "exit 0");
        assert_eq!(find_spike(Some(dir.path())), Some(spike.clone()));
        assert!(spike_available(&spike));

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(find_spike(Some(empty.path())), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_vivado_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bin")).unwrap();
        let vivado = dir.path().join("bin").join("vivado");
        write_script(&vivado, "echo 'Vivado v2023.2 (64-bit)'\necho 'SW Build 1'");
        let found = find_vivado(Some(dir.path())).unwrap();
        assert_eq!(
            vivado_version(&found).as_deref(),
            Some("Vivado v2023.2 (64-bit)")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_probe() {
        let dir = tempfile::tempdir().unwrap();
        let spike = dir.path().join("spike");
        write_script(&spike, "exit 1");
        assert!(!spike_available(&spike));
        assert!(!spike_available(&dir.path().join("missing")));
    }
}
