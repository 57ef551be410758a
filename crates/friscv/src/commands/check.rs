//! Check command.

use std::path::Path;

use friscv::tools::{find_spike, find_vivado, spike_available, supported_version, vivado_version};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Handle the `check` command. `vivado` is `None` when the Vivado check is
/// skipped, `Some(None)` to search `PATH`.
pub fn cmd_check(
    spike_path: Option<&Path>,
    vivado: Option<Option<&Path>>,
    supported: &[String],
    force: bool,
) -> i32 {
    let mut ok = true;

    if let Some(custom) = vivado {
        ok &= check_vivado(custom, supported, force);
    }

    terminal::info("Looking for Spike...");
    match find_spike(spike_path) {
        Some(path) if spike_available(&path) => {
            terminal::success(&format!("Spike found: {}", path.display()));
        }
        Some(path) => {
            terminal::error(&format!("Spike at {} does not run", path.display()));
            ok = false;
        }
        None => {
            terminal::error("Spike is not installed or not accessible");
            terminal::indent("Install Spike or pass its location with --spike-path.");
            ok = false;
        }
    }

    if ok {
        terminal::success("All dependencies are satisfied.");
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

fn check_vivado(custom: Option<&Path>, supported: &[String], force: bool) -> bool {
    terminal::info("Looking for Vivado...");
    let Some(version) = find_vivado(custom).and_then(|path| vivado_version(&path)) else {
        terminal::error("Vivado is not installed or not found");
        terminal::indent("Put Vivado in PATH or pass its location with --vivado-path.");
        return false;
    };
    terminal::success(&format!("Vivado found: {version}"));

    if supported.is_empty() {
        terminal::warning("No supported Vivado versions specified in configuration.");
        return true;
    }
    if let Some(matched) = supported_version(&version, supported) {
        terminal::success(&format!("Vivado version {matched} is supported."));
        return true;
    }

    terminal::warning(&format!(
        "Vivado version {version} is not in the list of supported versions:"
    ));
    for candidate in supported {
        terminal::indent(&format!("- {candidate}"));
    }
    if force {
        terminal::warning("Continuing because of --force.");
        true
    } else {
        terminal::indent("Use --force to continue anyway.");
        false
    }
}
