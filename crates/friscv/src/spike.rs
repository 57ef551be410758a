//! Spike as the reference model.
//!
//! Spike runs in interactive debug mode (`-d`) with commit logging, and is
//! advanced one instruction per fetch. Its commit log goes to stderr.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::process::{ProcessController, ProcessOptions, Stream};

pub const DEFAULT_ISA: &str = "rv32i";
pub const DEFAULT_MEMORY_MAP: &str = "0x80000000:0x10000,0x20000000:0x1000";
pub const DEFAULT_START_PC: u64 = 0x8000_0000;

/// Interactive command that retires exactly one instruction.
const STEP_COMMAND: &str = "r 1";
const QUIT_COMMAND: &str = "q";

/// How to launch Spike.
#[derive(Debug, Clone)]
pub struct SpikeConfig {
    pub path: PathBuf,
    pub isa: String,
    /// Value of `-m`, as `base:size[,base:size...]`.
    pub memory_map: String,
    /// Initial PC override, `None` to use the ELF entry point.
    pub start_pc: Option<u64>,
    /// Extra arguments placed before the image.
    pub extra_args: Vec<String>,
    /// See [`ProcessOptions::drain_settle`].
    pub drain_settle: Duration,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("spike"),
            isa: DEFAULT_ISA.to_string(),
            memory_map: DEFAULT_MEMORY_MAP.to_string(),
            start_pc: Some(DEFAULT_START_PC),
            extra_args: Vec::new(),
            drain_settle: Duration::from_millis(5),
        }
    }
}

impl SpikeConfig {
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_isa(mut self, isa: impl Into<String>) -> Self {
        self.isa = isa.into();
        self
    }

    pub fn with_memory_map(mut self, memory_map: impl Into<String>) -> Self {
        self.memory_map = memory_map.into();
        self
    }

    pub const fn with_start_pc(mut self, pc: Option<u64>) -> Self {
        self.start_pc = pc;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub const fn with_drain_settle(mut self, settle: Duration) -> Self {
        self.drain_settle = settle;
        self
    }

    /// Command-line arguments for running `image`.
    pub fn args(&self, image: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-d".into(),
            "-l".into(),
            "--log-commits".into(),
            format!("--isa={}", self.isa).into(),
        ];
        if !self.memory_map.is_empty() {
            args.push(format!("-m{}", self.memory_map).into());
        }
        if let Some(pc) = self.start_pc {
            args.push(format!("--pc=0x{pc:x}").into());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(image.into());
        args
    }

    pub fn options(&self) -> ProcessOptions {
        ProcessOptions::default()
            .with_trace_stream(Stream::Stderr)
            .with_step_command(STEP_COMMAND)
            .with_quit_command(QUIT_COMMAND)
            .with_drain_settle(self.drain_settle)
    }

    /// An unstarted controller for `image`.
    pub fn controller(&self, image: &Path) -> ProcessController {
        let mut command = Command::new(&self.path);
        command.args(self.args(image));
        ProcessController::new("spike", command, self.options())
    }
}
