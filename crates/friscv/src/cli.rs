//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use friscv::config::DEFAULT_CONFIG_PATH;
use friscv_image::DEFAULT_MEMORY_WORDS;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "friscv")]
#[command(about = "FRISC-V verification toolchain - lock-step RTL vs Spike co-simulation")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    /// Toolchain configuration file
    #[arg(long, global = true, value_name = "CONFIG_FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Co-simulate one image and report the first divergences
    Run {
        /// Image loaded by both the reference and the RTL
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        #[command(flatten)]
        session: SessionArgs,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Co-simulate many images
    Batch {
        /// Images and directories of images
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,

        /// Number of concurrent co-simulations (0 = one per CPU)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,

        /// Run images one after another
        #[arg(long, conflicts_with = "jobs")]
        sequential: bool,

        /// Image extension searched for in directories
        #[arg(long, default_value = "elf")]
        extension: String,

        #[command(flatten)]
        session: SessionArgs,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Convert legacy `.e` hex listings into binary memory images
    Image {
        /// Listing files
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Output directory (default: next to each listing)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write a SystemVerilog memory initializer
        #[arg(long)]
        sv: bool,

        /// Memory size in 32-bit words
        #[arg(long, default_value_t = DEFAULT_MEMORY_WORDS)]
        words: u64,
    },
    /// Build test images with the external build script
    Compile {
        /// Directory with the test sources
        #[arg(value_name = "SRC_DIR")]
        src_dir: PathBuf,

        /// Output base directory (images land in `<OUTPUT>/bin`)
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Build script (overrides `build_script` in the configuration)
        #[arg(long)]
        script: Option<PathBuf>,

        /// RISC-V toolchain installation, passed as RISCV_PATH
        #[arg(long, value_name = "RISCV_PATH")]
        riscv_tools_path: Option<PathBuf>,
    },
    /// Check that Spike and Vivado are installed and supported
    Check {
        /// Directory holding `spike` or `bin/spike`
        #[arg(long)]
        spike_path: Option<PathBuf>,

        /// Vivado installation directory
        #[arg(long)]
        vivado_path: Option<PathBuf>,

        /// Skip the Vivado check
        #[arg(long)]
        no_vivado: bool,

        /// Accept a Vivado version that is not in `supported_versions`
        #[arg(long)]
        force: bool,
    },
}

/// Comparison, reference and RTL options shared by `run` and `batch`.
///
/// Every option left unset falls back to the configuration file.
#[derive(clap::Args, Clone, Debug)]
pub struct SessionArgs {
    /// State compared on every instruction: all, pc, regs or mem
    #[arg(long, value_name = "SCOPE", help_heading = "Comparison")]
    pub compare: Option<String>,

    /// Comma-separated registers excluded from comparison (x5, 5 or t0)
    #[arg(long, value_name = "LIST", help_heading = "Comparison")]
    pub ignore_regs: Option<String>,

    /// Memory regions whose stores are compared ("start1-end1,start2-end2")
    #[arg(long, value_name = "LIST", help_heading = "Comparison")]
    pub mem_regions: Option<String>,

    /// Extra instructions one side may retire after the other ends
    #[arg(long, help_heading = "Comparison")]
    pub tolerance: Option<u64>,

    /// Stop at the first divergence
    #[arg(long, help_heading = "Comparison")]
    pub stop_on_error: bool,

    /// Time to wait for each instruction before declaring a hang
    #[arg(long, value_name = "MS", help_heading = "Comparison")]
    pub timeout_ms: Option<u64>,

    /// Stop after this many compared instructions
    #[arg(long, value_name = "N", help_heading = "Comparison")]
    pub max_commits: Option<u64>,

    /// Spike executable
    #[arg(long, value_name = "PATH", help_heading = "Reference")]
    pub spike: Option<PathBuf>,

    /// ISA string passed to Spike
    #[arg(long, help_heading = "Reference")]
    pub isa: Option<String>,

    /// Spike memory map (`base:size[,base:size...]`)
    #[arg(long, help_heading = "Reference")]
    pub mem_map: Option<String>,

    /// Initial program counter (hex with 0x, or decimal)
    #[arg(long, value_name = "PC", help_heading = "Reference")]
    pub start_pc: Option<String>,

    /// RTL simulator command; `{image}` is replaced by the image path
    #[arg(long, value_name = "COMMAND", help_heading = "RTL")]
    pub rtl_cmd: Option<String>,

    /// Directory of captured RTL commit logs named `<image>.log`
    #[arg(long, value_name = "DIR", help_heading = "RTL", conflicts_with = "rtl_cmd")]
    pub rtl_trace: Option<PathBuf>,
}

/// Output format for reports.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Text,
    /// JSON output
    Json,
}
