//! FRISC-V co-simulation
//!
//! Runs the Spike reference model and an RTL simulation of the same image in
//! lock step and compares the architectural effects of every retired
//! instruction.
//!
//! # Example
//!
//! ```ignore
//! use friscv::compare::{ComparePolicy, Comparator};
//! use friscv::rtl::RtlCommand;
//! use friscv::session::{RtlSource, SessionConfig, run_session};
//! use friscv::spike::SpikeConfig;
//!
//! let config = SessionConfig::new(SpikeConfig::default(), Comparator::new(ComparePolicy::default()))
//!     .with_rtl(RtlSource::Command(RtlCommand::new("./sim.sh {image}")));
//! let result = run_session("bin/test1_alu.elf".as_ref(), &config)?;
//! assert!(result.passed());
//! ```

pub use friscv_trace::{State, Store};

mod error;
pub use error::*;

pub mod compare;
pub mod compile;
pub mod config;
pub mod metrics;
pub mod process;
pub mod report;
pub mod rtl;
pub mod runner;
pub mod session;
pub mod source;
pub mod spike;
pub mod tools;
