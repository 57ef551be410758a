//! Retired-instruction state and commit-log parsing.
//!
//! A reference model running with commit logging prints one header per
//! retired instruction followed by the register writes and memory stores it
//! performed:
//!
//! ```text
//! core   0: 0x80000000 (0x00500293) li t0, 5
//!   x5 = 0x00000005
//! core   0: 0x80000004 (0x00512023) sw t0, 0(sp)
//!   store: addr=0x80001000 data=0x00000005
//! ```
//!
//! [`CommitParser`] turns that stream into [`State`] records, one per
//! header, and never hands out a record before the next header (or the end
//! of input) closes it.

mod parse;
mod state;

pub use parse::{CommitParser, LineError, TraceLine, classify, parse_commits};
pub use state::{State, Store};
