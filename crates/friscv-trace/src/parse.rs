//! Line classification and the commit accumulator.

use std::io::{self, BufRead};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{trace, warn};

use crate::state::{State, Store};

/// Number of architectural integer registers.
const NUM_REGS: u8 = 32;

/// A line that looks like a trace record but carries an unusable field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("invalid {field} `{text}`")]
    InvalidNumber { field: &'static str, text: String },
    #[error("register x{0} out of range")]
    RegisterOutOfRange(String),
}

impl LineError {
    /// Whether the line was a commit header with an unusable field.
    pub fn is_header(&self) -> bool {
        matches!(
            self,
            Self::InvalidNumber {
                field: "core" | "pc" | "instruction",
                ..
            }
        )
    }
}

/// Shape of one line of reference output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine {
    /// `core <n>: <pc> (<instruction>) <disassembly>`
    Commit {
        core: u32,
        pc: u64,
        instruction: u32,
        disassembly: String,
    },
    /// `x<n> = <value>`
    RegisterWrite { index: u8, value: u64 },
    /// `... store: addr=<addr> data=<data>`
    Store(Store),
    /// Anything else (prompts, banners, console output).
    Other,
}

static HEADER_PATTERN: OnceLock<Regex> = OnceLock::new();
static REGISTER_PATTERN: OnceLock<Regex> = OnceLock::new();
static STORE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Classify a single line.
///
/// The commit header may be preceded by anything (an interactive prompt for
/// instance), the store record may appear anywhere in the line, and register
/// writes may be indented. Numeric fields are hexadecimal with an optional
/// `0x` prefix; the core number is decimal.
pub fn classify(line: &str) -> Result<TraceLine, LineError> {
    let header = HEADER_PATTERN.get_or_init(|| {
        Regex::new(r"\bcore\s+(\S+):\s+(\S+)\s+\((\S+)\)\s*(.*)$").unwrap()
    });
    if let Some(caps) = header.captures(line) {
        let core = caps[1].parse::<u32>().map_err(|_| LineError::InvalidNumber {
            field: "core",
            text: caps[1].to_string(),
        })?;
        let pc = parse_hex("pc", &caps[2])?;
        let instruction = parse_hex("instruction", &caps[3])?;
        let instruction = u32::try_from(instruction).map_err(|_| LineError::InvalidNumber {
            field: "instruction",
            text: caps[3].to_string(),
        })?;
        return Ok(TraceLine::Commit {
            core,
            pc,
            instruction,
            disassembly: caps[4].trim_end().to_string(),
        });
    }

    let store = STORE_PATTERN
        .get_or_init(|| Regex::new(r"store:\s*addr=(\S+)\s+data=(\S+)").unwrap());
    if let Some(caps) = store.captures(line) {
        let addr = parse_hex("store address", &caps[1])?;
        let data = parse_hex("store data", &caps[2])?;
        return Ok(TraceLine::Store(Store::new(addr, data)));
    }

    let register =
        REGISTER_PATTERN.get_or_init(|| Regex::new(r"^\s*x(\d+)\s*=\s*(\S+)").unwrap());
    if let Some(caps) = register.captures(line) {
        let index = caps[1]
            .parse::<u8>()
            .ok()
            .filter(|&index| index < NUM_REGS)
            .ok_or_else(|| LineError::RegisterOutOfRange(caps[1].to_string()))?;
        let value = parse_hex("register value", &caps[2])?;
        return Ok(TraceLine::RegisterWrite { index, value });
    }

    Ok(TraceLine::Other)
}

fn parse_hex(field: &'static str, text: &str) -> Result<u64, LineError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|_| LineError::InvalidNumber {
        field,
        text: text.to_string(),
    })
}

enum ParserState {
    Idle,
    Accumulating(State),
    /// After a malformed header: continuation lines belong to no record.
    Discarding,
}

/// Accumulates trace lines into complete [`State`] records.
///
/// A record is only returned once it is closed, either by the next commit
/// header ([`feed`](Self::feed)) or by the producer going quiet
/// ([`finish`](Self::finish)). Register and store lines seen before the first
/// header, or after a malformed header, have no instruction to belong to and
/// are dropped.
pub struct CommitParser {
    state: ParserState,
    anomalies: usize,
}

impl CommitParser {
    pub const fn new() -> Self {
        Self {
            state: ParserState::Idle,
            anomalies: 0,
        }
    }

    /// Consume one line. Returns the previous record when `line` opens a new one.
    pub fn feed(&mut self, line: &str) -> Option<State> {
        match classify(line) {
            Ok(TraceLine::Commit {
                core,
                pc,
                instruction,
                disassembly,
            }) => {
                let closed = self.finish();
                self.state =
                    ParserState::Accumulating(State::new(core, pc, instruction, disassembly));
                closed
            }
            Ok(TraceLine::RegisterWrite { index, value }) => {
                if !self.amend(|state| state.with_register(index, value)) {
                    trace!(line, "register write outside of a commit");
                }
                None
            }
            Ok(TraceLine::Store(store)) => {
                if !self.amend(|state| state.with_store(store.addr, store.data)) {
                    trace!(line, "store outside of a commit");
                }
                None
            }
            Ok(TraceLine::Other) => None,
            Err(err) if err.is_header() => {
                self.anomalies += 1;
                warn!(line, "skipping malformed commit header: {err}");
                let closed = self.finish();
                self.state = ParserState::Discarding;
                closed
            }
            Err(err) => {
                self.anomalies += 1;
                warn!(line, "skipping malformed trace line: {err}");
                None
            }
        }
    }

    /// Close and return the open record, if any.
    pub fn finish(&mut self) -> Option<State> {
        match std::mem::replace(&mut self.state, ParserState::Idle) {
            ParserState::Accumulating(state) => Some(state),
            ParserState::Idle | ParserState::Discarding => None,
        }
    }

    /// Whether a commit header has been seen and not yet closed.
    pub const fn is_accumulating(&self) -> bool {
        matches!(self.state, ParserState::Accumulating(_))
    }

    /// Whether lines are being dropped until the next valid header.
    pub const fn is_discarding(&self) -> bool {
        matches!(self.state, ParserState::Discarding)
    }

    /// Number of malformed lines skipped so far.
    pub const fn anomalies(&self) -> usize {
        self.anomalies
    }

    fn amend(&mut self, apply: impl FnOnce(State) -> State) -> bool {
        match std::mem::replace(&mut self.state, ParserState::Idle) {
            ParserState::Accumulating(state) => {
                self.state = ParserState::Accumulating(apply(state));
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }
}

impl Default for CommitParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a complete commit log.
pub fn parse_commits(reader: impl BufRead) -> io::Result<Vec<State>> {
    let mut parser = CommitParser::new();
    let mut states = Vec::new();
    for line in reader.lines() {
        if let Some(state) = parser.feed(&line?) {
            states.push(state);
        }
    }
    states.extend(parser.finish());
    Ok(states)
}
