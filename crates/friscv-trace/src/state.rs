//! Architectural effects of one retired instruction.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A memory store observed while an instruction retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Store {
    pub addr: u64,
    pub data: u64,
}

impl Store {
    pub const fn new(addr: u64, data: u64) -> Self {
        Self { addr, data }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:08x}] <- 0x{:08x}", self.addr, self.data)
    }
}

/// One retired instruction as seen by a trace producer.
///
/// Only registers written by the instruction are present; an absent index
/// says nothing about that register. Stores keep their observation order.
/// The disassembly is carried for diagnostics and never compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct State {
    core: u32,
    pc: u64,
    instruction: u32,
    disassembly: String,
    registers: BTreeMap<u8, u64>,
    stores: Vec<Store>,
}

impl State {
    /// Create a state with no register writes and no stores.
    pub fn new(core: u32, pc: u64, instruction: u32, disassembly: impl Into<String>) -> Self {
        Self {
            core,
            pc,
            instruction,
            disassembly: disassembly.into(),
            registers: BTreeMap::new(),
            stores: Vec::new(),
        }
    }

    /// Record a register write. A later write to the same index replaces it.
    #[must_use]
    pub fn with_register(mut self, index: u8, value: u64) -> Self {
        self.registers.insert(index, value);
        self
    }

    /// Append a store after the ones already recorded.
    #[must_use]
    pub fn with_store(mut self, addr: u64, data: u64) -> Self {
        self.stores.push(Store::new(addr, data));
        self
    }

    pub const fn core(&self) -> u32 {
        self.core
    }

    pub const fn pc(&self) -> u64 {
        self.pc
    }

    pub const fn instruction(&self) -> u32 {
        self.instruction
    }

    pub fn disassembly(&self) -> &str {
        &self.disassembly
    }

    pub const fn registers(&self) -> &BTreeMap<u8, u64> {
        &self.registers
    }

    /// Value written to `index`, if this instruction wrote it.
    pub fn register(&self, index: u8) -> Option<u64> {
        self.registers.get(&index).copied()
    }

    pub fn stores(&self) -> &[Store] {
        &self.stores
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "core {}: 0x{:08x} (0x{:08x})",
            self.core, self.pc, self.instruction
        )?;
        if !self.disassembly.is_empty() {
            write!(f, " {}", self.disassembly)?;
        }
        for (index, value) in &self.registers {
            write!(f, "\n  x{index:<2} = 0x{value:08x}")?;
        }
        for store in &self.stores {
            write!(f, "\n  store {store}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_last_write_wins() {
        let state = State::new(0, 0x8000_0000, 0x0050_0293, "li t0, 5")
            .with_register(5, 1)
            .with_register(5, 2);
        assert_eq!(state.register(5), Some(2));
        assert_eq!(state.registers().len(), 1);
        assert_eq!(state.register(6), None);
    }

    #[test]
    fn test_builder_store_order() {
        let state = State::new(0, 0x8000_0004, 0x0051_2023, "")
            .with_store(0x100, 1)
            .with_store(0x104, 2);
        assert_eq!(state.stores(), &[Store::new(0x100, 1), Store::new(0x104, 2)]);
    }

    #[test]
    fn test_display() {
        let state = State::new(0, 0x8000_0000, 0x0050_0293, "li t0, 5")
            .with_register(5, 5)
            .with_store(0x8000_1000, 5);
        let text = state.to_string();
        assert!(text.starts_with("core 0: 0x80000000 (0x00500293) li t0, 5"));
        assert!(text.contains("x5  = 0x00000005"));
        assert!(text.contains("store [0x80001000] <- 0x00000005"));
    }
}
