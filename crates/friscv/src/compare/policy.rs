//! What "equal" means for two retired instructions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use friscv_trace::{State, Store};
use serde::Serialize;

use crate::error::ConfigError;

/// Facets included in the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Pc,
    Registers,
    Stores,
}

impl Scope {
    const fn includes(self, facet: Facet) -> bool {
        match (self, facet) {
            (Self::All, _)
            | (Self::Pc, Facet::Pc)
            | (Self::Registers, Facet::Registers)
            | (Self::Stores, Facet::Stores) => true,
            _ => false,
        }
    }
}

impl FromStr for Scope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "pc" => Ok(Self::Pc),
            "regs" | "registers" => Ok(Self::Registers),
            "mem" | "stores" => Ok(Self::Stores),
            _ => Err(ConfigError::invalid("comparison scope", s)),
        }
    }
}

/// A part of the state that disagreed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Pc,
    Registers,
    Stores,
    /// Different number of stores. Reported whatever the scope.
    StoreCount,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pc => write!(f, "pc"),
            Self::Registers => write!(f, "registers"),
            Self::Stores => write!(f, "stores"),
            Self::StoreCount => write!(f, "store count"),
        }
    }
}

/// Half-open address range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemRegion {
    pub start: u64,
    pub end: u64,
}

impl MemRegion {
    pub const fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }
}

impl FromStr for MemRegion {
    type Err = ConfigError;

    /// `start-end`, each bound hex with `0x` or decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::invalid("memory region", s);
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start = parse_number(start.trim()).ok_or_else(invalid)?;
        let end = parse_number(end.trim()).ok_or_else(invalid)?;
        if start >= end {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for MemRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}-0x{:x}", self.start, self.end)
    }
}

/// Parse a decimal number or a `0x` prefixed hex number.
pub fn parse_number(text: &str) -> Option<u64> {
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Comma-separated list of `start-end` regions.
pub fn parse_regions(text: &str) -> Result<Vec<MemRegion>, ConfigError> {
    text.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Register index from `x<n>`, `<n>` or an ABI name (`fp` is `s0`).
pub fn parse_register(name: &str) -> Option<u8> {
    let name = name.trim().to_lowercase();
    let index = match name.as_str() {
        "fp" => Some(8),
        _ => name
            .strip_prefix('x')
            .unwrap_or(name.as_str())
            .parse::<u8>()
            .ok()
            .or_else(|| {
                ABI_NAMES
                    .iter()
                    .position(|abi| *abi == name)
                    .and_then(|index| u8::try_from(index).ok())
            }),
    };
    index.filter(|&index| index < 32)
}

/// Comma-separated register names.
pub fn parse_register_list(text: &str) -> Result<BTreeSet<u8>, ConfigError> {
    text.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| parse_register(part).ok_or_else(|| ConfigError::invalid("register", part)))
        .collect()
}

/// Comparison policy.
#[derive(Debug, Clone, Default)]
pub struct ComparePolicy {
    pub scope: Scope,
    /// Registers never compared.
    pub ignored_registers: BTreeSet<u8>,
    /// Stores outside every region are not compared. Empty means everywhere.
    pub memory_regions: Vec<MemRegion>,
    /// Extra or missing commits tolerated when one side ends first.
    pub tolerance: u64,
    /// Halt at the first divergence instead of collecting all of them.
    pub stop_on_first: bool,
}

impl ComparePolicy {
    #[must_use]
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_ignored_registers(mut self, registers: impl IntoIterator<Item = u8>) -> Self {
        self.ignored_registers = registers.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_memory_regions(mut self, regions: Vec<MemRegion>) -> Self {
        self.memory_regions = regions;
        self
    }

    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: u64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub const fn with_stop_on_first(mut self, stop: bool) -> Self {
        self.stop_on_first = stop;
        self
    }

    fn in_regions(&self, store: &Store) -> bool {
        self.memory_regions.is_empty()
            || self
                .memory_regions
                .iter()
                .any(|region| region.contains(store.addr))
    }

    /// Registers that disagree: index, expected value, actual value.
    pub fn register_mismatches(
        &self,
        expected: &State,
        actual: &State,
    ) -> Vec<(u8, Option<u64>, Option<u64>)> {
        let indices: BTreeSet<u8> = expected
            .registers()
            .keys()
            .chain(actual.registers().keys())
            .copied()
            .filter(|index| !self.ignored_registers.contains(index))
            .collect();
        indices
            .into_iter()
            .map(|index| (index, expected.register(index), actual.register(index)))
            .filter(|(_, want, got)| want != got)
            .collect()
    }

    /// Stores that take part in the comparison.
    pub fn compared_stores<'a>(&'a self, state: &'a State) -> impl Iterator<Item = &'a Store> {
        state
            .stores()
            .iter()
            .filter(move |store| self.in_regions(store))
    }

    /// Facets on which `actual` disagrees with `expected`. Empty means equal.
    pub fn compare(&self, expected: &State, actual: &State) -> Vec<Facet> {
        let mut facets = Vec::new();

        if self.scope.includes(Facet::Pc) && expected.pc() != actual.pc() {
            facets.push(Facet::Pc);
        }

        if self.scope.includes(Facet::Registers)
            && !self.register_mismatches(expected, actual).is_empty()
        {
            facets.push(Facet::Registers);
        }

        if expected.stores().len() != actual.stores().len() {
            facets.push(Facet::StoreCount);
        } else if self.scope.includes(Facet::Stores)
            && !self
                .compared_stores(expected)
                .eq(self.compared_stores(actual))
        {
            facets.push(Facet::Stores);
        }

        facets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pc: u64) -> State {
        State::new(0, pc, 0x13, "nop")
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("all".parse::<Scope>().unwrap(), Scope::All);
        assert_eq!("regs".parse::<Scope>().unwrap(), Scope::Registers);
        assert_eq!("mem".parse::<Scope>().unwrap(), Scope::Stores);
        assert_eq!("PC".parse::<Scope>().unwrap(), Scope::Pc);
        assert!("flags".parse::<Scope>().is_err());
    }

    #[test]
    fn test_parse_register() {
        assert_eq!(parse_register("x7"), Some(7));
        assert_eq!(parse_register("31"), Some(31));
        assert_eq!(parse_register("sp"), Some(2));
        assert_eq!(parse_register("fp"), Some(8));
        assert_eq!(parse_register("A0"), Some(10));
        assert_eq!(parse_register("t6"), Some(31));
        assert_eq!(parse_register("x32"), None);
        assert_eq!(parse_register("q1"), None);
        assert_eq!(
            parse_register_list("x1, sp,a0").unwrap(),
            BTreeSet::from([1, 2, 10])
        );
        assert!(parse_register_list("x1,bogus").is_err());
    }

    #[test]
    fn test_parse_regions() {
        let regions = parse_regions("0x80000000-0x80001000, 16-32").unwrap();
        assert_eq!(
            regions,
            vec![
                MemRegion {
                    start: 0x8000_0000,
                    end: 0x8000_1000
                },
                MemRegion { start: 16, end: 32 },
            ]
        );
        assert!(regions[1].contains(16));
        assert!(!regions[1].contains(32));
        assert!(parse_regions("0x10-0x10").is_err());
        assert!(parse_regions("0x10").is_err());
        assert!(parse_regions("").unwrap().is_empty());
    }

    #[test]
    fn test_equal_states() {
        let a = state(0x100).with_register(5, 1).with_store(0x10, 2);
        assert!(ComparePolicy::default().compare(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_disassembly_not_compared() {
        let a = State::new(0, 0x100, 0x13, "nop");
        let b = State::new(0, 0x100, 0x13, "addi x0, x0, 0");
        assert!(ComparePolicy::default().compare(&a, &b).is_empty());
    }

    #[test]
    fn test_pc_mismatch() {
        let policy = ComparePolicy::default();
        assert_eq!(policy.compare(&state(0x100), &state(0x104)), vec![Facet::Pc]);
        let regs_only = policy.with_scope(Scope::Registers);
        assert!(regs_only.compare(&state(0x100), &state(0x104)).is_empty());
    }

    #[test]
    fn test_register_union() {
        let policy = ComparePolicy::default();
        let a = state(0).with_register(5, 1);
        let b = state(0).with_register(5, 1).with_register(6, 2);
        assert_eq!(policy.compare(&a, &b), vec![Facet::Registers]);
        assert_eq!(policy.register_mismatches(&a, &b), vec![(6, None, Some(2))]);
    }

    #[test]
    fn test_ignored_registers() {
        let policy = ComparePolicy::default().with_ignored_registers([7]);
        let a = state(0).with_register(7, 1);
        let b = state(0).with_register(7, 2);
        assert!(policy.compare(&a, &b).is_empty());
        let c = state(0).with_register(8, 2);
        assert_eq!(policy.compare(&a, &c), vec![Facet::Registers]);
    }

    #[test]
    fn test_store_regions() {
        let policy = ComparePolicy::default().with_memory_regions(vec![MemRegion {
            start: 0x1000,
            end: 0x2000,
        }]);
        let a = state(0).with_store(0x1000, 1).with_store(0x3000, 1);
        let b = state(0).with_store(0x1000, 1).with_store(0x3000, 9);
        assert!(policy.compare(&a, &b).is_empty());
        let c = state(0).with_store(0x1000, 2).with_store(0x3000, 1);
        assert_eq!(policy.compare(&a, &c), vec![Facet::Stores]);
    }

    #[test]
    fn test_store_order_matters() {
        let policy = ComparePolicy::default();
        let a = state(0).with_store(0x10, 1).with_store(0x14, 2);
        let b = state(0).with_store(0x14, 2).with_store(0x10, 1);
        assert_eq!(policy.compare(&a, &b), vec![Facet::Stores]);
    }

    #[test]
    fn test_store_count_unconditional() {
        let policy = ComparePolicy::default()
            .with_scope(Scope::Pc)
            .with_memory_regions(vec![MemRegion { start: 0, end: 4 }]);
        let a = state(0).with_store(0x100, 1);
        let b = state(0);
        assert_eq!(policy.compare(&a, &b), vec![Facet::StoreCount]);
    }
}
