//! Differential comparison of reference and RTL traces.

mod lockstep;
mod policy;

pub use lockstep::{
    CompareResult, Comparator, DEFAULT_TIMEOUT, Divergence, DivergenceKind,
};
pub use policy::{
    ComparePolicy, Facet, MemRegion, Scope, parse_number, parse_register, parse_register_list,
    parse_regions,
};
