//! Human and machine readable renderings of comparison results.

use std::fmt::Write;

use friscv_trace::{State, Store};
use serde::Serialize;

use crate::compare::{ComparePolicy, CompareResult, Divergence, Facet};

/// One-line verdict.
pub fn headline(result: &CompareResult) -> String {
    let mut line = match result.first_divergence() {
        None => format!("PASS: {} instructions compared", result.compared),
        Some(div) => {
            let mut line = format!("FAIL: {} at instruction {}", div.kind, div.index);
            if let Some(state) = div.expected.as_ref().or(div.actual.as_ref()) {
                let _ = write!(line, " (pc 0x{:08x})", state.pc());
            }
            if result.divergences.len() > 1 {
                let _ = write!(line, ", {} divergences", result.divergences.len());
            }
            line
        }
    };
    if result.limit_reached {
        line.push_str(", commit limit reached");
    }
    if result.tolerated > 0 {
        let _ = write!(line, ", {} extra tolerated", result.tolerated);
    }
    line
}

fn commit_line(state: &State) -> String {
    format!(
        "core {}: 0x{:08x} (0x{:08x}) {}",
        state.core(),
        state.pc(),
        state.instruction(),
        state.disassembly()
    )
}

fn value(value: Option<u64>) -> String {
    value.map_or_else(|| "<unset>".to_string(), |v| format!("0x{v:08x}"))
}

fn stores(stores: &[&Store]) -> String {
    if stores.is_empty() {
        return "none".to_string();
    }
    stores
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Details of one divergence, several lines, no trailing newline.
pub fn render_divergence(div: &Divergence, policy: &ComparePolicy) -> String {
    let mut out = format!("divergence at instruction {}: {}", div.index, div.kind);
    if !div.facets.is_empty() {
        let facets: Vec<String> = div.facets.iter().map(ToString::to_string).collect();
        let _ = write!(out, " ({})", facets.join(", "));
    }
    if let Some(extra) = div.extra {
        let _ = write!(out, ", {extra} extra");
    }
    if let Some(expected) = &div.expected {
        let _ = write!(out, "\n  reference: {}", commit_line(expected));
    }
    if let Some(actual) = &div.actual {
        let _ = write!(out, "\n  RTL:       {}", commit_line(actual));
    }

    let (Some(expected), Some(actual)) = (&div.expected, &div.actual) else {
        return out;
    };
    if div.facets.contains(&Facet::Registers) {
        for (index, want, got) in policy.register_mismatches(expected, actual) {
            let _ = write!(
                out,
                "\n  x{index:<2} expected {}, got {}",
                value(want),
                value(got)
            );
        }
    }
    if div.facets.contains(&Facet::Stores) || div.facets.contains(&Facet::StoreCount) {
        let want: Vec<&Store> = policy.compared_stores(expected).collect();
        let got: Vec<&Store> = policy.compared_stores(actual).collect();
        let _ = write!(
            out,
            "\n  stores expected {}\n  stores got      {}",
            stores(&want),
            stores(&got)
        );
    }
    out
}

/// Full text report.
pub fn render_text(result: &CompareResult, policy: &ComparePolicy) -> String {
    let mut out = headline(result);
    for div in &result.divergences {
        out.push_str("\n\n");
        out.push_str(&render_divergence(div, policy));
    }
    let ends = [("reference", result.reference_end), ("RTL", result.rtl_end)];
    let ends: Vec<String> = ends
        .iter()
        .filter_map(|(side, end)| end.map(|end| format!("{side} {end}")))
        .collect();
    if !ends.is_empty() {
        out.push_str("\n\n");
        out.push_str(&ends.join(", "));
    }
    out
}

/// Pretty-printed JSON.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DivergenceKind;
    use crate::source::EndReason;

    fn state(pc: u64) -> State {
        State::new(0, pc, 0x0000_0093, "addi ra, zero, 0")
    }

    fn mismatch() -> CompareResult {
        CompareResult {
            compared: 5,
            divergences: vec![Divergence {
                index: 4,
                kind: DivergenceKind::Mismatch,
                expected: Some(state(0x8000_0010).with_register(1, 10).with_store(0x100, 1)),
                actual: Some(state(0x8000_0010).with_register(1, 11)),
                facets: vec![Facet::Registers, Facet::StoreCount],
                extra: None,
            }],
            ..CompareResult::default()
        }
    }

    #[test]
    fn test_headline() {
        let pass = CompareResult {
            compared: 12,
            reference_end: Some(EndReason::Finished),
            rtl_end: Some(EndReason::Finished),
            ..CompareResult::default()
        };
        assert_eq!(headline(&pass), "PASS: 12 instructions compared");
        assert_eq!(
            headline(&mismatch()),
            "FAIL: state mismatch at instruction 4 (pc 0x80000010)"
        );
    }

    #[test]
    fn test_render_mismatch() {
        let text = render_text(&mismatch(), &ComparePolicy::default());
        assert!(text.contains("(registers, store count)"), "{text}");
        assert!(text.contains("x1  expected 0x0000000a, got 0x0000000b"), "{text}");
        assert!(text.contains("stores expected [0x00000100] <- 0x00000001"), "{text}");
        assert!(text.contains("stores got      none"), "{text}");
    }

    #[test]
    fn test_render_length_divergence() {
        let result = CompareResult {
            compared: 3,
            divergences: vec![Divergence {
                index: 3,
                kind: DivergenceKind::RtlFinishedFirst,
                expected: Some(state(0x8000_000c)),
                actual: None,
                facets: Vec::new(),
                extra: Some(2),
            }],
            reference_end: None,
            rtl_end: Some(EndReason::Finished),
            ..CompareResult::default()
        };
        let text = render_text(&result, &ComparePolicy::default());
        assert!(
            text.contains("divergence at instruction 3: reference has more instructions, 2 extra"),
            "{text}"
        );
        assert!(!text.contains("RTL:  "), "{text}");
        assert!(text.ends_with("RTL finished"), "{text}");
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&mismatch()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["compared"], 5);
        assert_eq!(value["divergences"][0]["kind"], "mismatch");
        assert_eq!(value["divergences"][0]["facets"][1], "store_count");
        assert_eq!(value["divergences"][0]["expected"]["pc"], 0x8000_0010_u64);
    }
}
