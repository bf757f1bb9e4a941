//! Run report: ranked cycle table and stats summary.

use std::fmt::Write as _;

use strategy::engine::SearchOutcome;

/// Human-readable table of the top `limit` cycles.
pub fn render_table(outcome: &SearchOutcome, limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4} {:>12} {:>12} {:>6}  route",
        "#", "raw %", "net %", "pass"
    );
    for (i, cycle) in outcome.cycles.iter().take(limit).enumerate() {
        let route = cycle
            .legs
            .iter()
            .map(|leg| short_id(&leg.pool_id))
            .collect::<Vec<_>>()
            .join(" → ");
        let _ = writeln!(
            out,
            "{:<4} {:>12} {:>12} {:>6}  {}",
            i + 1,
            trim_pct(&cycle.raw_profit_pct.to_string()),
            trim_pct(&cycle.net_after_costs_pct.to_string()),
            if cycle.passes { "yes" } else { "no" },
            route
        );
    }
    out
}

pub fn render_stats(outcome: &SearchOutcome) -> String {
    let s = &outcome.stats;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "pools={} outliers_dropped={} candidates={} triples={} bounds_discards={} emitted={} passing={}",
        s.pools_in,
        s.anchor_outliers_dropped,
        s.candidate_intermediates,
        s.triples_evaluated,
        s.triples_discarded_bounds,
        s.cycles_emitted,
        s.cycles_passing,
    );
    for (kind, count) in &s.swap_errors {
        let _ = writeln!(out, "  error[{kind}]={count}");
    }
    if s.cancelled {
        let _ = writeln!(out, "  (cancelled before completion)");
    }
    out
}

fn short_id(id: &str) -> String {
    if id.len() <= 8 {
        id.to_string()
    } else {
        format!("{}…{}", &id[..4], &id[id.len() - 4..])
    }
}

/// Percentages out of the decimal pipeline carry full precision; eight
/// fractional digits is plenty for a terminal.
fn trim_pct(s: &str) -> String {
    match s.find('.') {
        Some(dot) if s.len() > dot + 9 => s[..dot + 9].to_string(),
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_pct() {
        assert_eq!(trim_pct("1.23456789012345"), "1.23456789");
        assert_eq!(trim_pct("-0.5"), "-0.5");
        assert_eq!(trim_pct("42"), "42");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(
            short_id("58oQChGsNrtmhaJSRph38tB3BwpL66F42FMa86Fv3Gry"),
            "58oQ…3Gry"
        );
        assert_eq!(short_id("tiny"), "tiny");
    }
}
