//! Value rubric: is the security cheap relative to its own record, a
//! benchmark index, and absolute thresholds.

use valuation_core::stats;
use valuation_core::{EquitySnapshot, RubricScore, YearValue};

use crate::rubric::{run_rubric, RubricRule};

const HIGH_YIELD: f64 = 0.04;
const BENCHMARK_YIELD_MULTIPLE: f64 = 1.5;
/// Fallback index yield when no source supplied one
const DEFAULT_BENCHMARK_YIELD: f64 = 0.015;
const BENCHMARK_PE_DISCOUNT: f64 = 0.8;
const CHOWDER_THRESHOLD: f64 = 0.15;
const LOW_PE: f64 = 15.0;
const COMBO_ROE: f64 = 0.20;

pub const RULES: [RubricRule; 9] = [
    RubricRule {
        name: "PE vs History",
        max_score: 1.0,
        eval: pe_vs_history,
    },
    RubricRule {
        name: "Yield vs History",
        max_score: 1.0,
        eval: yield_vs_history,
    },
    RubricRule {
        name: "High Yield",
        max_score: 1.0,
        eval: high_yield,
    },
    RubricRule {
        name: "Yield vs Benchmark",
        max_score: 1.0,
        eval: yield_vs_benchmark,
    },
    RubricRule {
        name: "PE vs Benchmark",
        max_score: 1.0,
        eval: pe_vs_benchmark,
    },
    RubricRule {
        name: "Chowder Rule",
        max_score: 1.0,
        eval: chowder_rule,
    },
    RubricRule {
        name: "FCF Yield",
        max_score: 2.0,
        eval: fcf_yield,
    },
    RubricRule {
        name: "Low PE",
        max_score: 1.0,
        eval: low_pe,
    },
    RubricRule {
        name: "PE + ROE",
        max_score: 1.0,
        eval: pe_roe_combo,
    },
];

pub fn value_score(snapshot: &EquitySnapshot) -> RubricScore {
    run_rubric(&RULES, snapshot)
}

fn current_pe(snapshot: &EquitySnapshot) -> Option<f64> {
    snapshot
        .pe_ratio
        .or_else(|| stats::latest_value(snapshot.pe_history.as_deref()))
        .filter(|pe| *pe > 0.0)
}

fn current_yield(snapshot: &EquitySnapshot) -> Option<f64> {
    snapshot.dividend_yield.or_else(|| {
        stats::yield_from_dividends(
            snapshot.dividend_history.as_deref(),
            snapshot.current_price,
        )
    })
}

fn pe_vs_history(snapshot: &EquitySnapshot) -> (f64, String) {
    let Some((mean, std)) = stats::mean_std(snapshot.pe_history.as_deref()) else {
        return (0.0, "Insufficient PE history".into());
    };
    let Some(pe) = current_pe(snapshot) else {
        return (0.0, "No current PE".into());
    };
    let lower_band = (mean - std).max(0.0);
    if pe <= lower_band {
        (1.0, format!("{pe:.1} <= {lower_band:.1} (low)"))
    } else {
        (0.0, format!("{pe:.1} > {lower_band:.1}"))
    }
}

fn yield_vs_history(snapshot: &EquitySnapshot) -> (f64, String) {
    let Some((mean, std)) = stats::mean_std(snapshot.dividend_yield_history.as_deref()) else {
        return (0.0, "Insufficient yield history".into());
    };
    let current = snapshot
        .dividend_yield
        .or_else(|| stats::latest_value(snapshot.dividend_yield_history.as_deref()));
    let Some(current) = current else {
        return (0.0, "No current yield".into());
    };
    let upper_band = mean + std;
    if current >= upper_band {
        (
            1.0,
            format!(
                "{:.2}% >= {:.2}% (high)",
                current * 100.0,
                upper_band * 100.0
            ),
        )
    } else {
        (
            0.0,
            format!("{:.2}% < {:.2}%", current * 100.0, upper_band * 100.0),
        )
    }
}

fn high_yield(snapshot: &EquitySnapshot) -> (f64, String) {
    match current_yield(snapshot) {
        None => (0.0, "No yield data".into()),
        Some(current) if current >= HIGH_YIELD => {
            (1.0, format!("Yield={:.1}%", current * 100.0))
        }
        Some(current) => (0.0, format!("Yield={:.1}%", current * 100.0)),
    }
}

fn yield_vs_benchmark(snapshot: &EquitySnapshot) -> (f64, String) {
    let Some(current) = current_yield(snapshot) else {
        return (0.0, "No yield data".into());
    };
    let benchmark = snapshot.benchmark_yield.unwrap_or(DEFAULT_BENCHMARK_YIELD);
    let bar = benchmark * BENCHMARK_YIELD_MULTIPLE;
    if current >= bar {
        (
            1.0,
            format!(
                "{:.1}% >= 1.5x benchmark ({:.2}%)",
                current * 100.0,
                benchmark * 100.0
            ),
        )
    } else {
        (
            0.0,
            format!(
                "{:.1}% < 1.5x benchmark ({:.2}%)",
                current * 100.0,
                benchmark * 100.0
            ),
        )
    }
}

fn pe_vs_benchmark(snapshot: &EquitySnapshot) -> (f64, String) {
    let (Some(pe), Some(benchmark)) = (current_pe(snapshot), snapshot.benchmark_pe) else {
        return (0.0, "No benchmark PE".into());
    };
    let bar = benchmark * BENCHMARK_PE_DISCOUNT;
    if pe <= bar {
        (
            1.0,
            format!("PE {pe:.1} <= {bar:.1} (discount to benchmark {benchmark:.1})"),
        )
    } else {
        (0.0, format!("PE {pe:.1} > {bar:.1} (benchmark {benchmark:.1})"))
    }
}

fn chowder_rule(snapshot: &EquitySnapshot) -> (f64, String) {
    let current = current_yield(snapshot);
    let growth = stats::cagr(snapshot.dividend_history.as_deref(), 5);
    match (current, growth) {
        (Some(current), Some(growth)) => {
            let chowder = current + growth;
            if chowder >= CHOWDER_THRESHOLD {
                (1.0, format!("{:.1}% >= 15%", chowder * 100.0))
            } else {
                (0.0, format!("{:.1}% < 15%", chowder * 100.0))
            }
        }
        _ => (0.0, "Insufficient data".into()),
    }
}

fn fcf_yield(snapshot: &EquitySnapshot) -> (f64, String) {
    let fcf = stats::latest_value(snapshot.fcf_per_share_history.as_deref());
    let (Some(fcf), Some(price)) = (fcf, snapshot.current_price) else {
        return (0.0, "No FCF or price data".into());
    };
    if price <= 0.0 {
        return (0.0, "No FCF or price data".into());
    }
    let ratio = fcf / price;
    let reason = format!("FCF Yield={:.1}%", ratio * 100.0);
    if ratio >= 0.10 {
        (2.0, reason)
    } else if ratio >= 0.05 {
        (1.0, reason)
    } else {
        (0.0, reason)
    }
}

fn low_pe(snapshot: &EquitySnapshot) -> (f64, String) {
    match current_pe(snapshot) {
        None => (0.0, "No PE data".into()),
        Some(pe) if pe < LOW_PE => (1.0, format!("PE={pe:.1}")),
        Some(pe) => (0.0, format!("PE={pe:.1}")),
    }
}

fn pe_roe_combo(snapshot: &EquitySnapshot) -> (f64, String) {
    let pe = current_pe(snapshot);
    let roe = stats::trailing_average(snapshot.roe_history.as_deref(), 10);
    match (pe, roe) {
        (Some(pe), Some(roe)) => {
            let reason = format!("PE={:.1}, ROE={:.1}%", pe, roe * 100.0);
            if pe < LOW_PE && roe >= COMBO_ROE {
                (1.0, reason)
            } else {
                (0.0, reason)
            }
        }
        _ => (0.0, "Insufficient data".into()),
    }
}
