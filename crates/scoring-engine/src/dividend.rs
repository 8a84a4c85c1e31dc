//! Dividend rubric: growth, safety and shareholder returns.

use valuation_core::stats;
use valuation_core::{EquitySnapshot, RubricScore, YearValue};

use crate::rubric::{run_rubric, RubricRule};

const EXCELLENT_GROWTH: f64 = 0.10;
const GOOD_GROWTH: f64 = 0.06;
const FCF_PAYOUT_SAFE: f64 = 0.40;
const EPS_PAYOUT_SAFE: f64 = 0.50;
const PAYOUT_MODERATE: f64 = 0.75;
const BUYBACK_WINDOW: usize = 5;
const MIN_OBSERVATIONS: usize = 3;
const AVG_ROE_THRESHOLD: f64 = 0.15;
const LOW_BETA: f64 = 1.2;

pub const RULES: [RubricRule; 9] = [
    RubricRule {
        name: "Recent Dividend Growth",
        max_score: 1.0,
        eval: recent_dividend_growth,
    },
    RubricRule {
        name: "5Y Dividend Growth",
        max_score: 1.0,
        eval: five_year_dividend_growth,
    },
    RubricRule {
        name: "Growth Acceleration",
        max_score: 1.0,
        eval: growth_acceleration,
    },
    RubricRule {
        name: "FCF Payout",
        max_score: 1.0,
        eval: fcf_payout,
    },
    RubricRule {
        name: "EPS Payout",
        max_score: 1.0,
        eval: eps_payout,
    },
    RubricRule {
        name: "EPS Stability",
        max_score: 1.0,
        eval: eps_stability,
    },
    RubricRule {
        name: "Buyback",
        max_score: 1.0,
        eval: buyback,
    },
    RubricRule {
        name: "Average ROE",
        max_score: 1.0,
        eval: average_roe,
    },
    RubricRule {
        name: "Low Beta",
        max_score: 1.0,
        eval: low_beta,
    },
];

pub fn dividend_score(snapshot: &EquitySnapshot) -> RubricScore {
    run_rubric(&RULES, snapshot)
}

fn growth_bands(rate: Option<f64>, missing_reason: &str) -> (f64, String) {
    match rate {
        None => (0.0, missing_reason.to_string()),
        Some(rate) if rate >= EXCELLENT_GROWTH => {
            (1.0, format!("{:.1}% (excellent)", rate * 100.0))
        }
        Some(rate) if rate >= GOOD_GROWTH => (0.5, format!("{:.1}% (good)", rate * 100.0)),
        Some(rate) => (0.0, format!("{:.1}% (low)", rate * 100.0)),
    }
}

fn recent_dividend_growth(snapshot: &EquitySnapshot) -> (f64, String) {
    growth_bands(
        stats::recent_growth(snapshot.dividend_history.as_deref()),
        "No dividend history",
    )
}

fn five_year_dividend_growth(snapshot: &EquitySnapshot) -> (f64, String) {
    growth_bands(
        stats::cagr(snapshot.dividend_history.as_deref(), 5),
        "No dividend history",
    )
}

fn growth_acceleration(snapshot: &EquitySnapshot) -> (f64, String) {
    let five = stats::cagr(snapshot.dividend_history.as_deref(), 5);
    let ten = stats::cagr(snapshot.dividend_history.as_deref(), 10);
    match (five, ten) {
        (Some(five), Some(ten)) if ten > 0.0 => {
            let ratio = five / ten;
            if ratio >= 1.0 {
                (1.0, format!("5Y/10Y={ratio:.2} (accelerating)"))
            } else {
                (0.0, format!("5Y/10Y={ratio:.2} (decelerating)"))
            }
        }
        _ => (0.0, "Insufficient growth history".into()),
    }
}

fn payout_bands(ratio: Option<f64>, safe: f64, missing_reason: &str) -> (f64, String) {
    match ratio {
        None => (0.0, missing_reason.to_string()),
        Some(ratio) if ratio < safe => (1.0, format!("{:.0}% (safe)", ratio * 100.0)),
        Some(ratio) if ratio < PAYOUT_MODERATE => {
            (0.5, format!("{:.0}% (moderate)", ratio * 100.0))
        }
        Some(ratio) => (0.0, format!("{:.0}% (high)", ratio * 100.0)),
    }
}

fn fcf_payout(snapshot: &EquitySnapshot) -> (f64, String) {
    payout_bands(
        stats::payout_ratio(
            snapshot.dividend_history.as_deref(),
            snapshot.fcf_per_share_history.as_deref(),
        ),
        FCF_PAYOUT_SAFE,
        "No FCF payout data",
    )
}

fn eps_payout(snapshot: &EquitySnapshot) -> (f64, String) {
    payout_bands(
        stats::payout_ratio(
            snapshot.dividend_history.as_deref(),
            snapshot.eps_history.as_deref(),
        ),
        EPS_PAYOUT_SAFE,
        "No EPS payout data",
    )
}

fn eps_stability(snapshot: &EquitySnapshot) -> (f64, String) {
    let Some(history) = snapshot.eps_history.as_ref() else {
        return (0.0, "Insufficient EPS history".into());
    };
    if history.len() < MIN_OBSERVATIONS {
        return (0.0, "Insufficient EPS history".into());
    }
    let recent = stats::trailing(history, 10);
    if stats::declining_steps(&recent) <= 2 {
        return (1.0, "Rising trend".into());
    }
    let positive = recent
        .iter()
        .filter(|observation| observation.value > 0.0)
        .count();
    if positive + 2 >= recent.len() {
        (0.5, "Mostly positive".into())
    } else {
        (0.0, "Unstable earnings".into())
    }
}

fn buyback(snapshot: &EquitySnapshot) -> (f64, String) {
    let Some(history) = snapshot.shares_outstanding_history.as_ref() else {
        return (0.0, "Insufficient share count history".into());
    };
    if history.len() < BUYBACK_WINDOW {
        return (0.0, "Insufficient share count history".into());
    }
    let recent = stats::trailing(history, BUYBACK_WINDOW);
    let declining = stats::declining_steps(&recent);
    if declining + 2 >= recent.len() {
        (1.0, "Share count shrinking".into())
    } else {
        (0.0, "No buyback detected".into())
    }
}

fn average_roe(snapshot: &EquitySnapshot) -> (f64, String) {
    // One or two good years do not establish an average
    let history = snapshot
        .roe_history
        .as_deref()
        .filter(|history| history.len() >= MIN_OBSERVATIONS);
    match stats::trailing_average(history, 10) {
        None => (0.0, "Insufficient ROE history".into()),
        Some(average) if average >= AVG_ROE_THRESHOLD => {
            (1.0, format!("Avg={:.1}%", average * 100.0))
        }
        Some(average) => (0.0, format!("Avg={:.1}% (low)", average * 100.0)),
    }
}

fn low_beta(snapshot: &EquitySnapshot) -> (f64, String) {
    match snapshot.beta {
        None => (0.0, "No beta data".into()),
        Some(beta) if beta <= LOW_BETA => (1.0, format!("Beta={beta:.2} (stable)")),
        Some(beta) => (0.0, format!("Beta={beta:.2} (volatile)")),
    }
}
