//! Confidence rubric: how reliably has this business performed.

use valuation_core::stats;
use valuation_core::{EquitySnapshot, RubricScore, YearValue};

use crate::rubric::{run_rubric, RubricRule};

const TREND_WINDOW: usize = 10;
const TREND_TOLERANCE: usize = 2;
const MIN_OBSERVATIONS: usize = 3;
const ROE_THRESHOLD: f64 = 0.15;

pub const RULES: [RubricRule; 6] = [
    RubricRule {
        name: "EPS Trend",
        max_score: 1.0,
        eval: eps_trend,
    },
    RubricRule {
        name: "Dividend Consistency",
        max_score: 1.0,
        eval: dividend_consistency,
    },
    RubricRule {
        name: "FCF Positive",
        max_score: 1.0,
        eval: fcf_positive,
    },
    RubricRule {
        name: "ROE Level",
        max_score: 1.0,
        eval: roe_level,
    },
    RubricRule {
        name: "Interest Coverage",
        max_score: 1.0,
        eval: interest_coverage,
    },
    RubricRule {
        name: "Net Margin",
        max_score: 1.0,
        eval: net_margin,
    },
];

pub fn confidence_score(snapshot: &EquitySnapshot) -> RubricScore {
    run_rubric(&RULES, snapshot)
}

/// Count trailing-window violations, passing when they stay within the
/// tolerance. The shared shape of the four history rules.
fn tolerant_window(
    history: Option<&Vec<YearValue>>,
    violates: fn(f64) -> bool,
) -> Option<(usize, usize)> {
    let history = history?;
    if history.len() < MIN_OBSERVATIONS {
        return None;
    }
    let recent = stats::trailing(history, TREND_WINDOW);
    let violations = recent
        .iter()
        .filter(|observation| violates(observation.value))
        .count();
    Some((violations, recent.len()))
}

fn eps_trend(snapshot: &EquitySnapshot) -> (f64, String) {
    let Some(history) = snapshot.eps_history.as_ref() else {
        return (0.0, "Insufficient EPS history".into());
    };
    if history.len() < MIN_OBSERVATIONS {
        return (0.0, "Insufficient EPS history".into());
    }
    let recent = stats::trailing(history, TREND_WINDOW);
    let declines = stats::declining_steps(&recent);
    if declines <= TREND_TOLERANCE {
        (1.0, format!("Rising trend over {}y", recent.len()))
    } else {
        (
            0.0,
            format!("Declining {} of {} years", declines, recent.len()),
        )
    }
}

fn dividend_consistency(snapshot: &EquitySnapshot) -> (f64, String) {
    match tolerant_window(snapshot.dividend_history.as_ref(), |value| value <= 0.0) {
        None => (0.0, "Insufficient dividend history".into()),
        Some((missed, window)) if missed <= TREND_TOLERANCE => {
            (1.0, format!("Consistent payer over {window}y"))
        }
        Some((missed, window)) => (0.0, format!("Missed or zero in {missed} of {window} years")),
    }
}

fn fcf_positive(snapshot: &EquitySnapshot) -> (f64, String) {
    match tolerant_window(snapshot.fcf_per_share_history.as_ref(), |value| value < 0.0) {
        None => (0.0, "Insufficient FCF history".into()),
        Some((negative, window)) if negative <= TREND_TOLERANCE => {
            (1.0, format!("Mostly positive over {window}y"))
        }
        Some((negative, window)) => (0.0, format!("Negative {negative} of {window} years")),
    }
}

fn roe_level(snapshot: &EquitySnapshot) -> (f64, String) {
    match tolerant_window(snapshot.roe_history.as_ref(), |value| {
        value < ROE_THRESHOLD
    }) {
        None => (0.0, "Insufficient ROE history".into()),
        Some((below, window)) if below <= TREND_TOLERANCE => (
            1.0,
            format!("Above {:.0}% for {window}y", ROE_THRESHOLD * 100.0),
        ),
        Some((below, window)) => (0.0, format!("Below threshold {below} of {window} years")),
    }
}

fn interest_coverage(snapshot: &EquitySnapshot) -> (f64, String) {
    match snapshot.interest_coverage {
        None => (0.0, "No interest coverage data".into()),
        // Negative coverage means no net interest expense at all
        Some(coverage) if coverage < 0.0 => (1.0, "No net debt".into()),
        Some(coverage) if coverage >= 10.0 => (1.0, format!("IC={coverage:.1}x (excellent)")),
        Some(coverage) if coverage >= 4.0 => (0.5, format!("IC={coverage:.1}x (adequate)")),
        Some(coverage) => (0.0, format!("IC={coverage:.1}x (low)")),
    }
}

fn net_margin(snapshot: &EquitySnapshot) -> (f64, String) {
    match stats::latest_value(snapshot.net_margin_history.as_deref()) {
        None => (0.0, "No net margin data".into()),
        Some(margin) if margin >= 0.20 => {
            (1.0, format!("Margin={:.1}% (excellent)", margin * 100.0))
        }
        Some(margin) if margin >= 0.10 => (0.5, format!("Margin={:.1}% (good)", margin * 100.0)),
        Some(margin) => (0.0, format!("Margin={:.1}% (low)", margin * 100.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn years(values: &[f64]) -> Vec<YearValue> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| YearValue::new(2015 + i as i32, v))
            .collect()
    }

    #[test]
    fn eps_trend_tolerates_two_down_years() {
        let snapshot = EquitySnapshot {
            eps_history: Some(years(&[1.0, 0.9, 1.1, 1.0, 1.4, 1.5])),
            ..Default::default()
        };
        let (score, reason) = eps_trend(&snapshot);
        assert_eq!(score, 1.0);
        assert!(reason.contains("Rising"));
    }

    #[test]
    fn eps_trend_fails_on_three_declines() {
        let snapshot = EquitySnapshot {
            eps_history: Some(years(&[2.0, 1.8, 1.9, 1.7, 1.8, 1.6])),
            ..Default::default()
        };
        let (score, _) = eps_trend(&snapshot);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn short_history_scores_zero_not_panic() {
        let snapshot = EquitySnapshot {
            eps_history: Some(years(&[1.0, 1.1])),
            ..Default::default()
        };
        assert_eq!(eps_trend(&snapshot).0, 0.0);
    }

    #[test]
    fn interest_coverage_bands() {
        let mut snapshot = EquitySnapshot::default();
        assert_eq!(interest_coverage(&snapshot).0, 0.0);
        snapshot.interest_coverage = Some(-1.0);
        assert_eq!(interest_coverage(&snapshot).0, 1.0);
        snapshot.interest_coverage = Some(12.0);
        assert_eq!(interest_coverage(&snapshot).0, 1.0);
        snapshot.interest_coverage = Some(5.0);
        assert_eq!(interest_coverage(&snapshot).0, 0.5);
        snapshot.interest_coverage = Some(1.5);
        assert_eq!(interest_coverage(&snapshot).0, 0.0);
    }

    #[test]
    fn net_margin_uses_latest_observation() {
        let snapshot = EquitySnapshot {
            net_margin_history: Some(years(&[0.05, 0.22])),
            ..Default::default()
        };
        let (score, reason) = net_margin(&snapshot);
        assert_eq!(score, 1.0);
        assert!(reason.contains("22.0%"));
    }
}
