//! Fair-value models: three alternative intrinsic-price estimates for an
//! equity snapshot. Each model degrades to a null estimate with an
//! explanatory reason instead of erroring; `is_undervalued` is a strict
//! comparison and only true when both prices exist.

use valuation_core::stats;
use valuation_core::{EquitySnapshot, FairValueEstimate, ValuationModel};

#[derive(Debug, Clone)]
pub struct FairValueConfig {
    /// Annual growth rates are clamped into this range before they feed a
    /// projection, so one outlier year cannot explode the estimate
    pub growth_floor: f64,
    pub growth_ceiling: f64,
}

impl Default for FairValueConfig {
    fn default() -> Self {
        Self {
            growth_floor: 0.02,
            growth_ceiling: 0.25,
        }
    }
}

pub fn estimate(
    snapshot: &EquitySnapshot,
    model: ValuationModel,
    expected_return: f64,
    pb_threshold: f64,
) -> FairValueEstimate {
    estimate_with_config(
        snapshot,
        model,
        expected_return,
        pb_threshold,
        &FairValueConfig::default(),
    )
}

pub fn estimate_with_config(
    snapshot: &EquitySnapshot,
    model: ValuationModel,
    expected_return: f64,
    pb_threshold: f64,
    config: &FairValueConfig,
) -> FairValueEstimate {
    match model {
        ValuationModel::Growth => growth_estimate(snapshot, config),
        ValuationModel::Dividend => dividend_estimate(snapshot, expected_return),
        ValuationModel::Asset => asset_estimate(snapshot, pb_threshold),
    }
}

fn null_estimate(
    model: ValuationModel,
    current_price: Option<f64>,
    explanation: &str,
) -> FairValueEstimate {
    FairValueEstimate {
        model,
        fair_value: None,
        current_price,
        is_undervalued: false,
        explanation: explanation.to_string(),
    }
}

fn priced_estimate(
    model: ValuationModel,
    fair_value: f64,
    current_price: Option<f64>,
    explanation: String,
) -> FairValueEstimate {
    let fair_value = round_cents(fair_value);
    FairValueEstimate {
        model,
        fair_value: Some(fair_value),
        current_price,
        is_undervalued: current_price.is_some_and(|price| price < fair_value),
        explanation,
    }
}

/// Forward earnings times a growth-derived multiple. Prefers analyst
/// forward inputs, falls back to the historical record.
fn growth_estimate(snapshot: &EquitySnapshot, config: &FairValueConfig) -> FairValueEstimate {
    let price = snapshot.current_price;

    let forward = snapshot
        .eps_next_year
        .zip(snapshot.eps_growth_next_5y)
        .filter(|(eps, growth)| *eps > 0.0 && *growth > 0.0);

    let (eps, growth, basis) = match forward {
        Some((eps, growth)) => (eps, growth, "forward"),
        None => {
            let eps = stats::latest_value(snapshot.eps_history.as_deref());
            let growth = stats::cagr(snapshot.eps_history.as_deref(), 5);
            match eps.zip(growth).filter(|(eps, growth)| *eps > 0.0 && *growth > 0.0) {
                Some((eps, growth)) => (eps, growth, "historical"),
                None => {
                    return null_estimate(
                        ValuationModel::Growth,
                        price,
                        "Cannot estimate: EPS or growth data unavailable",
                    )
                }
            }
        }
    };

    let clamped = growth.clamp(config.growth_floor, config.growth_ceiling);
    // Lynch-style multiple: fair PE equals the growth rate in percent
    let fair_value = eps * (clamped * 100.0);
    priced_estimate(
        ValuationModel::Growth,
        fair_value,
        price,
        format!(
            "EPS (${eps:.2}) x growth multiple ({:.1}) = ${:.2} ({basis})",
            clamped * 100.0,
            round_cents(fair_value),
        ),
    )
}

/// Gordon growth model: next-period dividend over (expected return minus
/// growth). Null whenever the denominator would be zero or negative.
fn dividend_estimate(snapshot: &EquitySnapshot, expected_return: f64) -> FairValueEstimate {
    let price = snapshot.current_price;

    let base_dividend = snapshot
        .dividend_est
        .filter(|dividend| *dividend > 0.0)
        .or_else(|| stats::latest_value(snapshot.dividend_history.as_deref()));
    let Some(base_dividend) = base_dividend.filter(|dividend| *dividend > 0.0) else {
        return null_estimate(
            ValuationModel::Dividend,
            price,
            "Cannot estimate: no dividend data",
        );
    };

    let growth = stats::cagr(snapshot.dividend_history.as_deref(), 5).unwrap_or(0.0);
    if expected_return <= growth {
        return null_estimate(
            ValuationModel::Dividend,
            price,
            "Cannot estimate: expected return does not exceed dividend growth",
        );
    }

    let next_dividend = base_dividend * (1.0 + growth);
    let fair_value = next_dividend / (expected_return - growth);
    priced_estimate(
        ValuationModel::Dividend,
        fair_value,
        price,
        format!(
            "Next dividend (${next_dividend:.2}) / (return {:.1}% - growth {:.1}%) = ${:.2}",
            expected_return * 100.0,
            growth * 100.0,
            round_cents(fair_value),
        ),
    )
}

/// Book value per share times a caller-supplied reasonable P/B multiple
fn asset_estimate(snapshot: &EquitySnapshot, pb_threshold: f64) -> FairValueEstimate {
    let price = snapshot.current_price;

    let bvps = snapshot
        .book_value_per_share
        .filter(|value| *value > 0.0)
        .or_else(|| stats::latest_value(snapshot.book_value_history.as_deref()));
    let Some(bvps) = bvps.filter(|value| *value > 0.0) else {
        return null_estimate(
            ValuationModel::Asset,
            price,
            "Cannot estimate: no book value data",
        );
    };

    let fair_value = bvps * pb_threshold;
    priced_estimate(
        ValuationModel::Asset,
        fair_value,
        price,
        format!(
            "Book/sh (${bvps:.2}) x P/B threshold ({pb_threshold}) = ${:.2}",
            round_cents(fair_value),
        ),
    )
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use valuation_core::YearValue;

    fn years(values: &[f64]) -> Vec<YearValue> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| YearValue::new(2015 + i as i32, v))
            .collect()
    }

    #[test]
    fn dividend_model_guards_non_positive_denominator() {
        // Flat history: growth is 0, so the guard triggers on the rate alone
        let snapshot = EquitySnapshot {
            dividend_history: Some(years(&[2.0, 2.0, 2.0])),
            current_price: Some(50.0),
            ..Default::default()
        };
        let at_zero_margin = dividend_estimate(&snapshot, 0.0);
        assert_eq!(at_zero_margin.fair_value, None);
        assert!(!at_zero_margin.is_undervalued);

        // Growing history with expected return at/below the growth rate
        let growing = EquitySnapshot {
            // 4% annual growth
            dividend_history: Some(years(&[
                1.0,
                1.04,
                1.0816,
                1.124864,
                1.16985856,
            ])),
            current_price: Some(50.0),
            ..Default::default()
        };
        let growth = stats::cagr(growing.dividend_history.as_deref(), 5).unwrap();
        assert!((growth - 0.0319).abs() < 0.01);

        let blocked = dividend_estimate(&growing, growth);
        assert_eq!(blocked.fair_value, None);
        assert!(!blocked.is_undervalued);
        assert!(blocked.explanation.contains("expected return"));

        let allowed = dividend_estimate(&growing, growth + 0.02);
        assert!(allowed.fair_value.is_some());
    }

    #[test]
    fn dividend_model_prefers_forward_estimate() {
        let snapshot = EquitySnapshot {
            dividend_est: Some(3.0),
            dividend_history: Some(years(&[1.0, 1.0])),
            ..Default::default()
        };
        let estimate = dividend_estimate(&snapshot, 0.05);
        // 3.0 / 0.05 with zero growth
        assert_eq!(estimate.fair_value, Some(60.0));
    }

    #[test]
    fn growth_model_clamps_extreme_growth() {
        let snapshot = EquitySnapshot {
            eps_next_year: Some(2.0),
            eps_growth_next_5y: Some(0.80),
            current_price: Some(40.0),
            ..Default::default()
        };
        let estimate = growth_estimate(&snapshot, &FairValueConfig::default());
        // 80% growth is capped at 25%: 2.0 * 25 = 50
        assert_eq!(estimate.fair_value, Some(50.0));
        assert!(estimate.is_undervalued);
    }

    #[test]
    fn growth_model_falls_back_to_history() {
        let snapshot = EquitySnapshot {
            eps_history: Some(years(&[1.0, 1.1, 1.21, 1.331, 1.4641])),
            current_price: Some(100.0),
            ..Default::default()
        };
        let estimate = growth_estimate(&snapshot, &FairValueConfig::default());
        assert!(estimate.fair_value.is_some());
        assert!(estimate.explanation.contains("historical"));
    }

    #[test]
    fn growth_model_null_without_earnings() {
        let estimate = growth_estimate(&EquitySnapshot::default(), &FairValueConfig::default());
        assert_eq!(estimate.fair_value, None);
        assert!(!estimate.is_undervalued);
        assert!(!estimate.explanation.is_empty());
    }

    #[test]
    fn asset_model_multiplies_book_value() {
        let snapshot = EquitySnapshot {
            book_value_per_share: Some(25.0),
            current_price: Some(18.0),
            ..Default::default()
        };
        let estimate = asset_estimate(&snapshot, 0.8);
        assert_eq!(estimate.fair_value, Some(20.0));
        assert!(estimate.is_undervalued);
    }

    #[test]
    fn undervalued_is_strict() {
        let snapshot = EquitySnapshot {
            book_value_per_share: Some(25.0),
            current_price: Some(20.0),
            ..Default::default()
        };
        // Fair value exactly equals price: not undervalued
        let estimate = asset_estimate(&snapshot, 0.8);
        assert_eq!(estimate.fair_value, Some(20.0));
        assert!(!estimate.is_undervalued);
    }

    #[test]
    fn missing_price_never_reports_undervalued() {
        let snapshot = EquitySnapshot {
            book_value_per_share: Some(25.0),
            ..Default::default()
        };
        let estimate = asset_estimate(&snapshot, 0.8);
        assert!(estimate.fair_value.is_some());
        assert!(!estimate.is_undervalued);
    }
}
