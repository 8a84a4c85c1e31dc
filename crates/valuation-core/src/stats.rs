//! Shared annual-series helpers for the rubric rules and fair-value
//! models. One definition each for latest-value and CAGR, so the scoring
//! and valuation crates can never disagree on them.

use crate::YearValue;

pub fn sorted_by_year(history: &[YearValue]) -> Vec<YearValue> {
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|observation| observation.year);
    sorted
}

/// Most recent observation's value
pub fn latest_value(history: Option<&[YearValue]>) -> Option<f64> {
    history?
        .iter()
        .max_by_key(|observation| observation.year)
        .map(|observation| observation.value)
}

/// Last `window` observations, year ascending
pub fn trailing(history: &[YearValue], window: usize) -> Vec<YearValue> {
    let sorted = sorted_by_year(history);
    let skip = sorted.len().saturating_sub(window);
    sorted[skip..].to_vec()
}

/// Count of year-over-year declines within a series
pub fn declining_steps(series: &[YearValue]) -> usize {
    series
        .windows(2)
        .filter(|pair| pair[1].value < pair[0].value)
        .count()
}

/// Compound annual growth rate over roughly `years` trailing observations.
/// None when the series is too short or crosses zero.
pub fn cagr(history: Option<&[YearValue]>, years: usize) -> Option<f64> {
    let history = history?;
    if history.len() < 2 {
        return None;
    }
    let sorted = sorted_by_year(history);
    let span = years.min(sorted.len());
    let start = sorted[sorted.len() - span].value;
    let end = sorted[sorted.len() - 1].value;
    if start <= 0.0 || end <= 0.0 {
        return None;
    }
    Some((end / start).powf(1.0 / span as f64) - 1.0)
}

/// Growth from the second-latest to the latest observation
pub fn recent_growth(history: Option<&[YearValue]>) -> Option<f64> {
    let history = history?;
    if history.len() < 2 {
        return None;
    }
    let sorted = sorted_by_year(history);
    let previous = sorted[sorted.len() - 2].value;
    let latest = sorted[sorted.len() - 1].value;
    if previous <= 0.0 {
        return None;
    }
    Some(latest / previous - 1.0)
}

/// Mean and population std over the positive values of a series
pub fn mean_std(history: Option<&[YearValue]>) -> Option<(f64, f64)> {
    let values: Vec<f64> = history?
        .iter()
        .map(|observation| observation.value)
        .filter(|value| *value > 0.0)
        .collect();
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    Some((mean, variance.sqrt()))
}

/// Average over the last `window` observations
pub fn trailing_average(history: Option<&[YearValue]>, window: usize) -> Option<f64> {
    let history = history?;
    if history.is_empty() {
        return None;
    }
    let recent = trailing(history, window);
    Some(recent.iter().map(|observation| observation.value).sum::<f64>() / recent.len() as f64)
}

/// Latest dividend over latest denominator (FCF or EPS per share)
pub fn payout_ratio(
    dividends: Option<&[YearValue]>,
    denominator: Option<&[YearValue]>,
) -> Option<f64> {
    let dividend = latest_value(dividends)?;
    let denominator = latest_value(denominator)?;
    if denominator == 0.0 {
        return None;
    }
    Some(dividend.abs() / denominator.abs())
}

/// Latest dividend divided by the current price
pub fn yield_from_dividends(dividends: Option<&[YearValue]>, price: Option<f64>) -> Option<f64> {
    let dividend = latest_value(dividends)?;
    let price = price?;
    if price <= 0.0 {
        return None;
    }
    Some(dividend.abs() / price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<YearValue> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| YearValue::new(2010 + i as i32, v))
            .collect()
    }

    #[test]
    fn latest_value_respects_year_not_position() {
        let mut shuffled = series(&[1.0, 2.0, 3.0]);
        shuffled.swap(0, 2);
        assert_eq!(latest_value(Some(&shuffled)), Some(3.0));
    }

    #[test]
    fn cagr_of_doubling_series() {
        let history = series(&[1.0, 2.0]);
        let growth = cagr(Some(&history), 2).unwrap();
        // (2/1)^(1/2) - 1
        assert!((growth - (2.0_f64.sqrt() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn cagr_none_on_non_positive_endpoints() {
        assert_eq!(cagr(Some(&series(&[-1.0, 2.0])), 2), None);
        assert_eq!(cagr(Some(&series(&[1.0])), 2), None);
        assert_eq!(cagr(None, 5), None);
    }

    #[test]
    fn mean_std_ignores_non_positive_values() {
        let history = series(&[2.0, 4.0, -3.0, 0.0]);
        let (mean, std) = mean_std(Some(&history)).unwrap();
        assert_eq!(mean, 3.0);
        assert_eq!(std, 1.0);
    }

    #[test]
    fn declining_steps_counts_drops() {
        assert_eq!(declining_steps(&series(&[3.0, 2.0, 2.5, 1.0])), 2);
        assert_eq!(declining_steps(&series(&[1.0, 2.0])), 0);
    }

    #[test]
    fn payout_ratio_guards_zero_denominator() {
        let div = series(&[1.0]);
        let eps = series(&[0.0]);
        assert_eq!(payout_ratio(Some(&div), Some(&eps)), None);
    }
}
