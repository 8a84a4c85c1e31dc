use valuation_core::{EquitySnapshot, RubricScore, ScoreBreakdownItem};

/// Outcome of one rule: points awarded plus the human-readable reason
pub type RuleEval = fn(&EquitySnapshot) -> (f64, String);

/// One declarative rubric rule. `max_possible` for a rubric is derived
/// mechanically from its rule array and stays fixed even when a rule's
/// inputs are missing; missing data simply scores zero.
pub struct RubricRule {
    pub name: &'static str,
    pub max_score: f64,
    pub eval: RuleEval,
}

/// Evaluate an ordered rule array against a snapshot. Rules run
/// independently and in array order, so the breakdown is stable.
pub fn run_rubric(rules: &[RubricRule], snapshot: &EquitySnapshot) -> RubricScore {
    let mut breakdown = Vec::with_capacity(rules.len());
    let mut total = 0.0;
    let mut max_possible = 0.0;

    for rule in rules {
        let (score, reason) = (rule.eval)(snapshot);
        debug_assert!(
            (0.0..=rule.max_score).contains(&score),
            "rule {} scored {} outside 0..={}",
            rule.name,
            score,
            rule.max_score
        );
        total += score;
        max_possible += rule.max_score;
        breakdown.push(ScoreBreakdownItem {
            name: rule.name.to_string(),
            score,
            max_score: rule.max_score,
            reason,
        });
    }

    RubricScore {
        total,
        max_possible,
        breakdown,
    }
}
