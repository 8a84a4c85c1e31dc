//! Rubric-based scoring. Each score type is a fixed, ordered array of
//! declarative rules; scoring is a pure function of the snapshot and the
//! same snapshot always produces byte-identical breakdowns.

pub mod confidence;
pub mod dividend;
pub mod rubric;
pub mod value;

pub use confidence::confidence_score;
pub use dividend::dividend_score;
pub use rubric::{run_rubric, RubricRule};
pub use value::value_score;
