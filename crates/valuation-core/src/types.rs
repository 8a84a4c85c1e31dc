use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of an annual series (EPS, dividends, ROE, ...)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearValue {
    pub year: i32,
    pub value: f64,
}

impl YearValue {
    pub fn new(year: i32, value: f64) -> Self {
        Self { year, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Equity,
    Etf,
}

/// One position inside an ETF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    /// Portfolio weight as a fraction (0.07 = 7%)
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorWeight {
    pub sector: String,
    pub weight: f64,
}

/// Merged equity fundamentals for one symbol at one point in time.
/// Every field is optional: sources are sparse and a missing field is the
/// normal case, handled downstream by the rubric rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub symbol: String,
    /// Names of the gateways that contributed at least one field
    pub sources: Vec<String>,

    pub eps_history: Option<Vec<YearValue>>,
    pub dividend_history: Option<Vec<YearValue>>,
    pub fcf_per_share_history: Option<Vec<YearValue>>,
    pub roe_history: Option<Vec<YearValue>>,
    pub net_margin_history: Option<Vec<YearValue>>,
    pub pe_history: Option<Vec<YearValue>>,
    pub dividend_yield_history: Option<Vec<YearValue>>,
    pub shares_outstanding_history: Option<Vec<YearValue>>,
    pub book_value_history: Option<Vec<YearValue>>,

    pub interest_coverage: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub eps_next_year: Option<f64>,
    pub eps_growth_next_5y: Option<f64>,
    pub dividend_est: Option<f64>,
    pub dividend_growth_years: Option<u32>,
    pub benchmark_pe: Option<f64>,
    pub benchmark_yield: Option<f64>,
    pub current_price: Option<f64>,
}

/// ETF profile: no per-share fundamentals, just the instrument summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EtfSnapshot {
    pub symbol: String,
    pub sources: Vec<String>,
    pub expense_ratio: Option<f64>,
    pub beta_3y: Option<f64>,
    pub pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    /// At most 15 holdings, weight descending
    pub top_holdings: Vec<Holding>,
    pub sector_weightings: Vec<SectorWeight>,
}

/// Immutable merged view of one symbol's raw data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Snapshot {
    Equity(EquitySnapshot),
    Etf(EtfSnapshot),
}

impl Snapshot {
    pub fn symbol(&self) -> &str {
        match self {
            Snapshot::Equity(s) => &s.symbol,
            Snapshot::Etf(s) => &s.symbol,
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        match self {
            Snapshot::Equity(_) => InstrumentKind::Equity,
            Snapshot::Etf(_) => InstrumentKind::Etf,
        }
    }
}

/// Unmerged output of a single data source. A gateway that resolves the
/// symbol fills whatever fields it knows; the assembler merges across
/// sources in priority order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFields {
    pub kind: Option<InstrumentKind>,

    pub eps_history: Option<Vec<YearValue>>,
    pub dividend_history: Option<Vec<YearValue>>,
    pub fcf_per_share_history: Option<Vec<YearValue>>,
    pub roe_history: Option<Vec<YearValue>>,
    pub net_margin_history: Option<Vec<YearValue>>,
    pub pe_history: Option<Vec<YearValue>>,
    pub dividend_yield_history: Option<Vec<YearValue>>,
    pub shares_outstanding_history: Option<Vec<YearValue>>,
    pub book_value_history: Option<Vec<YearValue>>,

    pub interest_coverage: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub eps_next_year: Option<f64>,
    pub eps_growth_next_5y: Option<f64>,
    pub dividend_est: Option<f64>,
    pub dividend_growth_years: Option<u32>,
    pub benchmark_pe: Option<f64>,
    pub benchmark_yield: Option<f64>,
    pub current_price: Option<f64>,

    pub expense_ratio: Option<f64>,
    pub beta_3y: Option<f64>,
    pub top_holdings: Option<Vec<Holding>>,
    pub sector_weightings: Option<Vec<SectorWeight>>,
}

/// One rubric rule's contribution to a composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdownItem {
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    pub reason: String,
}

/// Composite rubric score. The same shape serves the confidence, dividend
/// and value scores; `total` is always the sum of the breakdown scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricScore {
    pub total: f64,
    pub max_possible: f64,
    pub breakdown: Vec<ScoreBreakdownItem>,
}

impl RubricScore {
    /// Score carrying no rubric at all (ETF results)
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuationModel {
    Growth,
    Dividend,
    Asset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueEstimate {
    pub model: ValuationModel,
    pub fair_value: Option<f64>,
    pub current_price: Option<f64>,
    pub is_undervalued: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Complete,
    Partial,
    Insufficient,
}

/// Full per-symbol analysis, computed wholesale and never patched in place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueAnalysisResult {
    pub symbol: String,
    pub data_status: DataStatus,
    pub confidence: RubricScore,
    pub dividend: RubricScore,
    pub value: RubricScore,
    /// Absent for ETFs and whenever the default model cannot produce a value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fair_value: Option<FairValueEstimate>,
    /// Instrument summary, present only for ETFs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etf: Option<EtfSnapshot>,
    pub computed_at: DateTime<Utc>,
}

/// Read-only view of one symbol's cache/fetch state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub symbol: String,
    pub cached: bool,
    pub fetching: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefetchOutcome {
    /// A fresh result already exists; nothing to do
    Cached,
    /// A fetch for this symbol is already in flight; nothing enqueued
    AlreadyFetching,
    /// Exactly one background unit of work was enqueued
    Queued,
}
