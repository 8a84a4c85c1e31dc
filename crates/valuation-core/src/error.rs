use thiserror::Error;

/// Failures that can surface from a fetch cycle.
///
/// Sparse-but-resolvable symbols are deliberately absent here: they are a
/// normal successful result with `DataStatus::Insufficient`, not an error.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The symbol could not be resolved by any data source
    #[error("no data source could resolve symbol {0}")]
    DataUnavailable(String),

    /// A fetch cycle exceeded its time budget; the per-symbol lock has
    /// already been released and the caller may retry
    #[error("fetch for {symbol} exceeded its {seconds}s budget")]
    Timeout { symbol: String, seconds: u64 },

    /// A single source failed; retried or tolerated by the assembler,
    /// surfaced only when no source produced anything usable
    #[error("data source failure: {0}")]
    SourceFailure(String),

    /// Shared-store (lock/flag) infrastructure failure
    #[error("shared store failure: {0}")]
    StoreFailure(String),
}
