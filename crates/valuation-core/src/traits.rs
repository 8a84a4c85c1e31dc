use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::{AnalysisError, RawFields};

/// A background unit of work handed to a [`TaskQueue`]
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One external data source. Implementations own their wire protocol;
/// the engine only sees resolved-or-not plus whatever fields came back.
#[async_trait]
pub trait DataSourceGateway: Send + Sync {
    /// Stable name, recorded as provenance on merged snapshots
    fn name(&self) -> &str;

    /// Resolve a symbol to raw fields. `Err(DataUnavailable)` means this
    /// source does not know the symbol at all; `Err(SourceFailure)` is a
    /// transient fault the assembler may retry.
    async fn fetch(&self, symbol: &str) -> Result<RawFields, AnalysisError>;
}

/// Shared key/value store backing the per-symbol fetch flags.
///
/// `compare_and_set` must be atomic so that two replicas can never both
/// win the same key; a read-then-write implementation breaks the
/// at-most-one-in-flight invariant.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Atomically transition `key` from `expected` to `new`, where `None`
    /// means "absent". Returns true when the transition was applied.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool, AnalysisError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AnalysisError>;
}

/// Executor seam for queued fetch work. Once enqueued, a job runs to
/// completion; nothing cancels it from the caller side.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, job: Job);
}
