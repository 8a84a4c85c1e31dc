//! Caching front door for the valuation pipeline.
//!
//! One orchestrator owns the result cache and coordinates fetches so that
//! at most one fetch cycle per symbol is in flight at a time, across every
//! clone of the orchestrator sharing the same [`SharedStore`]. Winners run
//! the cycle; losers wait on the per-symbol flag and read the cache the
//! winner filled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use snapshot_assembler::{classify, SnapshotAssembler};
use valuation_core::{
    AnalysisError, AnalysisStatus, FairValueEstimate, PrefetchOutcome, RubricScore, SharedStore,
    Snapshot, TaskQueue, ValuationModel, ValueAnalysisResult,
};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a computed result is served without refetching
    pub cache_ttl: Duration,
    /// Budget for one full fetch-and-score cycle
    pub fetch_timeout: Duration,
    /// How often a waiting caller re-checks the per-symbol fetch flag
    pub lock_poll_interval: Duration,
    /// Discount rate fed to the dividend model
    pub expected_return: f64,
    /// Price-to-book multiple fed to the asset model
    pub pb_threshold: f64,
    /// Model used for the estimate embedded in cached results
    pub default_model: ValuationModel,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            fetch_timeout: Duration::from_secs(45),
            lock_poll_interval: Duration::from_millis(250),
            expected_return: 0.04,
            pb_threshold: 0.8,
            default_model: ValuationModel::Growth,
        }
    }
}

struct CacheEntry {
    snapshot: Snapshot,
    result: ValueAnalysisResult,
    computed_at: DateTime<Utc>,
}

struct Inner {
    assembler: SnapshotAssembler,
    cache: DashMap<String, CacheEntry>,
    store: Arc<dyn SharedStore>,
    queue: Arc<dyn TaskQueue>,
    config: OrchestratorConfig,
}

/// Cheaply cloneable handle; all clones share one cache and one store
#[derive(Clone)]
pub struct ValuationOrchestrator {
    inner: Arc<Inner>,
}

fn flag_key(symbol: &str) -> String {
    format!("fetch:{symbol}")
}

impl ValuationOrchestrator {
    pub fn new(
        assembler: SnapshotAssembler,
        store: Arc<dyn SharedStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self::with_config(assembler, store, queue, OrchestratorConfig::default())
    }

    pub fn with_config(
        assembler: SnapshotAssembler,
        store: Arc<dyn SharedStore>,
        queue: Arc<dyn TaskQueue>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                assembler,
                cache: DashMap::new(),
                store,
                queue,
                config,
            }),
        }
    }

    /// Serve a fresh cached result, or fetch-and-compute one. Concurrent
    /// callers for the same symbol trigger exactly one fetch cycle; the
    /// rest wait and read the winner's result. When a refresh fails but a
    /// stale result exists, the stale result is served instead of the
    /// error.
    pub async fn get_or_compute(
        &self,
        symbol: &str,
    ) -> Result<ValueAnalysisResult, AnalysisError> {
        let symbol = symbol.to_uppercase();
        loop {
            if let Some(result) = self.fresh_result(&symbol) {
                return Ok(result);
            }

            if self.try_acquire(&symbol).await? {
                // Re-check after winning the flag: the previous holder may
                // have filled the cache between our check and our acquire
                if let Some(result) = self.fresh_result(&symbol) {
                    self.release(&symbol).await;
                    return Ok(result);
                }

                let outcome = self.run_fetch_cycle(&symbol).await;
                self.release(&symbol).await;
                return match outcome {
                    Ok(result) => Ok(result),
                    Err(err) => self.stale_or(&symbol, err),
                };
            }

            self.wait_for_release(&symbol).await?;
        }
    }

    /// Queue a background fetch unless a fresh result or an in-flight
    /// fetch already covers the symbol. Never blocks on the fetch itself.
    pub async fn request_prefetch(&self, symbol: &str) -> Result<PrefetchOutcome, AnalysisError> {
        let symbol = symbol.to_uppercase();
        if self.fresh_result(&symbol).is_some() {
            return Ok(PrefetchOutcome::Cached);
        }
        if !self.try_acquire(&symbol).await? {
            return Ok(PrefetchOutcome::AlreadyFetching);
        }

        // The job owns the flag from here and clears it on every exit path
        let worker = self.clone();
        let job_symbol = symbol.clone();
        self.inner.queue.enqueue(Box::pin(async move {
            match worker.run_fetch_cycle(&job_symbol).await {
                Ok(result) => {
                    tracing::info!(symbol = %job_symbol, status = ?result.data_status,
                        "prefetch complete");
                }
                Err(err) => {
                    tracing::warn!(symbol = %job_symbol, error = %err, "prefetch failed");
                }
            }
            worker.release(&job_symbol).await;
        }));
        tracing::debug!(symbol = %symbol, "prefetch queued");
        Ok(PrefetchOutcome::Queued)
    }

    /// Cache and in-flight state for a symbol. `cached` is true for any
    /// stored result, fresh or stale.
    pub async fn get_status(&self, symbol: &str) -> Result<AnalysisStatus, AnalysisError> {
        let symbol = symbol.to_uppercase();
        let fetching = self.inner.store.get(&flag_key(&symbol)).await?.is_some();
        Ok(AnalysisStatus {
            cached: self.inner.cache.contains_key(&symbol),
            symbol,
            fetching,
        })
    }

    /// Fair-value estimate under an explicitly chosen model and per-call
    /// inputs, computed from the cached snapshot without refetching. A
    /// cold symbol is fetched once via
    /// [`get_or_compute`](Self::get_or_compute) first.
    pub async fn get_fair_value(
        &self,
        symbol: &str,
        model: ValuationModel,
        expected_return: f64,
        pb_threshold: f64,
    ) -> Result<FairValueEstimate, AnalysisError> {
        let symbol = symbol.to_uppercase();
        if !self.inner.cache.contains_key(&symbol) {
            self.get_or_compute(&symbol).await?;
        }
        let entry = self
            .inner
            .cache
            .get(&symbol)
            .ok_or_else(|| AnalysisError::DataUnavailable(symbol.clone()))?;
        match &entry.snapshot {
            Snapshot::Equity(equity) => Ok(fair_value::estimate(
                equity,
                model,
                expected_return,
                pb_threshold,
            )),
            Snapshot::Etf(_) => Ok(FairValueEstimate {
                model,
                fair_value: None,
                current_price: None,
                is_undervalued: false,
                explanation: "Fair value models do not apply to ETFs".to_string(),
            }),
        }
    }

    async fn run_fetch_cycle(&self, symbol: &str) -> Result<ValueAnalysisResult, AnalysisError> {
        let budget = self.inner.config.fetch_timeout;
        let assembled = tokio::time::timeout(budget, self.inner.assembler.assemble(symbol)).await;
        let snapshot = match assembled {
            Ok(snapshot) => snapshot?,
            Err(_) => {
                tracing::warn!(symbol = %symbol, seconds = budget.as_secs(), "fetch cycle timed out");
                return Err(AnalysisError::Timeout {
                    symbol: symbol.to_string(),
                    seconds: budget.as_secs(),
                });
            }
        };

        let result = self.build_result(&snapshot);
        tracing::info!(symbol = %symbol, status = ?result.data_status, "analysis computed");
        self.inner.cache.insert(
            symbol.to_string(),
            CacheEntry {
                snapshot,
                result: result.clone(),
                computed_at: result.computed_at,
            },
        );
        Ok(result)
    }

    fn build_result(&self, snapshot: &Snapshot) -> ValueAnalysisResult {
        let data_status = classify(snapshot);
        match snapshot {
            Snapshot::Equity(equity) => {
                // The cached embed uses the configured defaults; per-call
                // inputs only apply to get_fair_value
                let estimate = fair_value::estimate(
                    equity,
                    self.inner.config.default_model,
                    self.inner.config.expected_return,
                    self.inner.config.pb_threshold,
                );
                ValueAnalysisResult {
                    symbol: equity.symbol.clone(),
                    data_status,
                    confidence: scoring_engine::confidence_score(equity),
                    dividend: scoring_engine::dividend_score(equity),
                    value: scoring_engine::value_score(equity),
                    // Omitted entirely when the model could not price it
                    fair_value: Some(estimate).filter(|e| e.fair_value.is_some()),
                    etf: None,
                    computed_at: Utc::now(),
                }
            }
            Snapshot::Etf(etf) => ValueAnalysisResult {
                symbol: etf.symbol.clone(),
                data_status,
                confidence: RubricScore::empty(),
                dividend: RubricScore::empty(),
                value: RubricScore::empty(),
                fair_value: None,
                etf: Some(etf.clone()),
                computed_at: Utc::now(),
            },
        }
    }

    fn fresh_result(&self, symbol: &str) -> Option<ValueAnalysisResult> {
        let entry = self.inner.cache.get(symbol)?;
        let age = Utc::now().signed_duration_since(entry.computed_at);
        match age.to_std() {
            Ok(age) if age < self.inner.config.cache_ttl => Some(entry.result.clone()),
            Ok(_) => None,
            // Negative age means the clock moved; keep serving the entry
            Err(_) => Some(entry.result.clone()),
        }
    }

    fn stale_or(
        &self,
        symbol: &str,
        err: AnalysisError,
    ) -> Result<ValueAnalysisResult, AnalysisError> {
        match self.inner.cache.get(symbol) {
            Some(entry) => {
                tracing::warn!(symbol = %symbol, error = %err, "refresh failed, serving stale result");
                Ok(entry.result.clone())
            }
            None => Err(err),
        }
    }

    async fn try_acquire(&self, symbol: &str) -> Result<bool, AnalysisError> {
        self.inner
            .store
            .compare_and_set(&flag_key(symbol), None, Some("1"))
            .await
    }

    async fn release(&self, symbol: &str) {
        let outcome = self
            .inner
            .store
            .compare_and_set(&flag_key(symbol), Some("1"), None)
            .await;
        if let Err(err) = outcome {
            tracing::warn!(symbol = %symbol, error = %err, "failed to clear fetch flag");
        }
    }

    /// Poll until the holder clears the per-symbol flag. Bounded by the
    /// fetch budget: a holder always finishes or times out within it, so a
    /// flag still set past the deadline means the store state is stuck.
    async fn wait_for_release(&self, symbol: &str) -> Result<(), AnalysisError> {
        let key = flag_key(symbol);
        let deadline = tokio::time::Instant::now()
            + self.inner.config.fetch_timeout
            + self.inner.config.lock_poll_interval;
        while self.inner.store.get(&key).await?.is_some() {
            if tokio::time::Instant::now() >= deadline {
                return Err(AnalysisError::Timeout {
                    symbol: symbol.to_string(),
                    seconds: self.inner.config.fetch_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.inner.config.lock_poll_interval).await;
        }
        Ok(())
    }
}
