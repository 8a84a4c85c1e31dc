//! Merges raw fields from one or more data sources into one immutable
//! [`Snapshot`] and classifies how complete the merged data is.

use std::sync::Arc;

use valuation_core::{
    AnalysisError, DataSourceGateway, DataStatus, EquitySnapshot, EtfSnapshot, InstrumentKind,
    RawFields, Snapshot, YearValue,
};

/// ETF holdings are capped at the largest positions by weight
const MAX_TOP_HOLDINGS: usize = 15;

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Extra attempts per source after a transient failure
    pub source_retries: u32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { source_retries: 2 }
    }
}

/// Assembles one snapshot per call. Pure aside from the gateway calls;
/// caching is the orchestrator's job, not this crate's.
pub struct SnapshotAssembler {
    sources: Vec<Arc<dyn DataSourceGateway>>,
    config: AssemblerConfig,
}

impl SnapshotAssembler {
    /// `sources` in merge priority order: the first source to return a
    /// non-null value for a field wins that field.
    pub fn new(sources: Vec<Arc<dyn DataSourceGateway>>) -> Self {
        Self::with_config(sources, AssemblerConfig::default())
    }

    pub fn with_config(sources: Vec<Arc<dyn DataSourceGateway>>, config: AssemblerConfig) -> Self {
        Self { sources, config }
    }

    /// Resolve and merge a symbol. `DataUnavailable` only when no source
    /// resolves the symbol at all; a resolvable-but-sparse symbol is a
    /// normal outcome classified later via [`classify`].
    pub async fn assemble(&self, symbol: &str) -> Result<Snapshot, AnalysisError> {
        let symbol = symbol.to_uppercase();
        let mut resolved: Vec<(String, RawFields)> = Vec::new();

        for source in &self.sources {
            match self.fetch_with_retry(source.as_ref(), &symbol).await {
                Ok(fields) => {
                    tracing::debug!(symbol = %symbol, source = source.name(), "source resolved");
                    resolved.push((source.name().to_string(), fields));
                }
                Err(AnalysisError::DataUnavailable(_)) => {
                    tracing::debug!(symbol = %symbol, source = source.name(), "symbol unknown to source");
                }
                Err(err) => {
                    tracing::warn!(symbol = %symbol, source = source.name(), error = %err,
                        "source failed, continuing with remaining sources");
                }
            }
        }

        if resolved.is_empty() {
            return Err(AnalysisError::DataUnavailable(symbol));
        }

        // Instrument kind follows the highest-priority source that stated one
        let kind = resolved
            .iter()
            .find_map(|(_, fields)| fields.kind)
            .unwrap_or(InstrumentKind::Equity);

        let snapshot = match kind {
            InstrumentKind::Equity => Snapshot::Equity(merge_equity(&symbol, &resolved)),
            InstrumentKind::Etf => Snapshot::Etf(merge_etf(&symbol, &resolved)),
        };
        Ok(snapshot)
    }

    async fn fetch_with_retry(
        &self,
        source: &dyn DataSourceGateway,
        symbol: &str,
    ) -> Result<RawFields, AnalysisError> {
        let mut attempts_left = self.config.source_retries + 1;
        loop {
            attempts_left -= 1;
            match source.fetch(symbol).await {
                Ok(fields) => return Ok(fields),
                Err(AnalysisError::SourceFailure(message)) if attempts_left > 0 => {
                    tracing::debug!(symbol = %symbol, source = source.name(), error = %message,
                        attempts_left, "transient source failure, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// First non-null value for a field across sources, in priority order
macro_rules! first_some {
    ($resolved:expr, $field:ident) => {
        $resolved.iter().find_map(|(_, fields)| fields.$field.clone())
    };
}

fn source_names(resolved: &[(String, RawFields)]) -> Vec<String> {
    resolved.iter().map(|(name, _)| name.clone()).collect()
}

fn merge_equity(symbol: &str, resolved: &[(String, RawFields)]) -> EquitySnapshot {
    EquitySnapshot {
        symbol: symbol.to_string(),
        sources: source_names(resolved),
        eps_history: first_some!(resolved, eps_history),
        dividend_history: first_some!(resolved, dividend_history),
        fcf_per_share_history: first_some!(resolved, fcf_per_share_history),
        roe_history: first_some!(resolved, roe_history),
        net_margin_history: first_some!(resolved, net_margin_history),
        pe_history: first_some!(resolved, pe_history),
        dividend_yield_history: first_some!(resolved, dividend_yield_history),
        shares_outstanding_history: first_some!(resolved, shares_outstanding_history),
        book_value_history: first_some!(resolved, book_value_history),
        interest_coverage: first_some!(resolved, interest_coverage),
        pe_ratio: first_some!(resolved, pe_ratio),
        dividend_yield: first_some!(resolved, dividend_yield),
        beta: first_some!(resolved, beta),
        book_value_per_share: first_some!(resolved, book_value_per_share),
        eps_next_year: first_some!(resolved, eps_next_year),
        eps_growth_next_5y: first_some!(resolved, eps_growth_next_5y),
        dividend_est: first_some!(resolved, dividend_est),
        dividend_growth_years: first_some!(resolved, dividend_growth_years),
        benchmark_pe: first_some!(resolved, benchmark_pe),
        benchmark_yield: first_some!(resolved, benchmark_yield),
        current_price: first_some!(resolved, current_price),
    }
}

fn merge_etf(symbol: &str, resolved: &[(String, RawFields)]) -> EtfSnapshot {
    let mut top_holdings = first_some!(resolved, top_holdings).unwrap_or_default();
    top_holdings.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    top_holdings.truncate(MAX_TOP_HOLDINGS);

    EtfSnapshot {
        symbol: symbol.to_string(),
        sources: source_names(resolved),
        expense_ratio: first_some!(resolved, expense_ratio),
        beta_3y: first_some!(resolved, beta_3y),
        pe: first_some!(resolved, pe_ratio),
        dividend_yield: first_some!(resolved, dividend_yield),
        top_holdings,
        sector_weightings: first_some!(resolved, sector_weightings).unwrap_or_default(),
    }
}

fn has_history(history: &Option<Vec<YearValue>>) -> bool {
    history.as_ref().is_some_and(|h| !h.is_empty())
}

/// Minimal required fields per rubric; a rubric is "satisfiable" when at
/// least one of its rules can score against real data.
fn confidence_satisfiable(snapshot: &EquitySnapshot) -> bool {
    has_history(&snapshot.eps_history)
}

fn dividend_satisfiable(snapshot: &EquitySnapshot) -> bool {
    has_history(&snapshot.dividend_history)
}

fn value_satisfiable(snapshot: &EquitySnapshot) -> bool {
    has_history(&snapshot.pe_history)
        || has_history(&snapshot.dividend_yield_history)
        || (has_history(&snapshot.dividend_history) && snapshot.current_price.is_some())
}

/// Completeness classification: `Complete` when all three rubrics are
/// satisfiable, `Partial` when at least one is, `Insufficient` when none
/// are. Never an error; sparse symbols land here routinely.
pub fn classify(snapshot: &Snapshot) -> DataStatus {
    match snapshot {
        Snapshot::Equity(equity) => {
            let satisfied = [
                confidence_satisfiable(equity),
                dividend_satisfiable(equity),
                value_satisfiable(equity),
            ]
            .iter()
            .filter(|&&ok| ok)
            .count();

            match satisfied {
                3 => DataStatus::Complete,
                0 => DataStatus::Insufficient,
                _ => DataStatus::Partial,
            }
        }
        Snapshot::Etf(etf) => {
            let has_costs = etf.expense_ratio.is_some();
            let has_holdings = !etf.top_holdings.is_empty();
            if has_costs && has_holdings {
                DataStatus::Complete
            } else if has_costs || has_holdings {
                DataStatus::Partial
            } else {
                DataStatus::Insufficient
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use valuation_core::Holding;

    struct StubSource {
        name: &'static str,
        fields: Result<RawFields, &'static str>,
        /// Number of leading calls that fail transiently
        flaky_failures: AtomicU32,
        calls: AtomicU32,
    }

    impl StubSource {
        fn resolving(name: &'static str, fields: RawFields) -> Self {
            Self {
                name,
                fields: Ok(fields),
                flaky_failures: AtomicU32::new(0),
                calls: AtomicU32::new(0),
            }
        }

        fn unknown(name: &'static str) -> Self {
            Self {
                name,
                fields: Err("unknown"),
                flaky_failures: AtomicU32::new(0),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DataSourceGateway for StubSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, symbol: &str) -> Result<RawFields, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.flaky_failures.load(Ordering::SeqCst) > 0 {
                self.flaky_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(AnalysisError::SourceFailure("connection reset".into()));
            }
            match &self.fields {
                Ok(fields) => Ok(fields.clone()),
                Err(_) => Err(AnalysisError::DataUnavailable(symbol.to_string())),
            }
        }
    }

    fn years(values: &[f64]) -> Vec<YearValue> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| YearValue::new(2015 + i as i32, v))
            .collect()
    }

    fn equity_fields() -> RawFields {
        RawFields {
            kind: Some(InstrumentKind::Equity),
            eps_history: Some(years(&[1.0, 1.1, 1.2])),
            pe_ratio: Some(14.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn merges_first_non_null_by_priority() {
        let primary = RawFields {
            kind: Some(InstrumentKind::Equity),
            eps_history: Some(years(&[1.0, 1.2])),
            beta: None,
            ..Default::default()
        };
        let secondary = RawFields {
            kind: Some(InstrumentKind::Equity),
            eps_history: Some(years(&[9.0, 9.0])),
            beta: Some(0.9),
            ..Default::default()
        };
        let assembler = SnapshotAssembler::new(vec![
            Arc::new(StubSource::resolving("primary", primary)),
            Arc::new(StubSource::resolving("secondary", secondary)),
        ]);

        let snapshot = assembler.assemble("aapl").await.unwrap();
        let Snapshot::Equity(equity) = snapshot else {
            panic!("expected equity snapshot");
        };
        assert_eq!(equity.symbol, "AAPL");
        // Primary wins EPS, secondary fills the gap it left
        assert_eq!(equity.eps_history.as_ref().unwrap()[0].value, 1.0);
        assert_eq!(equity.beta, Some(0.9));
        assert_eq!(equity.sources, vec!["primary", "secondary"]);
    }

    #[tokio::test]
    async fn unresolvable_everywhere_is_data_unavailable() {
        let assembler = SnapshotAssembler::new(vec![
            Arc::new(StubSource::unknown("a")),
            Arc::new(StubSource::unknown("b")),
        ]);
        let err = assembler.assemble("ZZZZ").await.unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable(s) if s == "ZZZZ"));
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let source = StubSource::resolving("flaky", equity_fields());
        source.flaky_failures.store(2, Ordering::SeqCst);
        let source = Arc::new(source);
        let assembler = SnapshotAssembler::new(vec![source.clone()]);

        let snapshot = assembler.assemble("IBM").await.unwrap();
        assert_eq!(snapshot.kind(), InstrumentKind::Equity);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn one_failing_source_is_tolerated() {
        let broken = StubSource::resolving("broken", equity_fields());
        // More consecutive failures than the retry budget
        broken.flaky_failures.store(10, Ordering::SeqCst);
        let assembler = SnapshotAssembler::new(vec![
            Arc::new(broken),
            Arc::new(StubSource::resolving("backup", equity_fields())),
        ]);

        let snapshot = assembler.assemble("IBM").await.unwrap();
        let Snapshot::Equity(equity) = snapshot else {
            panic!("expected equity snapshot");
        };
        assert_eq!(equity.sources, vec!["backup"]);
    }

    #[tokio::test]
    async fn etf_holdings_sorted_and_truncated() {
        let holdings: Vec<Holding> = (0..20)
            .map(|i| Holding {
                symbol: format!("H{i}"),
                name: format!("Holding {i}"),
                weight: 0.01 * (i as f64 + 1.0),
            })
            .collect();
        let fields = RawFields {
            kind: Some(InstrumentKind::Etf),
            expense_ratio: Some(0.0009),
            top_holdings: Some(holdings),
            ..Default::default()
        };
        let assembler =
            SnapshotAssembler::new(vec![Arc::new(StubSource::resolving("fund", fields))]);

        let snapshot = assembler.assemble("voo").await.unwrap();
        let Snapshot::Etf(etf) = snapshot else {
            panic!("expected ETF snapshot");
        };
        assert_eq!(etf.top_holdings.len(), 15);
        assert_eq!(etf.top_holdings[0].symbol, "H19");
        assert!(etf
            .top_holdings
            .windows(2)
            .all(|w| w[0].weight >= w[1].weight));
    }

    #[test]
    fn classification_counts_satisfiable_rubrics() {
        let mut equity = EquitySnapshot {
            symbol: "T".into(),
            ..Default::default()
        };
        assert_eq!(
            classify(&Snapshot::Equity(equity.clone())),
            DataStatus::Insufficient
        );

        equity.eps_history = Some(years(&[1.0, 1.1, 1.2]));
        assert_eq!(
            classify(&Snapshot::Equity(equity.clone())),
            DataStatus::Partial
        );

        equity.dividend_history = Some(years(&[0.5, 0.6]));
        equity.pe_history = Some(years(&[15.0, 16.0]));
        assert_eq!(
            classify(&Snapshot::Equity(equity)),
            DataStatus::Complete
        );
    }

    #[test]
    fn empty_history_vec_does_not_satisfy() {
        let equity = EquitySnapshot {
            symbol: "T".into(),
            eps_history: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(
            classify(&Snapshot::Equity(equity)),
            DataStatus::Insufficient
        );
    }
}
