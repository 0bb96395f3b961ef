use crate::series::Series;

/// The boundary the core consumes (spec §6). Implementations (vendor
/// fetchers, a CSV cache, a test fixture) live outside this workspace; the
/// core only ever calls `get`.
///
/// The contract is synchronous and single-threaded (spec §5): a `step` must
/// complete before the next begins, so there is no benefit to an async
/// `DataSource` and every implementation here and in tests is a plain
/// in-memory lookup.
pub trait DataSource {
    /// Look up a named series. Missing series return `None`; the caller
    /// (feature engine, return synthesiser) is responsible for degrading
    /// gracefully per spec §7's `DataUnavailable` policy — this trait never
    /// raises for an absent name.
    fn get(&self, name: &str) -> Option<Series>;

    /// Every series name this source can serve, for diagnostics.
    fn available(&self) -> Vec<String>;
}

/// A trivial in-memory `DataSource` over owned series, used by tests and by
/// the `macro-risk-run` bin crate that stands in for the external serving
/// layer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    series: std::collections::HashMap<String, Series>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.insert(series.name().to_string(), series);
        self
    }
}

impl DataSource for InMemoryDataSource {
    fn get(&self, name: &str) -> Option<Series> {
        self.series.get(name).cloned()
    }

    fn available(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }
}
