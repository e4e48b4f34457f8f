// src/provider/mod.rs

use async_trait::async_trait;

pub mod error;
pub mod http;
pub mod normalize;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ProviderError;
pub use http::{CeicClient, ClientOptions};
pub use types::{
    option_label, SearchQuery, SeriesMetadata, SeriesSummary, TimePoint, VintageQuery,
};

use crate::vintages::VintageMap;

/// An authenticated handle to the economic-data provider.
///
/// Implementations return canonical types; response-shape handling stays inside the
/// implementation (see [`normalize`]).
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn metadata(&self, series_id: &str) -> Result<SeriesMetadata, ProviderError>;

    /// Latest-revision points, ascending by date.
    async fn latest_series(&self, series_id: &str) -> Result<Vec<TimePoint>, ProviderError>;

    async fn vintages(
        &self,
        series_id: &str,
        query: &VintageQuery,
    ) -> Result<VintageMap, ProviderError>;

    /// All hits for the query across every result page.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SeriesSummary>, ProviderError>;
}
