// src/fetch/mod.rs

use std::sync::Arc;
use tokio::task::{self, JoinError};
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::provider::{DataProvider, ProviderError, SeriesMetadata, TimePoint, VintageQuery};
use crate::vintages::RevisionTable;

/// Everything fetched for one series selection. A `None` slot means that fetch failed
/// or returned nothing usable.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBundle {
    pub series_id: String,
    pub metadata: Option<SeriesMetadata>,
    pub latest: Option<Vec<TimePoint>>,
    pub table: Option<RevisionTable>,
}

impl SeriesBundle {
    pub fn is_complete(&self) -> bool {
        self.metadata.is_some() && self.latest.is_some() && self.table.is_some()
    }
}

/// Collapse a task's outcome into an optional artifact, logging the cause of a miss.
fn settle<T>(
    what: &str,
    series_id: &str,
    joined: Result<Result<T, ProviderError>, JoinError>,
) -> Option<T> {
    match joined {
        Ok(Ok(v)) => Some(v),
        Ok(Err(e)) => {
            error!(series = %series_id, error = %e, "fetching {} failed", what);
            None
        }
        Err(e) => {
            error!(series = %series_id, error = %e, "{} task aborted", what);
            None
        }
    }
}

/// Fetch metadata, latest series and revision table concurrently and wait for all three.
///
/// Never fails: each artifact that could not be fetched or built is left `None`.
#[instrument(level = "info", skip(provider, query))]
pub async fn fetch_all(
    provider: Arc<dyn DataProvider>,
    series_id: &str,
    query: &VintageQuery,
) -> SeriesBundle {
    let start = Instant::now();

    let meta_handle = task::spawn({
        let provider = Arc::clone(&provider);
        let id = series_id.to_string();
        async move { provider.metadata(&id).await }
    });
    let series_handle = task::spawn({
        let provider = Arc::clone(&provider);
        let id = series_id.to_string();
        async move { provider.latest_series(&id).await }
    });
    let vintages_handle = task::spawn({
        let provider = Arc::clone(&provider);
        let id = series_id.to_string();
        let query = query.clone();
        async move { provider.vintages(&id, &query).await }
    });

    let (meta, series, vintages) = tokio::join!(meta_handle, series_handle, vintages_handle);

    let metadata = settle("metadata", series_id, meta);
    let latest = settle("series data", series_id, series);
    let table = settle("vintages", series_id, vintages).and_then(|raw| {
        let table = RevisionTable::from_vintage_map(&raw);
        if table.is_none() {
            warn!(series = %series_id, "vintages response unusable, no revision table");
        }
        table
    });

    info!(
        series = %series_id,
        metadata = metadata.is_some(),
        latest = latest.is_some(),
        vintages = table.is_some(),
        elapsed = ?start.elapsed(),
        "fetch complete"
    );

    SeriesBundle {
        series_id: series_id.to_string(),
        metadata,
        latest,
        table,
    }
}
