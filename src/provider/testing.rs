// In-memory provider for unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{
    DataProvider, ProviderError, SearchQuery, SeriesMetadata, SeriesSummary, TimePoint,
    VintageQuery,
};
use crate::vintages::VintageMap;

/// Canned answers; a `None` field makes that call fail.
#[derive(Default)]
pub struct FakeProvider {
    pub meta: Option<SeriesMetadata>,
    pub points: Option<Vec<TimePoint>>,
    pub vintages: Option<VintageMap>,
    pub hits: Option<Vec<SeriesSummary>>,
    pub panic_on_vintages: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    /// Provider answering every call for the two-row sample series.
    pub fn sample(id: &str) -> Self {
        let mut vintages = VintageMap::new();
        vintages
            .entry("2021-01-01".into())
            .or_default()
            .insert("2020-01-01".into(), Some(100.0));
        let feb = vintages.entry("2021-02-01".into()).or_default();
        feb.insert("2020-01-01".into(), Some(105.0));
        feb.insert("2020-02-01".into(), Some(50.0));

        Self {
            meta: Some(SeriesMetadata {
                id: id.to_string(),
                name: Some("Sample Series".into()),
                country: Some("Nowhere".into()),
                frequency: Some("Monthly".into()),
                source: None,
                last_update_time: None,
                last_value: Some(50.0),
            }),
            points: Some(vec![
                TimePoint {
                    date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    value: Some(105.0),
                },
                TimePoint {
                    date: NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
                    value: Some(50.0),
                },
            ]),
            vintages: Some(vintages),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

fn unavailable(what: &str) -> ProviderError {
    ProviderError::Malformed(format!("{} unavailable", what))
}

#[async_trait]
impl DataProvider for FakeProvider {
    async fn metadata(&self, _series_id: &str) -> Result<SeriesMetadata, ProviderError> {
        self.enter().await;
        self.meta.clone().ok_or_else(|| unavailable("metadata"))
    }

    async fn latest_series(&self, _series_id: &str) -> Result<Vec<TimePoint>, ProviderError> {
        self.enter().await;
        self.points.clone().ok_or_else(|| unavailable("series"))
    }

    async fn vintages(
        &self,
        _series_id: &str,
        _query: &VintageQuery,
    ) -> Result<VintageMap, ProviderError> {
        self.enter().await;
        if self.panic_on_vintages {
            panic!("vintages blew up");
        }
        self.vintages.clone().ok_or_else(|| unavailable("vintages"))
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<SeriesSummary>, ProviderError> {
        self.enter().await;
        self.hits.clone().ok_or_else(|| unavailable("search"))
    }
}
