// src/session.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dates::label;
use crate::fetch::{fetch_all, SeriesBundle};
use crate::provider::{DataProvider, SearchQuery, TimePoint, VintageQuery};
use crate::vintages::transforms::{
    compare_first_two, compare_vintages, consecutive_diff, first_last_diff, highlight_changes,
    melt,
};
use crate::vintages::{
    AnimationFrames, CellStyle, DiffTable, FirstLastDiff, RevisionTable, VintageComparison,
};

static NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));

/// Series ids are all digits, or SR codes.
pub fn is_valid_series_id(id: &str) -> bool {
    NUMERIC_ID.is_match(id) || id.starts_with("SR")
}

/// Result of a load-by-id or search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Options were replaced and the first one selected.
    Selected {
        label: String,
        series_id: String,
        found: usize,
    },
    EmptyInput,
    InvalidId(String),
    MissingFilters,
    NoResults,
    Failed(String),
}

/// A derived view, as handed to whatever renders it.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Series(Vec<TimePoint>),
    VintagesTable {
        table: RevisionTable,
        styles: Vec<Vec<CellStyle>>,
    },
    Heatmap(DiffTable),
    Animation(AnimationFrames),
    Comparison(VintageComparison),
    Differences(FirstLastDiff),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Series,
    VintagesTable,
    Heatmap,
    Animation,
    /// Two explicit vintages, or the two earliest when `None`.
    Comparison(Option<(NaiveDate, NaiveDate)>),
    Differences,
}

impl ViewKind {
    pub fn cache_key(&self) -> String {
        match self {
            ViewKind::Series => "series".into(),
            ViewKind::VintagesTable => "vintages_table".into(),
            ViewKind::Heatmap => "heatmap".into(),
            ViewKind::Animation => "animation".into(),
            ViewKind::Comparison(Some((a, b))) => format!("comparison_{}_{}", label(*a), label(*b)),
            ViewKind::Comparison(None) => "comparison".into(),
            ViewKind::Differences => "differences".into(),
        }
    }
}

fn build_view(bundle: &SeriesBundle, kind: ViewKind) -> Option<View> {
    let table = || bundle.table.as_ref();
    let view = match kind {
        ViewKind::Series => View::Series(
            bundle
                .latest
                .as_ref()
                .filter(|pts| !pts.is_empty())?
                .clone(),
        ),
        ViewKind::VintagesTable => {
            let table = table()?;
            View::VintagesTable {
                table: table.clone(),
                styles: highlight_changes(table),
            }
        }
        ViewKind::Heatmap => View::Heatmap(consecutive_diff(table()?)),
        ViewKind::Animation => View::Animation(melt(table()?)),
        ViewKind::Comparison(Some((a, b))) => {
            View::Comparison(compare_vintages(table()?, a, b)?)
        }
        ViewKind::Comparison(None) => View::Comparison(compare_first_two(table()?)?),
        ViewKind::Differences => View::Differences(first_last_diff(table()?)),
    };
    Some(view)
}

/// Per-user state: current series options, the selection, the fetched bundle and a
/// cache of derived views keyed by view name.
pub struct SeriesSession {
    provider: Arc<dyn DataProvider>,
    query: VintageQuery,
    options: Vec<(String, String)>,
    selected: Option<String>,
    bundle: Option<SeriesBundle>,
    views: HashMap<String, Option<View>>,
}

impl SeriesSession {
    pub fn new(provider: Arc<dyn DataProvider>, query: VintageQuery) -> Self {
        Self {
            provider,
            query,
            options: Vec::new(),
            selected: None,
            bundle: None,
            views: HashMap::new(),
        }
    }

    /// Series options as `(label, series id)`, in the order they were found.
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    pub fn selected_label(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_id(&self) -> Option<&str> {
        let label = self.selected.as_deref()?;
        self.options
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, id)| id.as_str())
    }

    pub fn bundle(&self) -> Option<&SeriesBundle> {
        self.bundle.as_ref()
    }

    fn reset(&mut self) {
        self.options.clear();
        self.selected = None;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.bundle = None;
        self.views.clear();
    }

    fn install_options(&mut self, options: Vec<(String, String)>) -> LookupOutcome {
        let mut deduped: Vec<(String, String)> = Vec::with_capacity(options.len());
        for (l, id) in options {
            if !deduped.iter().any(|(seen, _)| *seen == l) {
                deduped.push((l, id));
            }
        }
        let Some((first_label, first_id)) = deduped.first().cloned() else {
            return LookupOutcome::NoResults;
        };
        let found = deduped.len();
        self.options = deduped;
        self.selected = Some(first_label.clone());
        LookupOutcome::Selected {
            label: first_label,
            series_id: first_id,
            found,
        }
    }

    /// Resolve a typed series id through the provider's metadata call.
    pub async fn load_by_id(&mut self, raw_id: &str) -> LookupOutcome {
        self.reset();
        let id = raw_id.trim();
        if id.is_empty() {
            return LookupOutcome::EmptyInput;
        }
        if !is_valid_series_id(id) {
            warn!(id, "invalid series id format");
            return LookupOutcome::InvalidId(id.to_string());
        }

        match self.provider.metadata(id).await {
            Ok(meta) => {
                info!(id = %meta.id, "loaded series");
                self.install_options(vec![(meta.option_label(), meta.id.clone())])
            }
            Err(e) => {
                warn!(id, error = %e, "load by id failed");
                LookupOutcome::Failed(e.to_string())
            }
        }
    }

    /// Keyword search with frequency, geo and status filters.
    pub async fn search(&mut self, query: &SearchQuery) -> LookupOutcome {
        self.reset();
        if query.keyword.trim().is_empty() {
            return LookupOutcome::EmptyInput;
        }
        if [&query.frequency, &query.geo, &query.status]
            .iter()
            .any(|f| f.trim().is_empty())
        {
            return LookupOutcome::MissingFilters;
        }

        match self.provider.search(query).await {
            Ok(hits) => {
                info!(keyword = %query.keyword, count = hits.len(), "search finished");
                self.install_options(
                    hits.iter()
                        .map(|h| (h.option_label(), h.id.clone()))
                        .collect(),
                )
            }
            Err(e) => {
                warn!(keyword = %query.keyword, error = %e, "search failed");
                LookupOutcome::Failed(e.to_string())
            }
        }
    }

    /// Switch to another listed option. Returns `true` if the selection changed, in
    /// which case fetched data and cached views are dropped.
    pub fn select(&mut self, label: &str) -> bool {
        if self.selected.as_deref() == Some(label) || !self.options.iter().any(|(l, _)| l == label)
        {
            return false;
        }
        self.selected = Some(label.to_string());
        self.invalidate();
        true
    }

    /// Fetch the selected series unless the current bundle already belongs to it.
    /// `force_reload` always refetches and drops cached views.
    pub async fn visualize(&mut self, force_reload: bool) -> Option<&SeriesBundle> {
        let id = self.selected_id()?.to_string();
        let stale = self
            .bundle
            .as_ref()
            .map_or(true, |b| b.series_id != id);
        if force_reload || stale {
            let bundle = fetch_all(Arc::clone(&self.provider), &id, &self.query).await;
            self.views.clear();
            self.bundle = Some(bundle);
        }
        self.bundle.as_ref()
    }

    /// A derived view of the current bundle, computed on first use and cached.
    ///
    /// Views that cannot be built are cached as missing too; `force` recomputes.
    pub fn view(&mut self, kind: ViewKind, force: bool) -> Option<&View> {
        let bundle = self.bundle.as_ref()?;
        let key = kind.cache_key();
        if force || !self.views.contains_key(&key) {
            debug!(view = %key, "building view");
            let view = build_view(bundle, kind);
            self.views.insert(key.clone(), view);
        }
        self.views.get(&key).and_then(Option::as_ref)
    }

    pub fn cached_views(&self) -> usize {
        self.views.len()
    }
}
