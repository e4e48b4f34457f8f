// src/provider/types.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Descriptive fields of one series. Anything the provider leaves out stays `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub id: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub frequency: Option<String>,
    pub source: Option<String>,
    pub last_update_time: Option<String>,
    pub last_value: Option<f64>,
}

impl SeriesMetadata {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed Series")
    }

    /// Label used for series pickers: `"<name> (ID: <id>)"`.
    pub fn option_label(&self) -> String {
        option_label(self.display_name(), &self.id)
    }
}

impl fmt::Display for SeriesMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_na(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("N/A")
        }
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Name: {}", or_na(&self.name))?;
        writeln!(f, "Country: {}", or_na(&self.country))?;
        writeln!(f, "Frequency: {}", or_na(&self.frequency))?;
        writeln!(f, "Source: {}", or_na(&self.source))?;
        writeln!(f, "Last Update Time: {}", or_na(&self.last_update_time))?;
        match self.last_value {
            Some(v) => write!(f, "Last Value: {}", v),
            None => write!(f, "Last Value: N/A"),
        }
    }
}

/// One (date, value) point of the latest-revision series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Sort points ascending by date, keeping the last value seen for a repeated date.
pub fn sort_points(points: Vec<TimePoint>) -> Vec<TimePoint> {
    let mut by_date = std::collections::BTreeMap::new();
    for p in points {
        by_date.insert(p.date, p.value);
    }
    by_date
        .into_iter()
        .map(|(date, value)| TimePoint { date, value })
        .collect()
}

/// Which slice of revision history to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VintageQuery {
    /// The most recent `n` vintages.
    Count(u32),
    /// Every vintage published on or after this date.
    StartDate(NaiveDate),
}

impl Default for VintageQuery {
    fn default() -> Self {
        VintageQuery::Count(10_000)
    }
}

impl VintageQuery {
    pub fn from_options(count: u32, start: Option<NaiveDate>) -> Self {
        match start {
            Some(d) => VintageQuery::StartDate(d),
            None => VintageQuery::Count(count),
        }
    }
}

/// Keyword search restricted by filter ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub frequency: String,
    pub geo: String,
    pub status: String,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub id: String,
    pub name: String,
}

impl SeriesSummary {
    pub fn option_label(&self) -> String {
        option_label(&self.name, &self.id)
    }
}

pub fn option_label(name: &str, id: &str) -> String {
    format!("{} (ID: {})", name, id)
}
