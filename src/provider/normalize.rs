// src/provider/normalize.rs
//
// The only place that knows about response shapes. Everything past this module
// works with SeriesMetadata, TimePoint, VintageMap and SeriesSummary.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::trace;

use super::error::ProviderError;
use super::types::{sort_points, SeriesMetadata, SeriesSummary, TimePoint};
use crate::dates::parse_date;
use crate::vintages::VintageMap;

fn malformed(msg: impl Into<String>) -> ProviderError {
    ProviderError::Malformed(msg.into())
}

/// Unwrap the `data` envelope and, if it is a list, its first element.
fn first_record(v: &Value) -> Option<&Value> {
    match v.get("data").unwrap_or(v) {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

/// Ids come back as either strings or numbers.
fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A `{ "name": ... }` object or a bare string.
fn named(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Numbers may be JSON numbers, numeric strings or null.
pub fn numeric(v: &Value) -> Result<Option<f64>, ProviderError> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| malformed(format!("not a number: {:?}", s))),
        other => Err(malformed(format!("not a number: {}", other))),
    }
}

pub fn metadata(v: &Value) -> Result<SeriesMetadata, ProviderError> {
    let record = first_record(v).ok_or_else(|| malformed("metadata response has no data"))?;
    let meta = record
        .get("metadata")
        .unwrap_or(record)
        .as_object()
        .ok_or_else(|| malformed("metadata is not an object"))?;

    let id = meta
        .get("id")
        .and_then(id_string)
        .ok_or_else(|| malformed("metadata has no id"))?;
    let last_value = match meta.get("last_value") {
        Some(x) => numeric(x).unwrap_or(None),
        None => None,
    };

    Ok(SeriesMetadata {
        id,
        name: meta.get("name").and_then(Value::as_str).map(str::to_string),
        country: named(meta.get("country")),
        frequency: named(meta.get("frequency")),
        source: named(meta.get("source")),
        last_update_time: meta
            .get("last_update_time")
            .and_then(|t| match t {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            }),
        last_value,
    })
}

fn point(v: &Value) -> Result<TimePoint, ProviderError> {
    let obj = v
        .as_object()
        .ok_or_else(|| malformed("time point is not an object"))?;
    let date_label = obj
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("time point has no date"))?;
    let date =
        parse_date(date_label).ok_or_else(|| malformed(format!("bad date {:?}", date_label)))?;
    let value = numeric(obj.get("value").unwrap_or(&Value::Null))?;
    Ok(TimePoint { date, value })
}

/// Latest-revision points, sorted ascending by date.
///
/// `time_points` may be a list of points or an object whose values are points.
pub fn time_points(v: &Value) -> Result<Vec<TimePoint>, ProviderError> {
    let record = first_record(v).ok_or_else(|| malformed("series response has no data"))?;
    let raw = record
        .get("time_points")
        .or_else(|| record.get("timePoints"))
        .ok_or_else(|| malformed("series response has no time_points"))?;

    let points = match raw {
        Value::Array(items) => items.iter().map(point).collect::<Result<Vec<_>, _>>()?,
        Value::Object(map) => map.values().map(point).collect::<Result<Vec<_>, _>>()?,
        _ => return Err(malformed("time_points is neither a list nor an object")),
    };
    trace!(count = points.len(), "parsed time points");
    Ok(sort_points(points))
}

fn vintage_column(
    col: &Map<String, Value>,
) -> Result<BTreeMap<String, Option<f64>>, ProviderError> {
    col.iter()
        .map(|(obs, value)| -> Result<_, ProviderError> { Ok((obs.clone(), numeric(value)?)) })
        .collect()
}

/// Vintage mapping: either `{vintage: {observation: value}}` (optionally under
/// `data`) or a record list of `{vintage_date, date, value}`.
pub fn vintages(v: &Value) -> Result<VintageMap, ProviderError> {
    let body = v.get("data").unwrap_or(v);
    match body {
        Value::Object(map) => map
            .iter()
            .map(|(vintage, col)| -> Result<_, ProviderError> {
                let col = col
                    .as_object()
                    .ok_or_else(|| malformed(format!("vintage {} is not an object", vintage)))?;
                Ok((vintage.clone(), vintage_column(col)?))
            })
            .collect(),
        Value::Array(records) => {
            let mut out = VintageMap::new();
            for rec in records {
                let vintage = rec
                    .get("vintage_date")
                    .or_else(|| rec.get("vintage"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("vintage record has no vintage_date"))?;
                let obs = rec
                    .get("date")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("vintage record has no date"))?;
                let value = numeric(rec.get("value").unwrap_or(&Value::Null))?;
                out.entry(vintage.to_string())
                    .or_default()
                    .insert(obs.to_string(), value);
            }
            Ok(out)
        }
        _ => Err(malformed("vintages response is neither an object nor a list")),
    }
}

/// One page of search results and the provider's reported total, if any.
pub fn search_page(v: &Value) -> Result<(Vec<SeriesSummary>, Option<u64>), ProviderError> {
    let data = v.get("data").unwrap_or(v);
    let items = match data.get("items").unwrap_or(data) {
        Value::Array(items) => items,
        Value::Null => return Ok((Vec::new(), Some(0))),
        _ => return Err(malformed("search items is not a list")),
    };
    let total = data.get("total").and_then(Value::as_u64);

    let hits = items
        .iter()
        .filter_map(|item| {
            let meta = item.get("metadata").unwrap_or(item);
            let id = meta.get("id").and_then(id_string)?;
            let name = meta.get("name").and_then(Value::as_str)?.to_string();
            Some(SeriesSummary { id, name })
        })
        .collect();
    Ok((hits, total))
}
