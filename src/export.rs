// src/export.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Date32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

use crate::dates::{label, to_epoch_days};
use crate::fetch::SeriesBundle;
use crate::provider::TimePoint;
use crate::vintages::transforms::{
    compare_first_two, compare_vintages, consecutive_diff, first_last_diff, highlight_changes,
    melt,
};
use crate::vintages::{BarDirection, CellStyle, RevisionTable};

/// Background for cells that were first published or revised at that vintage.
pub const CHANGED_CELL_COLOR: &str = "#F2CEEF";

/// Files written by one export.
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Output directory for a series under `root`.
pub fn series_dir(root: &Path, series_id: &str) -> PathBuf {
    root.join(format!("ceic_series_{}_output", series_id))
}

fn date_array(dates: impl IntoIterator<Item = NaiveDate>) -> ArrayRef {
    Arc::new(Date32Array::from(
        dates.into_iter().map(to_epoch_days).collect::<Vec<_>>(),
    ))
}

fn value_array(values: impl IntoIterator<Item = Option<f64>>) -> ArrayRef {
    Arc::new(Float64Array::from(values.into_iter().collect::<Vec<_>>()))
}

fn direction_array(directions: Vec<BarDirection>) -> ArrayRef {
    Arc::new(StringArray::from(
        directions
            .into_iter()
            .map(BarDirection::as_str)
            .collect::<Vec<_>>(),
    ))
}

/// Write one record batch to a snappy-compressed Parquet file.
fn write_parquet(path: &Path, fields: Vec<Field>, columns: Vec<ArrayRef>) -> Result<()> {
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns)
        .with_context(|| format!("building record batch for {:?}", path))?;
    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))
        .with_context(|| format!("creating Arrow writer for {:?}", path))?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    Ok(())
}

pub fn write_latest_series(path: &Path, points: &[TimePoint]) -> Result<()> {
    write_parquet(
        path,
        vec![
            Field::new("date", DataType::Date32, false),
            Field::new("value", DataType::Float64, true),
        ],
        vec![
            date_array(points.iter().map(|p| p.date)),
            value_array(points.iter().map(|p| p.value)),
        ],
    )
}

fn long_fields() -> Vec<Field> {
    vec![
        Field::new("observation_date", DataType::Date32, false),
        Field::new("vintage_date", DataType::Date32, false),
        Field::new("value", DataType::Float64, true),
    ]
}

/// Long-form (observation, vintage, value) table, vintage-major.
pub fn write_vintages_long(path: &Path, table: &RevisionTable) -> Result<()> {
    let frames = melt(table);
    write_parquet(
        path,
        long_fields(),
        vec![
            date_array(frames.records.iter().map(|r| r.observation_date)),
            date_array(frames.records.iter().map(|r| r.vintage_date)),
            value_array(frames.records.iter().map(|r| r.value)),
        ],
    )
}

/// Consecutive-vintage deltas in the same long layout as [`write_vintages_long`].
pub fn write_diff_long(path: &Path, table: &RevisionTable) -> Result<()> {
    let diff = consecutive_diff(table);
    let (mut obs, mut vin, mut val) = (Vec::new(), Vec::new(), Vec::new());
    for (c, vintage) in diff.columns.iter().enumerate() {
        for (r, date) in diff.rows.iter().enumerate() {
            obs.push(*date);
            vin.push(*vintage);
            val.push(diff.deltas[r][c]);
        }
    }
    write_parquet(
        path,
        long_fields(),
        vec![date_array(obs), date_array(vin), value_array(val)],
    )
}

pub fn write_first_last(path: &Path, table: &RevisionTable) -> Result<()> {
    let diff = first_last_diff(table);
    write_parquet(
        path,
        vec![
            Field::new("observation_date", DataType::Date32, false),
            Field::new("difference", DataType::Float64, true),
            Field::new("direction", DataType::Utf8, true),
        ],
        vec![
            date_array(diff.dates.iter().copied()),
            value_array(diff.values.iter().map(|v| (!v.is_nan()).then_some(*v))),
            direction_array(diff.directions()),
        ],
    )
}

/// Two vintage columns side by side; `Ok(false)` if either vintage is missing.
pub fn write_comparison(
    path: &Path,
    table: &RevisionTable,
    vintages: Option<(NaiveDate, NaiveDate)>,
) -> Result<bool> {
    let cmp = match vintages {
        Some((a, b)) => compare_vintages(table, a, b),
        None => compare_first_two(table),
    };
    let Some(cmp) = cmp else {
        return Ok(false);
    };
    let first_name = label(cmp.first_vintage);
    let mut second_name = label(cmp.second_vintage);
    if second_name == first_name {
        second_name.push_str("_2");
    }
    write_parquet(
        path,
        vec![
            Field::new("observation_date", DataType::Date32, false),
            Field::new(first_name, DataType::Float64, true),
            Field::new(second_name, DataType::Float64, true),
        ],
        vec![
            date_array(cmp.dates.iter().copied()),
            value_array(cmp.first.iter().copied()),
            value_array(cmp.second.iter().copied()),
        ],
    )?;
    Ok(true)
}

/// HTML table of the revision matrix with changed cells shaded.
pub fn render_vintages_html(table: &RevisionTable) -> String {
    let styles = highlight_changes(table);
    let mut html = String::from("<table class=\"vintages\">\n<thead><tr><th></th>");
    for c in table.columns() {
        html.push_str(&format!("<th>{}</th>", label(*c)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for (r, obs) in table.rows().iter().enumerate() {
        html.push_str(&format!("<tr><th>{}</th>", label(*obs)));
        for (c, style) in styles[r].iter().enumerate() {
            let text = table
                .cell(r, c)
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "nan".to_string());
            let cell = match style {
                CellStyle::Changed => format!(
                    "<td style=\"background-color: {}\">{}</td>",
                    CHANGED_CELL_COLOR, text
                ),
                CellStyle::Unchanged => format!("<td>{}</td>", text),
            };
            html.push_str(&cell);
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

/// Write every available artifact of `bundle` under `root`. Missing artifacts are
/// skipped with a warning.
#[tracing::instrument(level = "info", skip(bundle, root), fields(series = %bundle.series_id))]
pub fn export_bundle(
    bundle: &SeriesBundle,
    root: &Path,
    comparison: Option<(NaiveDate, NaiveDate)>,
) -> Result<ExportSummary> {
    let dir = series_dir(root, &bundle.series_id);
    fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;
    let mut summary = ExportSummary {
        dir: dir.clone(),
        files: Vec::new(),
    };

    match &bundle.metadata {
        Some(meta) => {
            let path = dir.join("metadata.json");
            let body = serde_json::to_string_pretty(meta).context("serializing metadata")?;
            fs::write(&path, body).with_context(|| format!("writing {:?}", path))?;
            summary.files.push(path);
        }
        None => warn!("metadata not available, skipping metadata.json"),
    }

    match bundle.latest.as_deref() {
        Some(points) if !points.is_empty() => {
            let path = dir.join("latest_series.parquet");
            write_latest_series(&path, points)?;
            summary.files.push(path);
        }
        Some(_) => warn!("latest series has no points, skipping"),
        None => warn!("latest series not available, skipping"),
    }

    let Some(table) = &bundle.table else {
        warn!("vintages not available, skipping vintage views");
        return Ok(summary);
    };

    let path = dir.join(format!("styled_vintages_table_{}.html", bundle.series_id));
    fs::write(&path, render_vintages_html(table))
        .with_context(|| format!("writing {:?}", path))?;
    summary.files.push(path);

    let path = dir.join("vintages_long.parquet");
    write_vintages_long(&path, table)?;
    summary.files.push(path);

    let path = dir.join("vintage_diff_long.parquet");
    write_diff_long(&path, table)?;
    summary.files.push(path);

    let path = dir.join("first_last_diff.parquet");
    write_first_last(&path, table)?;
    summary.files.push(path);

    let path = dir.join("vintage_comparison.parquet");
    if write_comparison(&path, table, comparison)? {
        summary.files.push(path);
    } else {
        warn!(?comparison, "comparison vintages not available, skipping");
    }

    info!(dir = %dir.display(), files = summary.files.len(), "export complete");
    Ok(summary)
}
