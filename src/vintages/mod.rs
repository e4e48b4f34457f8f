// src/vintages/mod.rs

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::dates::parse_date;

pub mod transforms;

pub use transforms::{
    AnimationFrames, BarDirection, CellStyle, DiffTable, FirstLastDiff, MeltRecord,
    VintageComparison,
};

/// Observation dates before this are dropped from every revision table.
pub const OBSERVATION_CUTOFF: NaiveDate = match NaiveDate::from_ymd_opt(2014, 3, 1) {
    Some(d) => d,
    None => panic!("cutoff must be a valid date"),
};

/// Raw "vintages as mapping" payload: vintage label → (observation label → value).
pub type VintageMap = BTreeMap<String, BTreeMap<String, Option<f64>>>;

/// Observation-date × vintage-date matrix of values.
///
/// Rows and columns are both sorted ascending. `cells[r][c]` is the value known for
/// `rows[r]` as of vintage `columns[c]`, or `None` if it was not yet published.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionTable {
    rows: Vec<NaiveDate>,
    columns: Vec<NaiveDate>,
    cells: Vec<Vec<Option<f64>>>,
}

impl RevisionTable {
    /// Build a table from the provider's vintage mapping.
    ///
    /// Returns `None` for an empty mapping, for any label that does not parse as a
    /// date, or when no observation survives [`OBSERVATION_CUTOFF`].
    pub fn from_vintage_map(raw: &VintageMap) -> Option<Self> {
        if raw.is_empty() {
            debug!("empty vintage mapping");
            return None;
        }

        let mut by_vintage: BTreeMap<NaiveDate, BTreeMap<NaiveDate, Option<f64>>> =
            BTreeMap::new();
        let mut observations = BTreeSet::new();

        for (vintage_label, column) in raw {
            let Some(vintage) = parse_date(vintage_label) else {
                warn!(label = %vintage_label, "unparseable vintage date, discarding table");
                return None;
            };
            let slot = by_vintage.entry(vintage).or_default();
            for (obs_label, value) in column {
                let Some(obs) = parse_date(obs_label) else {
                    warn!(label = %obs_label, "unparseable observation date, discarding table");
                    return None;
                };
                observations.insert(obs);
                // a non-finite value carries no information
                let value = (*value).filter(|v| v.is_finite());
                if value.is_some() || !slot.contains_key(&obs) {
                    slot.insert(obs, value);
                }
            }
        }

        let rows: Vec<NaiveDate> = observations
            .into_iter()
            .filter(|d| *d >= OBSERVATION_CUTOFF)
            .collect();
        if rows.is_empty() {
            debug!("no observations on or after {}", OBSERVATION_CUTOFF);
            return None;
        }
        let columns: Vec<NaiveDate> = by_vintage.keys().copied().collect();

        let cells = rows
            .iter()
            .map(|obs| {
                by_vintage
                    .values()
                    .map(|col| col.get(obs).copied().flatten())
                    .collect()
            })
            .collect();

        Some(Self {
            rows,
            columns,
            cells,
        })
    }

    /// Assemble a table from already-parsed parts. Rows and columns must be sorted
    /// ascending and `cells` must be `rows.len()` × `columns.len()`. Non-finite
    /// cells are stored as absent.
    pub fn from_parts(
        rows: Vec<NaiveDate>,
        columns: Vec<NaiveDate>,
        mut cells: Vec<Vec<Option<f64>>>,
    ) -> Option<Self> {
        let sorted = |v: &[NaiveDate]| v.windows(2).all(|w| w[0] < w[1]);
        if rows.is_empty()
            || !sorted(&rows)
            || !sorted(&columns)
            || cells.len() != rows.len()
            || cells.iter().any(|r| r.len() != columns.len())
        {
            return None;
        }
        for cell in cells.iter_mut().flatten() {
            *cell = cell.filter(|v| v.is_finite());
        }
        Some(Self {
            rows,
            columns,
            cells,
        })
    }

    /// Observation dates, ascending.
    pub fn rows(&self) -> &[NaiveDate] {
        &self.rows
    }

    /// Vintage dates, ascending.
    pub fn columns(&self) -> &[NaiveDate] {
        &self.columns
    }

    pub fn cells(&self) -> &[Vec<Option<f64>>] {
        &self.cells
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row)?.get(col).copied().flatten()
    }

    pub fn column_index(&self, vintage: NaiveDate) -> Option<usize> {
        self.columns.binary_search(&vintage).ok()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(entries: &[(&str, &[(&str, Option<f64>)])]) -> VintageMap {
        entries
            .iter()
            .map(|(v, col)| {
                (
                    v.to_string(),
                    col.iter().map(|(o, x)| (o.to_string(), *x)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn builds_sorted_axes_and_aligns_cells() {
        let map = raw(&[
            ("2021-02-01", &[("2020-02-01", Some(50.0)), ("2020-01-01", Some(105.0))]),
            ("2021-01-01", &[("2020-01-01", Some(100.0))]),
        ]);
        let t = RevisionTable::from_vintage_map(&map).unwrap();

        assert_eq!(t.rows(), &[ymd(2020, 1, 1), ymd(2020, 2, 1)]);
        assert_eq!(t.columns(), &[ymd(2021, 1, 1), ymd(2021, 2, 1)]);
        assert_eq!(t.cell(0, 0), Some(100.0));
        assert_eq!(t.cell(0, 1), Some(105.0));
        assert_eq!(t.cell(1, 0), None);
        assert_eq!(t.cell(1, 1), Some(50.0));
        assert_eq!(t.column_index(ymd(2021, 2, 1)), Some(1));
        assert_eq!(t.column_index(ymd(2022, 2, 1)), None);
    }

    #[test]
    fn drops_observations_before_cutoff() {
        let map = raw(&[(
            "2020-06-01",
            &[
                ("2014-02-01", Some(1.0)),
                ("2014-03-01", Some(2.0)),
                ("2014-04-01", Some(3.0)),
            ],
        )]);
        let t = RevisionTable::from_vintage_map(&map).unwrap();
        assert_eq!(t.rows(), &[ymd(2014, 3, 1), ymd(2014, 4, 1)]);
        assert_eq!(t.cells(), &[vec![Some(2.0)], vec![Some(3.0)]]);
    }

    #[test]
    fn timestamped_labels_are_truncated_to_dates() {
        let map = raw(&[("2021-01-01T00:00:00", &[("2020-01-01T00:00:00", Some(1.5))])]);
        let t = RevisionTable::from_vintage_map(&map).unwrap();
        assert_eq!(t.rows(), &[ymd(2020, 1, 1)]);
        assert_eq!(t.columns(), &[ymd(2021, 1, 1)]);
    }

    #[test]
    fn empty_or_malformed_input_is_absent() {
        assert!(RevisionTable::from_vintage_map(&VintageMap::new()).is_none());

        let bad_vintage = raw(&[("yesterday", &[("2020-01-01", Some(1.0))])]);
        assert!(RevisionTable::from_vintage_map(&bad_vintage).is_none());

        let bad_obs = raw(&[("2021-01-01", &[("2020-01-01", Some(1.0)), ("Q1", Some(2.0))])]);
        assert!(RevisionTable::from_vintage_map(&bad_obs).is_none());

        let all_old = raw(&[("2021-01-01", &[("2010-01-01", Some(1.0))])]);
        assert!(RevisionTable::from_vintage_map(&all_old).is_none());
    }

    #[test]
    fn from_parts_checks_shape_and_order() {
        let rows = vec![ymd(2020, 1, 1), ymd(2020, 2, 1)];
        let cols = vec![ymd(2021, 1, 1)];
        assert!(RevisionTable::from_parts(
            rows.clone(),
            cols.clone(),
            vec![vec![Some(1.0)], vec![None]]
        )
        .is_some());
        assert!(
            RevisionTable::from_parts(rows.clone(), cols.clone(), vec![vec![Some(1.0)]]).is_none()
        );
        assert!(RevisionTable::from_parts(
            rows.into_iter().rev().collect(),
            cols,
            vec![vec![Some(1.0)], vec![None]]
        )
        .is_none());
    }

    #[test]
    fn non_finite_values_are_absent() {
        let map = raw(&[(
            "2021-01-01",
            &[
                ("2020-01-01", Some(f64::NAN)),
                ("2020-02-01", Some(f64::INFINITY)),
                ("2020-03-01", Some(2.0)),
            ],
        )]);
        let t = RevisionTable::from_vintage_map(&map).unwrap();
        assert_eq!(t.cells(), &[vec![None], vec![None], vec![Some(2.0)]]);
    }

    #[test]
    fn from_parts_drops_non_finite_cells() {
        let t = RevisionTable::from_parts(
            vec![ymd(2020, 1, 1)],
            vec![ymd(2021, 1, 1), ymd(2021, 2, 1), ymd(2021, 3, 1)],
            vec![vec![Some(1.0), Some(f64::NAN), Some(f64::NEG_INFINITY)]],
        )
        .unwrap();
        assert_eq!(t.cells(), &[vec![Some(1.0), None, None]]);

        assert_eq!(transforms::highlight_changes(&t), vec![vec![CellStyle::Unchanged; 3]]);
        assert_eq!(transforms::first_last_diff(&t).values, vec![0.0]);
        assert_eq!(transforms::melt(&t).y_range, Some((1.0, 1.0)));
    }

    #[test]
    fn vintage_labels_on_the_same_date_merge() {
        let map = raw(&[
            ("2021-01-01", &[("2020-01-01", Some(1.0)), ("2020-02-01", None)]),
            ("2021-01-01T00:00:00", &[("2020-01-01", None), ("2020-02-01", Some(2.0))]),
        ]);
        let t = RevisionTable::from_vintage_map(&map).unwrap();
        assert_eq!(t.columns().len(), 1);
        assert_eq!(t.cells(), &[vec![Some(1.0)], vec![Some(2.0)]]);
    }
}
