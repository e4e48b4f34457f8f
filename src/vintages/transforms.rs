// src/vintages/transforms.rs
//
// Derived views over a RevisionTable. All of them are pure and assume the
// ascending column order that RevisionTable guarantees.

use chrono::NaiveDate;
use serde::Serialize;

use super::RevisionTable;

/// Fraction of the value range added above and below the animation's y axis.
const Y_PADDING_FRACTION: f64 = 0.05;
/// Bar width used when there are fewer than two observations to measure spacing.
const DEFAULT_BAR_WIDTH: f64 = 10.0;
/// Bars fill this share of the gap between consecutive observations.
const BAR_FILL: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CellStyle {
    Unchanged,
    /// The cell was first published, or revised, at this vintage.
    Changed,
}

/// Consecutive-vintage deltas, same shape as the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffTable {
    pub rows: Vec<NaiveDate>,
    pub columns: Vec<NaiveDate>,
    pub deltas: Vec<Vec<Option<f64>>>,
}

impl DiffTable {
    /// Largest absolute delta, for a color scale centered at zero.
    pub fn max_abs(&self) -> Option<f64> {
        self.deltas
            .iter()
            .flatten()
            .flatten()
            .map(|d| d.abs())
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.max(d))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeltRecord {
    pub observation_date: NaiveDate,
    pub vintage_date: NaiveDate,
    pub value: Option<f64>,
}

/// Long-form table driving a frame-per-vintage animation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFrames {
    pub records: Vec<MeltRecord>,
    /// Distinct vintages in ascending order, one frame each.
    pub frames: Vec<NaiveDate>,
    /// Padded `(low, high)` y range; `None` when the table holds no values.
    pub y_range: Option<(f64, f64)>,
}

impl AnimationFrames {
    /// Records for a single frame, in observation order.
    pub fn frame(&self, vintage: NaiveDate) -> impl Iterator<Item = &MeltRecord> {
        self.records
            .iter()
            .filter(move |r| r.vintage_date == vintage)
    }
}

/// Sign of a first-vs-last bar, which picks its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarDirection {
    Up,
    Down,
    None,
}

impl BarDirection {
    /// Column value for exports; `None` has no bar.
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            BarDirection::Up => Some("up"),
            BarDirection::Down => Some("down"),
            BarDirection::None => None,
        }
    }
}

/// Last-minus-first revision per observation date.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstLastDiff {
    pub dates: Vec<NaiveDate>,
    /// NaN where the row has no published value.
    pub values: Vec<f64>,
    pub bar_width: f64,
}

impl FirstLastDiff {
    pub fn directions(&self) -> Vec<BarDirection> {
        self.values
            .iter()
            .map(|v| {
                if v.is_nan() {
                    BarDirection::None
                } else if *v >= 0.0 {
                    BarDirection::Up
                } else {
                    BarDirection::Down
                }
            })
            .collect()
    }
}

/// Two vintage columns side by side over the observation axis.
#[derive(Debug, Clone, PartialEq)]
pub struct VintageComparison {
    pub dates: Vec<NaiveDate>,
    pub first_vintage: NaiveDate,
    pub first: Vec<Option<f64>>,
    pub second_vintage: NaiveDate,
    pub second: Vec<Option<f64>>,
}

/// Tag cells whose value first appears or differs from the previous vintage.
///
/// Uses exact float equality; absent → present counts as a change.
pub fn highlight_row(row: &[Option<f64>]) -> Vec<CellStyle> {
    let mut styles = vec![CellStyle::Unchanged; row.len()];
    for i in 1..row.len() {
        if let Some(cur) = row[i] {
            match row[i - 1] {
                None => styles[i] = CellStyle::Changed,
                Some(prev) if prev != cur => styles[i] = CellStyle::Changed,
                Some(_) => {}
            }
        }
    }
    styles
}

pub fn highlight_changes(table: &RevisionTable) -> Vec<Vec<CellStyle>> {
    table.cells().iter().map(|row| highlight_row(row)).collect()
}

/// Column-wise first difference; the first column and any gap are `None`.
pub fn consecutive_diff(table: &RevisionTable) -> DiffTable {
    let deltas = table
        .cells()
        .iter()
        .map(|row| {
            let mut out = Vec::with_capacity(row.len());
            if !row.is_empty() {
                out.push(None);
            }
            out.extend(row.windows(2).map(|w| match (w[0], w[1]) {
                (Some(prev), Some(cur)) => Some(cur - prev),
                _ => None,
            }));
            out
        })
        .collect();

    DiffTable {
        rows: table.rows().to_vec(),
        columns: table.columns().to_vec(),
        deltas,
    }
}

/// Reshape into one record per cell, vintage-major.
pub fn melt(table: &RevisionTable) -> AnimationFrames {
    let mut records = Vec::with_capacity(table.num_rows() * table.num_columns());
    for (c, vintage) in table.columns().iter().enumerate() {
        for (r, obs) in table.rows().iter().enumerate() {
            records.push(MeltRecord {
                observation_date: *obs,
                vintage_date: *vintage,
                value: table.cell(r, c),
            });
        }
    }

    let bounds = records
        .iter()
        .filter_map(|r| r.value)
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });
    let y_range = bounds.map(|(lo, hi)| {
        let pad = (hi - lo) * Y_PADDING_FRACTION;
        (lo - pad, hi + pad)
    });

    AnimationFrames {
        records,
        frames: table.columns().to_vec(),
        y_range,
    }
}

/// Difference between the last and first published value of every row.
pub fn first_last_diff(table: &RevisionTable) -> FirstLastDiff {
    let values = table
        .cells()
        .iter()
        .map(|row| {
            let mut present = row.iter().flatten();
            match present.next() {
                Some(first) => present.last().unwrap_or(first) - first,
                None => f64::NAN,
            }
        })
        .collect();

    let dates = table.rows().to_vec();
    let bar_width = match dates.as_slice() {
        [a, b, ..] => (*b - *a).num_days() as f64 * BAR_FILL,
        _ => DEFAULT_BAR_WIDTH,
    };

    FirstLastDiff {
        dates,
        values,
        bar_width,
    }
}

/// Extract two vintage columns; `None` if either is not in the table.
pub fn compare_vintages(
    table: &RevisionTable,
    first: NaiveDate,
    second: NaiveDate,
) -> Option<VintageComparison> {
    let a = table.column_index(first)?;
    let b = table.column_index(second)?;
    let column = |c: usize| (0..table.num_rows()).map(|r| table.cell(r, c)).collect();

    Some(VintageComparison {
        dates: table.rows().to_vec(),
        first_vintage: first,
        first: column(a),
        second_vintage: second,
        second: column(b),
    })
}

/// Compare the two earliest vintages; `None` with fewer than two columns.
pub fn compare_first_two(table: &RevisionTable) -> Option<VintageComparison> {
    match table.columns() {
        [a, b, ..] => compare_vintages(table, *a, *b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// rows 2020-01/02, vintages 2021-01/02, one late first print.
    fn sample() -> RevisionTable {
        RevisionTable::from_parts(
            vec![ymd(2020, 1, 1), ymd(2020, 2, 1)],
            vec![ymd(2021, 1, 1), ymd(2021, 2, 1)],
            vec![vec![Some(100.0), Some(105.0)], vec![None, Some(50.0)]],
        )
        .unwrap()
    }

    fn wide() -> RevisionTable {
        RevisionTable::from_parts(
            vec![ymd(2020, 1, 1), ymd(2020, 1, 11), ymd(2020, 1, 21)],
            vec![
                ymd(2021, 1, 1),
                ymd(2021, 2, 1),
                ymd(2021, 3, 1),
                ymd(2021, 4, 1),
            ],
            vec![
                vec![Some(1.0), Some(1.0), None, Some(4.0)],
                vec![None, None, None, None],
                vec![None, Some(-2.0), Some(-2.5), Some(-2.5)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn highlight_scenario() {
        let styles = highlight_changes(&sample());
        assert_eq!(styles[0], vec![CellStyle::Unchanged, CellStyle::Changed]);
        assert_eq!(styles[1], vec![CellStyle::Unchanged, CellStyle::Changed]);
    }

    #[test]
    fn highlight_never_tags_first_column_and_tags_first_prints() {
        let table = wide();
        for (r, styles) in highlight_changes(&table).iter().enumerate() {
            assert_eq!(styles[0], CellStyle::Unchanged);
            for c in 1..styles.len() {
                if table.cell(r, c).is_some() && table.cell(r, c - 1).is_none() {
                    assert_eq!(styles[c], CellStyle::Changed, "row {r} col {c}");
                }
            }
        }
        let styles = highlight_changes(&table);
        // same value carried forward, then a gap, then a reappearance
        assert_eq!(
            styles[0],
            vec![
                CellStyle::Unchanged,
                CellStyle::Unchanged,
                CellStyle::Unchanged,
                CellStyle::Changed
            ]
        );
        assert!(styles[1].iter().all(|s| *s == CellStyle::Unchanged));
    }

    #[test]
    fn highlight_uses_exact_equality() {
        let noisy = [Some(0.1 + 0.2), Some(0.3)];
        assert_eq!(highlight_row(&noisy)[1], CellStyle::Changed);
        assert_eq!(highlight_row(&[Some(0.3), Some(0.3)])[1], CellStyle::Unchanged);
        assert!(highlight_row(&[]).is_empty());
    }

    #[test]
    fn diff_scenario() {
        let d = consecutive_diff(&sample());
        assert_eq!(d.deltas[0], vec![None, Some(5.0)]);
        assert_eq!(d.deltas[1], vec![None, None]);
        assert_eq!(d.max_abs(), Some(5.0));
    }

    #[test]
    fn diff_first_column_always_absent() {
        let d = consecutive_diff(&wide());
        assert!(d.deltas.iter().all(|row| row[0].is_none()));
        assert_eq!(d.deltas[0], vec![None, Some(0.0), None, None]);
        assert_eq!(d.deltas[2], vec![None, None, Some(-0.5), Some(0.0)]);
        assert_eq!(d.columns.len(), 4);
    }

    #[test]
    fn first_last_scenario() {
        let f = first_last_diff(&sample());
        assert_eq!(f.values, vec![5.0, 0.0]);
        assert_eq!(f.dates, vec![ymd(2020, 1, 1), ymd(2020, 2, 1)]);
        assert!((f.bar_width - 31.0 * 0.8).abs() < 1e-9);
        assert_eq!(f.directions(), vec![BarDirection::Up, BarDirection::Up]);
    }

    #[test]
    fn first_last_handles_gaps_and_empty_rows() {
        let f = first_last_diff(&wide());
        assert_eq!(f.values[0], 3.0);
        assert!(f.values[1].is_nan());
        assert_eq!(f.values[2], -0.5);
        assert_eq!(
            f.directions(),
            vec![BarDirection::Up, BarDirection::None, BarDirection::Down]
        );
        assert!((f.bar_width - 8.0).abs() < 1e-9);
    }

    #[test]
    fn single_row_uses_default_bar_width() {
        let t = RevisionTable::from_parts(
            vec![ymd(2020, 1, 1)],
            vec![ymd(2021, 1, 1)],
            vec![vec![Some(7.0)]],
        )
        .unwrap();
        assert_eq!(first_last_diff(&t).bar_width, 10.0);
    }

    #[test]
    fn melt_is_vintage_major_with_padded_range() {
        let frames = melt(&sample());
        assert_eq!(frames.records.len(), 4);
        assert_eq!(
            frames.records[0],
            MeltRecord {
                observation_date: ymd(2020, 1, 1),
                vintage_date: ymd(2021, 1, 1),
                value: Some(100.0),
            }
        );
        assert_eq!(frames.records[1].value, None);
        assert_eq!(frames.records[3].value, Some(50.0));
        assert_eq!(frames.frames, vec![ymd(2021, 1, 1), ymd(2021, 2, 1)]);

        let (lo, hi) = frames.y_range.unwrap();
        assert!((lo - 47.25).abs() < 1e-9);
        assert!((hi - 107.75).abs() < 1e-9);

        let second: Vec<_> = frames.frame(ymd(2021, 2, 1)).map(|r| r.value).collect();
        assert_eq!(second, vec![Some(105.0), Some(50.0)]);
    }

    #[test]
    fn melt_of_all_absent_has_no_range() {
        let t = RevisionTable::from_parts(
            vec![ymd(2020, 1, 1)],
            vec![ymd(2021, 1, 1)],
            vec![vec![None]],
        )
        .unwrap();
        let frames = melt(&t);
        assert_eq!(frames.records.len(), 1);
        assert_eq!(frames.y_range, None);
    }

    #[test]
    fn comparison_requires_both_columns() {
        let t = sample();
        let cmp = compare_vintages(&t, ymd(2021, 2, 1), ymd(2021, 1, 1)).unwrap();
        assert_eq!(cmp.first, vec![Some(105.0), Some(50.0)]);
        assert_eq!(cmp.second, vec![Some(100.0), None]);
        assert_eq!(cmp.first_vintage, ymd(2021, 2, 1));

        assert!(compare_vintages(&t, ymd(2021, 1, 1), ymd(1999, 1, 1)).is_none());
        assert!(compare_vintages(&t, ymd(1999, 1, 1), ymd(2021, 1, 1)).is_none());
    }

    #[test]
    fn default_comparison_uses_two_earliest_vintages() {
        let cmp = compare_first_two(&wide()).unwrap();
        assert_eq!(cmp.first_vintage, ymd(2021, 1, 1));
        assert_eq!(cmp.second_vintage, ymd(2021, 2, 1));

        let narrow = RevisionTable::from_parts(
            vec![ymd(2020, 1, 1)],
            vec![ymd(2021, 1, 1)],
            vec![vec![Some(1.0)]],
        )
        .unwrap();
        assert!(compare_first_two(&narrow).is_none());
    }
}
