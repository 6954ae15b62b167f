//! Long-format panel data for skill-formation models.
//!
//! Purpose
//! -------
//! Provide the validated long-format [`Dataset`] (one row per individual and
//! period) that users hand to a model, and the [`Panel`] it is aligned into:
//! dense per-period matrices whose columns follow the measurement equations
//! and controls of a [`ModelSpec`].
//!
//! Key behaviors
//! -------------
//! - [`Dataset::new`] checks that every column has one value per row and
//!   that the dataset is non-empty. [`Dataset::from_csv_reader`] /
//!   [`Dataset::from_csv_path`] read the same layout from CSV; empty cells
//!   and `NA` / `NaN` / `.` are missing values.
//! - [`Panel::align`] groups rows by individual (first-appearance order),
//!   rejects duplicated `(id, period)` pairs and periods outside
//!   `0..n_periods`, and fills absent rows with missing values.
//! - A missing control value makes every measurement of that
//!   individual-period missing; alignment logs one warning with the count.
//!
//! Invariants & assumptions
//! ------------------------
//! - Missing values are stored as `NaN` and only ever mean "not observed".
//! - After alignment, `measurements[t]` has shape
//!   `(n_individuals, measurement_equations[t].len())` and `controls[t]` has
//!   shape `(n_individuals, controls[t].len())`.
//!
//! Conventions
//! -----------
//! - Periods are 0-based integers.
//! - The anchoring outcome is read from the final period's row.
//!
//! Downstream usage
//! ----------------
//! - The filter reads one individual at a time through
//!   [`Panel::individual`]; the panel is shared read-only across threads.
//!
//! Testing notes
//! -------------
//! - Unit tests cover construction errors, CSV parsing of missing values,
//!   alignment of absent rows and the missing-control rule.
use crate::model::{
    core::spec::ModelSpec,
    errors::{DataError, DataResult},
};
use csv::{ReaderBuilder, WriterBuilder};
use ndarray::{Array1, Array2, ArrayView1};
use std::{
    collections::{BTreeMap, HashMap},
    io,
    path::Path,
};
use tracing::warn;

const MISSING_TOKENS: [&str; 5] = ["", "NA", "NaN", "nan", "."];

/// Long-format dataset keyed by `(id, period)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    ids: Vec<String>,
    periods: Vec<usize>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl Dataset {
    /// Construct a dataset from key vectors and named columns.
    ///
    /// Parameters
    /// ----------
    /// - `ids`: `Vec<String>`
    ///   Individual identifier per row.
    /// - `periods`: `Vec<usize>`
    ///   Period per row.
    /// - `columns`: `Vec<(String, Vec<f64>)>`
    ///   Variable columns; `NaN` marks a missing value.
    ///
    /// Errors
    /// ------
    /// - `DataError::EmptyDataset` if there are no rows.
    /// - `DataError::ColumnLength` if `periods` or any column length differs
    ///   from `ids.len()`.
    pub fn new(
        ids: Vec<String>, periods: Vec<usize>, columns: Vec<(String, Vec<f64>)>,
    ) -> DataResult<Self> {
        if ids.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        let n = ids.len();
        if periods.len() != n {
            return Err(DataError::ColumnLength {
                column: "period".to_string(),
                expected: n,
                found: periods.len(),
            });
        }
        let mut map = BTreeMap::new();
        for (name, values) in columns {
            if values.len() != n {
                return Err(DataError::ColumnLength { column: name, expected: n, found: values.len() });
            }
            map.insert(name, values);
        }
        Ok(Self { ids, periods, columns: map })
    }

    /// Read a dataset from CSV with a header row.
    ///
    /// Errors
    /// ------
    /// - `DataError::MissingColumn` if the id or period column is absent.
    /// - `DataError::ParseValue` for a cell that is neither a number nor a
    ///   missing-value token, or a period that is not a non-negative integer.
    /// - `DataError::Csv` for malformed CSV.
    pub fn from_csv_reader<R: io::Read>(
        reader: R, id_column: &str, period_column: &str,
    ) -> DataResult<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DataError::MissingColumn { column: name.to_string() })
        };
        let id_pos = position(id_column)?;
        let period_pos = position(period_column)?;

        let mut ids = Vec::new();
        let mut periods = Vec::new();
        let mut values: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            for (col, cell) in record.iter().enumerate() {
                let cell = cell.trim();
                if col == id_pos {
                    ids.push(cell.to_string());
                } else if col == period_pos {
                    periods.push(parse_period(cell).ok_or_else(|| DataError::ParseValue {
                        row,
                        column: headers[col].clone(),
                        value: cell.to_string(),
                    })?);
                } else {
                    values[col].push(parse_value(cell).ok_or_else(|| DataError::ParseValue {
                        row,
                        column: headers[col].clone(),
                        value: cell.to_string(),
                    })?);
                }
            }
        }
        let columns = headers
            .into_iter()
            .zip(values)
            .enumerate()
            .filter(|(col, _)| *col != id_pos && *col != period_pos)
            .map(|(_, pair)| pair)
            .collect();
        Self::new(ids, periods, columns)
    }

    pub fn from_csv_path(
        path: impl AsRef<Path>, id_column: &str, period_column: &str,
    ) -> DataResult<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| DataError::Csv {
            reason: format!("failed to open '{}': {e}", path.as_ref().display()),
        })?;
        Self::from_csv_reader(file, id_column, period_column)
    }

    /// Write the dataset as CSV (`id`, `period`, then columns in name order).
    pub fn to_csv_writer<W: io::Write>(&self, writer: W) -> DataResult<()> {
        let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
        let mut header = vec!["id".to_string(), "period".to_string()];
        header.extend(self.columns.keys().cloned());
        wtr.write_record(&header)?;
        for row in 0..self.n_rows() {
            let mut record = vec![self.ids[row].clone(), self.periods[row].to_string()];
            for values in self.columns.values() {
                let v = values[row];
                record.push(if v.is_nan() { String::new() } else { v.to_string() });
            }
            wtr.write_record(&record)?;
        }
        wtr.flush().map_err(|e| DataError::Csv { reason: e.to_string() })?;
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn periods(&self) -> &[usize] {
        &self.periods
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

fn parse_value(cell: &str) -> Option<f64> {
    if MISSING_TOKENS.contains(&cell) {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

fn parse_period(cell: &str) -> Option<usize> {
    if let Ok(p) = cell.parse::<usize>() {
        return Some(p);
    }
    let v = cell.parse::<f64>().ok()?;
    (v >= 0.0 && v.fract() == 0.0 && v.is_finite()).then_some(v as usize)
}

/// One individual's observations, borrowed from a [`Panel`].
#[derive(Debug, Clone)]
pub struct IndividualData<'a> {
    /// Per period, aligned with the period's measurement equations.
    pub measurements: Vec<ArrayView1<'a, f64>>,
    /// Per period, aligned with the period's controls.
    pub controls: Vec<ArrayView1<'a, f64>>,
    /// Anchoring outcome in the final period (`NaN` if missing).
    pub anchoring_outcome: Option<f64>,
}

/// Dataset aligned to a specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    ids: Vec<String>,
    measurements: Vec<Array2<f64>>,
    controls: Vec<Array2<f64>>,
    anchoring_outcome: Option<Array1<f64>>,
}

impl Panel {
    /// Align a long-format dataset to `spec`.
    ///
    /// Parameters
    /// ----------
    /// - `spec`: `&ModelSpec`
    ///   Normalized specification; its measurement equations and controls
    ///   define the column order.
    /// - `data`: `&Dataset`
    ///   Long-format data.
    ///
    /// Returns
    /// -------
    /// `DataResult<Panel>` with one row per individual in order of first
    /// appearance.
    ///
    /// Errors
    /// ------
    /// - `DataError::MissingColumn` for any column in
    ///   [`ModelSpec::required_columns`] that the dataset lacks.
    /// - `DataError::PeriodOutOfRange` for a period `≥ n_periods`.
    /// - `DataError::DuplicateObservation` for a repeated `(id, period)`.
    pub fn align(spec: &ModelSpec, data: &Dataset) -> DataResult<Self> {
        for column in spec.required_columns() {
            if data.column(&column).is_none() {
                return Err(DataError::MissingColumn { column });
            }
        }
        let n_periods = spec.n_periods;

        let mut ids: Vec<String> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut rows: Vec<Vec<Option<usize>>> = Vec::new();
        for (row, (id, &period)) in data.ids().iter().zip(data.periods()).enumerate() {
            if period >= n_periods {
                return Err(DataError::PeriodOutOfRange { id: id.clone(), period, n_periods });
            }
            let i = *index.entry(id.as_str()).or_insert_with(|| {
                ids.push(id.clone());
                rows.push(vec![None; n_periods]);
                ids.len() - 1
            });
            if rows[i][period].replace(row).is_some() {
                return Err(DataError::DuplicateObservation { id: id.clone(), period });
            }
        }
        let n_ind = ids.len();

        let value = |i: usize, t: usize, column: &str| -> f64 {
            match (rows[i][t], data.column(column)) {
                (Some(row), Some(values)) => values[row],
                _ => f64::NAN,
            }
        };

        let mut measurements = Vec::with_capacity(n_periods);
        let mut controls = Vec::with_capacity(n_periods);
        let mut n_dropped = 0usize;
        for t in 0..n_periods {
            let eqs = &spec.measurement_equations[t];
            let ctrl_names = &spec.controls[t];
            let ctrl = Array2::from_shape_fn((n_ind, ctrl_names.len()), |(i, c)| {
                value(i, t, &ctrl_names[c])
            });
            let mut meas =
                Array2::from_shape_fn((n_ind, eqs.len()), |(i, j)| value(i, t, &eqs[j].name));
            for i in 0..n_ind {
                if ctrl.row(i).iter().any(|v| v.is_nan())
                    && meas.row(i).iter().any(|v| !v.is_nan())
                {
                    meas.row_mut(i).fill(f64::NAN);
                    n_dropped += 1;
                }
            }
            measurements.push(meas);
            controls.push(ctrl);
        }
        if n_dropped > 0 {
            warn!(
                n_individual_periods = n_dropped,
                "missing control values; measurements of these individual-periods are ignored"
            );
        }

        let anchoring_outcome = spec.anchoring.as_ref().map(|a| {
            Array1::from_shape_fn(n_ind, |i| value(i, n_periods - 1, &a.outcome))
        });

        Ok(Self { ids, measurements, controls, anchoring_outcome })
    }

    pub fn n_individuals(&self) -> usize {
        self.ids.len()
    }

    pub fn n_periods(&self) -> usize {
        self.measurements.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Measurements of period `t` (`n_individuals × n_equations`).
    pub fn measurements(&self, t: usize) -> &Array2<f64> {
        &self.measurements[t]
    }

    /// Controls of period `t` (`n_individuals × n_controls`).
    pub fn controls(&self, t: usize) -> &Array2<f64> {
        &self.controls[t]
    }

    pub fn anchoring_outcome(&self) -> Option<&Array1<f64>> {
        self.anchoring_outcome.as_ref()
    }

    /// Borrow individual `i`'s rows.
    pub fn individual(&self, i: usize) -> IndividualData<'_> {
        IndividualData {
            measurements: self.measurements.iter().map(|m| m.row(i)).collect(),
            controls: self.controls.iter().map(|c| c.row(i)).collect(),
            anchoring_outcome: self.anchoring_outcome.as_ref().map(|a| a[i]),
        }
    }
}
