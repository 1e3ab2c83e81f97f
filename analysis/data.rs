//! # Data Loading and Preparation
//!
//! This module is the only entry point for user-provided survey data. It reads a
//! delimited extract, projects it onto the six fields the analysis uses, and turns
//! each row into a fully observed [`Record`].
//!
//! - Fixed variable set: only the configured outcome, age, sex, BMI, systolic blood
//!   pressure and physical-activity columns are read; everything else is dropped at load.
//! - Exclusion, not failure: a respondent with a missing, non-finite or unrecognised
//!   value is excluded and counted in the [`PreparationReport`]. Structural problems
//!   with the file itself (missing column, non-numeric column, too few rows) are errors.
//! - Performance: polars reads the file once; conversion to records is a single pass.

use crate::config::{Codebook, ColumnNames};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Categorical sex, dummy-encoded with `Female` as the reference level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
}

/// One fully observed survey respondent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub has_condition: bool,
    pub age: f64,
    pub sex: Sex,
    pub bmi: f64,
    pub systolic_bp: f64,
    pub physically_active: bool,
}

impl Record {
    /// Outcome label as the 0/1 response used by the regression.
    pub fn outcome(&self) -> f64 {
        if self.has_condition { 1.0 } else { 0.0 }
    }
}

/// One row as read from disk, before any recoding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawRecord {
    pub outcome: Option<f64>,
    pub age: Option<f64>,
    pub sex: Option<f64>,
    pub bmi: Option<f64>,
    pub systolic_bp: Option<f64>,
    pub physically_active: Option<f64>,
}

/// An ordered, immutable collection of prepared records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.records.iter().filter(|r| r.has_condition).count()
    }

    /// Fraction of records with the condition; NaN for an empty dataset.
    pub fn prevalence(&self) -> f64 {
        if self.records.is_empty() {
            return f64::NAN;
        }
        self.positives() as f64 / self.records.len() as f64
    }

    /// Builds a new dataset from the records at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset::new(indices.iter().map(|&i| self.records[i]).collect())
    }
}

/// The survey fields, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Outcome,
    Age,
    Sex,
    Bmi,
    SystolicBp,
    PhysicallyActive,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Outcome,
        Field::Age,
        Field::Sex,
        Field::Bmi,
        Field::SystolicBp,
        Field::PhysicallyActive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Outcome => "outcome",
            Field::Age => "age",
            Field::Sex => "sex",
            Field::Bmi => "bmi",
            Field::SystolicBp => "systolic_bp",
            Field::PhysicallyActive => "physically_active",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A respondent lacks a usable value for a required field. Resolved by excluding
/// the respondent; never fatal for the run.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("Row {row} has no usable value for '{field}' and is excluded.")]
pub struct MissingDataError {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub field: Field,
}

/// Structural problems with the input file.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to numeric codes. None of its values parse as numbers. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        found_type: String,
    },
    #[error(
        "Input contains only {found} usable rows, but at least {required} are required for a stable model."
    )]
    InsufficientRows { found: usize, required: usize },
}

/// Counts of what preparation kept and why it dropped the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreparationReport {
    pub rows_read: usize,
    pub rows_retained: usize,
    /// Exclusions keyed by the first unusable field in schema order.
    pub excluded_by_field: Vec<(Field, usize)>,
}

impl PreparationReport {
    pub fn rows_excluded(&self) -> usize {
        self.rows_read - self.rows_retained
    }

    pub fn excluded_for(&self, field: Field) -> usize {
        self.excluded_by_field
            .iter()
            .find(|(f, _)| *f == field)
            .map_or(0, |(_, count)| *count)
    }
}

/// Recodes raw survey rows into analysis records.
#[derive(Debug, Clone)]
pub struct DataPreparer<'a> {
    codebook: &'a Codebook,
}

impl<'a> DataPreparer<'a> {
    pub fn new(codebook: &'a Codebook) -> Self {
        Self { codebook }
    }

    /// Converts one raw row. `row` is the 1-based data row number used in the error.
    pub fn prepare_record(&self, row: usize, raw: &RawRecord) -> Result<Record, MissingDataError> {
        let missing = |field| MissingDataError { row, field };
        let has_condition = recode_binary(
            raw.outcome,
            &self.codebook.outcome_positive,
            &self.codebook.outcome_negative,
        )
        .ok_or(missing(Field::Outcome))?;
        let age = finite(raw.age).ok_or(missing(Field::Age))?;
        let sex = recode_binary(raw.sex, &self.codebook.sex_male, &self.codebook.sex_female)
            .map(|male| if male { Sex::Male } else { Sex::Female })
            .ok_or(missing(Field::Sex))?;
        let bmi = finite(raw.bmi).ok_or(missing(Field::Bmi))?;
        let systolic_bp = finite(raw.systolic_bp).ok_or(missing(Field::SystolicBp))?;
        let physically_active = recode_binary(
            raw.physically_active,
            &self.codebook.active,
            &self.codebook.inactive,
        )
        .ok_or(missing(Field::PhysicallyActive))?;

        Ok(Record {
            has_condition,
            age,
            sex,
            bmi,
            systolic_bp,
            physically_active,
        })
    }

    /// Prepares every row, excluding incomplete ones.
    pub fn prepare(&self, raw: &[RawRecord]) -> (Dataset, PreparationReport) {
        let mut records = Vec::with_capacity(raw.len());
        let mut excluded = [0usize; 6];
        for (i, row) in raw.iter().enumerate() {
            match self.prepare_record(i + 1, row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::debug!("{e}");
                    excluded[e.field as usize] += 1;
                }
            }
        }

        let excluded_by_field: Vec<(Field, usize)> = Field::ALL
            .iter()
            .zip(excluded)
            .filter(|(_, count)| *count > 0)
            .map(|(&field, count)| (field, count))
            .collect();
        for (field, count) in &excluded_by_field {
            log::warn!("Excluded {count} respondents with no usable '{field}' value.");
        }

        let report = PreparationReport {
            rows_read: raw.len(),
            rows_retained: records.len(),
            excluded_by_field,
        };
        (Dataset::new(records), report)
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// `Some(true)` for a code in `yes`, `Some(false)` for a code in `no`, otherwise `None`.
fn recode_binary(value: Option<f64>, yes: &[f64], no: &[f64]) -> Option<bool> {
    let code = finite(value)?;
    if yes.contains(&code) {
        Some(true)
    } else if no.contains(&code) {
        Some(false)
    } else {
        None
    }
}

/// Cell contents treated as null on load, in addition to empty cells.
const MISSING_VALUE_MARKERS: &[&str] = &["NA", ""];

/// Reads the survey extract at `path`, keeping only the configured columns.
pub fn load_raw_records(
    path: &Path,
    columns: &ColumnNames,
    separator: u8,
    minimum_rows: usize,
) -> Result<Vec<RawRecord>, DataError> {
    println!("Loading survey data from '{}'", path.display());

    // Every column is read as text so that a missing-value marker far into the file
    // cannot contradict an inferred numeric type; the cast below decides per cell.
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .with_parse_options(
                    CsvParseOptions::default()
                        .with_separator(separator)
                        .with_null_values(Some(NullValues::AllColumns(
                            MISSING_VALUE_MARKERS.iter().map(|m| (*m).into()).collect(),
                        ))),
                ),
        )
        .finish()?;

    if df.height() < minimum_rows {
        return Err(DataError::InsufficientRows {
            found: df.height(),
            required: minimum_rows,
        });
    }

    let available: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    for name in columns.in_schema_order() {
        if !available.contains(name) {
            return Err(DataError::ColumnNotFound(name.to_string()));
        }
    }

    let df = df.select(columns.in_schema_order())?;

    let outcome = extract_optional_column(&df, &columns.outcome)?;
    let age = extract_optional_column(&df, &columns.age)?;
    let sex = extract_optional_column(&df, &columns.sex)?;
    let bmi = extract_optional_column(&df, &columns.bmi)?;
    let systolic_bp = extract_optional_column(&df, &columns.systolic_bp)?;
    let physically_active = extract_optional_column(&df, &columns.physically_active)?;

    let rows = (0..df.height())
        .map(|i| RawRecord {
            outcome: outcome[i],
            age: age[i],
            sex: sex[i],
            bmi: bmi[i],
            systolic_bp: systolic_bp[i],
            physically_active: physically_active[i],
        })
        .collect::<Vec<_>>();

    println!("Loaded {} rows with all required columns present.", rows.len());
    Ok(rows)
}

/// Casts a column to `f64`, mapping nulls and unparseable cells to `None`.
fn extract_optional_column(df: &DataFrame, column_name: &str) -> Result<Vec<Option<f64>>, DataError> {
    let column = df.column(column_name)?;
    let present = column.len() - column.null_count();
    let casted = column.cast(&DataType::Float64)?;
    if present > 0 && casted.null_count() == casted.len() {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            found_type: format!("{:?}", column.dtype()),
        });
    }
    let values = casted.f64()?.into_iter().collect();
    Ok(values)
}
