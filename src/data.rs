//! Customer table loading, feature extraction and dataset summaries using Polars

use crate::behavior::Behavior;
use crate::error::{SegmentError, SegmentResult};
use ndarray::Array2;
use polars::prelude::*;
use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

pub const GENDER: &str = "Gender";
pub const ANNUAL_INCOME: &str = "Annual Income (k$)";
pub const SPENDING_SCORE: &str = "Spending Score (1-100)";
pub const CLUSTER: &str = "Cluster";
pub const BEHAVIOR: &str = "Behavior";

/// Input bounds accepted for a single customer
pub const INCOME_RANGE: (f64, f64) = (0.0, 150.0);
pub const SPENDING_RANGE: (f64, f64) = (0.0, 100.0);

/// Customer gender as fed to the model (Male = 1, Female = 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn encode(self) -> f64 {
        match self {
            Gender::Male => 1.0,
            Gender::Female => 0.0,
        }
    }
}

impl FromStr for Gender {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(SegmentError::UnknownGender(s.to_string())),
        }
    }
}

/// Which input columns feed the scaler and the model.
///
/// The two sets are incompatible with each other's artifacts: a scaler fitted
/// on three columns cannot transform two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FeatureSet {
    /// Gender (1/0), annual income, spending score
    #[default]
    GenderIncomeSpending,
    /// Annual income, spending score
    IncomeSpending,
}

impl FeatureSet {
    /// Column names in model order
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            FeatureSet::GenderIncomeSpending => &[GENDER, ANNUAL_INCOME, SPENDING_SCORE],
            FeatureSet::IncomeSpending => &[ANNUAL_INCOME, SPENDING_SCORE],
        }
    }

    pub fn n_features(self) -> usize {
        self.columns().len()
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.columns().join(", "))
    }
}

/// A single customer entered by hand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomerRecord {
    pub gender: Gender,
    /// Annual income in thousands
    pub annual_income: f64,
    /// Spending score, 1-100
    pub spending_score: f64,
}

impl CustomerRecord {
    pub fn new(gender: Gender, annual_income: f64, spending_score: f64) -> SegmentResult<Self> {
        check_range("annual income", annual_income, INCOME_RANGE)?;
        check_range("spending score", spending_score, SPENDING_RANGE)?;
        Ok(Self {
            gender,
            annual_income,
            spending_score,
        })
    }

    /// Raw (unscaled) feature vector for the given feature set
    pub fn features(&self, feature_set: FeatureSet) -> Vec<f64> {
        match feature_set {
            FeatureSet::GenderIncomeSpending => vec![
                self.gender.encode(),
                self.annual_income,
                self.spending_score,
            ],
            FeatureSet::IncomeSpending => vec![self.annual_income, self.spending_score],
        }
    }

    pub fn behavior(&self) -> Behavior {
        Behavior::classify(self.annual_income, self.spending_score)
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> SegmentResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(SegmentError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Load a customer CSV with a header row
pub fn load_csv<P: AsRef<Path>>(path: P) -> SegmentResult<DataFrame> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    tracing::debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
    Ok(df)
}

/// Parse customer CSV content already held in memory
pub fn parse_csv(content: &[u8]) -> SegmentResult<DataFrame> {
    let df = CsvReader::new(Cursor::new(content.to_vec())).finish()?;
    Ok(df)
}

/// Write a table as CSV with a header row
pub fn write_csv<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> SegmentResult<()> {
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}

fn required<'a>(df: &'a DataFrame, name: &str) -> SegmentResult<&'a Series> {
    df.column(name)
        .map_err(|_| SegmentError::MissingColumn(name.to_string()))
}

/// Read a column as f64, failing on any null, non-numeric or non-finite entry
pub fn numeric_column(df: &DataFrame, name: &str) -> SegmentResult<Vec<f64>> {
    let series = required(df, name)?;
    let values = series.cast(&DataType::Float64)?;
    let missing = values.null_count();
    if missing > 0 {
        return Err(SegmentError::MissingValues {
            column: name.to_string(),
            count: missing,
        });
    }

    let values: Vec<f64> = values.f64()?.into_no_null_iter().collect();
    let non_finite = values.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        return Err(SegmentError::NonFiniteValues {
            column: name.to_string(),
            count: non_finite,
        });
    }
    Ok(values)
}

/// Read the gender column as the 1/0 model encoding
pub fn gender_column(df: &DataFrame) -> SegmentResult<Vec<f64>> {
    let series = required(df, GENDER)?;
    if series.null_count() > 0 {
        return Err(SegmentError::MissingValues {
            column: GENDER.to_string(),
            count: series.null_count(),
        });
    }

    if series.dtype() == &DataType::String {
        series
            .str()?
            .into_no_null_iter()
            .map(|value| value.parse::<Gender>().map(Gender::encode))
            .collect()
    } else {
        // Already encoded upstream; only 1 and 0 are meaningful
        numeric_column(df, GENDER)?
            .into_iter()
            .map(|value| match value {
                v if v == 1.0 || v == 0.0 => Ok(v),
                v => Err(SegmentError::UnknownGender(v.to_string())),
            })
            .collect()
    }
}

/// Build the raw (n_rows, n_features) matrix for a feature set.
///
/// Every required column must be present and complete; there is no partial
/// result.
pub fn feature_matrix(df: &DataFrame, feature_set: FeatureSet) -> SegmentResult<Array2<f64>> {
    let columns = feature_set
        .columns()
        .iter()
        .map(|&name| {
            if name == GENDER {
                gender_column(df)
            } else {
                numeric_column(df, name)
            }
        })
        .collect::<SegmentResult<Vec<_>>>()?;

    let n_rows = df.height();
    let n_cols = columns.len();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(row, col)| {
        columns[col][row]
    }))
}

/// Descriptive statistics for one numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnStats {
    /// Compute statistics over the non-null values of a column.
    ///
    /// Uses the sample standard deviation and linearly interpolated quantiles.
    pub fn from_values(name: &str, values: &[f64]) -> Self {
        let count = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = if count == 0 {
            f64::NAN
        } else {
            sorted.iter().sum::<f64>() / count as f64
        };
        let std = if count < 2 {
            f64::NAN
        } else {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        };

        Self {
            name: name.to_string(),
            count,
            mean,
            std,
            min: quantile(&sorted, 0.0),
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: quantile(&sorted, 1.0),
        }
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Overview of an uploaded dataset
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub rows: usize,
    pub preview: DataFrame,
    pub stats: Vec<ColumnStats>,
    pub missing: Vec<(String, usize)>,
}

impl DatasetSummary {
    pub fn compute(df: &DataFrame, preview_rows: usize) -> SegmentResult<Self> {
        let mut stats = Vec::new();
        let mut missing = Vec::new();

        for series in df.get_columns() {
            missing.push((series.name().to_string(), series.null_count()));

            if series.dtype().is_numeric() {
                let values: Vec<f64> = series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .flatten()
                    .collect();
                stats.push(ColumnStats::from_values(series.name(), &values));
            }
        }

        Ok(Self {
            rows: df.height(),
            preview: df.head(Some(preview_rows)),
            stats,
            missing,
        })
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Preview of Dataset:")?;
        writeln!(f, "{}", self.preview)?;

        writeln!(f, "\nDataset Description ({} rows):", self.rows)?;
        writeln!(
            f,
            "  {:<24} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for s in &self.stats {
            writeln!(
                f,
                "  {:<24} {:>6} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
                s.name, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
            )?;
        }

        writeln!(f, "\nMissing Values:")?;
        for (name, count) in &self.missing {
            writeln!(f, "  {:<24} {}", name, count)?;
        }
        Ok(())
    }
}
