//! Scaler → model → behavior labeling over single customers and whole tables

use crate::behavior::Behavior;
use crate::data::{
    feature_matrix, has_column, numeric_column, CustomerRecord, FeatureSet, ANNUAL_INCOME,
    BEHAVIOR, CLUSTER, SPENDING_SCORE,
};
use crate::error::{SegmentError, SegmentResult};
use crate::model::{ClusterModel, FeatureScaler};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

/// Cluster and behavior for one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub cluster: usize,
    pub behavior: Behavior,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicted Cluster: {} ({})", self.cluster, self.behavior)
    }
}

/// Applies a fitted scaler and model to customer data.
///
/// The scaler and model are handed in at construction and never mutated.
#[derive(Debug)]
pub struct SegmentationPipeline<M, S> {
    feature_set: FeatureSet,
    model: M,
    scaler: S,
}

impl<M: ClusterModel, S: FeatureScaler> SegmentationPipeline<M, S> {
    /// Build a pipeline, checking both artifacts match the feature set width
    pub fn new(feature_set: FeatureSet, model: M, scaler: S) -> SegmentResult<Self> {
        let expected = feature_set.n_features();
        for found in [scaler.n_features(), model.n_features()] {
            if found != expected {
                return Err(SegmentError::DimensionMismatch { expected, found });
            }
        }

        tracing::debug!(
            features = %feature_set,
            clusters = model.n_clusters(),
            "Segmentation pipeline ready"
        );
        Ok(Self {
            feature_set,
            model,
            scaler,
        })
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.feature_set
    }

    pub fn n_clusters(&self) -> usize {
        self.model.n_clusters()
    }

    /// Predict the cluster and behavior of one customer
    pub fn predict_one(&self, record: &CustomerRecord) -> SegmentResult<Prediction> {
        let raw = Array2::from_shape_vec(
            (1, self.feature_set.n_features()),
            record.features(self.feature_set),
        )?;
        let clusters = self.predict_raw(&raw)?;

        Ok(Prediction {
            cluster: clusters[0],
            behavior: record.behavior(),
        })
    }

    /// Cluster ids for raw feature rows, in row order
    pub fn predict_raw(&self, raw: &Array2<f64>) -> SegmentResult<Vec<usize>> {
        let scaled = self.scaler.transform(raw.view())?;
        Ok(self.model.predict(scaled.view())?.to_vec())
    }

    /// Append `Cluster` and `Behavior` columns to a customer table.
    ///
    /// Fails as a whole if any required column is missing or incomplete.
    /// Existing `Cluster`/`Behavior` columns are replaced.
    pub fn predict_table(&self, df: &DataFrame) -> SegmentResult<DataFrame> {
        let raw = feature_matrix(df, self.feature_set)?;
        let clusters: Vec<u32> = self
            .predict_raw(&raw)?
            .into_iter()
            .map(|c| c as u32)
            .collect();
        let behaviors = behavior_labels(df)?;

        let mut out = df.clone();
        out.with_column(Series::new(CLUSTER, clusters))?;
        out.with_column(behavior_series(&behaviors))?;

        tracing::info!(rows = out.height(), "Predicted clusters for table");
        Ok(out)
    }
}

/// Behavior of every row, from the income and spending columns
pub fn behavior_labels(df: &DataFrame) -> SegmentResult<Vec<Behavior>> {
    let income = numeric_column(df, ANNUAL_INCOME)?;
    let spending = numeric_column(df, SPENDING_SCORE)?;
    Ok(income
        .into_iter()
        .zip(spending)
        .map(|(i, s)| Behavior::classify(i, s))
        .collect())
}

fn behavior_series(behaviors: &[Behavior]) -> Series {
    let labels: Vec<&str> = behaviors.iter().map(Behavior::as_str).collect();
    Series::new(BEHAVIOR, labels)
}

/// Append a `Behavior` column without running the model
pub fn label_behaviors(df: &DataFrame) -> SegmentResult<DataFrame> {
    let behaviors = behavior_labels(df)?;
    let mut out = df.clone();
    out.with_column(behavior_series(&behaviors))?;
    Ok(out)
}

/// Rows whose `Behavior` column equals `behavior`.
///
/// The column has to exist already; see [`label_behaviors`].
pub fn filter_by_behavior(df: &DataFrame, behavior: Behavior) -> SegmentResult<DataFrame> {
    if !has_column(df, BEHAVIOR) {
        return Err(SegmentError::MissingBehaviorColumn);
    }

    let filtered = df
        .clone()
        .lazy()
        .filter(col(BEHAVIOR).eq(lit(behavior.as_str())))
        .collect()?;

    tracing::debug!(behavior = %behavior, rows = filtered.height(), "Filtered by behavior");
    Ok(filtered)
}

/// Labels present in the `Behavior` column with their row counts
pub fn behavior_counts(df: &DataFrame) -> SegmentResult<BTreeMap<Behavior, usize>> {
    if !has_column(df, BEHAVIOR) {
        return Err(SegmentError::MissingBehaviorColumn);
    }

    let mut counts = BTreeMap::new();
    for label in df.column(BEHAVIOR)?.str()?.into_iter().flatten() {
        *counts.entry(label.parse::<Behavior>()?).or_insert(0) += 1;
    }
    Ok(counts)
}
