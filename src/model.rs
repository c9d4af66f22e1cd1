//! Fitted artifacts: the feature scaler and the K-Means model
//!
//! Both are read-only once loaded. The pipeline only sees them through the
//! [`FeatureScaler`] and [`ClusterModel`] traits, so other implementations can
//! be swapped in.

use crate::data::FeatureSet;
use crate::error::{SegmentError, SegmentResult};
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MODEL_FILE: &str = "kmeans_model.json";
pub const SCALER_FILE: &str = "scaler.json";

/// Maps raw feature rows to the space the model was fitted in
pub trait FeatureScaler {
    fn n_features(&self) -> usize;
    fn transform(&self, raw: ArrayView2<'_, f64>) -> SegmentResult<Array2<f64>>;
}

/// Assigns each scaled feature row to a cluster id
pub trait ClusterModel {
    fn n_features(&self) -> usize;
    fn n_clusters(&self) -> usize;
    fn predict(&self, features: ArrayView2<'_, f64>) -> SegmentResult<Array1<usize>>;
}

fn check_width(expected: usize, found: usize) -> SegmentResult<()> {
    if expected != found {
        return Err(SegmentError::DimensionMismatch { expected, found });
    }
    Ok(())
}

/// Reject NaN or infinite cells, naming the first column that has any
fn check_finite(names: &[String], values: ArrayView2<'_, f64>) -> SegmentResult<()> {
    for (idx, column) in values.axis_iter(Axis(1)).enumerate() {
        let count = column.iter().filter(|v| !v.is_finite()).count();
        if count > 0 {
            return Err(SegmentError::NonFiniteValues {
                column: names.get(idx).cloned().unwrap_or_else(|| format!("#{idx}")),
                count,
            });
        }
    }
    Ok(())
}

/// Per-column standardization: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column names the scaler was fitted on, in order
    pub features: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on raw rows. Uses the population standard deviation; constant
    /// columns get a scale of 1.0.
    pub fn fit(features: &[&str], raw: &Array2<f64>) -> SegmentResult<Self> {
        check_width(features.len(), raw.ncols())?;
        let names: Vec<String> = features.iter().map(|f| f.to_string()).collect();
        check_finite(&names, raw.view())?;
        let mean = raw.mean_axis(Axis(0)).ok_or_else(|| SegmentError::InvalidArtifact {
            name: SCALER_FILE.to_string(),
            reason: "cannot fit on an empty table".to_string(),
        })?;
        let scale = raw
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });

        Ok(Self {
            features: names,
            mean: mean.to_vec(),
            scale: scale.to_vec(),
        })
    }

    pub fn validate(&self) -> SegmentResult<()> {
        let invalid = |reason: String| SegmentError::InvalidArtifact {
            name: SCALER_FILE.to_string(),
            reason,
        };
        if self.features.is_empty() {
            return Err(invalid("no features".to_string()));
        }
        if self.mean.len() != self.features.len() || self.scale.len() != self.features.len() {
            return Err(invalid(format!(
                "{} features but {} means and {} scales",
                self.features.len(),
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(s) = self.scale.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(invalid(format!("scale must be positive, got {s}")));
        }
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn n_features(&self) -> usize {
        self.features.len()
    }

    fn transform(&self, raw: ArrayView2<'_, f64>) -> SegmentResult<Array2<f64>> {
        check_width(self.n_features(), raw.ncols())?;
        check_finite(&self.features, raw)?;
        let mean = Array1::from_vec(self.mean.clone());
        let scale = Array1::from_vec(self.scale.clone());
        Ok((&raw - &mean) / &scale)
    }
}

/// Nearest-centroid K-Means predictor
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    pub features: Vec<String>,
    /// (n_clusters, n_features), in scaled space
    pub centroids: Array2<f64>,
}

/// On-disk form of [`KMeansModel`]
#[derive(Debug, Serialize, Deserialize)]
struct KMeansFile {
    features: Vec<String>,
    centroids: Vec<Vec<f64>>,
}

impl KMeansModel {
    pub fn new(features: Vec<String>, centroids: Array2<f64>) -> SegmentResult<Self> {
        let model = Self {
            features,
            centroids,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> SegmentResult<()> {
        let invalid = |reason: String| SegmentError::InvalidArtifact {
            name: MODEL_FILE.to_string(),
            reason,
        };
        if self.centroids.nrows() == 0 {
            return Err(invalid("no centroids".to_string()));
        }
        if self.centroids.ncols() != self.features.len() {
            return Err(invalid(format!(
                "{} features but centroids have {} columns",
                self.features.len(),
                self.centroids.ncols()
            )));
        }
        if self.centroids.iter().any(|v| !v.is_finite()) {
            return Err(invalid("centroids contain non-finite values".to_string()));
        }
        Ok(())
    }

    fn nearest(&self, row: ndarray::ArrayView1<'_, f64>) -> usize {
        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance: f64 = row
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        closest_cluster
    }

    fn to_file(&self) -> KMeansFile {
        KMeansFile {
            features: self.features.clone(),
            centroids: self.centroids.outer_iter().map(|r| r.to_vec()).collect(),
        }
    }

    fn from_file(file: KMeansFile) -> SegmentResult<Self> {
        let n_clusters = file.centroids.len();
        let n_features = file.features.len();
        if file.centroids.iter().any(|row| row.len() != n_features) {
            return Err(SegmentError::InvalidArtifact {
                name: MODEL_FILE.to_string(),
                reason: format!("every centroid must have {n_features} values"),
            });
        }
        let flat: Vec<f64> = file.centroids.into_iter().flatten().collect();
        let centroids = Array2::from_shape_vec((n_clusters, n_features), flat)?;
        Self::new(file.features, centroids)
    }
}

impl ClusterModel for KMeansModel {
    fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> SegmentResult<Array1<usize>> {
        check_width(self.n_features(), features.ncols())?;
        check_finite(&self.features, features)?;
        Ok(features.outer_iter().map(|row| self.nearest(row)).collect())
    }
}

/// The scaler/model pair stored in a model directory
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub scaler: StandardScaler,
    pub model: KMeansModel,
}

impl Artifacts {
    pub fn model_path(dir: &Path) -> PathBuf {
        dir.join(MODEL_FILE)
    }

    pub fn scaler_path(dir: &Path) -> PathBuf {
        dir.join(SCALER_FILE)
    }

    /// Load both artifacts and check they agree with each other
    pub fn load<P: AsRef<Path>>(dir: P) -> SegmentResult<Self> {
        let dir = dir.as_ref();

        let scaler_path = Self::scaler_path(dir);
        tracing::info!(path = %scaler_path.display(), "Loading scaler");
        let scaler: StandardScaler = serde_json::from_str(&fs::read_to_string(&scaler_path)?)?;
        scaler.validate()?;

        let model_path = Self::model_path(dir);
        tracing::info!(path = %model_path.display(), "Loading K-Means model");
        let file: KMeansFile = serde_json::from_str(&fs::read_to_string(&model_path)?)?;
        let model = KMeansModel::from_file(file)?;

        if model.features != scaler.features {
            return Err(SegmentError::InvalidArtifact {
                name: MODEL_FILE.to_string(),
                reason: format!(
                    "model features {:?} do not match scaler features {:?}",
                    model.features, scaler.features
                ),
            });
        }

        tracing::info!(
            clusters = model.n_clusters(),
            features = ?model.features,
            "Artifacts loaded"
        );
        Ok(Self { scaler, model })
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> SegmentResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        fs::write(
            Self::scaler_path(dir),
            serde_json::to_string_pretty(&self.scaler)?,
        )?;
        fs::write(
            Self::model_path(dir),
            serde_json::to_string_pretty(&self.model.to_file())?,
        )?;
        tracing::info!(dir = %dir.display(), "Artifacts saved");
        Ok(())
    }
}

/// K-Means fitting parameters
#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    pub n_clusters: usize,
    pub max_iters: u64,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            n_clusters: 5,
            max_iters: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

/// Fit a scaler and a K-Means model on raw feature rows
///
/// # Arguments
/// * `feature_set` - Columns `raw` was built from
/// * `raw` - Unscaled features, one row per customer
/// * `params` - Cluster count and convergence settings
pub fn fit_artifacts(
    feature_set: FeatureSet,
    raw: &Array2<f64>,
    params: FitParams,
) -> SegmentResult<Artifacts> {
    if params.n_clusters == 0 {
        return Err(SegmentError::Fit("number of clusters must be positive".to_string()));
    }
    if raw.nrows() < params.n_clusters {
        return Err(SegmentError::Fit(format!(
            "number of rows ({}) must be at least the number of clusters ({})",
            raw.nrows(),
            params.n_clusters
        )));
    }

    let scaler = StandardScaler::fit(feature_set.columns(), raw)?;
    let scaled = scaler.transform(raw.view())?;

    let n_samples = scaled.nrows();
    let dataset = Dataset::new(scaled, Array1::<usize>::zeros(n_samples));
    let rng = StdRng::seed_from_u64(params.seed);

    let fitted = KMeans::params_with(params.n_clusters, rng, L2Dist)
        .max_n_iterations(params.max_iters)
        .tolerance(params.tolerance)
        .fit(&dataset)
        .map_err(|e| SegmentError::Fit(e.to_string()))?;

    let model = KMeansModel::new(scaler.features.clone(), fitted.centroids().clone())?;
    tracing::info!(
        clusters = model.n_clusters(),
        rows = n_samples,
        "K-Means model fitted"
    );

    Ok(Artifacts { scaler, model })
}
