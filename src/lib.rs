//! custseg: customer segmentation and behavior labeling
//!
//! Applies a fitted standard scaler and K-Means model to customer records
//! (gender, annual income, spending score), assigns each customer a cluster
//! and a rule-based spending behavior label, and renders the result.

pub mod behavior;
pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod viz;

// Re-export public items for easier access
pub use behavior::Behavior;
pub use cli::{Args, Command};
pub use data::{load_csv, write_csv, CustomerRecord, DatasetSummary, FeatureSet, Gender};
pub use error::{SegmentError, SegmentResult};
pub use model::{
    fit_artifacts, Artifacts, ClusterModel, FeatureScaler, FitParams, KMeansModel, StandardScaler,
};
pub use pipeline::{
    behavior_counts, filter_by_behavior, label_behaviors, Prediction, SegmentationPipeline,
};
pub use viz::{generate_visualization_report, try_visualize};

/// Common result type used by the command-line surface
pub type Result<T> = anyhow::Result<T>;
