//! Command-line interface definitions and argument parsing

use crate::data::{FeatureSet, Gender};
use crate::model::FitParams;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Customer segmentation using a fitted scaler and K-Means model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding kmeans_model.json and scaler.json
    #[arg(short, long, global = true, env = "CUSTSEG_MODEL_DIR", default_value = "model")]
    pub model_dir: PathBuf,

    /// Columns fed to the scaler and model
    #[arg(
        short,
        long,
        global = true,
        env = "CUSTSEG_FEATURES",
        value_enum,
        default_value_t = FeatureSet::GenderIncomeSpending
    )]
    pub features: FeatureSet,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Preview, describe and count missing values of a dataset
    Summary {
        /// Path to the input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Number of preview rows
        #[arg(long, default_value = "5")]
        rows: usize,

        /// Render a cluster plot if the dataset carries a Cluster column
        #[arg(short, long)]
        plot: Option<PathBuf>,
    },

    /// Show customers with a given behavior label
    Filter {
        /// Path to the input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Behavior label, e.g. "High Income, Low Spending". Lists labels when omitted
        #[arg(short, long)]
        behavior: Option<String>,

        /// Write the matching rows to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict the cluster of a single customer
    Predict {
        #[arg(short, long, value_enum, ignore_case = true, default_value_t = Gender::Male)]
        gender: Gender,

        /// Annual income in k$ (0-150)
        #[arg(short, long, default_value = "50")]
        income: f64,

        /// Spending score (0-100)
        #[arg(short, long, default_value = "50")]
        spending: f64,
    },

    /// Predict clusters for every row of a CSV file
    PredictCsv {
        /// Path to the input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the predictions
        #[arg(short, long, default_value = "customer_predictions.csv")]
        output: PathBuf,

        /// Output path for the visualization plot
        #[arg(short, long, default_value = "cluster_plot.png")]
        plot: PathBuf,

        /// Skip the visualization
        #[arg(long)]
        no_plot: bool,
    },

    /// Fit a scaler and K-Means model and write them to the model directory
    Fit {
        /// Path to the training CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Number of clusters for K-Means
        #[arg(short = 'k', long, default_value = "5")]
        clusters: usize,

        /// Maximum iterations for K-Means algorithm
        #[arg(long, default_value = "300")]
        max_iters: u64,

        /// Tolerance for K-Means convergence
        #[arg(long, default_value = "1e-4")]
        tolerance: f64,

        /// Seed for centroid initialization
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

impl Command {
    /// K-Means parameters for the `fit` command
    pub fn fit_params(&self) -> Option<FitParams> {
        match *self {
            Command::Fit {
                clusters,
                max_iters,
                tolerance,
                seed,
                ..
            } => Some(FitParams {
                n_clusters: clusters,
                max_iters,
                tolerance,
                seed,
            }),
            _ => None,
        }
    }
}
