//! custseg: customer segmentation CLI
//!
//! Entrypoint that loads the fitted artifacts once and dispatches to the
//! summary, filtering, prediction and fitting commands.

use anyhow::{Context, Result};
use clap::Parser;
use custseg::{
    behavior_counts, data, filter_by_behavior, fit_artifacts, label_behaviors, load_csv,
    try_visualize, write_csv, Args, Artifacts, Behavior, Command, CustomerRecord, DatasetSummary,
    FeatureSet, Gender, KMeansModel, SegmentationPipeline, StandardScaler,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type Pipeline = SegmentationPipeline<KMeansModel, StandardScaler>;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose)?;

    debug!(model_dir = %args.model_dir.display(), features = %args.features, "Starting");

    match &args.command {
        Command::Summary { input, rows, plot } => run_summary(input, *rows, plot.as_deref()),
        Command::Filter {
            input,
            behavior,
            output,
        } => run_filter(input, behavior.as_deref(), output.as_deref()),
        Command::Predict {
            gender,
            income,
            spending,
        } => run_prediction_mode(&args, *gender, *income, *spending),
        Command::PredictCsv {
            input,
            output,
            plot,
            no_plot,
        } => {
            let plot = (!*no_plot).then_some(plot.as_path());
            run_batch_prediction(&args, input, output, plot)
        }
        Command::Fit { input, .. } => run_fit(&args, input),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "custseg=debug" } else { "custseg=warn" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Load the artifacts from the model directory and wire up the pipeline
fn load_pipeline(model_dir: &Path, features: FeatureSet) -> Result<Pipeline> {
    let artifacts = Artifacts::load(model_dir).with_context(|| {
        format!(
            "Failed to load model artifacts from {} (run `custseg fit` to create them)",
            model_dir.display()
        )
    })?;

    let pipeline = SegmentationPipeline::new(features, artifacts.model, artifacts.scaler)
        .with_context(|| {
            format!(
                "Artifacts in {} do not match the feature set [{}]",
                model_dir.display(),
                features
            )
        })?;

    info!(
        clusters = pipeline.n_clusters(),
        features = %pipeline.feature_set(),
        "Loaded model from {}",
        model_dir.display()
    );
    Ok(pipeline)
}

/// Dataset preview, description and missing values
fn run_summary(input: &Path, rows: usize, plot: Option<&Path>) -> Result<()> {
    println!("=== Dataset Summary ===\n");

    let df = load_csv(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let summary = DatasetSummary::compute(&df, rows)?;
    println!("{summary}");

    if let Some(plot) = plot {
        try_visualize(&df, plot);
    }

    Ok(())
}

/// Filter customers by behavior label
fn run_filter(input: &Path, behavior: Option<&str>, output: Option<&Path>) -> Result<()> {
    println!("=== Filter Customers by Behavior Type ===\n");

    let mut df = load_csv(input).with_context(|| format!("Failed to read {}", input.display()))?;
    if !data::has_column(&df, data::BEHAVIOR) {
        debug!("Input has no Behavior column, labeling rows");
        df = label_behaviors(&df)?;
    }

    let Some(label) = behavior else {
        println!("Behavior types present:");
        for (behavior, count) in behavior_counts(&df)? {
            println!("  {behavior}: {count} customers");
        }
        return Ok(());
    };

    let behavior: Behavior = label.parse()?;
    let mut filtered = filter_by_behavior(&df, behavior)?;
    println!("{} customers with behavior '{}':", filtered.height(), behavior);
    println!("{filtered}");

    if let Some(output) = output {
        write_csv(&mut filtered, output)?;
        println!("\nFiltered rows saved to: {}", output.display());
    }

    Ok(())
}

/// Run prediction mode for a single customer
fn run_prediction_mode(args: &Args, gender: Gender, income: f64, spending: f64) -> Result<()> {
    println!("=== Predict Single Customer Cluster ===");
    println!(
        "Input: gender={:?}, annual income={}k$, spending score={}",
        gender, income, spending
    );

    let record = CustomerRecord::new(gender, income, spending)?;
    let pipeline = load_pipeline(&args.model_dir, args.features)?;

    let prediction = pipeline.predict_one(&record)?;
    println!("\n✓ {prediction}");

    Ok(())
}

/// Predict clusters for a whole CSV file
fn run_batch_prediction(
    args: &Args,
    input: &Path,
    output: &Path,
    plot: Option<&Path>,
) -> Result<()> {
    println!("=== Predict Customer Clusters from File ===\n");

    let start_time = Instant::now();
    let pipeline = load_pipeline(&args.model_dir, args.features)?;

    let df = load_csv(input).with_context(|| format!("Failed to read {}", input.display()))?;
    println!("✓ Data loaded: {} customers", df.height());

    let mut predicted = pipeline
        .predict_table(&df)
        .with_context(|| format!("Failed to predict clusters for {}", input.display()))?;

    println!("\nPredicted Dataset:");
    println!("{predicted}");

    write_csv(&mut predicted, output)?;
    println!("\nPredictions saved to: {}", output.display());

    if let Some(plot) = plot {
        try_visualize(&predicted, plot);
    }

    info!(elapsed_ms = start_time.elapsed().as_millis() as u64, "Batch prediction complete");
    Ok(())
}

/// Fit the scaler and model on a training file and save them
fn run_fit(args: &Args, input: &Path) -> Result<()> {
    println!("=== Fit Scaler and K-Means Model ===\n");

    let params = args
        .command
        .fit_params()
        .context("fit parameters are only available for the fit command")?;

    let start_time = Instant::now();
    let df = load_csv(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let raw = data::feature_matrix(&df, args.features)?;
    println!("✓ Data loaded: {} customers, features [{}]", raw.nrows(), args.features);

    let artifacts = fit_artifacts(args.features, &raw, params)?;
    artifacts.save(&args.model_dir)?;

    let model_path: PathBuf = Artifacts::model_path(&args.model_dir);
    println!("✓ Model fitted with {} clusters", params.n_clusters);
    println!("  Model saved to: {}", model_path.display());
    println!("  Scaler saved to: {}", Artifacts::scaler_path(&args.model_dir).display());
    println!("  Fitting time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}
