//! Integration tests for custseg

use custseg::data::{feature_matrix, BEHAVIOR, CLUSTER};
use custseg::{
    filter_by_behavior, fit_artifacts, label_behaviors, load_csv, write_csv, Artifacts, Behavior,
    CustomerRecord, FeatureSet, FitParams, Gender, SegmentError, SegmentationPipeline,
};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Create a test CSV file with two well separated customer groups
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "CustomerID,Gender,Age,Annual Income (k$),Spending Score (1-100)"
    )
    .unwrap();

    // Low income, high spending
    writeln!(file, "1,Male,19,15,81").unwrap();
    writeln!(file, "2,Female,21,16,77").unwrap();
    writeln!(file, "3,Female,20,17,90").unwrap();
    writeln!(file, "4,Male,23,18,85").unwrap();

    // High income, low spending
    writeln!(file, "5,Female,45,95,10").unwrap();
    writeln!(file, "6,Male,52,98,12").unwrap();
    writeln!(file, "7,Male,40,101,8").unwrap();
    writeln!(file, "8,Female,48,103,15").unwrap();

    file
}

fn fitted_pipeline(
    feature_set: FeatureSet,
) -> SegmentationPipeline<custseg::KMeansModel, custseg::StandardScaler> {
    let test_file = create_test_csv();
    let df = load_csv(test_file.path()).unwrap();
    let raw = feature_matrix(&df, feature_set).unwrap();
    let params = FitParams {
        n_clusters: 2,
        ..FitParams::default()
    };
    let artifacts = fit_artifacts(feature_set, &raw, params).unwrap();

    let dir = tempdir().unwrap();
    artifacts.save(dir.path()).unwrap();
    let loaded = Artifacts::load(dir.path()).unwrap();

    SegmentationPipeline::new(feature_set, loaded.model, loaded.scaler).unwrap()
}

#[test]
fn test_end_to_end_batch_prediction() {
    let pipeline = fitted_pipeline(FeatureSet::IncomeSpending);
    let test_file = create_test_csv();
    let df = load_csv(test_file.path()).unwrap();

    let mut predicted = pipeline.predict_table(&df).unwrap();
    assert_eq!(predicted.height(), 8);

    let clusters: Vec<u32> = predicted
        .column(CLUSTER)
        .unwrap()
        .u32()
        .unwrap()
        .into_no_null_iter()
        .collect();

    // Each group lands in one cluster, and the groups differ
    assert!(clusters[..4].iter().all(|&c| c == clusters[0]));
    assert!(clusters[4..].iter().all(|&c| c == clusters[4]));
    assert_ne!(clusters[0], clusters[4]);

    // Written CSV keeps the original columns plus Cluster and Behavior
    let out_dir = tempdir().unwrap();
    let out_path = out_dir.path().join("customer_predictions.csv");
    write_csv(&mut predicted, &out_path).unwrap();

    let reloaded = load_csv(&out_path).unwrap();
    assert_eq!(reloaded.height(), 8);
    assert_eq!(reloaded.width(), df.width() + 2);
    assert!(reloaded.column(BEHAVIOR).is_ok());
}

#[test]
fn test_single_prediction_agrees_with_batch() {
    let pipeline = fitted_pipeline(FeatureSet::GenderIncomeSpending);
    let test_file = create_test_csv();
    let df = load_csv(test_file.path()).unwrap();
    let predicted = pipeline.predict_table(&df).unwrap();

    let clusters: Vec<u32> = predicted
        .column(CLUSTER)
        .unwrap()
        .u32()
        .unwrap()
        .into_no_null_iter()
        .collect();

    let record = CustomerRecord::new(Gender::Male, 15.0, 81.0).unwrap();
    let first = pipeline.predict_one(&record).unwrap();
    assert_eq!(first.cluster as u32, clusters[0]);
    assert_eq!(first.behavior, Behavior::LowIncomeHighSpending);

    let record = CustomerRecord::new(Gender::Male, 98.0, 12.0).unwrap();
    let sixth = pipeline.predict_one(&record).unwrap();
    assert_eq!(sixth.cluster as u32, clusters[5]);
    assert_eq!(sixth.behavior, Behavior::HighIncomeLowSpending);
}

#[test]
fn test_behavior_column_matches_classifier_row_by_row() {
    let pipeline = fitted_pipeline(FeatureSet::IncomeSpending);
    let test_file = create_test_csv();
    let df = load_csv(test_file.path()).unwrap();
    let predicted = pipeline.predict_table(&df).unwrap();

    let labels: Vec<&str> = predicted
        .column(BEHAVIOR)
        .unwrap()
        .str()
        .unwrap()
        .into_no_null_iter()
        .collect();
    let income = custseg::data::numeric_column(&df, custseg::data::ANNUAL_INCOME).unwrap();
    let spending = custseg::data::numeric_column(&df, custseg::data::SPENDING_SCORE).unwrap();

    for ((label, i), s) in labels.iter().zip(income).zip(spending) {
        assert_eq!(*label, Behavior::classify(i, s).as_str());
    }
}

#[test]
fn test_feature_set_mismatch_is_rejected() {
    let test_file = create_test_csv();
    let df = load_csv(test_file.path()).unwrap();
    let raw = feature_matrix(&df, FeatureSet::IncomeSpending).unwrap();
    let artifacts = fit_artifacts(
        FeatureSet::IncomeSpending,
        &raw,
        FitParams {
            n_clusters: 2,
            ..FitParams::default()
        },
    )
    .unwrap();

    let result = SegmentationPipeline::new(
        FeatureSet::GenderIncomeSpending,
        artifacts.model,
        artifacts.scaler,
    );
    assert!(matches!(
        result,
        Err(SegmentError::DimensionMismatch { expected: 3, found: 2 })
    ));
}

#[test]
fn test_missing_gender_column_fails_whole_batch() {
    let pipeline = fitted_pipeline(FeatureSet::GenderIncomeSpending);

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Annual Income (k$),Spending Score (1-100)").unwrap();
    writeln!(file, "15,81").unwrap();
    let df = load_csv(file.path()).unwrap();

    assert!(matches!(
        pipeline.predict_table(&df),
        Err(SegmentError::MissingColumn(ref c)) if c == "Gender"
    ));
}

#[test]
fn test_filtering_flow() {
    let test_file = create_test_csv();
    let df = load_csv(test_file.path()).unwrap();

    assert!(matches!(
        filter_by_behavior(&df, Behavior::LowIncomeHighSpending),
        Err(SegmentError::MissingBehaviorColumn)
    ));

    let labeled = label_behaviors(&df).unwrap();
    let low_high = filter_by_behavior(&labeled, Behavior::LowIncomeHighSpending).unwrap();
    let high_low = filter_by_behavior(&labeled, Behavior::HighIncomeLowSpending).unwrap();
    let high_high = filter_by_behavior(&labeled, Behavior::HighIncomeHighSpending).unwrap();

    assert_eq!(low_high.height(), 4);
    assert_eq!(high_low.height(), 4);
    assert_eq!(high_high.height(), 0);
}

#[test]
fn test_load_missing_artifacts_fails() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        Artifacts::load(dir.path()),
        Err(SegmentError::Io(_))
    ));
}
