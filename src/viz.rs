//! Visualization functions using Plotters for cluster analysis

use crate::data::{numeric_column, ANNUAL_INCOME, CLUSTER, SPENDING_SCORE};
use crate::error::{SegmentError, SegmentResult};
use plotters::prelude::*;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};

/// Color palette for different clusters
static CLUSTER_COLORS: [RGBColor; 8] = [
    RGBColor(68, 1, 84),
    RGBColor(59, 82, 139),
    RGBColor(33, 145, 140),
    RGBColor(94, 201, 98),
    RGBColor(253, 231, 37),
    RED,
    BLUE,
    MAGENTA,
];

fn cluster_color(cluster: usize) -> &'static RGBColor {
    CLUSTER_COLORS.get(cluster).unwrap_or(&BLACK)
}

/// Cluster ids at or above this are refused rather than plotted
pub const MAX_PLOT_CLUSTERS: usize = 256;

fn cluster_id(value: f64) -> SegmentResult<usize> {
    if value < 0.0 || value.fract() != 0.0 || value >= MAX_PLOT_CLUSTERS as f64 {
        return Err(SegmentError::InvalidCluster(value));
    }
    Ok(value as usize)
}

/// Income/spending points with their cluster ids, taken from a predicted table
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPoints {
    pub income: Vec<f64>,
    pub spending: Vec<f64>,
    pub clusters: Vec<usize>,
}

impl ClusterPoints {
    /// Requires `Annual Income (k$)`, `Spending Score (1-100)` and `Cluster`
    pub fn from_table(df: &DataFrame) -> SegmentResult<Self> {
        Ok(Self {
            income: numeric_column(df, ANNUAL_INCOME)?,
            spending: numeric_column(df, SPENDING_SCORE)?,
            clusters: numeric_column(df, CLUSTER)?
                .into_iter()
                .map(cluster_id)
                .collect::<SegmentResult<_>>()?,
        })
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters.iter().map(|&c| c + 1).max().unwrap_or(0)
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters()];
        for &c in &self.clusters {
            sizes[c] += 1;
        }
        sizes
    }

    fn bounds(values: &[f64]) -> (f64, f64) {
        let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        if min.is_finite() && max.is_finite() {
            (min.min(0.0), max + 10.0)
        } else {
            (0.0, 100.0)
        }
    }
}

/// Scatter plot of income vs spending, colored by cluster
pub fn create_cluster_visualization(points: &ClusterPoints, output_path: &Path) -> crate::Result<()> {
    let (x_min, x_max) = ClusterPoints::bounds(&points.income);
    let (y_min, y_max) = ClusterPoints::bounds(&points.spending);

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customer Segments Visualization", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(ANNUAL_INCOME)
        .y_desc(SPENDING_SCORE)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for cluster in 0..points.n_clusters() {
        let color = cluster_color(cluster);
        let series = points
            .income
            .iter()
            .zip(&points.spending)
            .zip(&points.clusters)
            .filter(|(_, c)| **c == cluster)
            .map(|((&x, &y), _)| Circle::new((x, y), 4, color.mix(0.7).filled()));

        chart
            .draw_series(series)?
            .label(format!("Cluster {}", cluster))
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    tracing::info!(path = %output_path.display(), "Cluster visualization saved");

    Ok(())
}

/// Bar chart of customers per cluster
pub fn create_cluster_size_chart(points: &ClusterPoints, output_path: &Path) -> crate::Result<()> {
    let cluster_sizes = points.cluster_sizes();
    let max_size = cluster_sizes.iter().copied().max().unwrap_or(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cluster Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(cluster_sizes.len() as f64 - 0.5), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Cluster")
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(cluster_sizes.iter().enumerate().map(|(cluster, &size)| {
        Rectangle::new(
            [(cluster as f64 - 0.4, 0.0), (cluster as f64 + 0.4, size as f64)],
            cluster_color(cluster).filled(),
        )
    }))?;

    root.present()?;
    tracing::info!(path = %output_path.display(), "Cluster size chart saved");

    Ok(())
}

/// Path of the size chart that accompanies a scatter plot: `plot.png` -> `plot_sizes.png`
pub fn sizes_chart_path(plot_path: &Path) -> PathBuf {
    let stem = plot_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cluster_plot".to_string());
    plot_path.with_file_name(format!("{stem}_sizes.png"))
}

/// Render the scatter plot and the size chart for a predicted table
pub fn generate_visualization_report(df: &DataFrame, plot_path: &Path) -> crate::Result<PathBuf> {
    let points = ClusterPoints::from_table(df)?;
    create_cluster_visualization(&points, plot_path)?;

    let sizes_path = sizes_chart_path(plot_path);
    create_cluster_size_chart(&points, &sizes_path)?;

    Ok(sizes_path)
}

/// Like [`generate_visualization_report`], but a failure only logs a warning.
///
/// Returns whether the plots were written.
pub fn try_visualize(df: &DataFrame, plot_path: &Path) -> bool {
    match generate_visualization_report(df, plot_path) {
        Ok(sizes_path) => {
            println!("Cluster plot saved to: {}", plot_path.display());
            println!("Cluster sizes saved to: {}", sizes_path.display());
            true
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Visualization could not be generated. Ensure '{}', '{}' and '{}' columns exist.",
                ANNUAL_INCOME,
                SPENDING_SCORE,
                CLUSTER
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_csv;
    use tempfile::tempdir;

    #[test]
    fn test_points_from_table() {
        let df = parse_csv(
            b"Annual Income (k$),Spending Score (1-100),Cluster\n15,39,0\n16,81,2\n70,40,2\n",
        )
        .unwrap();
        let points = ClusterPoints::from_table(&df).unwrap();
        assert_eq!(points.income, vec![15.0, 16.0, 70.0]);
        assert_eq!(points.clusters, vec![0, 2, 2]);
        assert_eq!(points.n_clusters(), 3);
        assert_eq!(points.cluster_sizes(), vec![1, 0, 2]);
    }

    #[test]
    fn test_points_need_cluster_column() {
        let df = parse_csv(b"Annual Income (k$),Spending Score (1-100)\n15,39\n").unwrap();
        assert!(ClusterPoints::from_table(&df).is_err());
    }

    #[test]
    fn test_try_visualize_without_clusters_is_non_fatal() {
        let df = parse_csv(b"Annual Income (k$),Spending Score (1-100)\n15,39\n").unwrap();
        let dir = tempdir().unwrap();
        let plot = dir.path().join("plot.png");
        assert!(!try_visualize(&df, &plot));
        assert!(!plot.exists());
    }

    #[test]
    fn test_points_reject_bad_cluster_ids() {
        for bad in ["-1", "1.5", "1e15", "256"] {
            let csv = format!(
                "Annual Income (k$),Spending Score (1-100),Cluster\n15,39,0\n16,81,{bad}\n"
            );
            let df = parse_csv(csv.as_bytes()).unwrap();
            assert!(
                matches!(
                    ClusterPoints::from_table(&df),
                    Err(SegmentError::InvalidCluster(_))
                ),
                "cluster id {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_try_visualize_with_bad_cluster_ids_is_non_fatal() {
        let dir = tempdir().unwrap();
        for bad in ["-1", "1e15"] {
            let csv = format!("Annual Income (k$),Spending Score (1-100),Cluster\n15,39,{bad}\n");
            let df = parse_csv(csv.as_bytes()).unwrap();
            let plot = dir.path().join("plot.png");
            assert!(!try_visualize(&df, &plot));
            assert!(!plot.exists());
        }
    }

    #[test]
    fn test_sizes_chart_path() {
        assert_eq!(
            sizes_chart_path(Path::new("out/cluster_plot.png")),
            PathBuf::from("out/cluster_plot_sizes.png")
        );
    }

    #[test]
    fn test_bounds() {
        assert_eq!(ClusterPoints::bounds(&[15.0, 120.0]), (0.0, 130.0));
        assert_eq!(ClusterPoints::bounds(&[]), (0.0, 100.0));
    }
}
