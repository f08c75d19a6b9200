//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::data::{parse_timestamp, ReportFilter};
use crate::error::AnalysisError;
use crate::pipeline::AnalysisConfig;

/// Account usage segmentation CLI using K-Means clustering on report submissions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "reports.csv")]
    pub input: String,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long, default_value = "3")]
    pub clusters: usize,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "1000")]
    pub max_iters: usize,

    /// Tolerance for K-Means convergence (max centroid movement)
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Score difference under which two clusters count as tied
    #[arg(long, default_value = "0.001")]
    pub tie_epsilon: f64,

    /// Assumed upper bound for each raw feature before normalization
    #[arg(long, default_value = "100.0")]
    pub ceiling: f64,

    /// Seed for centroid initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Only analyze reports created on or after this date
    #[arg(long)]
    pub start_date: Option<String>,

    /// Only analyze reports created on or before this date
    #[arg(long)]
    pub end_date: Option<String>,

    /// Only analyze reports whose identifier contains this text (case-insensitive)
    #[arg(long)]
    pub report_id: Option<String>,

    /// Print the analysis result as JSON instead of a text summary
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            clusters: self.clusters,
            max_iterations: self.max_iters,
            tolerance: self.tolerance,
            tie_epsilon: self.tie_epsilon,
            normalization_ceiling: self.ceiling,
            seed: self.seed,
        }
    }

    /// Build the report filter from the date and id arguments
    pub fn report_filter(&self) -> crate::Result<ReportFilter> {
        let filter = ReportFilter {
            start_date: parse_date_arg("start-date", self.start_date.as_deref())?,
            end_date: parse_date_arg("end-date", self.end_date.as_deref())?,
            report_id: self.report_id.clone(),
        };
        filter.validate()?;
        Ok(filter)
    }
}

fn parse_date_arg(
    name: &str,
    value: Option<&str>,
) -> crate::Result<Option<chrono::DateTime<chrono::Utc>>> {
    match value {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| AnalysisError::InvalidFilter(format!("invalid {name}: {raw}"))),
    }
}
