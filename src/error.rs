//! Error taxonomy for the analysis pipeline

use thiserror::Error;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Loading,
    Extraction,
    Clustering,
}

/// Errors raised while loading reports or running an analysis.
///
/// A run either produces a complete [`crate::AnalysisResult`] or fails with
/// exactly one of these; partial results are never returned.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No report records were supplied, so there is nothing to cluster.
    #[error("no report records supplied")]
    EmptyInput,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading the CSV source failed.
    #[error("failed to load reports: {0}")]
    Load(#[from] polars::prelude::PolarsError),

    #[error("required column '{0}' not found in input")]
    MissingColumn(String),

    /// A timestamp cell could not be parsed with any supported format.
    #[error("malformed timestamp in row {row}, column '{column}': '{value}'")]
    MalformedTimestamp {
        /// 1-based data row (header excluded)
        row: usize,
        column: String,
        value: String,
    },

    #[error("invalid report filter: {0}")]
    InvalidFilter(String),

    /// A per-account statistic could not be computed.
    #[error("feature extraction failed for account '{account}': {reason}")]
    Extraction { account: String, reason: String },

    /// The cluster engine was handed a matrix with no rows.
    #[error("cannot cluster an empty feature matrix")]
    EmptyFeatureMatrix,

    #[error("feature matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl AnalysisError {
    /// Stage of the pipeline that raised this error
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisError::InvalidConfig(_) | AnalysisError::InvalidFilter(_) => {
                Stage::Configuration
            }
            AnalysisError::Load(_)
            | AnalysisError::MissingColumn(_)
            | AnalysisError::MalformedTimestamp { .. } => Stage::Loading,
            AnalysisError::EmptyInput | AnalysisError::Extraction { .. } => Stage::Extraction,
            AnalysisError::EmptyFeatureMatrix | AnalysisError::Shape(_) => Stage::Clustering,
        }
    }
}
