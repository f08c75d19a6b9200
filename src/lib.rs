//! ReportForge: account usage segmentation using K-Means clustering
//!
//! This library groups report submissions by account, clusters the accounts on
//! completion time, report volume and report frequency, ranks the clusters into
//! High/Medium/Low performance tiers, and produces narrative insights.

pub mod cli;
pub mod data;
pub mod error;
pub mod features;
pub mod insight;
pub mod model;
pub mod pipeline;
pub mod tier;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_reports, ReportFilter, ReportRecord};
pub use error::{AnalysisError, Stage};
pub use features::{extract_features, normalize_value, AccountFeatures};
pub use model::{fit_kmeans, KMeansModel, KMeansParams};
pub use pipeline::{
    analyze_report_usage, AnalysisConfig, AnalysisResult, ClusterSummary, ClusteringDiagnostics,
    UsageAnalyzer,
};
pub use tier::Tier;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, AnalysisError>;
