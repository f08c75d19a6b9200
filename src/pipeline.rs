//! Analysis entry point: features -> normalization -> K-Means -> tiers -> insights

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Dispatch;

use crate::data::ReportRecord;
use crate::error::AnalysisError;
use crate::features::{
    extract_features, normalize_features, AccountFeatures, DEFAULT_NORMALIZATION_CEILING,
};
use crate::insight::generate_insights;
use crate::model::{fit_kmeans, KMeansModel, KMeansParams};
use crate::tier::{classify_tiers, Tier, DEFAULT_TIE_EPSILON};

/// Accounts sampled when computing the silhouette coefficient
const SILHOUETTE_SAMPLE_SIZE: usize = 100;

/// Tunable parameters for an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of clusters. High/Medium/Low map one-to-one only when this is 3;
    /// with more clusters every rank past the second is Low.
    pub clusters: usize,
    pub max_iterations: usize,
    /// Maximum centroid movement treated as converged
    pub tolerance: f64,
    /// Score difference below which two clusters are tied
    pub tie_epsilon: f64,
    /// Assumed upper bound of each raw feature
    pub normalization_ceiling: f64,
    /// Seed for centroid initialization
    pub seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            clusters: 3,
            max_iterations: 1000,
            tolerance: 1e-4,
            tie_epsilon: DEFAULT_TIE_EPSILON,
            normalization_ceiling: DEFAULT_NORMALIZATION_CEILING,
            seed: 42,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.clusters == 0 {
            return Err(AnalysisError::InvalidConfig(
                "clusters must be at least 1".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if !self.tie_epsilon.is_finite() || self.tie_epsilon < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "tie_epsilon must be non-negative, got {}",
                self.tie_epsilon
            )));
        }
        if !self.normalization_ceiling.is_finite() || self.normalization_ceiling <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "normalization_ceiling must be positive, got {}",
                self.normalization_ceiling
            )));
        }
        Ok(())
    }

    pub fn kmeans_params(&self) -> KMeansParams {
        KMeansParams {
            n_clusters: self.clusters,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            seed: self.seed,
        }
    }
}

/// Statistics for one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Engine index; carries no ranking meaning
    pub cluster: usize,
    /// `None` for a cluster that ended up with no accounts
    pub tier: Option<Tier>,
    pub account_count: usize,
    pub average_completion_hours: f64,
    pub average_reports_per_day: f64,
    /// Centroid performance score used for ranking
    pub score: f64,
    pub accounts: Vec<String>,
}

/// Convergence and fit quality of the clustering step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringDiagnostics {
    pub iterations: usize,
    pub converged: bool,
    pub inertia: f64,
    pub silhouette: f64,
}

/// Outcome of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub clusters: Vec<ClusterSummary>,
    pub insights: Vec<String>,
    pub total_accounts: usize,
    pub analyzed_at: DateTime<Utc>,
    pub diagnostics: ClusteringDiagnostics,
}

impl AnalysisResult {
    /// Clusters carrying the given tier
    pub fn clusters_with_tier(&self, tier: Tier) -> impl Iterator<Item = &ClusterSummary> {
        self.clusters.iter().filter(move |c| c.tier == Some(tier))
    }
}

/// Runs the clustering analysis over a report snapshot.
///
/// Each call to [`UsageAnalyzer::analyze`] owns all of its intermediate
/// state, so one analyzer can serve independent snapshots.
#[derive(Debug, Clone)]
pub struct UsageAnalyzer {
    config: AnalysisConfig,
    logger: Dispatch,
}

impl UsageAnalyzer {
    pub fn new(config: AnalysisConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            logger: Dispatch::none(),
        })
    }

    /// Route diagnostic events for this analyzer's runs to `logger`.
    /// Without one, runs emit nothing.
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze report usage, stamping the result with the current time
    pub fn analyze(&self, records: &[ReportRecord]) -> crate::Result<AnalysisResult> {
        self.analyze_at(records, Utc::now())
    }

    /// Analyze report usage with an explicit analysis timestamp
    pub fn analyze_at(
        &self,
        records: &[ReportRecord],
        analyzed_at: DateTime<Utc>,
    ) -> crate::Result<AnalysisResult> {
        tracing::dispatcher::with_default(&self.logger, || self.run(records, analyzed_at))
    }

    fn run(&self, records: &[ReportRecord], analyzed_at: DateTime<Utc>) -> crate::Result<AnalysisResult> {
        let features = extract_features(records)?;
        tracing::debug!(
            records = records.len(),
            accounts = features.len(),
            "extracted account features"
        );

        let matrix = normalize_features(&features, self.config.normalization_ceiling)?;
        let model = fit_kmeans(&matrix, &self.config.kmeans_params())?;
        tracing::debug!(
            iterations = model.iterations,
            converged = model.converged,
            inertia = model.inertia,
            "clustering finished"
        );

        let clusters = summarize_clusters(&features, &model, self.config.tie_epsilon);
        let insights = generate_insights(&clusters);
        let total_accounts = clusters.iter().map(|c| c.account_count).sum();

        let diagnostics = ClusteringDiagnostics {
            iterations: model.iterations,
            converged: model.converged,
            inertia: model.inertia,
            silhouette: model.compute_silhouette_sample(&matrix, SILHOUETTE_SAMPLE_SIZE),
        };

        tracing::info!(
            accounts = total_accounts,
            insights = insights.len(),
            "report usage analysis complete"
        );

        Ok(AnalysisResult {
            clusters,
            insights,
            total_accounts,
            analyzed_at,
            diagnostics,
        })
    }
}

/// Convenience wrapper: validate `config` and run one analysis without logging
pub fn analyze_report_usage(
    records: &[ReportRecord],
    config: &AnalysisConfig,
) -> crate::Result<AnalysisResult> {
    UsageAnalyzer::new(config.clone())?.analyze(records)
}

fn summarize_clusters(
    features: &[AccountFeatures],
    model: &KMeansModel,
    tie_epsilon: f64,
) -> Vec<ClusterSummary> {
    let sizes = model.cluster_sizes();
    let (tiers, scores) = classify_tiers(&model.centroids, &sizes, tie_epsilon);

    (0..model.n_clusters)
        .map(|cluster| {
            let members: Vec<&AccountFeatures> = features
                .iter()
                .zip(model.labels.iter())
                .filter(|(_, &label)| label == cluster)
                .map(|(f, _)| f)
                .collect();

            let (average_completion_hours, average_reports_per_day) = if members.is_empty() {
                (0.0, 0.0)
            } else {
                let n = members.len() as f64;
                (
                    members.iter().map(|f| f.average_completion_hours).sum::<f64>() / n,
                    members.iter().map(|f| f.report_frequency).sum::<f64>() / n,
                )
            };

            ClusterSummary {
                cluster,
                tier: tiers[cluster],
                account_count: members.len(),
                average_completion_hours,
                average_reports_per_day,
                score: scores[cluster],
                accounts: members.iter().map(|f| f.account_id.clone()).collect(),
            }
        })
        .collect()
}
