//! Performance tier assignment from cluster centroids

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Weight of the average completion time dimension; faster is better
pub const COMPLETION_TIME_WEIGHT: f64 = -1.0;
/// Weight of the report count dimension
pub const REPORT_COUNT_WEIGHT: f64 = 1.0;
/// Weight of the report frequency dimension
pub const REPORT_FREQUENCY_WEIGHT: f64 = 1.0;

/// Scores closer than this are treated as tied
pub const DEFAULT_TIE_EPSILON: f64 = 0.001;

/// Ordinal performance label for a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    /// Tier for a 0-based rank. Only the top two ranks get named tiers.
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => Tier::High,
            1 => Tier::Medium,
            _ => Tier::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "High",
            Tier::Medium => "Medium",
            Tier::Low => "Low",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted performance score of a centroid
pub fn performance_score(centroid: &ArrayView1<f64>) -> f64 {
    centroid[0] * COMPLETION_TIME_WEIGHT
        + centroid[1] * REPORT_COUNT_WEIGHT
        + centroid[2] * REPORT_FREQUENCY_WEIGHT
}

/// Rank candidate clusters by score, best first.
///
/// Each step takes the highest remaining score and, among the remaining
/// clusters within `tie_epsilon` of it, picks the lowest index.
pub fn rank_clusters(scores: &[f64], candidates: &[usize], tie_epsilon: f64) -> Vec<usize> {
    let mut remaining: Vec<usize> = candidates.to_vec();
    remaining.sort_unstable();
    remaining.dedup();

    let mut ranking = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let best = remaining
            .iter()
            .map(|&c| scores[c])
            .fold(f64::NEG_INFINITY, f64::max);

        // `remaining` is sorted, so the first match is the lowest index
        let pos = remaining
            .iter()
            .position(|&c| (best - scores[c]).abs() < tie_epsilon || scores[c] == best)
            .unwrap_or(0);
        ranking.push(remaining.remove(pos));
    }

    ranking
}

/// Assign a tier to every non-empty cluster.
///
/// # Arguments
/// * `centroids` - (k, 3) centroid matrix
/// * `cluster_sizes` - member count per cluster; empty clusters are not ranked
/// * `tie_epsilon` - score band treated as a tie
///
/// # Returns
/// * `(tiers, scores)`, both indexed by cluster. Empty clusters get `None`.
pub fn classify_tiers(
    centroids: &Array2<f64>,
    cluster_sizes: &[usize],
    tie_epsilon: f64,
) -> (Vec<Option<Tier>>, Vec<f64>) {
    let scores: Vec<f64> = centroids
        .outer_iter()
        .map(|centroid| performance_score(&centroid))
        .collect();

    let candidates: Vec<usize> = (0..scores.len())
        .filter(|&c| cluster_sizes.get(c).copied().unwrap_or(0) > 0)
        .collect();

    let mut tiers = vec![None; scores.len()];
    for (rank, cluster) in rank_clusters(&scores, &candidates, tie_epsilon)
        .into_iter()
        .enumerate()
    {
        tiers[cluster] = Some(Tier::from_rank(rank));
    }

    (tiers, scores)
}
