//! K-Means clustering engine: seeded k-means++ initialization and Lloyd iterations

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::AnalysisError;

/// Parameters for a single K-Means fit
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansParams {
    pub n_clusters: usize,
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this between iterations
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            max_iterations: 1000,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

/// Fitted K-Means model
#[derive(Debug, Clone)]
pub struct KMeansModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster assignment for each input row, in input order
    pub labels: Array1<usize>,
    /// Final centroids (n_clusters, n_features)
    pub centroids: Array2<f64>,
    /// Lloyd iterations actually run
    pub iterations: usize,
    /// False when the iteration cap was hit first
    pub converged: bool,
    /// Largest centroid movement recorded at each iteration
    pub displacement_history: Vec<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
}

impl KMeansModel {
    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Compute basic silhouette coefficient for a subset of points (for efficiency)
    pub fn compute_silhouette_sample(&self, features: &Array2<f64>, sample_size: usize) -> f64 {
        let n_samples = features.nrows().min(sample_size);
        if n_samples < 2 {
            return 0.0;
        }

        let mut silhouette_sum = 0.0;

        for i in 0..n_samples {
            let point = features.row(i);
            let cluster_label = self.labels[i];

            let mut same_cluster_distances = Vec::new();
            let mut other_cluster_distances: Vec<Vec<f64>> = vec![Vec::new(); self.n_clusters];

            for j in 0..n_samples {
                if i == j {
                    continue;
                }

                let distance = euclidean_distance(&point, &features.row(j));
                let other_label = self.labels[j];

                if other_label == cluster_label {
                    same_cluster_distances.push(distance);
                } else if other_label < self.n_clusters {
                    other_cluster_distances[other_label].push(distance);
                }
            }

            let a_i = mean(&same_cluster_distances);

            // b(i): smallest mean distance to any other non-empty cluster
            let b_i = other_cluster_distances
                .iter()
                .filter(|distances| !distances.is_empty())
                .map(|distances| mean(distances))
                .fold(f64::INFINITY, f64::min);

            let silhouette_i = if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
                0.0
            } else {
                (b_i - a_i) / a_i.max(b_i)
            };

            silhouette_sum += silhouette_i;
        }

        silhouette_sum / n_samples as f64
    }
}

/// Fit K-Means on a normalized feature matrix
///
/// # Arguments
/// * `features` - (n_samples, n_features) matrix, one row per account
/// * `params` - Cluster count, iteration cap, tolerance and seed
///
/// # Returns
/// * Fitted `KMeansModel`. Hitting the iteration cap is not an error.
///
/// Fewer samples than clusters is allowed: the surplus centroids duplicate
/// existing ones and stay empty.
pub fn fit_kmeans(features: &Array2<f64>, params: &KMeansParams) -> crate::Result<KMeansModel> {
    let k = params.n_clusters;
    if k == 0 {
        return Err(AnalysisError::InvalidConfig(
            "number of clusters must be at least 1".to_string(),
        ));
    }
    if features.nrows() == 0 {
        return Err(AnalysisError::EmptyFeatureMatrix);
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut centroids = init_kmeans_plus_plus(features, k, &mut rng);
    let mut labels = assign_labels(features, &centroids);

    let mut iterations = 0;
    let mut converged = false;
    let mut displacement_history = Vec::new();

    while iterations < params.max_iterations {
        iterations += 1;

        let updated = update_centroids(features, &labels, &centroids);
        let displacement = max_displacement(&centroids, &updated);
        displacement_history.push(displacement);
        centroids = updated;
        labels = assign_labels(features, &centroids);

        if displacement < params.tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        tracing::debug!(iterations, "k-means converged");
    } else {
        tracing::warn!(
            max_iterations = params.max_iterations,
            "k-means reached iteration cap without converging"
        );
    }

    let inertia = compute_inertia(features, &labels, &centroids);

    Ok(KMeansModel {
        n_clusters: k,
        labels,
        centroids,
        iterations,
        converged,
        displacement_history,
        inertia,
    })
}

/// k-means++ seeding. Falls back to a uniform pick once every point
/// coincides with a chosen centroid.
fn init_kmeans_plus_plus(features: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = features.nrows();
    let mut centroids = Array2::zeros((k, features.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&features.row(first));

    let mut min_sq_dist: Vec<f64> = features
        .outer_iter()
        .map(|row| squared_distance(&row, &features.row(first)))
        .collect();

    for c in 1..k {
        let total: f64 = min_sq_dist.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (i, &d) in min_sq_dist.iter().enumerate() {
                if d > 0.0 && target < d {
                    pick = i;
                    break;
                }
                target -= d;
            }
            // Rounding can exhaust `target` without a pick; take the last
            // candidate that still carries weight
            if min_sq_dist[pick] == 0.0 {
                pick = min_sq_dist.iter().rposition(|&d| d > 0.0).unwrap_or(pick);
            }
            pick
        } else {
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&features.row(chosen));
        for (i, row) in features.outer_iter().enumerate() {
            let d = squared_distance(&row, &features.row(chosen));
            if d < min_sq_dist[i] {
                min_sq_dist[i] = d;
            }
        }
    }

    centroids
}

fn assign_labels(features: &Array2<f64>, centroids: &Array2<f64>) -> Array1<usize> {
    features
        .outer_iter()
        .map(|row| nearest_centroid(&row, centroids))
        .collect()
}

/// Index of the closest centroid; ties go to the lowest index
fn nearest_centroid(point: &ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut min_distance = f64::INFINITY;
    let mut closest_cluster = 0;

    for (cluster_idx, centroid) in centroids.outer_iter().enumerate() {
        let distance = squared_distance(point, &centroid);
        if distance < min_distance {
            min_distance = distance;
            closest_cluster = cluster_idx;
        }
    }

    closest_cluster
}

/// Mean of each cluster's members. A cluster with no members keeps its previous centroid.
fn update_centroids(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    previous: &Array2<f64>,
) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.raw_dim());
    let mut counts = vec![0usize; previous.nrows()];

    for (row, &label) in features.outer_iter().zip(labels.iter()) {
        let mut sum = sums.row_mut(label);
        sum += &row;
        counts[label] += 1;
    }

    let mut updated = previous.clone();
    for (c, mut centroid) in updated.axis_iter_mut(Axis(0)).enumerate() {
        if counts[c] > 0 {
            centroid.assign(&(&sums.row(c) / counts[c] as f64));
        }
    }
    updated
}

fn max_displacement(before: &Array2<f64>, after: &Array2<f64>) -> f64 {
    before
        .outer_iter()
        .zip(after.outer_iter())
        .map(|(a, b)| euclidean_distance(&a, &b))
        .fold(0.0, f64::max)
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    features
        .outer_iter()
        .zip(labels.iter())
        .filter(|(_, &cluster)| cluster < centroids.nrows())
        .map(|(point, &cluster)| squared_distance(&point, &centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    squared_distance(a, b).sqrt()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separated_points() -> Array2<f64> {
        array![
            [0.01, 0.01, 0.01],
            [0.02, 0.01, 0.02],
            [0.50, 0.50, 0.50],
            [0.51, 0.49, 0.50],
            [0.95, 0.90, 0.99],
            [0.97, 0.92, 0.98],
        ]
    }

    fn params(seed: u64) -> KMeansParams {
        KMeansParams {
            seed,
            ..KMeansParams::default()
        }
    }

    #[test]
    fn test_fit_kmeans() {
        let features = separated_points();
        let model = fit_kmeans(&features, &params(7)).unwrap();

        assert_eq!(model.n_clusters, 3);
        assert_eq!(model.labels.len(), 6);
        assert_eq!(model.centroids.shape(), &[3, 3]);
        assert!(model.labels.iter().all(|&l| l < 3));
        assert!(model.converged);
        assert!(*model.displacement_history.last().unwrap() < 1e-4);
    }

    #[test]
    fn test_displacement_tail_non_increasing() {
        // Zero tolerance never converges, so the loop runs to the cap and
        // records every step, including the settled ones
        let uncapped = KMeansParams {
            max_iterations: 50,
            tolerance: 0.0,
            ..params(13)
        };
        let model = fit_kmeans(&separated_points(), &uncapped).unwrap();
        let history = &model.displacement_history;

        assert_eq!(history.len(), 50);
        assert!(!model.converged);
        assert!(history[0] > 0.0);

        let settle_tolerance = KMeansParams::default().tolerance;
        let first_below = history
            .iter()
            .position(|&d| d < settle_tolerance)
            .unwrap();
        for i in (first_below + 1)..history.len() {
            assert!(
                history[i] <= history[i - 1],
                "displacement rose at iteration {}: {} > {}",
                i,
                history[i],
                history[i - 1]
            );
        }
        assert_eq!(*history.last().unwrap(), 0.0);
    }

    #[test]
    fn test_separated_groups_share_labels() {
        let model = fit_kmeans(&separated_points(), &params(11)).unwrap();
        assert_eq!(model.labels[0], model.labels[1]);
        assert_eq!(model.labels[2], model.labels[3]);
        assert_eq!(model.labels[4], model.labels[5]);
        assert_ne!(model.labels[0], model.labels[2]);
        assert_ne!(model.labels[2], model.labels[4]);
    }

    #[test]
    fn test_same_seed_same_result() {
        let features = separated_points();
        let a = fit_kmeans(&features, &params(3)).unwrap();
        let b = fit_kmeans(&features, &params(3)).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn test_fewer_points_than_clusters() {
        let features = array![[0.01, 0.03, 0.03], [0.10, 0.02, 0.0025]];
        let model = fit_kmeans(&features, &params(42)).unwrap();

        assert_eq!(model.centroids.nrows(), 3);
        let sizes = model.cluster_sizes();
        assert_eq!(sizes.iter().sum::<usize>(), 2);
        assert_eq!(sizes.iter().filter(|&&s| s == 0).count(), 1);
        assert_ne!(model.labels[0], model.labels[1]);
    }

    #[test]
    fn test_single_point() {
        let features = array![[0.2, 0.2, 0.2]];
        let model = fit_kmeans(&features, &params(1)).unwrap();
        assert_eq!(model.labels[0], 0);
        assert_eq!(model.cluster_sizes(), vec![1, 0, 0]);
        assert_eq!(model.inertia, 0.0);
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let features = separated_points();
        let capped = KMeansParams {
            max_iterations: 1,
            tolerance: 0.0,
            ..params(5)
        };
        let model = fit_kmeans(&features, &capped).unwrap();
        assert_eq!(model.iterations, 1);
        assert!(!model.converged);
        assert_eq!(model.labels.len(), 6);
    }

    #[test]
    fn test_empty_cluster_keeps_centroid() {
        let features = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let previous = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [5.0, 5.0, 5.0]];
        let labels = array![0usize, 1];
        let updated = update_centroids(&features, &labels, &previous);
        assert_eq!(updated.row(2), previous.row(2));
    }

    #[test]
    fn test_nearest_centroid_tie_prefers_lower_index() {
        let centroids = array![[0.5, 0.5, 0.5], [0.5, 0.5, 0.5]];
        let point = array![0.5, 0.5, 0.5];
        assert_eq!(nearest_centroid(&point.view(), &centroids), 0);
    }

    #[test]
    fn test_cluster_sizes() {
        let model = fit_kmeans(&separated_points(), &params(9)).unwrap();
        let sizes = model.cluster_sizes();
        assert_eq!(sizes.len(), 3);
        assert_eq!(sizes.iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_silhouette_well_separated() {
        let features = separated_points();
        let model = fit_kmeans(&features, &params(4)).unwrap();
        let score = model.compute_silhouette_sample(&features, 100);
        assert!(score > 0.8, "silhouette {score}");
    }

    #[test]
    fn test_invalid_inputs() {
        let features = separated_points();
        let zero_k = KMeansParams {
            n_clusters: 0,
            ..KMeansParams::default()
        };
        assert!(fit_kmeans(&features, &zero_k).is_err());
        assert!(matches!(
            fit_kmeans(&Array2::zeros((0, 3)), &KMeansParams::default()),
            Err(AnalysisError::EmptyFeatureMatrix)
        ));
        assert_eq!(
            AnalysisError::EmptyFeatureMatrix.stage(),
            crate::error::Stage::Clustering
        );
    }
}
