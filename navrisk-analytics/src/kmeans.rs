//! Deterministic one-dimensional k-means.
//!
//! Centroids start from caller-supplied values, so the fit is a pure function
//! of its input. Ties go to the lower centroid index; a cluster that loses all
//! its points keeps its previous centroid.

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit<const K: usize> {
    pub centroids: [f64; K],
    /// Cluster index per input point.
    pub assignments: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
}

fn nearest<const K: usize>(x: f64, centroids: &[f64; K]) -> usize {
    let mut best = 0;
    let mut best_dist = (x - centroids[0]).abs();
    for (k, c) in centroids.iter().enumerate().skip(1) {
        let dist = (x - c).abs();
        if dist < best_dist {
            best = k;
            best_dist = dist;
        }
    }
    best
}

pub fn fit<const K: usize>(
    values: &[f64],
    init: [f64; K],
    max_iterations: usize,
    tolerance: f64,
) -> KMeansFit<K> {
    let mut centroids = init;
    let mut assignments = vec![0; values.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;
        for (a, &x) in assignments.iter_mut().zip(values) {
            *a = nearest(x, &centroids);
        }

        let mut sums = [0.0; K];
        let mut counts = [0usize; K];
        for (&a, &x) in assignments.iter().zip(values) {
            sums[a] += x;
            counts[a] += 1;
        }

        let mut shift = 0.0_f64;
        for k in 0..K {
            if counts[k] > 0 {
                let next = sums[k] / counts[k] as f64;
                shift = shift.max((next - centroids[k]).abs());
                centroids[k] = next;
            }
        }

        if shift <= tolerance {
            converged = true;
            break;
        }
    }

    // Final assignment against the final centroids.
    for (a, &x) in assignments.iter_mut().zip(values) {
        *a = nearest(x, &centroids);
    }

    KMeansFit {
        centroids,
        assignments,
        iterations,
        converged,
    }
}

/// Cluster indices sorted by ascending centroid; `rank[cluster]` is its position.
pub fn centroid_ranks<const K: usize>(centroids: &[f64; K]) -> [usize; K] {
    let mut order: [usize; K] = std::array::from_fn(|i| i);
    order.sort_by(|a, b| centroids[*a].total_cmp(&centroids[*b]));
    let mut rank = [0; K];
    for (pos, &cluster) in order.iter().enumerate() {
        rank[cluster] = pos;
    }
    rank
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_three_groups() {
        let values = [1.0, 1.1, 0.9, 5.0, 5.2, 4.8, 10.0, 10.5, 9.5];
        let fit = fit(&values, [0.0, 4.0, 8.0], 100, 1e-12);
        assert!(fit.converged);
        assert!((fit.centroids[0] - 1.0).abs() < 1e-12);
        assert!((fit.centroids[1] - 5.0).abs() < 1e-12);
        assert!((fit.centroids[2] - 10.0).abs() < 1e-12);
        assert_eq!(fit.assignments, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn ties_go_to_lower_index() {
        let fit = fit(&[2.0], [1.0, 3.0], 1, 0.0);
        assert_eq!(fit.assignments, vec![0]);
    }

    #[test]
    fn empty_cluster_keeps_centroid() {
        let fit = fit(&[1.0, 1.0, 1.0], [1.0, 50.0, 100.0], 10, 1e-12);
        assert_eq!(fit.centroids, [1.0, 50.0, 100.0]);
        assert_eq!(fit.assignments, vec![0, 0, 0]);
    }

    #[test]
    fn iteration_cap_is_respected() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let fit = fit(&values, [0.0, 1.0, 2.0], 1, 0.0);
        assert_eq!(fit.iterations, 1);
        assert!(!fit.converged);
    }

    #[test]
    fn ranks_follow_centroids() {
        assert_eq!(centroid_ranks(&[5.0, 1.0, 3.0]), [2, 0, 1]);
    }
}
