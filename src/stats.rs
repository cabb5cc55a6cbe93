//! Histograms and the chi-square goodness-of-fit comparison.
//!
//! The chi-square test is only valid when every expected-count bin holds at
//! least [`MIN_EXPECTED`] samples. [`compare_counts`] enforces that by merging
//! adjacent bins before computing the statistic: a forward pass folds each
//! deficient bin into its right neighbour, a backward pass folds leftward. The
//! merge direction is fixed policy so that the reported bin boundaries are
//! reproducible.

use statrs::distribution::{ChiSquared, ContinuousCDF};
use thiserror::Error;

/// Smallest expected count per bin for a valid chi-square test.
pub const MIN_EXPECTED: u64 = 5;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("observed and expected must have equal length ({observed} vs {expected})")]
    LengthMismatch { observed: usize, expected: usize },
    #[error("bin edges must be one longer than the counts ({edges} edges for {bins} bins)")]
    EdgeCountMismatch { edges: usize, bins: usize },
    #[error("total expected count must be at least {MIN_EXPECTED}, got {total}")]
    InsufficientExpected { total: u64 },
    #[error("expected bin {index} still below {MIN_EXPECTED} after merging ({count})")]
    UnmergeableBin { index: usize, count: u64 },
    #[error("{bins} bin(s) leave no degrees of freedom, chi-square is degenerate")]
    DegenerateTest { bins: usize },
}

/// Mean of the non-NaN samples; NaN when none are valid.
pub fn nan_mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &val in values {
        if !val.is_nan() {
            sum += val;
            count += 1;
        }
    }
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

/// `n + 1` equally spaced edges over `[min, max]`.
pub fn linear_edges(min: f64, max: f64, n: usize) -> Vec<f64> {
    let step = (max - min) / n as f64;
    (0..=n).map(|i| min + step * i as f64).collect()
}

/// `n + 1` logarithmically spaced edges over `[min, max]`.
pub fn log_edges(min: f64, max: f64, n: usize) -> Vec<f64> {
    let (lo, hi) = (min.log10(), max.log10());
    let step = (hi - lo) / n as f64;
    (0..=n).map(|i| 10f64.powf(lo + step * i as f64)).collect()
}

/// Sample counts over explicit bin edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Count samples into bins `[edges[i], edges[i+1])`; the last bin is
    /// closed on the right. NaN and out-of-range samples are skipped.
    pub fn from_samples(samples: &[f64], edges: &[f64]) -> Self {
        let n_bins = edges.len().saturating_sub(1);
        let mut counts = vec![0u64; n_bins];
        if n_bins > 0 {
            let last = edges[n_bins];
            for &x in samples {
                if x.is_nan() || x < edges[0] || x > last {
                    continue;
                }
                let bin = if x == last {
                    n_bins - 1
                } else {
                    edges.partition_point(|&e| e <= x) - 1
                };
                counts[bin] += 1;
            }
        }
        Self {
            edges: edges.to_vec(),
            counts,
        }
    }
}

/// Rescale counts so they sum to roughly `total`, preserving proportions.
///
/// Lets a background histogram over a far larger sample serve as the expected
/// distribution for a small observed one.
pub fn scale_to_total(counts: &[u64], total: u64) -> Vec<u64> {
    let sum: u64 = counts.iter().sum();
    if sum == 0 {
        return vec![0; counts.len()];
    }
    counts
        .iter()
        .map(|&c| ((c as f64 * total as f64) / sum as f64).round() as u64)
        .collect()
}

/// Result of a chi-square comparison, with the bins actually used.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub p_value: f64,
    pub statistic: f64,
    pub observed: Vec<u64>,
    pub expected: Vec<u64>,
    pub edges: Vec<f64>,
}

/// Chi-square goodness-of-fit p-value of `observed` against `expected` over
/// `edges`, merging adjacent bins until every expected bin holds at least
/// [`MIN_EXPECTED`] samples. `ddof` reduces the degrees of freedom below
/// `k - 1`.
pub fn compare_counts(
    observed: &[u64],
    expected: &[u64],
    edges: &[f64],
    ddof: usize,
) -> Result<Comparison, CompareError> {
    if observed.len() != expected.len() {
        return Err(CompareError::LengthMismatch {
            observed: observed.len(),
            expected: expected.len(),
        });
    }
    if edges.len() != observed.len() + 1 {
        return Err(CompareError::EdgeCountMismatch {
            edges: edges.len(),
            bins: observed.len(),
        });
    }
    let total: u64 = expected.iter().sum();
    if total < MIN_EXPECTED {
        return Err(CompareError::InsufficientExpected { total });
    }

    let (observed, expected, edges) = if expected.iter().all(|&count| count >= MIN_EXPECTED) {
        (observed.to_vec(), expected.to_vec(), edges.to_vec())
    } else {
        merge_low_bins(observed.to_vec(), expected.to_vec(), edges.to_vec())
    };

    if let Some(index) = expected.iter().position(|&count| count < MIN_EXPECTED) {
        return Err(CompareError::UnmergeableBin {
            index,
            count: expected[index],
        });
    }
    if expected.len() <= 1 + ddof {
        return Err(CompareError::DegenerateTest {
            bins: expected.len(),
        });
    }

    let statistic: f64 = observed
        .iter()
        .zip(&expected)
        .map(|(&o, &e)| {
            let diff = o as f64 - e as f64;
            diff * diff / e as f64
        })
        .sum();
    let freedom = (expected.len() - 1 - ddof) as f64;
    let dist = ChiSquared::new(freedom).map_err(|_| CompareError::DegenerateTest {
        bins: expected.len(),
    })?;
    let p_value = 1.0 - dist.cdf(statistic);

    Ok(Comparison {
        p_value,
        statistic,
        observed,
        expected,
        edges,
    })
}

/// Forward pass folds deficient bins rightward, backward pass leftward; the
/// edge shared by the merged pair is dropped each time.
fn merge_low_bins(
    mut observed: Vec<u64>,
    mut expected: Vec<u64>,
    mut edges: Vec<f64>,
) -> (Vec<u64>, Vec<u64>, Vec<f64>) {
    let n = expected.len();
    let mut removed = vec![false; n];
    for i in 0..n.saturating_sub(1) {
        if expected[i] < MIN_EXPECTED {
            expected[i + 1] += expected[i];
            observed[i + 1] += observed[i];
            removed[i] = true;
        }
    }
    compact(&mut observed, &mut expected, &mut edges, &removed, MergeSide::Right);

    let n = expected.len();
    let mut removed = vec![false; n];
    for i in (1..n).rev() {
        if expected[i] < MIN_EXPECTED {
            expected[i - 1] += expected[i];
            observed[i - 1] += observed[i];
            removed[i] = true;
        }
    }
    compact(&mut observed, &mut expected, &mut edges, &removed, MergeSide::Left);

    (observed, expected, edges)
}

enum MergeSide {
    /// Bin `i` merged into `i + 1`: the boundary `edges[i + 1]` goes.
    Right,
    /// Bin `i` merged into `i - 1`: the boundary `edges[i]` goes.
    Left,
}

fn compact(
    observed: &mut Vec<u64>,
    expected: &mut Vec<u64>,
    edges: &mut Vec<f64>,
    removed: &[bool],
    side: MergeSide,
) {
    let mut i = 0;
    observed.retain(|_| {
        let keep = !removed[i];
        i += 1;
        keep
    });
    let mut i = 0;
    expected.retain(|_| {
        let keep = !removed[i];
        i += 1;
        keep
    });

    let n_edges = edges.len();
    let mut i = 0;
    edges.retain(|_| {
        let keep = match side {
            // Outer edges always survive.
            MergeSide::Right => i == 0 || !removed[i - 1],
            MergeSide::Left => i == n_edges - 1 || !removed[i],
        };
        i += 1;
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_mean_skips_invalid_samples() {
        assert_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(&[f64::NAN, f64::NAN]).is_nan());
        assert!(nan_mean(&[]).is_nan());
    }

    #[test]
    fn histogram_follows_edge_conventions() {
        let edges = linear_edges(0.0, 4.0, 4);
        let hist =
            Histogram::from_samples(&[0.0, 0.5, 1.0, 3.9, 4.0, 4.1, -0.1, f64::NAN], &edges);
        // 4.0 lands in the last (closed) bin; 4.1, -0.1 and NaN are skipped.
        assert_eq!(hist.counts, vec![2, 1, 0, 2]);
    }

    #[test]
    fn log_edges_span_the_decades() {
        let edges = log_edges(1e2, 1e6, 4);
        assert_eq!(edges.len(), 5);
        assert!((edges[0] - 1e2).abs() < 1e-6);
        assert!((edges[2] - 1e4).abs() < 1e-6);
        assert!((edges[4] - 1e6).abs() < 1e-3);
    }

    #[test]
    fn scaling_preserves_proportions() {
        assert_eq!(scale_to_total(&[100, 300, 600], 10), vec![1, 3, 6]);
        assert_eq!(scale_to_total(&[0, 0], 10), vec![0, 0]);
    }

    #[test]
    fn well_filled_bins_pass_through_unchanged() {
        let observed = [6, 7, 9];
        let expected = [5, 8, 9];
        let edges = [0.0, 1.0, 2.0, 3.0];
        let cmp = compare_counts(&observed, &expected, &edges, 0).unwrap();

        assert_eq!(cmp.observed, observed);
        assert_eq!(cmp.expected, expected);
        assert_eq!(cmp.edges, edges);
        assert!(cmp.p_value > 0.0 && cmp.p_value <= 1.0);
    }

    #[test]
    fn forward_merge_folds_into_right_neighbour() {
        let cmp = compare_counts(&[1, 5, 9], &[2, 10, 10], &[0.0, 1.0, 2.0, 3.0], 0).unwrap();

        assert_eq!(cmp.expected, vec![12, 10]);
        assert_eq!(cmp.observed, vec![6, 9]);
        assert_eq!(cmp.edges, vec![0.0, 2.0, 3.0]);
        assert!(cmp.p_value > 0.0 && cmp.p_value <= 1.0);
    }

    #[test]
    fn backward_merge_folds_into_left_neighbour() {
        // The trailing bin is short; the backward pass folds it into its left
        // neighbour, dropping the shared edge.
        let cmp = compare_counts(&[5, 4, 1], &[10, 9, 2], &[0.0, 1.0, 2.0, 3.0], 0).unwrap();

        assert_eq!(cmp.expected, vec![10, 11]);
        assert_eq!(cmp.observed, vec![5, 5]);
        assert_eq!(cmp.edges, vec![0.0, 1.0, 3.0]);
    }

    #[test]
    fn cascading_merge_accumulates() {
        // 1 folds into 2 making 3, which folds into 10.
        let cmp =
            compare_counts(&[0, 1, 2, 3], &[1, 2, 10, 10], &[0.0, 1.0, 2.0, 3.0, 4.0], 0).unwrap();

        assert_eq!(cmp.expected, vec![13, 10]);
        assert_eq!(cmp.observed, vec![3, 3]);
        assert_eq!(cmp.edges, vec![0.0, 3.0, 4.0]);
    }

    #[test]
    fn insufficient_total_is_rejected_before_merging() {
        let err = compare_counts(&[1, 1], &[1, 1], &[0.0, 1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, CompareError::InsufficientExpected { total: 2 }));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = compare_counts(&[1, 2, 3], &[1, 2], &[0.0, 1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, CompareError::LengthMismatch { .. }));

        let err = compare_counts(&[6, 6], &[6, 6], &[0.0, 1.0], 0).unwrap_err();
        assert!(matches!(err, CompareError::EdgeCountMismatch { .. }));
    }

    #[test]
    fn collapse_to_one_bin_is_degenerate() {
        let err = compare_counts(&[2, 3], &[3, 2], &[0.0, 1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, CompareError::DegenerateTest { bins: 1 }));
    }

    #[test]
    fn ddof_can_exhaust_degrees_of_freedom() {
        let err = compare_counts(&[6, 6], &[6, 6], &[0.0, 1.0, 2.0], 1).unwrap_err();
        assert!(matches!(err, CompareError::DegenerateTest { bins: 2 }));
    }

    #[test]
    fn p_value_matches_known_statistic() {
        // Uniform expectation, chi2 = 0.8 on 3 dof: p ≈ 0.8497.
        let cmp =
            compare_counts(&[12, 8, 10, 10], &[10, 10, 10, 10], &[0.0, 1.0, 2.0, 3.0, 4.0], 0)
                .unwrap();
        assert!((cmp.statistic - 0.8).abs() < 1e-12);
        assert!((cmp.p_value - 0.8497).abs() < 1e-3);
    }
}
