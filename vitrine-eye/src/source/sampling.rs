//! Even frame sampling

/// Pick at most `max` evenly spaced indices out of `0..total`, in increasing
/// order. Index 0 is always included when anything is picked.
pub fn sample_indices(total: usize, max: usize) -> Vec<usize> {
    if total == 0 || max == 0 {
        return Vec::new();
    }
    if total <= max {
        return (0..total).collect();
    }
    // total > max, so consecutive picks differ by at least one
    (0..max).map(|i| i * total / max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_all_when_under_limit() {
        assert_eq!(sample_indices(3, 10), vec![0, 1, 2]);
        assert_eq!(sample_indices(5, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_sample_evenly_spaced() {
        assert_eq!(sample_indices(10, 5), vec![0, 2, 4, 6, 8]);
        assert_eq!(sample_indices(7, 3), vec![0, 2, 4]);
    }

    #[test]
    fn test_sample_empty() {
        assert!(sample_indices(0, 5).is_empty());
        assert!(sample_indices(5, 0).is_empty());
    }

    #[test]
    fn test_sample_strictly_increasing_and_bounded() {
        for total in 1..60 {
            for max in 1..20 {
                let picks = sample_indices(total, max);
                assert_eq!(picks.len(), total.min(max));
                assert_eq!(picks[0], 0);
                assert!(picks.windows(2).all(|w| w[0] < w[1]));
                assert!(picks.iter().all(|&i| i < total));
            }
        }
    }
}
