//! Pass@k estimation over repeated samples of the same prompt.

use thiserror::Error;

/// Errors from pass@k computation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PassAtKError {
    #[error("pass@{k} requires at least k samples, got {n}")]
    InsufficientSamples { n: usize, k: usize },
}

/// Unbiased pass@k estimate from `n` samples with `c` passing.
///
/// Computes `1 - prod_{i=n-c+1..=n} (1 - k/i)` in the numerically stable
/// product form. When fewer than `k` samples failed the estimate is
/// exactly 1.0.
///
/// # Errors
///
/// Fails when `k == 0` or `k > n`.
pub fn pass_at_k(n: usize, c: usize, k: usize) -> Result<f64, PassAtKError> {
    if k == 0 || k > n {
        return Err(PassAtKError::InsufficientSamples { n, k });
    }
    if n - c < k {
        return Ok(1.0);
    }
    let mut complement = 1.0f64;
    for i in (n - c + 1)..=n {
        complement *= 1.0 - k as f64 / i as f64;
    }
    Ok(1.0 - complement)
}

/// Hard pass@k: whether any of the first `k` sampled outcomes passed.
///
/// Outcomes are taken in sampling order, so the result is deterministic
/// for a fixed response file.
///
/// # Errors
///
/// Fails when `k == 0` or `k > outcomes.len()`.
pub fn hard_pass_at_k(outcomes: &[bool], k: usize) -> Result<bool, PassAtKError> {
    if k == 0 || k > outcomes.len() {
        return Err(PassAtKError::InsufficientSamples {
            n: outcomes.len(),
            k,
        });
    }
    Ok(outcomes[..k].iter().any(|&passed| passed))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    #[test]
    fn test_known_value() {
        // n=5, c=2, k=2: 1 - (1 - 2/4)(1 - 2/5) = 0.7
        approx_eq(pass_at_k(5, 2, 2).unwrap(), 0.7);
    }

    #[test]
    fn test_all_pass() {
        approx_eq(pass_at_k(10, 10, 3).unwrap(), 1.0);
    }

    #[test]
    fn test_none_pass() {
        approx_eq(pass_at_k(10, 0, 3).unwrap(), 0.0);
    }

    #[test]
    fn test_few_failures_saturates() {
        // n - c < k means even the worst draw contains a pass.
        approx_eq(pass_at_k(5, 4, 2).unwrap(), 1.0);
    }

    #[test]
    fn test_k_equals_n() {
        // Drawing every sample finds a pass iff any passed.
        approx_eq(pass_at_k(7, 1, 7).unwrap(), 1.0);
        approx_eq(pass_at_k(7, 0, 7).unwrap(), 0.0);
    }

    #[test]
    fn test_monotone_in_k() {
        let mut prev = 0.0;
        for k in 1..=10 {
            let p = pass_at_k(10, 3, k).unwrap();
            assert!(p >= prev, "pass@{k} decreased");
            prev = p;
        }
    }

    #[test]
    fn test_invalid_k() {
        assert!(pass_at_k(5, 2, 0).is_err());
        assert!(pass_at_k(5, 2, 6).is_err());
    }

    #[test]
    fn test_hard_pass_at_k() {
        assert!(hard_pass_at_k(&[false, true, false], 2).unwrap());
        assert!(!hard_pass_at_k(&[false, false, true], 2).unwrap());
        assert!(hard_pass_at_k(&[true], 1).unwrap());
        assert!(hard_pass_at_k(&[false, true], 3).is_err());
        assert!(hard_pass_at_k(&[true], 0).is_err());
    }
}
