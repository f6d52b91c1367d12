//! Gaussian smoothing of a count series for trend charts.
//!
//! Kernel: `exp(-x² / 2σ²)` sampled on `[-r, r]` with `r = floor(4σ + 0.5)`,
//! normalised to sum 1. Edges use half-sample reflection
//! (`d c b a | a b c d | d c b a`), repeated when the kernel is longer than
//! the series. Reflection has period `2n`, so a kernel longer than that is
//! folded onto `2n` taps first. Output is display-only and never
//! re-aggregated.

use serde::{Deserialize, Serialize};

use crate::aggregate::Bucket;
pub use crate::error::MAX_SIGMA;
use crate::error::{check_sigma, Result};

/// Kernel half-width in standard deviations.
pub const TRUNCATE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedPoint {
    pub start_seconds: f64,
    pub value: f64,
}

/// How samples beyond either end of the series are synthesised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    #[default]
    Reflect,
}

/// Normalised Gaussian weights, length `2r + 1`. Sigmas above
/// [`MAX_SIGMA`] are rejected as `InvalidSigma`.
pub fn gaussian_kernel(sigma: f64) -> Result<Vec<f64>> {
    check_sigma(sigma)?;
    let radius = (TRUNCATE * sigma + 0.5).floor() as i64;
    let denom = 2.0 * sigma * sigma;

    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / denom).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    Ok(weights)
}

pub fn smooth(counts: &[f64], sigma: f64) -> Result<Vec<f64>> {
    let kernel = gaussian_kernel(sigma)?;
    if counts.is_empty() {
        return Ok(Vec::new());
    }

    let n = counts.len() as i64;
    let radius = (kernel.len() / 2) as i64;
    let period = 2 * n;

    // (offset, weight) pairs; offsets a multiple of 2n apart read the same sample
    let taps: Vec<(i64, f64)> = if kernel.len() as i64 > period {
        let mut folded = vec![0.0_f64; period as usize];
        for (k, w) in kernel.iter().enumerate() {
            folded[(k as i64 - radius).rem_euclid(period) as usize] += *w;
        }
        folded
            .into_iter()
            .enumerate()
            .map(|(m, w)| (m as i64, w))
            .collect()
    } else {
        kernel
            .iter()
            .enumerate()
            .map(|(k, &w)| (k as i64 - radius, w))
            .collect()
    };

    let out: Vec<f64> = (0..n)
        .map(|i| {
            taps.iter()
                .map(|&(off, w)| w * counts[reflect(i + off, n)])
                .sum::<f64>()
        })
        .collect();
    Ok(out)
}

/// Smooth bucket counts and keep their start times.
pub fn smooth_buckets(buckets: &[Bucket], sigma: f64) -> Result<Vec<SmoothedPoint>> {
    let counts: Vec<f64> = buckets.iter().map(|b| b.count as f64).collect();
    let values = smooth(&counts, sigma)?;
    Ok(buckets
        .iter()
        .zip(values)
        .map(|(b, value)| SmoothedPoint {
            start_seconds: b.start_seconds,
            value,
        })
        .collect())
}

/// Map any index onto `[0, n)` by half-sample symmetric reflection.
fn reflect(i: i64, n: i64) -> usize {
    let period = 2 * n;
    let m = i.rem_euclid(period);
    let idx = if m < n { m } else { period - 1 - m };
    idx as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DensityError;

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let k = gaussian_kernel(2.0).unwrap();
        assert_eq!(k.len(), 17); // r = floor(8.5) = 8
        let sum: f64 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for i in 0..k.len() / 2 {
            assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-15);
        }
        assert!(k[8] > k[7]);
    }

    #[test]
    fn reflect_indices() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        // kernel wider than series wraps around again
        assert_eq!(reflect(8, 4), 0);
        assert_eq!(reflect(-9, 4), 0);
        assert_eq!(reflect(0, 1), 0);
        assert_eq!(reflect(7, 1), 0);
    }

    #[test]
    fn constant_series_stays_constant() {
        // reflection preserves constants exactly at the edges
        let out = smooth(&[5.0; 10], 2.0).unwrap();
        for v in out {
            assert!((v - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn impulse_spreads_and_preserves_mass_away_from_edges() {
        let mut xs = vec![0.0; 41];
        xs[20] = 10.0;
        let out = smooth(&xs, 2.0).unwrap();
        let total: f64 = out.iter().sum();
        assert!((total - 10.0).abs() < 1e-9);
        assert!(out[20] < 10.0);
        assert!(out[19] > 0.0 && out[21] > 0.0);
        assert!((out[19] - out[21]).abs() < 1e-12);
    }

    #[test]
    fn length_and_determinism() {
        let xs = [3.0, 0.0, 7.0, 1.0, 1.0];
        let a = smooth(&xs, 1.5).unwrap();
        let b = smooth(&xs, 1.5).unwrap();
        assert_eq!(a.len(), xs.len());
        assert_eq!(
            a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn empty_and_bad_sigma() {
        assert!(smooth(&[], 2.0).unwrap().is_empty());
        assert!(matches!(
            smooth(&[1.0], 0.0),
            Err(DensityError::InvalidSigma { .. })
        ));
        assert!(matches!(
            smooth(&[], -1.0),
            Err(DensityError::InvalidSigma { .. })
        ));
    }

    #[test]
    fn huge_sigma_is_rejected_not_allocated() {
        assert!(matches!(
            smooth(&[1.0, 2.0, 3.0], 1e300),
            Err(DensityError::InvalidSigma { .. })
        ));
        assert!(matches!(
            gaussian_kernel(MAX_SIGMA * 4.0),
            Err(DensityError::InvalidSigma { .. })
        ));
    }

    #[test]
    fn widest_kernel_flattens_a_short_series() {
        let out = smooth(&[1.0, 2.0, 3.0], MAX_SIGMA).unwrap();
        assert_eq!(out.len(), 3);
        for v in out {
            assert!((v - 2.0).abs() < 1e-6, "{v}");
        }
    }

    #[test]
    fn folded_kernel_matches_direct_convolution() {
        // kernel of 17 taps over a 3-sample series (period 6) gets folded
        let xs = [4.0, 0.0, 1.0];
        let k = gaussian_kernel(2.0).unwrap();
        let direct: Vec<f64> = (0..3i64)
            .map(|i| {
                k.iter()
                    .enumerate()
                    .map(|(j, w)| w * xs[reflect(i + j as i64 - 8, 3)])
                    .sum::<f64>()
            })
            .collect();
        let folded = smooth(&xs, 2.0).unwrap();
        for (a, b) in direct.iter().zip(&folded) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn buckets_keep_their_starts() {
        let buckets = vec![
            Bucket {
                start_seconds: 0.0,
                count: 4,
            },
            Bucket {
                start_seconds: 70.0,
                count: 0,
            },
        ];
        let out = smooth_buckets(&buckets, 2.0).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].start_seconds, 0.0);
        assert_eq!(out[1].start_seconds, 70.0);
        // reflection conserves total mass even when the kernel overhangs both ends
        assert!((out[0].value + out[1].value - 4.0).abs() < 1e-9);
    }
}
