//! Normalized sinc-kernel smoothing of the raw histogram.
//!
//! `out[i] = max(0, Σ_j in[j]·k(i-j) / Σ_j k(i-j))` with
//! `k(d) = sinc(d / (length + 1))`. The kernel spans the whole curve and is
//! renormalized per output bin, so edge bins are not attenuated. This exact
//! form determines where zone levels land and must not be simplified.

use std::f64::consts::PI;

/// Normalized sinc: `sin(πx) / (πx)`, with `sinc(0) = 1`.
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSmoother {
    length: usize,
}

impl SignalSmoother {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn smooth(&self, input: &[f64]) -> Vec<f64> {
        if self.length == 0 || input.is_empty() {
            return input.to_vec();
        }
        let bandwidth = (self.length + 1) as f64;
        let n = input.len();
        let kernel: Vec<f64> = (0..n).map(|d| sinc(d as f64 / bandwidth)).collect();

        (0..n)
            .map(|i| {
                let mut sum = 0.0;
                let mut norm = 0.0;
                for (j, &v) in input.iter().enumerate() {
                    let w = kernel[i.abs_diff(j)];
                    sum += v * w;
                    norm += w;
                }
                if norm > 0.0 {
                    (sum / norm).max(0.0)
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} != {b}");
    }

    #[test]
    fn sinc_values() {
        assert_eq!(sinc(0.0), 1.0);
        assert_approx(sinc(1.0), 0.0, 1e-15);
        assert_approx(sinc(0.5), 2.0 / PI, 1e-15);
        assert_approx(sinc(-0.25), sinc(0.25), 1e-15);
    }

    #[test]
    fn flat_histogram_stays_flat() {
        let input = vec![3.0; 75];
        let out = SignalSmoother::new(3).smooth(&input);
        for v in out {
            assert_approx(v, 3.0, 1e-9);
        }
    }

    #[test]
    fn zero_length_is_identity() {
        let input = vec![1.0, 5.0, 2.0];
        assert_eq!(SignalSmoother::new(0).smooth(&input), input);
    }

    #[test]
    fn output_is_non_negative() {
        let mut input = vec![0.0; 40];
        input[20] = 100.0;
        let out = SignalSmoother::new(3).smooth(&input);
        assert!(out.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn isolated_spike_keeps_its_position() {
        let mut input = vec![0.0; 41];
        input[20] = 10.0;
        let out = SignalSmoother::new(3).smooth(&input);
        let argmax = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(argmax, Some(20));
        // symmetric around the spike
        assert_approx(out[19], out[21], 1e-12);
        assert!(out[20] < 10.0);
    }
}
