//! Stochastic Dual Coordinate Ascent (SDCA) for maximum-entropy classification
//!
//! Minimizes the L2-regularized multinomial log-loss
//!
//! ```text
//! P(W, b) = 1/n Σ_i [ logsumexp(z_i) - z_i[y_i] ] + λ/2 (‖W‖² + ‖b‖²),   z_i = W x_i + b
//! ```
//!
//! through its dual. Every row keeps a distribution `q_i` over the classes
//! (initially the one-hot label) and the primal weights are tied to it by
//! `W = 1/(λn) Σ_i x_i (y_i - q_i)ᵀ`, with the bias treated as a weight on a
//! constant feature. Visiting a row moves `q_i` toward the current softmax
//! `p_i` along `q_i ← (1 - t) q_i + t p_i`, picking the `t ∈ (0, 1]` that
//! maximizes the dual objective exactly. `q_i` therefore stays on the simplex
//! and the dual objective never decreases.
//!
//! The duality gap `P - D` bounds the distance to the optimum and is the
//! stopping criterion.

use crate::core::{DigitError, FeatureSource, Result, TrainerConfig, TrainingResult};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Bisection steps for the per-row line search
const LINE_SEARCH_STEPS: usize = 30;

/// Squared step norm below which a row is considered converged
const MIN_DIRECTION_NORM: f64 = 1e-18;

/// SDCA solver for multinomial logistic regression
pub struct SdcaSolver {
    config: TrainerConfig,
    num_classes: usize,
}

/// Mutable optimization state
struct SdcaState {
    weights: Vec<f64>,
    bias: Vec<f64>,
    /// Row-major `n × K` dual distributions
    dual: Vec<f64>,
    dim: usize,
    num_classes: usize,
}

impl SdcaState {
    fn new(dim: usize, num_classes: usize, labels: impl Iterator<Item = usize>) -> Self {
        let mut dual = Vec::new();
        for label in labels {
            let start = dual.len();
            dual.resize(start + num_classes, 0.0);
            dual[start + label] = 1.0;
        }
        Self {
            weights: vec![0.0; num_classes * dim],
            bias: vec![0.0; num_classes],
            dual,
            dim,
            num_classes,
        }
    }

    /// Linear scores `W x + b` into `out`
    fn scores_into(&self, x: &[f64], out: &mut [f64]) {
        for (k, score) in out.iter_mut().enumerate() {
            let w = &self.weights[k * self.dim..(k + 1) * self.dim];
            *score = dot(w, x) + self.bias[k];
        }
    }

    fn regularizer_norm(&self) -> f64 {
        self.weights.iter().map(|w| w * w).sum::<f64>() + self.bias.iter().map(|b| b * b).sum::<f64>()
    }
}

/// Primal and dual objective values at the current iterate
#[derive(Debug, Clone, Copy)]
struct Objectives {
    primal: f64,
    dual: f64,
}

impl Objectives {
    fn gap(&self) -> f64 {
        self.primal - self.dual
    }

    fn relative_gap(&self) -> f64 {
        self.gap() / self.primal.abs().max(1e-12)
    }
}

impl SdcaSolver {
    /// Create a new solver for `num_classes` classes
    pub fn new(config: TrainerConfig, num_classes: usize) -> Self {
        Self {
            config,
            num_classes,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit weights and biases on the given rows
    pub fn solve<F: FeatureSource + ?Sized>(&self, data: &F) -> Result<TrainingResult> {
        self.config.validate()?;
        if data.is_empty() {
            return Err(DigitError::EmptyDataset);
        }
        if self.num_classes < 2 {
            return Err(DigitError::InvalidParameter(format!(
                "at least 2 classes are required, got {}",
                self.num_classes
            )));
        }

        let n = data.len();
        let dim = data.dim();
        let k_classes = self.num_classes;

        for i in 0..n {
            let label = data.label(i);
            if label >= k_classes {
                return Err(DigitError::InvalidParameter(format!(
                    "label {label} at row {i} is outside [0, {k_classes})"
                )));
            }
        }

        let lambda_n = self.config.l2 * n as f64;
        let mut state = SdcaState::new(dim, k_classes, (0..n).map(|i| data.label(i)));

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..n).collect();

        let mut scores = vec![0.0; k_classes];
        let mut probs = vec![0.0; k_classes];
        let mut direction = vec![0.0; k_classes];

        let mut epochs = 0;
        let mut converged = false;

        // max_epochs >= 1 is validated, so at least one pass runs
        let objectives = loop {
            if self.config.shuffle {
                order.shuffle(&mut rng);
            }

            for &i in &order {
                let x = data.features(i);
                let norm_sq = data.norm_squared(i) + 1.0; // constant bias feature

                state.scores_into(&x, &mut scores);
                softmax_into(&scores, &mut probs);

                let q = &state.dual[i * k_classes..(i + 1) * k_classes];
                let mut direction_norm = 0.0;
                for k in 0..k_classes {
                    direction[k] = q[k] - probs[k];
                    direction_norm += direction[k] * direction[k];
                }
                if direction_norm < MIN_DIRECTION_NORM {
                    continue;
                }

                let curvature = norm_sq * direction_norm / lambda_n;
                let t = line_search(q, &probs, &direction, &scores, curvature);

                for k in 0..k_classes {
                    let coeff = t * direction[k] / lambda_n;
                    if coeff != 0.0 {
                        let w = &mut state.weights[k * dim..(k + 1) * dim];
                        axpy(coeff, &x, w);
                        state.bias[k] += coeff;
                    }
                }

                let q = &mut state.dual[i * k_classes..(i + 1) * k_classes];
                for k in 0..k_classes {
                    q[k] = ((1.0 - t) * q[k] + t * probs[k]).max(0.0);
                }
            }

            epochs += 1;

            if !state.weights.iter().chain(state.bias.iter()).all(|w| w.is_finite()) {
                return Err(DigitError::OptimizationError(format!(
                    "weights diverged at epoch {epochs}"
                )));
            }

            let objectives = self.objectives(data, &state);
            debug!(
                "SDCA epoch {}: primal={:.6} dual={:.6} gap={:.3e}",
                epochs,
                objectives.primal,
                objectives.dual,
                objectives.gap()
            );

            if objectives.relative_gap() <= self.config.tolerance {
                converged = true;
                break objectives;
            }
            if epochs >= self.config.max_epochs {
                break objectives;
            }
        };

        if !converged {
            warn!(
                "SDCA stopped after {} epochs with relative duality gap {:.4} (tolerance {})",
                epochs,
                objectives.relative_gap(),
                self.config.tolerance
            );
        }

        Ok(TrainingResult {
            weights: state.weights,
            bias: state.bias,
            dim,
            epochs,
            primal_objective: objectives.primal,
            duality_gap: objectives.gap(),
            converged,
        })
    }

    /// Full pass computing the primal and dual objectives
    fn objectives<F: FeatureSource + ?Sized>(&self, data: &F, state: &SdcaState) -> Objectives {
        let n = data.len();
        let k_classes = state.num_classes;
        let mut scores = vec![0.0; k_classes];

        let mut loss = 0.0;
        let mut entropy = 0.0;
        for i in 0..n {
            let x = data.features(i);
            state.scores_into(&x, &mut scores);
            loss += log_sum_exp(&scores) - scores[data.label(i)];

            let q = &state.dual[i * k_classes..(i + 1) * k_classes];
            entropy -= q.iter().filter(|&&v| v > 0.0).map(|&v| v * v.ln()).sum::<f64>();
        }

        let reg = 0.5 * self.config.l2 * state.regularizer_norm();
        Objectives {
            primal: loss / n as f64 + reg,
            dual: entropy / n as f64 - reg,
        }
    }
}

/// Maximize the dual along `q ← (1 - t) q + t p` for `t ∈ [0, 1]`
///
/// The derivative (scaled by n) is
/// `g(t) = Σ_k d_k ln r_k(t) - Σ_k d_k z_k - t · curvature`
/// with `d = q - p` and `r(t) = (1 - t) q + t p`. It is strictly decreasing,
/// and `g(0) ≥ 0`, so the maximizer is 1 when `g(1) ≥ 0` and the root of
/// `g` otherwise.
fn line_search(q: &[f64], p: &[f64], d: &[f64], z: &[f64], curvature: f64) -> f64 {
    let linear: f64 = d.iter().zip(z).map(|(d, z)| d * z).sum();
    let derivative = |t: f64| -> f64 {
        let mut entropy_term = 0.0;
        for k in 0..d.len() {
            if d[k] != 0.0 {
                let r = (1.0 - t) * q[k] + t * p[k];
                entropy_term += d[k] * r.max(f64::MIN_POSITIVE).ln();
            }
        }
        entropy_term - linear - t * curvature
    };

    if derivative(1.0) >= 0.0 {
        return 1.0;
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    for _ in 0..LINE_SEARCH_STEPS {
        let mid = 0.5 * (lo + hi);
        if derivative(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Numerically stable `ln Σ exp(v)`
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Softmax of `scores` into `out`
pub fn softmax_into(scores: &[f64], out: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut total = 0.0;
    for (o, &s) in out.iter_mut().zip(scores) {
        *o = (s - max).exp();
        total += *o;
    }
    for o in out.iter_mut() {
        *o /= total;
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::borrow::Cow;

    /// Minimal in-memory feature source
    struct Rows {
        rows: Vec<Vec<f64>>,
        labels: Vec<usize>,
    }

    impl FeatureSource for Rows {
        fn len(&self) -> usize {
            self.rows.len()
        }
        fn dim(&self) -> usize {
            self.rows[0].len()
        }
        fn label(&self, i: usize) -> usize {
            self.labels[i]
        }
        fn features(&self, i: usize) -> Cow<'_, [f64]> {
            Cow::Borrowed(&self.rows[i])
        }
    }

    fn two_blobs() -> Rows {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let jitter = i as f64 * 0.05;
            rows.push(vec![1.0 + jitter, 0.1, 0.0]);
            labels.push(0);
            rows.push(vec![0.1, 1.0 + jitter, 0.0]);
            labels.push(1);
        }
        Rows { rows, labels }
    }

    fn config() -> TrainerConfig {
        TrainerConfig {
            l2: 1e-2,
            tolerance: 1e-3,
            max_epochs: 1000,
            seed: Some(42),
            ..TrainerConfig::default()
        }
    }

    fn accuracy(result: &TrainingResult, data: &Rows, k_classes: usize) -> f64 {
        let mut scores = vec![0.0; k_classes];
        let mut correct = 0;
        for (row, &label) in data.rows.iter().zip(&data.labels) {
            for k in 0..k_classes {
                let w = &result.weights[k * result.dim..(k + 1) * result.dim];
                scores[k] = dot(w, row) + result.bias[k];
            }
            if crate::core::argmax(&scores) == label {
                correct += 1;
            }
        }
        correct as f64 / data.rows.len() as f64
    }

    #[test]
    fn test_sdca_separable_two_classes() {
        let data = two_blobs();
        let result = SdcaSolver::new(config(), 2).solve(&data).unwrap();

        assert_eq!(result.weights.len(), 2 * 3);
        assert_eq!(result.bias.len(), 2);
        assert!(result.epochs >= 1);
        assert_eq!(accuracy(&result, &data, 2), 1.0);
    }

    #[test]
    fn test_sdca_converges_to_small_gap() {
        let data = two_blobs();
        let result = SdcaSolver::new(config(), 2).solve(&data).unwrap();

        assert!(result.converged, "gap {} after {} epochs", result.duality_gap, result.epochs);
        assert!(result.duality_gap >= -1e-9);
        assert!(result.duality_gap <= 1e-3 * result.primal_objective + 1e-12);
    }

    #[test]
    fn test_sdca_gap_shrinks_with_epochs() {
        let data = two_blobs();
        let short = TrainerConfig {
            max_epochs: 1,
            tolerance: 0.0,
            ..config()
        };
        let long = TrainerConfig {
            max_epochs: 5,
            tolerance: 0.0,
            ..config()
        };
        let short = SdcaSolver::new(short, 2).solve(&data).unwrap();
        let long = SdcaSolver::new(long, 2).solve(&data).unwrap();

        assert_eq!(short.epochs, 1);
        assert!(!short.converged);
        assert!(short.duality_gap >= -1e-9);
        assert!(long.duality_gap <= short.duality_gap);
        assert!(!long.converged);
        assert_eq!(long.epochs, 5);
    }

    #[test]
    fn test_sdca_unused_classes_get_negative_scores() {
        let data = two_blobs();
        let result = SdcaSolver::new(config(), 4).solve(&data).unwrap();

        // Classes 2 and 3 never appear, so only dual mass pulls on them
        assert!(result.bias[2] < 0.0);
        assert!(result.bias[3] < 0.0);
        assert_relative_eq!(result.bias[2], result.bias[3], epsilon = 1e-9);
        assert_eq!(accuracy(&result, &data, 4), 1.0);
    }

    #[test]
    fn test_sdca_deterministic_with_seed() {
        let data = two_blobs();
        let a = SdcaSolver::new(config(), 2).solve(&data).unwrap();
        let b = SdcaSolver::new(config(), 2).solve(&data).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
    }

    #[test]
    fn test_sdca_rejects_bad_input() {
        let empty = Rows {
            rows: vec![],
            labels: vec![],
        };
        assert!(matches!(
            SdcaSolver::new(config(), 2).solve(&empty),
            Err(DigitError::EmptyDataset)
        ));

        let data = two_blobs();
        assert!(SdcaSolver::new(config(), 1).solve(&data).is_err());

        let bad_label = Rows {
            rows: vec![vec![1.0]],
            labels: vec![5],
        };
        assert!(SdcaSolver::new(config(), 2).solve(&bad_label).is_err());

        let bad_config = TrainerConfig {
            l2: -1.0,
            ..config()
        };
        assert!(SdcaSolver::new(bad_config, 2).solve(&data).is_err());
    }

    #[test]
    fn test_softmax_and_log_sum_exp() {
        let scores = [1000.0, 1000.0];
        let mut probs = [0.0; 2];
        softmax_into(&scores, &mut probs);
        assert_relative_eq!(probs[0], 0.5);
        assert_relative_eq!(probs[1], 0.5);
        assert_relative_eq!(log_sum_exp(&scores), 1000.0 + 2f64.ln());

        let scores = [0.0, 0.0, 0.0];
        assert_relative_eq!(log_sum_exp(&scores), 3f64.ln());
    }

    #[test]
    fn test_line_search_stays_in_unit_interval() {
        let q = [1.0, 0.0];
        let p = [0.5, 0.5];
        let d = [0.5, -0.5];
        let z = [0.0, 0.0];

        let t = line_search(&q, &p, &d, &z, 0.0);
        assert_eq!(t, 1.0);

        let t = line_search(&q, &p, &d, &z, 1e6);
        assert!(t > 0.0 && t < 1.0);
    }
}
