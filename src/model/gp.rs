//! Gaussian process regression surrogate.
//!
//! The GP uses a stationary kernel with ARD lengthscales set to the
//! per-dimension standard deviation of the training inputs, and solves
//! `(K + σ²I) α = y` through a Cholesky decomposition.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `kernel_func` | `Matern52` | Covariance family: `Matern52`, `Matern32` or `RBF` |
//! | `scale_y` | `true` | Standardize targets before fitting |
//! | `scale_x` | `false` | Standardize each input column before fitting |
//! | `noise_kernel` | `false` | Choose the noise variance by maximizing the marginal likelihood |
//! | `use_scikit` | `None` | Accepted for payload compatibility; has no effect |
//!
//! Every fit uses the whole observation history.

use nalgebra::{DMatrix, DVector, Dyn, linalg::Cholesky};
use serde::{Deserialize, Serialize};

use super::{Prediction, SurrogateModel, column_stats};
use crate::error::{Error, Result};
use crate::types::{Observation, Point};

/// Covariance family of the GP.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kernel {
    /// Matérn kernel with ν = 5/2.
    #[default]
    Matern52,
    /// Matérn kernel with ν = 3/2.
    Matern32,
    /// Squared-exponential kernel.
    #[serde(rename = "RBF")]
    Rbf,
}

/// Options of the Gaussian process model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpConfig {
    /// Covariance family.
    pub kernel_func: Kernel,
    /// Standardize targets before fitting.
    pub scale_y: bool,
    /// Standardize inputs before fitting.
    pub scale_x: bool,
    /// Treat observation noise as a hyperparameter.
    pub noise_kernel: bool,
    /// Backend selection flag of older clients. Ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_scikit: Option<bool>,
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            kernel_func: Kernel::Matern52,
            scale_y: true,
            scale_x: false,
            noise_kernel: false,
            use_scikit: None,
        }
    }
}

/// Jitter added to the kernel diagonal, relative to the signal variance.
const DEFAULT_NOISE_VAR: f64 = 1e-6;
/// Largest relative jitter tried before a fit is declared failed.
const MAX_JITTER: f64 = 1e-2;
/// Relative noise levels considered when `noise_kernel` is enabled.
const NOISE_GRID: [f64; 6] = [1e-6, 1e-4, 1e-3, 1e-2, 5e-2, 1e-1];
/// Lower clamp for ARD lengthscales.
const MIN_LENGTHSCALE: f64 = 1e-2;

const SQRT_3: f64 = 1.732_050_807_568_877_2;
const SQRT_5: f64 = 2.236_067_977_499_79;

/// A fitted GP ready for predictions.
struct FittedGp {
    /// Cholesky factor of `K + σ²I`.
    cholesky: Cholesky<f64, Dyn>,
    /// `α = (K + σ²I)⁻¹ y`.
    alpha: DVector<f64>,
    /// Training inputs after input scaling.
    x_train: Vec<Point>,
    x_shift: Vec<f64>,
    x_scale: Vec<f64>,
    lengthscales: Vec<f64>,
    signal_var: f64,
    y_shift: f64,
    y_scale: f64,
}

/// Gaussian process surrogate model.
///
/// # Examples
///
/// ```
/// use boaas::model::{GaussianProcess, GpConfig, SurrogateModel};
/// use boaas::Observation;
///
/// let mut gp = GaussianProcess::new(GpConfig::default());
/// let history: Vec<Observation> = [0.0, 0.5, 1.0]
///     .iter()
///     .enumerate()
///     .map(|(i, &x)| Observation::new(vec![x], x * x, i as u64))
///     .collect();
/// gp.fit(&history).unwrap();
///
/// let p = gp.predict(&[vec![0.5]])[0];
/// assert!((p.mean - 0.25).abs() < 1e-2);
/// ```
pub struct GaussianProcess {
    config: GpConfig,
    fitted: Option<FittedGp>,
    noise_var: f64,
}

impl GaussianProcess {
    /// Creates an unfitted GP.
    #[must_use]
    pub fn new(config: GpConfig) -> Self {
        Self {
            config,
            fitted: None,
            noise_var: DEFAULT_NOISE_VAR,
        }
    }

    /// The configuration this model was built with.
    #[must_use]
    pub fn config(&self) -> &GpConfig {
        &self.config
    }

    /// Noise variance chosen by the last fit, relative to the signal variance.
    #[must_use]
    pub fn noise_variance(&self) -> f64 {
        self.noise_var
    }

    fn kernel(&self, x1: &[f64], x2: &[f64], lengthscales: &[f64], signal_var: f64) -> f64 {
        let r_sq: f64 = x1
            .iter()
            .zip(x2)
            .zip(lengthscales)
            .map(|((a, b), l)| {
                let diff = (a - b) / l;
                diff * diff
            })
            .sum();
        let r = r_sq.sqrt();
        let k = match self.config.kernel_func {
            Kernel::Matern52 => {
                let s = SQRT_5 * r;
                (1.0 + s + 5.0 / 3.0 * r_sq) * (-s).exp()
            }
            Kernel::Matern32 => {
                let s = SQRT_3 * r;
                (1.0 + s) * (-s).exp()
            }
            Kernel::Rbf => (-0.5 * r_sq).exp(),
        };
        signal_var * k
    }

    fn kernel_matrix(&self, x: &[Point], lengthscales: &[f64], signal_var: f64) -> DMatrix<f64> {
        let n = x.len();
        DMatrix::from_fn(n, n, |i, j| {
            self.kernel(&x[i], &x[j], lengthscales, signal_var)
        })
    }

    /// Factorize `K + noise·I`, growing the jitter until the matrix is
    /// positive definite.
    fn factorize(
        &self,
        k: &DMatrix<f64>,
        signal_var: f64,
        noise: f64,
    ) -> Option<(Cholesky<f64, Dyn>, f64)> {
        let n = k.nrows();
        let mut rel = noise;
        loop {
            let mut m = k.clone();
            for i in 0..n {
                m[(i, i)] += rel * signal_var;
            }
            if let Some(chol) = Cholesky::new(m) {
                return Some((chol, rel));
            }
            if rel >= MAX_JITTER {
                return None;
            }
            rel *= 10.0;
        }
    }
}

impl SurrogateModel for GaussianProcess {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, observations: &[Observation]) -> Result<()> {
        self.fitted = None;
        if observations.is_empty() {
            return Ok(());
        }
        let n = observations.len();

        let raw_x: Vec<Point> = observations.iter().map(|o| o.point.clone()).collect();
        let y: Vec<f64> = observations.iter().map(|o| o.value).collect();

        // Input scaling
        let d = raw_x[0].len();
        let (x_shift, x_scale) = if self.config.scale_x {
            let (mean, std) = column_stats(&raw_x);
            let scale = std.into_iter().map(|s| if s > 1e-12 { s } else { 1.0 }).collect();
            (mean, scale)
        } else {
            (vec![0.0; d], vec![1.0; d])
        };
        let x_train: Vec<Point> = raw_x
            .iter()
            .map(|p| scale_point(p, &x_shift, &x_scale))
            .collect();

        // Target scaling
        let y_mean = y.iter().sum::<f64>() / n as f64;
        let (y_shift, y_scale, signal_var) = if self.config.scale_y {
            let var = if n > 1 {
                y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64
            } else {
                1.0
            };
            (y_mean, var.sqrt().max(1e-10), 1.0)
        } else {
            let second_moment = y.iter().map(|v| v * v).sum::<f64>() / n as f64;
            (0.0, 1.0, second_moment.max(1e-10))
        };
        let y_std: Vec<f64> = y.iter().map(|v| (v - y_shift) / y_scale).collect();

        // ARD lengthscales: per-dimension std dev of the training inputs
        let (_, spread) = column_stats(&x_train);
        let lengthscales: Vec<f64> = spread.into_iter().map(|s| s.max(MIN_LENGTHSCALE)).collect();

        let k = self.kernel_matrix(&x_train, &lengthscales, signal_var);
        let y_vec = DVector::from_column_slice(&y_std);

        let candidates: &[f64] = if self.config.noise_kernel {
            &NOISE_GRID
        } else {
            &[DEFAULT_NOISE_VAR]
        };

        let mut best: Option<(f64, Cholesky<f64, Dyn>, f64)> = None;
        for &noise in candidates {
            let Some((chol, used)) = self.factorize(&k, signal_var, noise) else {
                continue;
            };
            let alpha = chol.solve(&y_vec);
            let lml = log_marginal_likelihood(&chol, &alpha, &y_vec);
            if best.as_ref().is_none_or(|(b, _, _)| lml > *b) {
                best = Some((lml, chol, used));
            }
        }
        let Some((_, cholesky, noise_var)) = best else {
            return Err(Error::ModelFit(format!(
                "kernel matrix of {n} points is not positive definite"
            )));
        };

        let alpha = cholesky.solve(&y_vec);
        self.noise_var = noise_var;
        self.fitted = Some(FittedGp {
            cholesky,
            alpha,
            x_train,
            x_shift,
            x_scale,
            lengthscales,
            signal_var,
            y_shift,
            y_scale,
        });
        Ok(())
    }

    fn predict(&self, points: &[Point]) -> Vec<Prediction> {
        let Some(model) = &self.fitted else {
            return vec![
                Prediction {
                    mean: 0.0,
                    variance: 0.0
                };
                points.len()
            ];
        };
        points
            .iter()
            .map(|p| {
                let x = scale_point(p, &model.x_shift, &model.x_scale);
                let k_star = DVector::from_fn(model.x_train.len(), |i, _| {
                    self.kernel(&x, &model.x_train[i], &model.lengthscales, model.signal_var)
                });
                let mean = k_star.dot(&model.alpha);
                let v = model.cholesky.solve(&k_star);
                let var = (model.signal_var - k_star.dot(&v)).max(0.0);
                Prediction {
                    mean: mean * model.y_scale + model.y_shift,
                    variance: var * model.y_scale * model.y_scale,
                }
            })
            .collect()
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

fn scale_point(p: &[f64], shift: &[f64], scale: &[f64]) -> Point {
    p.iter()
        .zip(shift.iter().zip(scale))
        .map(|(v, (s, c))| (v - s) / c)
        .collect()
}

/// `log p(y | X) = -½ yᵀα - Σ log Lᵢᵢ - n/2 log 2π`
#[allow(clippy::cast_precision_loss)]
fn log_marginal_likelihood(chol: &Cholesky<f64, Dyn>, alpha: &DVector<f64>, y: &DVector<f64>) -> f64 {
    let l = chol.l_dirty();
    let n = y.len();
    let log_det: f64 = (0..n).map(|i| l[(i, i)].ln()).sum();
    -0.5 * y.dot(alpha) - log_det - 0.5 * n as f64 * core::f64::consts::TAU.ln()
}
