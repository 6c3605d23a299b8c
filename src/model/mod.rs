//! Surrogate models: cheap statistical stand-ins for the black-box objective.
//!
//! A [`SurrogateModel`] is fitted on the full observation history and
//! predicts a mean and variance for unobserved points. The acquisition
//! engine only relies on that contract, so models are interchangeable:
//!
//! | Model | Config key | Notes |
//! |-------|------------|-------|
//! | [`GaussianProcess`] | `gaussian_process` | Matérn 5/2, Matérn 3/2 or RBF kernel, Cholesky solve |
//! | [`RandomForest`] | `random_forest` | Bagged regression trees; variance across trees |
//!
//! Fitting is deterministic: fitting twice on the same observations gives
//! the same predictions.

mod forest;
mod gp;

pub use forest::{ForestConfig, RandomForest};
pub use gp::{GaussianProcess, GpConfig, Kernel};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Observation, Point};

/// Predictive distribution of the model at one point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted mean, in objective units.
    pub mean: f64,
    /// Predicted variance, in squared objective units. Never negative.
    pub variance: f64,
}

impl Prediction {
    /// Standard deviation of the prediction.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }
}

/// A regression model fitted on observations that predicts mean and variance.
pub trait SurrogateModel: Send {
    /// Fit the model on `observations`, replacing any previous fit.
    ///
    /// An empty slice leaves the model unfitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelFit`](crate::Error::ModelFit) if the model
    /// cannot be fitted; the model is left unfitted in that case.
    fn fit(&mut self, observations: &[Observation]) -> Result<()>;

    /// Predict the mean and variance at each point.
    ///
    /// An unfitted model predicts zero mean with zero variance.
    fn predict(&self, points: &[Point]) -> Vec<Prediction>;

    /// Returns `true` once [`fit`](Self::fit) succeeded on a non-empty history.
    fn is_fitted(&self) -> bool;
}

/// Surrogate model selection, as found under the `model` key of an
/// experiment payload.
///
/// ```
/// use boaas::model::{Kernel, ModelConfig};
///
/// let config: ModelConfig = serde_json::from_str(
///     r#"{"gaussian_process": {"kernel_func": "Matern52", "scale_y": true, "noise_kernel": true}}"#,
/// )
/// .unwrap();
/// let ModelConfig::GaussianProcess(gp) = config else { unreachable!() };
/// assert_eq!(gp.kernel_func, Kernel::Matern52);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelConfig {
    /// A Gaussian process regressor.
    GaussianProcess(GpConfig),
    /// A random forest regressor.
    RandomForest(ForestConfig),
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::GaussianProcess(GpConfig::default())
    }
}

impl ModelConfig {
    /// Instantiate an unfitted model for this configuration.
    #[must_use]
    pub fn build(&self) -> Box<dyn SurrogateModel> {
        match self {
            Self::GaussianProcess(c) => Box::new(GaussianProcess::new(c.clone())),
            Self::RandomForest(c) => Box::new(RandomForest::new(c.clone())),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::GaussianProcess(_) => Ok(()),
            Self::RandomForest(c) => c.validate(),
        }
    }
}

/// Drop observations more than three standard deviations from the mean value.
///
/// Returns the input unchanged when the values have no spread.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn without_outliers(observations: &[Observation]) -> Vec<Observation> {
    const MAX_Z: f64 = 3.0;

    let n = observations.len();
    if n < 2 {
        return observations.to_vec();
    }
    let mean = observations.iter().map(|o| o.value).sum::<f64>() / n as f64;
    let var = observations
        .iter()
        .map(|o| (o.value - mean).powi(2))
        .sum::<f64>()
        / (n - 1) as f64;
    let std = var.sqrt();
    if std <= 0.0 {
        return observations.to_vec();
    }
    observations
        .iter()
        .filter(|o| ((o.value - mean) / std).abs() <= MAX_Z)
        .cloned()
        .collect()
}

/// Mean and (population) standard deviation of each column of `x`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn column_stats(x: &[Point]) -> (Vec<f64>, Vec<f64>) {
    let n = x.len();
    let d = x.first().map_or(0, Vec::len);
    if n == 0 {
        return (vec![0.0; d], vec![0.0; d]);
    }
    (0..d)
        .map(|j| {
            let mean = x.iter().map(|p| p[j]).sum::<f64>() / n as f64;
            let var = x.iter().map(|p| (p[j] - mean).powi(2)).sum::<f64>() / n as f64;
            (mean, var.sqrt())
        })
        .unzip()
}
