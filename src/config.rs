//! Typed experiment configuration.
//!
//! [`ExperimentConfig`] mirrors the JSON payload accepted by
//! [`BoaService::create_experiment_json`](crate::BoaService::create_experiment_json):
//!
//! ```json
//! {
//!   "name": "core-tuning",
//!   "domain": [[1, 2], [3, 4]],
//!   "model": {"gaussian_process": {"kernel_func": "Matern52", "scale_y": true}},
//!   "optimization_type": "max",
//!   "initialization": {"type": "random", "random": {"no_samples": 3, "seed": 7}},
//!   "sampling_function": {"type": "expected_improvement", "epsilon": 0.1}
//! }
//! ```
//!
//! Unknown keys are rejected at every level.

use serde::{Deserialize, Serialize};

use crate::acquisition::AcquisitionFunction;
use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::model::ModelConfig;
use crate::types::Direction;

/// Full configuration of one experiment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Human-readable experiment name.
    pub name: String,
    /// The search space.
    pub domain: Domain,
    /// Surrogate model; a Matérn 5/2 Gaussian process when omitted.
    #[serde(default)]
    pub model: ModelConfig,
    /// Whether to maximize or minimize the objective.
    pub optimization_type: Direction,
    /// How the first points are chosen.
    #[serde(default)]
    pub initialization: InitializationConfig,
    /// How later points are chosen.
    #[serde(default)]
    pub sampling_function: SamplingConfig,
}

/// Initialization strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct InitializationConfig {
    /// Strategy selector; only `"random"` is supported.
    #[serde(rename = "type", default)]
    pub kind: InitializationKind,
    /// Options of the random strategy.
    #[serde(default)]
    pub random: RandomInit,
}

/// Initialization strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitializationKind {
    /// Uniform random sampling of the domain.
    #[default]
    Random,
}

/// Options of the random initialization strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomInit {
    /// Number of random points evaluated before the model takes over.
    pub no_samples: usize,
    /// Seed of the initialization sample and of candidate generation.
    /// `None` draws from system entropy.
    pub seed: Option<u64>,
}

impl Default for RandomInit {
    fn default() -> Self {
        Self {
            no_samples: 3,
            seed: None,
        }
    }
}

/// Options of the acquisition step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    /// Acquisition function.
    #[serde(rename = "type")]
    pub kind: AcquisitionFunction,
    /// Minimum improvement margin, in objective units.
    pub epsilon: f64,
    /// Refine the best random candidate by local search (bounded domains only).
    pub optimize_acq: bool,
    /// Exclude 3-sigma outliers from the model fit.
    pub outlier: bool,
    /// Optional per-dimension `(min, max)` restriction of the search region.
    pub bounds: Option<Vec<(f64, f64)>>,
    /// Exploration weight of the upper confidence bound.
    pub kappa: f64,
    /// Number of random candidates scored on bounded domains.
    pub n_candidates: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            kind: AcquisitionFunction::default(),
            epsilon: 0.0,
            optimize_acq: false,
            outlier: false,
            bounds: None,
            kappa: 1.96,
            n_candidates: 1000,
        }
    }
}

impl ExperimentConfig {
    /// Start building a configuration programmatically.
    ///
    /// # Examples
    ///
    /// ```
    /// use boaas::config::ExperimentConfig;
    /// use boaas::{Direction, Domain};
    ///
    /// let domain = Domain::discrete(vec![vec![1.0], vec![2.0]]).unwrap();
    /// let config = ExperimentConfig::builder("demo", domain)
    ///     .maximize()
    ///     .no_samples(2)
    ///     .seed(11)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.optimization_type, Direction::Maximize);
    /// ```
    #[must_use]
    pub fn builder(name: impl Into<String>, domain: Domain) -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::new(name.into(), domain)
    }

    /// Parse and validate a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the payload is malformed, carries an
    /// unknown key, or fails [`validate`](Self::validate).
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field invariants of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("experiment name must not be empty".into()));
        }
        self.domain.validate_shape()?;
        self.model.validate()?;

        let s = &self.sampling_function;
        if !s.epsilon.is_finite() || s.epsilon < 0.0 {
            return Err(Error::Config(format!(
                "sampling_function.epsilon must be finite and >= 0, got {}",
                s.epsilon
            )));
        }
        if !s.kappa.is_finite() || s.kappa < 0.0 {
            return Err(Error::Config(format!(
                "sampling_function.kappa must be finite and >= 0, got {}",
                s.kappa
            )));
        }
        if s.n_candidates == 0 {
            return Err(Error::Config(
                "sampling_function.n_candidates must be positive".into(),
            ));
        }
        if let Some(bounds) = &s.bounds {
            Domain::bounded(bounds.clone())?;
        }
        self.search_domain().map(|_| ())
    }

    /// The acquisition search region: the domain restricted to
    /// `sampling_function.bounds`, if any.
    pub(crate) fn search_domain(&self) -> Result<Domain> {
        match &self.sampling_function.bounds {
            Some(bounds) => self.domain.restrict(bounds),
            None => Ok(self.domain.clone()),
        }
    }
}

/// A builder for [`ExperimentConfig`].
///
/// # Defaults
///
/// - Direction: [`Maximize`](Direction::Maximize)
/// - Model: Matérn 5/2 Gaussian process
/// - Initialization: 3 random samples, unseeded
/// - Acquisition: expected improvement, `epsilon = 0`
pub struct ExperimentConfigBuilder {
    config: ExperimentConfig,
}

impl ExperimentConfigBuilder {
    fn new(name: String, domain: Domain) -> Self {
        Self {
            config: ExperimentConfig {
                name,
                domain,
                model: ModelConfig::default(),
                optimization_type: Direction::Maximize,
                initialization: InitializationConfig::default(),
                sampling_function: SamplingConfig::default(),
            },
        }
    }

    /// Maximize the objective (the default).
    #[must_use]
    pub fn maximize(mut self) -> Self {
        self.config.optimization_type = Direction::Maximize;
        self
    }

    /// Minimize the objective.
    #[must_use]
    pub fn minimize(mut self) -> Self {
        self.config.optimization_type = Direction::Minimize;
        self
    }

    /// Set the surrogate model.
    #[must_use]
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.config.model = model;
        self
    }

    /// Number of random initialization samples.
    #[must_use]
    pub fn no_samples(mut self, n: usize) -> Self {
        self.config.initialization.random.no_samples = n;
        self
    }

    /// Seed initialization and candidate generation.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.initialization.random.seed = Some(seed);
        self
    }

    /// Set the acquisition function.
    #[must_use]
    pub fn acquisition(mut self, function: AcquisitionFunction) -> Self {
        self.config.sampling_function.kind = function;
        self
    }

    /// Minimum improvement margin for expected and probable improvement.
    #[must_use]
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.sampling_function.epsilon = epsilon;
        self
    }

    /// Refine the acquisition maximizer by local search.
    #[must_use]
    pub fn optimize_acq(mut self, enabled: bool) -> Self {
        self.config.sampling_function.optimize_acq = enabled;
        self
    }

    /// Exclude 3-sigma outliers from the model fit.
    #[must_use]
    pub fn outlier(mut self, enabled: bool) -> Self {
        self.config.sampling_function.outlier = enabled;
        self
    }

    /// Restrict the acquisition search region.
    #[must_use]
    pub fn bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.config.sampling_function.bounds = Some(bounds);
        self
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if [`ExperimentConfig::validate`] fails.
    pub fn build(self) -> Result<ExperimentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
