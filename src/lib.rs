#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! In-process Bayesian optimization experiment service. Experiments search
//! a discrete or bounded domain for the best value of an expensive black-box
//! objective, fitting a surrogate model to every observation and choosing
//! the next point by expected improvement.
//!
//! # Getting Started
//!
//! ```
//! use boaas::prelude::*;
//!
//! let domain = Domain::bounded(vec![(-5.0, 5.0), (-5.0, 5.0)]).unwrap();
//! let config = ExperimentConfig::builder("sphere", domain)
//!     .minimize()
//!     .no_samples(5)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//! let mut experiment = Experiment::new(config).unwrap();
//!
//! experiment
//!     .run(15, |x: &[f64]| Ok::<_, String>(x[0] * x[0] + x[1] * x[1]))
//!     .unwrap();
//!
//! let best = experiment.best_observation().unwrap();
//! println!("best {:?} = {:.4}", best.point, best.value);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Domain`] | The search space: a list of admissible points or per-dimension bounds. |
//! | [`Experiment`] | The ask/tell state machine that owns observations and the surrogate model. |
//! | [`SurrogateModel`](model::SurrogateModel) | Predicts mean and variance of the objective from observations. |
//! | [`AcquisitionFunction`](acquisition::AcquisitionFunction) | Scores candidates; expected improvement by default. |
//! | [`BoaService`] | Multi-user front end keyed by experiment id and session token. |
//! | [`Objective`](objective::Objective) | The black box; closures implement it directly. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) for every mutating call | on |
//! | `async` | [`Experiment::run_async`] and [`BoaService::run_async`] via tokio, with a bounded evaluation wait | off |
//! | `journal` | [`JournalStorage`](storage::JournalStorage): JSONL history with file locking | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod auth;
pub mod config;
mod domain;
mod error;
pub mod experiment;
pub mod model;
pub mod objective;
mod rng_util;
mod service;
pub mod storage;
mod types;

pub use domain::Domain;
pub use error::{AuthFailure, Error, ErrorKind, Result};
pub use experiment::{
    Experiment, ExperimentId, ExperimentSnapshot, RunOptions, RunSummary, Suggestion,
};
pub use service::{BoaService, ExperimentSummary, ServiceBuilder};
pub use types::{BestObservation, Direction, ExperimentStatus, Observation, Point};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use boaas::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::AcquisitionFunction;
    pub use crate::auth::{Credentials, Registration, Session};
    pub use crate::config::ExperimentConfig;
    pub use crate::domain::Domain;
    pub use crate::error::{Error, Result};
    pub use crate::experiment::{Experiment, RunOptions, RunSummary, Suggestion};
    pub use crate::model::{ForestConfig, GpConfig, Kernel, ModelConfig};
    pub use crate::objective::{Objective, TableObjective};
    pub use crate::service::BoaService;
    #[cfg(feature = "journal")]
    pub use crate::storage::JournalStorage;
    pub use crate::storage::{MemoryStorage, Storage};
    pub use crate::types::{BestObservation, Direction, ExperimentStatus, Observation};
}
