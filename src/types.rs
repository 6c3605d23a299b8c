//! Core types shared across the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point in the search space.
pub type Point = Vec<f64>;

/// The direction of optimization.
///
/// Serialized as `"max"` / `"min"`, matching the `optimization_type` field of
/// the experiment payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Minimize the objective value.
    #[serde(rename = "min")]
    Minimize,
    /// Maximize the objective value.
    #[serde(rename = "max")]
    Maximize,
}

impl Direction {
    /// `+1.0` when maximizing, `-1.0` when minimizing.
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Self::Maximize => 1.0,
            Self::Minimize => -1.0,
        }
    }

    /// Returns `true` if `a` is strictly better than `b` in this direction.
    #[must_use]
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            Self::Maximize => a > b,
            Self::Minimize => a < b,
        }
    }
}

/// The lifecycle state of an experiment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Created but no epoch has been requested yet.
    Created,
    /// At least one epoch has been requested.
    Running,
    /// Stopped; terminal.
    Stopped,
}

/// A single recorded evaluation of the objective.
///
/// Observations are immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The evaluated point.
    pub point: Point,
    /// The objective value at `point`.
    pub value: f64,
    /// Zero-based epoch index at which the observation was recorded.
    pub epoch: u64,
    /// When the observation was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl Observation {
    /// Creates an observation stamped with the current time.
    #[must_use]
    pub fn new(point: Point, value: f64, epoch: u64) -> Self {
        Self {
            point,
            value,
            epoch,
            recorded_at: Utc::now(),
        }
    }
}

/// The best point found so far, as returned to API callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestObservation {
    /// The best point.
    pub point: Point,
    /// Its objective value.
    pub value: f64,
}

impl From<Observation> for BestObservation {
    fn from(obs: Observation) -> Self {
        Self {
            point: obs.point,
            value: obs.value,
        }
    }
}
