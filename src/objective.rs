//! The [`Objective`] trait defines the black box being optimized.
//!
//! Plain closures work directly:
//!
//! ```
//! use boaas::prelude::*;
//!
//! let domain = Domain::discrete(vec![vec![1.0], vec![2.0], vec![3.0]]).unwrap();
//! let config = ExperimentConfig::builder("square", domain)
//!     .minimize()
//!     .no_samples(2)
//!     .seed(3)
//!     .build()
//!     .unwrap();
//! let mut experiment = Experiment::new(config).unwrap();
//!
//! experiment
//!     .run(3, |x: &[f64]| Ok::<_, String>(x[0] * x[0]))
//!     .unwrap();
//! assert_eq!(experiment.best_observation().unwrap().point, vec![1.0]);
//! ```
//!
//! Implement [`Objective`] on a struct for early stopping or retries, or use
//! [`TableObjective`] to look values up in tabulated measurements.

use core::ops::ControlFlow;

use crate::types::{Observation, Point};

/// An objective function with optional lifecycle hooks.
///
/// Only [`evaluate`](Objective::evaluate) is required.
///
/// # Thread safety
///
/// [`Experiment::run_async`](crate::Experiment::run_async) additionally
/// requires `Send + Sync + 'static`, since evaluations run on the blocking
/// thread pool. The synchronous [`run`](crate::Experiment::run) has no such
/// requirement.
pub trait Objective {
    /// The error type returned by [`evaluate`](Objective::evaluate).
    type Error: ToString + 'static;

    /// Evaluate the objective at `point`.
    ///
    /// # Errors
    ///
    /// Any error whose type implements `ToString`. The epoch is aborted and
    /// reported as [`Error::ObjectiveEvaluation`](crate::Error::ObjectiveEvaluation).
    fn evaluate(&self, point: &[f64]) -> Result<f64, Self::Error>;

    /// Called after each recorded observation.
    ///
    /// Return `ControlFlow::Break(())` to end the run early.
    fn after_epoch(&self, _observation: &Observation) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Number of times a failed evaluation is retried on the same point
    /// before the epoch is aborted. Defaults to `0`.
    fn max_retries(&self) -> usize {
        0
    }
}

impl<F, E> Objective for F
where
    F: Fn(&[f64]) -> Result<f64, E>,
    E: ToString + 'static,
{
    type Error = E;

    fn evaluate(&self, point: &[f64]) -> Result<f64, E> {
        self(point)
    }
}

/// Failure of a [`TableObjective`] lookup.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("no row matches {0:?}")]
pub struct MissingRow(pub Vec<i64>);

/// Exact-match lookup over tabulated measurements.
///
/// Each coordinate of the queried point is mapped to an integer key as
/// `trunc(x + 0.5)` before being compared against the key columns. For
/// non-negative coordinates that is rounding to nearest with halves up;
/// negative ones truncate toward zero.
///
/// # Examples
///
/// ```
/// use boaas::objective::{Objective, TableObjective};
///
/// let table = TableObjective::new(vec![
///     (vec![1.0, 8.0], 0.75),
///     (vec![2.0, 8.0], 0.90),
/// ]);
/// assert_eq!(table.evaluate(&[1.6, 7.8]), Ok(0.90));
/// assert!(table.evaluate(&[3.0, 8.0]).is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct TableObjective {
    rows: Vec<(Vec<i64>, f64)>,
}

impl TableObjective {
    /// Build a table from `(key columns, value)` rows.
    ///
    /// Keys are rounded on insertion. When two rows share a key, the first
    /// one wins.
    #[must_use]
    pub fn new(rows: impl IntoIterator<Item = (Point, f64)>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(key, value)| (round_key(&key), value))
                .collect(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The distinct key columns, in table order, as a discrete domain's points.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn points(&self) -> Vec<Point> {
        let mut seen: Vec<&[i64]> = Vec::with_capacity(self.rows.len());
        let mut points = Vec::with_capacity(self.rows.len());
        for (key, _) in &self.rows {
            if !seen.contains(&key.as_slice()) {
                seen.push(key);
                points.push(key.iter().map(|&v| v as f64).collect());
            }
        }
        points
    }
}

impl Objective for TableObjective {
    type Error = MissingRow;

    fn evaluate(&self, point: &[f64]) -> Result<f64, MissingRow> {
        let key = round_key(point);
        self.rows
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or(MissingRow(key))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_key(point: &[f64]) -> Vec<i64> {
    point.iter().map(|&x| (x + 0.5).trunc() as i64).collect()
}
