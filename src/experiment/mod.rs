//! The experiment state machine.
//!
//! An [`Experiment`] owns its domain, surrogate model, and observation
//! history. It moves through `created -> running -> stopped`; `stopped` is
//! terminal. Each epoch is an ask/evaluate/tell cycle:
//!
//! 1. [`ask`](Experiment::ask) proposes a point: pending random
//!    initialization samples first, then the acquisition maximizer of a
//!    model refitted on the full history.
//! 2. The caller evaluates the objective.
//! 3. [`tell`](Experiment::tell) records the value, or reports the failure
//!    without touching history. A point whose evaluation failed is set aside
//!    and proposed again only when nothing else is left to try.
//!
//! [`run`](Experiment::run) drives that loop for a fixed number of epochs.

#[cfg(feature = "async")]
mod async_impl;
mod persistence;

use std::collections::VecDeque;
use std::sync::Arc;

#[cfg(feature = "async")]
pub(crate) use async_impl::evaluate_blocking;
use chrono::{DateTime, Utc};
pub use persistence::ExperimentSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::acquisition::{Selection, SelectionSource, select_next};
use crate::config::ExperimentConfig;
use crate::domain::{Domain, same_point};
use crate::error::{Error, Result};
use crate::model::{SurrogateModel, without_outliers};
use crate::objective::Objective;
use crate::rng_util;
use crate::storage::{MemoryStorage, Storage};
use crate::types::{Direction, ExperimentStatus, Observation, Point};

/// Identifier of an experiment.
pub type ExperimentId = Uuid;

/// A point proposed by [`Experiment::ask`], awaiting its objective value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// The experiment that issued the suggestion.
    pub experiment_id: ExperimentId,
    /// The epoch index the observation will be recorded under.
    pub epoch: u64,
    /// Identifies this suggestion among all suggestions of the experiment.
    pub ticket: u64,
    /// The proposed point and how it was selected.
    pub selection: Selection,
}

impl Suggestion {
    /// The point to evaluate.
    #[must_use]
    pub fn point(&self) -> &[f64] {
        &self.selection.point
    }
}

/// Options of [`Experiment::run_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Log the selection diagnostics of every epoch at info level.
    pub explain: bool,
}

/// Outcome of a completed (or interrupted) run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Epochs recorded by this run.
    pub epochs_completed: usize,
    /// `true` if the run ended early because the experiment was stopped.
    pub interrupted: bool,
    /// The last observation recorded by this run.
    pub last: Option<Observation>,
}

/// A single black-box optimization experiment.
pub struct Experiment {
    id: ExperimentId,
    config: ExperimentConfig,
    search_domain: Domain,
    status: ExperimentStatus,
    storage: Arc<dyn Storage>,
    model: Box<dyn SurrogateModel>,
    rng: fastrand::Rng,
    init_queue: VecDeque<Point>,
    init_drawn: bool,
    failed: Vec<Point>,
    validated: usize,
    pending: Option<Suggestion>,
    next_ticket: u64,
    stop_requested: bool,
    created_at: DateTime<Utc>,
}

impl Experiment {
    /// Create an experiment with in-memory history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        Self::with_storage(config, MemoryStorage::new())
    }

    /// Create an experiment on top of a custom storage backend.
    ///
    /// Observations already present in `storage` count as history, so
    /// random initialization is skipped when it is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid and
    /// [`Error::Domain`] if a stored observation lies outside the domain.
    pub fn with_storage(config: ExperimentConfig, storage: impl Storage + 'static) -> Result<Self> {
        Self::assemble(Uuid::new_v4(), config, Arc::new(storage), Utc::now())
    }

    /// Create an experiment whose history is persisted to a JSONL journal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration,
    /// [`Error::Storage`] if an existing journal cannot be read, and
    /// [`Error::Domain`] if it records a point outside the domain.
    #[cfg(feature = "journal")]
    pub fn with_journal(config: ExperimentConfig, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let storage = crate::storage::JournalStorage::open(path)?;
        Self::with_storage(config, storage)
    }

    pub(crate) fn assemble(
        id: ExperimentId,
        config: ExperimentConfig,
        storage: Arc<dyn Storage>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        config.validate()?;
        let search_domain = config.search_domain()?;
        let model = config.model.build();
        let rng = rng_util::rng_from_seed(config.initialization.random.seed);
        let validated = {
            let history = storage.observations_arc();
            let history = history.read();
            check_history(&config.domain, &history)?;
            history.len()
        };

        trace_info!(
            experiment_id = %id,
            name = %config.name,
            direction = ?config.optimization_type,
            "experiment created"
        );

        Ok(Self {
            id,
            config,
            search_domain,
            status: ExperimentStatus::Created,
            storage,
            model,
            rng,
            init_queue: VecDeque::new(),
            init_drawn: false,
            failed: Vec::new(),
            validated,
            pending: None,
            next_ticket: 0,
            stop_requested: false,
            created_at,
        })
    }

    /// The experiment id.
    #[must_use]
    pub fn id(&self) -> ExperimentId {
        self.id
    }

    /// The experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configuration the experiment was created with.
    #[must_use]
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The declared domain.
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.config.domain
    }

    /// The region acquisition searches: the domain restricted to the
    /// sampling bounds, if any.
    #[must_use]
    pub fn search_domain(&self) -> &Domain {
        &self.search_domain
    }

    /// The optimization direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.config.optimization_type
    }

    /// The lifecycle state.
    #[must_use]
    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// When the experiment was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns `true` if a stop was requested while a suggestion was
    /// outstanding; the experiment stops once it is told.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stop_requested && self.status != ExperimentStatus::Stopped
    }

    /// The outstanding suggestion, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&Suggestion> {
        self.pending.as_ref()
    }

    /// A copy of every recorded observation, in epoch order.
    #[must_use]
    pub fn observations(&self) -> Vec<Observation> {
        self.storage.observations_arc().read().clone()
    }

    /// Number of recorded observations.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.storage.observations_arc().read().len()
    }

    /// The best observation in the experiment's direction.
    ///
    /// Ties resolve to the earliest observation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHistory`] if nothing has been recorded.
    pub fn best_observation(&self) -> Result<Observation> {
        let direction = self.direction();
        let observations = self.storage.observations_arc().read();
        observations
            .iter()
            .reduce(|best, o| {
                if direction.is_better(o.value, best.value) {
                    o
                } else {
                    best
                }
            })
            .cloned()
            .ok_or(Error::EmptyHistory)
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.status == ExperimentStatus::Stopped {
            return Err(Error::InvalidState(format!("experiment {} is stopped", self.id)));
        }
        if self.stop_requested {
            return Err(Error::InvalidState(format!("experiment {} is stopping", self.id)));
        }
        Ok(())
    }

    /// Propose the next point to evaluate.
    ///
    /// While a suggestion is outstanding, the same suggestion is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the experiment is stopped (or
    /// stopping), and [`Error::Domain`] if the storage picked up an
    /// observation outside the domain.
    pub fn ask(&mut self) -> Result<Suggestion> {
        self.ensure_active()?;
        if let Some(pending) = &self.pending {
            return Ok(pending.clone());
        }

        self.storage.refresh();
        let observations = self.observations();
        check_history(
            &self.config.domain,
            observations.get(self.validated..).unwrap_or_default(),
        )?;
        self.validated = observations.len();
        self.status = ExperimentStatus::Running;

        if !self.init_drawn {
            self.init_drawn = true;
            if observations.is_empty() {
                let random = &self.config.initialization.random;
                self.init_queue = self
                    .search_domain
                    .sample_random(random.no_samples, random.seed)
                    .into();
                trace_debug!(
                    experiment_id = %self.id,
                    n_samples = self.init_queue.len(),
                    "initialization sample drawn"
                );
            }
        }

        let selection = match self.init_queue.front() {
            Some(point) => Selection::initialization(point.clone()),
            None => self.select(&observations),
        };
        self.config.domain.check(&selection.point)?;

        let suggestion = Suggestion {
            experiment_id: self.id,
            epoch: observations.len() as u64,
            ticket: self.next_ticket,
            selection,
        };
        self.next_ticket += 1;
        self.pending = Some(suggestion.clone());
        Ok(suggestion)
    }

    fn select(&mut self, observations: &[Observation]) -> Selection {
        let fitted = if self.config.sampling_function.outlier {
            self.model.fit(&without_outliers(observations))
        } else {
            self.model.fit(observations)
        };
        if let Err(e) = fitted {
            trace_debug!(experiment_id = %self.id, error = %e, "model fit failed; falling back");
        }
        select_next(
            self.model.as_ref(),
            &self.search_domain,
            observations,
            &self.failed,
            self.config.optimization_type,
            &self.config.sampling_function,
            &mut self.rng,
        )
    }

    /// Report the outcome of evaluating `suggestion`.
    ///
    /// On success the observation is recorded under the suggestion's epoch.
    /// On failure history is left unchanged and the point is set aside:
    /// later [`ask`](Self::ask) calls skip it while any other point remains.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the experiment is stopped, or
    ///   `suggestion` is not the outstanding suggestion of this experiment.
    /// - [`Error::ObjectiveEvaluation`] if `result` is an error or a
    ///   non-finite value.
    /// - [`Error::Storage`] if the observation cannot be persisted.
    pub fn tell<E: ToString>(
        &mut self,
        suggestion: &Suggestion,
        result: core::result::Result<f64, E>,
    ) -> Result<Observation> {
        if self.status == ExperimentStatus::Stopped {
            return Err(Error::InvalidState(format!("experiment {} is stopped", self.id)));
        }
        if suggestion.experiment_id != self.id {
            return Err(Error::InvalidState(format!(
                "suggestion belongs to experiment {}",
                suggestion.experiment_id
            )));
        }
        if self.pending.as_ref().is_none_or(|p| p.ticket != suggestion.ticket) {
            return Err(Error::InvalidState(
                "suggestion is not outstanding (already told or never issued)".into(),
            ));
        }
        let Some(pending) = self.pending.take() else {
            return Err(Error::Internal("pending suggestion vanished"));
        };

        let epoch = pending.epoch;
        let outcome = match result {
            Ok(value) if value.is_finite() => self.record(pending, value),
            Ok(value) => {
                self.set_aside(&pending);
                Err(Error::ObjectiveEvaluation {
                    epoch,
                    reason: format!("objective returned non-finite value {value}"),
                })
            }
            Err(e) => {
                self.set_aside(&pending);
                Err(Error::ObjectiveEvaluation {
                    epoch,
                    reason: e.to_string(),
                })
            }
        };

        if let Err(e) = &outcome {
            trace_debug!(experiment_id = %self.id, epoch, error = %e, "epoch failed");
        }
        if self.stop_requested {
            self.status = ExperimentStatus::Stopped;
            trace_info!(experiment_id = %self.id, "experiment stopped");
        }
        outcome
    }

    fn record(&mut self, suggestion: Suggestion, value: f64) -> Result<Observation> {
        let Suggestion {
            epoch, selection, ..
        } = suggestion;
        let observation = Observation::new(selection.point, value, epoch);
        self.storage.push(observation.clone())?;
        if selection.source == SelectionSource::Initialization {
            self.init_queue.pop_front();
        }
        self.failed.retain(|p| !same_point(p, &observation.point));
        trace_info!(experiment_id = %self.id, epoch, value, "observation recorded");
        Ok(observation)
    }

    fn set_aside(&mut self, suggestion: &Suggestion) {
        let selection = &suggestion.selection;
        if selection.source == SelectionSource::Initialization {
            self.init_queue.pop_front();
        }
        if !self.failed.iter().any(|p| same_point(p, &selection.point)) {
            self.failed.push(selection.point.clone());
        }
    }

    /// Stop the experiment. Idempotent.
    ///
    /// With a suggestion outstanding the stop is deferred until that
    /// suggestion is told, so an in-flight evaluation is still recorded.
    pub fn stop(&mut self) {
        if self.status == ExperimentStatus::Stopped {
            return;
        }
        if self.pending.is_some() {
            self.stop_requested = true;
            trace_info!(experiment_id = %self.id, "stop deferred until the outstanding epoch is told");
        } else {
            self.status = ExperimentStatus::Stopped;
            trace_info!(experiment_id = %self.id, "experiment stopped");
        }
    }

    /// Run `n_epochs` sequential ask/evaluate/tell cycles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the experiment is stopped and
    /// [`Error::ObjectiveEvaluation`] as soon as an evaluation fails after
    /// [`max_retries`](Objective::max_retries) retries. Epochs recorded
    /// before the failure are kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use boaas::prelude::*;
    ///
    /// let domain = Domain::discrete(vec![vec![1.0], vec![2.0]]).unwrap();
    /// let config = ExperimentConfig::builder("identity", domain)
    ///     .maximize()
    ///     .no_samples(2)
    ///     .build()
    ///     .unwrap();
    /// let mut experiment = Experiment::new(config).unwrap();
    ///
    /// let summary = experiment.run(3, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();
    /// assert_eq!(summary.epochs_completed, 3);
    ///
    /// let best = experiment.best_observation().unwrap();
    /// assert_eq!((best.point, best.value), (vec![2.0], 2.0));
    /// ```
    pub fn run(&mut self, n_epochs: usize, objective: impl Objective) -> Result<RunSummary> {
        self.run_with(n_epochs, objective, RunOptions::default())
    }

    /// Like [`run`](Self::run), with options.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    #[allow(clippy::needless_pass_by_value)]
    pub fn run_with(
        &mut self,
        n_epochs: usize,
        objective: impl Objective,
        options: RunOptions,
    ) -> Result<RunSummary> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("run", experiment_id = %self.id, n_epochs).entered();

        self.ensure_active()?;
        let mut summary = RunSummary::default();
        for _ in 0..n_epochs {
            if self.status == ExperimentStatus::Stopped || self.stop_requested {
                summary.interrupted = true;
                break;
            }
            let suggestion = self.ask()?;
            if options.explain {
                explain(&suggestion);
            }
            let result = evaluate(&objective, suggestion.point());
            let observation = self.tell(&suggestion, result)?;
            summary.epochs_completed += 1;
            let flow = objective.after_epoch(&observation);
            summary.last = Some(observation);
            if flow.is_break() {
                break;
            }
        }
        Ok(summary)
    }

    /// Capture the experiment state for persistence.
    #[must_use]
    pub fn snapshot(&self) -> ExperimentSnapshot {
        ExperimentSnapshot {
            version: 1,
            id: self.id,
            config: self.config.clone(),
            status: self.status,
            created_at: self.created_at,
            observations: self.observations(),
        }
    }

    /// Restore an experiment from a snapshot, with in-memory history.
    ///
    /// A snapshot taken while stopping restores as stopped. The
    /// initialization sample is not redrawn if the snapshot has history.
    /// Points set aside after failed evaluations are not part of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unsupported schema version or an
    /// invalid configuration, and [`Error::Domain`] if a recorded point lies
    /// outside the domain.
    pub fn from_snapshot(snapshot: ExperimentSnapshot) -> Result<Self> {
        if snapshot.version != 1 {
            return Err(Error::Config(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        let storage = Arc::new(MemoryStorage::with_observations(snapshot.observations));
        let mut experiment =
            Self::assemble(snapshot.id, snapshot.config, storage, snapshot.created_at)?;
        experiment.status = snapshot.status;
        Ok(experiment)
    }
}

fn check_history(domain: &Domain, observations: &[Observation]) -> Result<()> {
    for o in observations {
        domain.check(&o.point).map_err(|e| match e {
            Error::Domain(reason) => Error::Domain(format!("observation {}: {reason}", o.epoch)),
            other => other,
        })?;
    }
    Ok(())
}

impl core::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Experiment")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("status", &self.status)
            .field("n_observations", &self.n_observations())
            .finish_non_exhaustive()
    }
}

/// Evaluate `objective` at `point`, retrying failures up to
/// [`max_retries`](Objective::max_retries) times.
pub(crate) fn evaluate<O: Objective + ?Sized>(
    objective: &O,
    point: &[f64],
) -> core::result::Result<f64, String> {
    let mut attempt = 0;
    loop {
        match objective.evaluate(point) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < objective.max_retries() => {
                attempt += 1;
                trace_debug!(attempt, error = %e.to_string(), "retrying evaluation");
            }
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Log how a suggestion was selected.
#[cfg(feature = "tracing")]
pub(crate) fn explain(suggestion: &Suggestion) {
    let s = &suggestion.selection;
    tracing::info!(
        experiment_id = %suggestion.experiment_id,
        epoch = suggestion.epoch,
        point = ?s.point,
        source = ?s.source,
        mean = s.prediction.map(|p| p.mean),
        variance = s.prediction.map(|p| p.variance),
        score = s.score,
        "selection"
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn explain(_suggestion: &Suggestion) {}
