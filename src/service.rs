//! The client-facing experiment service.
//!
//! [`BoaService`] keys experiments by id and guards them with session
//! tokens. The usual lifecycle is:
//!
//! ```
//! use boaas::auth::{Credentials, Registration};
//! use boaas::BoaService;
//!
//! let service = BoaService::new();
//! service.register(Registration {
//!     user_id: "boa_test@test.com".into(),
//!     name: "BOA Test".into(),
//!     password: "password".into(),
//!     confirm_password: "password".into(),
//! })?;
//! let session = service.login(&Credentials {
//!     user_id: "boa_test@test.com".into(),
//!     password: "password".into(),
//! })?;
//!
//! let id = service.create_experiment_json(
//!     &session.user_id,
//!     &session.token,
//!     r#"{"name": "identity", "domain": [[1], [2], [3]], "optimization_type": "max",
//!         "initialization": {"type": "random", "random": {"no_samples": 2, "seed": 4}}}"#,
//! )?;
//! service.run(id, &session.token, |x: &[f64]| Ok::<_, String>(x[0]), 4, false)?;
//!
//! let best = service.best_observation(id, &session.token)?;
//! assert_eq!(best.point, vec![3.0]);
//! service.stop_experiment(id, &session.token)?;
//! # Ok::<(), boaas::Error>(())
//! ```
//!
//! Each experiment sits behind its own lock and the registry lock is only
//! held for lookups, so experiments never block each other. A run takes its
//! experiment's lock per ask and per tell, never across an evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthStore, Credentials, Registration, Session, UserId};
use crate::config::ExperimentConfig;
use crate::error::{AuthFailure, Error, Result};
use crate::experiment::{
    Experiment, ExperimentId, ExperimentSnapshot, RunSummary, Suggestion, evaluate, explain,
};
use crate::objective::Objective;
use crate::storage::MemoryStorage;
use crate::types::{BestObservation, ExperimentStatus, Observation};

/// Default lifetime of a session token.
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// One line of [`BoaService::list_experiments`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    /// Experiment id.
    pub id: ExperimentId,
    /// Experiment name.
    pub name: String,
    /// Lifecycle state.
    pub status: ExperimentStatus,
    /// Number of recorded observations.
    pub n_observations: usize,
}

struct Entry {
    owner: UserId,
    experiment: Arc<Mutex<Experiment>>,
}

/// In-process experiment service.
pub struct BoaService {
    experiments: RwLock<HashMap<ExperimentId, Entry>>,
    auth: AuthStore,
    #[cfg(feature = "async")]
    evaluation_timeout: Option<core::time::Duration>,
    #[cfg(feature = "journal")]
    journal_dir: Option<std::path::PathBuf>,
}

impl Default for BoaService {
    fn default() -> Self {
        Self::new()
    }
}

impl BoaService {
    /// A service with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a service.
    #[must_use]
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    /// Register a user.
    ///
    /// # Errors
    ///
    /// See [`AuthStore::register`].
    pub fn register(&self, registration: Registration) -> Result<UserId> {
        let user_id = self.auth.register(registration)?;
        trace_info!(user_id = %user_id, "user registered");
        Ok(user_id)
    }

    /// Log a user in.
    ///
    /// # Errors
    ///
    /// See [`AuthStore::login`].
    pub fn login(&self, credentials: &Credentials) -> Result<Session> {
        let session = self.auth.login(credentials)?;
        trace_info!(user_id = %session.user_id, "user logged in");
        Ok(session)
    }

    /// Close a session.
    pub fn logout(&self, token: &str) {
        self.auth.logout(token);
    }

    /// Create an experiment owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if `token` is invalid or belongs to another
    /// user, [`Error::Config`] if the configuration is rejected, and
    /// `Error::Storage` if the experiment journal cannot be opened.
    pub fn create_experiment(
        &self,
        user_id: &str,
        token: &str,
        config: ExperimentConfig,
    ) -> Result<ExperimentId> {
        let caller = self.auth.authenticate(token)?;
        if caller != user_id {
            return Err(AuthFailure::InvalidToken.into());
        }

        let id = Uuid::new_v4();
        let experiment = self.assemble(id, config)?;
        trace_info!(experiment_id = %id, user_id = %caller, name = %experiment.name(), "experiment created");

        self.experiments.write().insert(
            id,
            Entry {
                owner: caller,
                experiment: Arc::new(Mutex::new(experiment)),
            },
        );
        Ok(id)
    }

    #[cfg(feature = "journal")]
    fn assemble(&self, id: ExperimentId, config: ExperimentConfig) -> Result<Experiment> {
        match &self.journal_dir {
            Some(dir) => {
                let storage = crate::storage::JournalStorage::open(dir.join(format!("{id}.jsonl")))?;
                Experiment::assemble(id, config, Arc::new(storage), chrono::Utc::now())
            }
            None => Experiment::assemble(id, config, Arc::new(MemoryStorage::new()), chrono::Utc::now()),
        }
    }

    #[cfg(not(feature = "journal"))]
    #[allow(clippy::unused_self)]
    fn assemble(&self, id: ExperimentId, config: ExperimentConfig) -> Result<Experiment> {
        Experiment::assemble(id, config, Arc::new(MemoryStorage::new()), chrono::Utc::now())
    }

    /// Create an experiment from a JSON payload.
    ///
    /// # Errors
    ///
    /// As [`create_experiment`](Self::create_experiment); a malformed payload
    /// is [`Error::Config`].
    pub fn create_experiment_json(
        &self,
        user_id: &str,
        token: &str,
        payload: &str,
    ) -> Result<ExperimentId> {
        self.auth.authenticate(token)?;
        let config = ExperimentConfig::from_json(payload)?;
        self.create_experiment(user_id, token, config)
    }

    /// Register an experiment restored from a snapshot under the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] for a bad token, [`Error::InvalidState`] if
    /// an experiment with the snapshot's id already exists, and the errors
    /// of [`Experiment::from_snapshot`].
    pub fn import_snapshot(&self, token: &str, snapshot: ExperimentSnapshot) -> Result<ExperimentId> {
        let caller = self.auth.authenticate(token)?;
        let experiment = Experiment::from_snapshot(snapshot)?;
        let id = experiment.id();

        let mut experiments = self.experiments.write();
        if experiments.contains_key(&id) {
            return Err(Error::InvalidState(format!("experiment {id} already exists")));
        }
        experiments.insert(
            id,
            Entry {
                owner: caller,
                experiment: Arc::new(Mutex::new(experiment)),
            },
        );
        trace_info!(experiment_id = %id, "experiment imported");
        Ok(id)
    }

    /// Look up an experiment on behalf of the session owner.
    fn experiment(&self, id: ExperimentId, token: &str) -> Result<Arc<Mutex<Experiment>>> {
        let caller = self.auth.authenticate(token)?;
        let experiments = self.experiments.read();
        let entry = experiments
            .get(&id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if entry.owner != caller {
            return Err(AuthFailure::Forbidden {
                user: caller,
                experiment: id.to_string(),
            }
            .into());
        }
        Ok(Arc::clone(&entry.experiment))
    }

    /// Run `no_epochs` epochs of an experiment.
    ///
    /// The experiment is locked for each ask and each tell but not while
    /// `objective` runs. A [`stop_experiment`](Self::stop_experiment) issued
    /// meanwhile lets the outstanding epoch finish, then ends the run with
    /// `interrupted = true`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] or [`Error::NotFound`] for a bad lookup,
    /// [`Error::InvalidState`] if the experiment is stopped, and
    /// [`Error::ObjectiveEvaluation`] as soon as an epoch fails. Epochs
    /// recorded before a failure are kept.
    #[allow(clippy::needless_pass_by_value)]
    pub fn run(
        &self,
        id: ExperimentId,
        token: &str,
        objective: impl Objective,
        no_epochs: usize,
        explain_epochs: bool,
    ) -> Result<RunSummary> {
        let handle = self.experiment(id, token)?;
        handle.lock().ensure_active()?;

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("run", experiment_id = %id, no_epochs).entered();

        let mut summary = RunSummary::default();
        for _ in 0..no_epochs {
            let Some(suggestion) = Self::next_suggestion(&handle)? else {
                summary.interrupted = true;
                break;
            };
            if explain_epochs {
                explain(&suggestion);
            }
            let result = evaluate(&objective, suggestion.point());
            let observation = handle.lock().tell(&suggestion, result)?;
            summary.epochs_completed += 1;
            let flow = objective.after_epoch(&observation);
            summary.last = Some(observation);
            if flow.is_break() {
                break;
            }
        }
        trace_info!(experiment_id = %id, epochs = summary.epochs_completed, interrupted = summary.interrupted, "run finished");
        Ok(summary)
    }

    /// Async variant of [`run`](Self::run).
    ///
    /// Evaluations run on the blocking thread pool. With an
    /// [`evaluation_timeout`](ServiceBuilder::evaluation_timeout), an
    /// evaluation that exceeds it aborts the run with
    /// [`Error::ObjectiveEvaluation`].
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus [`Error::TaskError`] if an evaluation
    /// task panics.
    #[cfg(feature = "async")]
    pub async fn run_async<O>(
        &self,
        id: ExperimentId,
        token: &str,
        objective: O,
        no_epochs: usize,
        explain_epochs: bool,
    ) -> Result<RunSummary>
    where
        O: Objective + Send + Sync + 'static,
    {
        use crate::experiment::evaluate_blocking;

        let handle = self.experiment(id, token)?;
        handle.lock().ensure_active()?;
        trace_info!(experiment_id = %id, no_epochs, "async run started");

        let objective = Arc::new(objective);
        let mut summary = RunSummary::default();
        for _ in 0..no_epochs {
            let Some(suggestion) = Self::next_suggestion(&handle)? else {
                summary.interrupted = true;
                break;
            };
            if explain_epochs {
                explain(&suggestion);
            }
            let outcome = evaluate_blocking(
                Arc::clone(&objective),
                suggestion.point().to_vec(),
                self.evaluation_timeout,
            )
            .await;
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    let _ = handle.lock().tell(&suggestion, Err::<f64, _>(e.to_string()));
                    return Err(e);
                }
            };
            let observation = handle.lock().tell(&suggestion, result)?;
            summary.epochs_completed += 1;
            let flow = objective.after_epoch(&observation);
            summary.last = Some(observation);
            if flow.is_break() {
                break;
            }
        }
        trace_info!(experiment_id = %id, epochs = summary.epochs_completed, interrupted = summary.interrupted, "async run finished");
        Ok(summary)
    }

    /// Ask for the next point, or `None` once the experiment stopped.
    fn next_suggestion(handle: &Mutex<Experiment>) -> Result<Option<Suggestion>> {
        let mut experiment = handle.lock();
        if experiment.status() == ExperimentStatus::Stopped || experiment.is_stopping() {
            return Ok(None);
        }
        experiment.ask().map(Some)
    }

    /// Ask an experiment for its next point.
    ///
    /// # Errors
    ///
    /// See [`Experiment::ask`].
    pub fn ask(&self, id: ExperimentId, token: &str) -> Result<Suggestion> {
        let suggestion = self.experiment(id, token)?.lock().ask()?;
        trace_debug!(experiment_id = %id, epoch = suggestion.epoch, "suggestion issued");
        Ok(suggestion)
    }

    /// Report the outcome of a suggestion.
    ///
    /// # Errors
    ///
    /// See [`Experiment::tell`].
    pub fn tell<E: ToString>(
        &self,
        id: ExperimentId,
        token: &str,
        suggestion: &Suggestion,
        result: core::result::Result<f64, E>,
    ) -> Result<Observation> {
        self.experiment(id, token)?.lock().tell(suggestion, result)
    }

    /// The best observation of an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHistory`] if nothing has been recorded, besides
    /// lookup errors.
    pub fn best_observation(&self, id: ExperimentId, token: &str) -> Result<BestObservation> {
        Ok(self.experiment(id, token)?.lock().best_observation()?.into())
    }

    /// Every recorded observation of an experiment.
    ///
    /// # Errors
    ///
    /// Returns lookup errors.
    pub fn observations(&self, id: ExperimentId, token: &str) -> Result<Vec<Observation>> {
        Ok(self.experiment(id, token)?.lock().observations())
    }

    /// The lifecycle state of an experiment.
    ///
    /// # Errors
    ///
    /// Returns lookup errors.
    pub fn status(&self, id: ExperimentId, token: &str) -> Result<ExperimentStatus> {
        Ok(self.experiment(id, token)?.lock().status())
    }

    /// A persistable snapshot of an experiment.
    ///
    /// # Errors
    ///
    /// Returns lookup errors.
    pub fn snapshot(&self, id: ExperimentId, token: &str) -> Result<ExperimentSnapshot> {
        Ok(self.experiment(id, token)?.lock().snapshot())
    }

    /// The caller's experiments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] for a bad token.
    pub fn list_experiments(&self, token: &str) -> Result<Vec<ExperimentSummary>> {
        let caller = self.auth.authenticate(token)?;
        let handles: Vec<Arc<Mutex<Experiment>>> = self
            .experiments
            .read()
            .values()
            .filter(|e| e.owner == caller)
            .map(|e| Arc::clone(&e.experiment))
            .collect();

        let mut listed: Vec<(chrono::DateTime<chrono::Utc>, ExperimentSummary)> = handles
            .iter()
            .map(|h| {
                let e = h.lock();
                (
                    e.created_at(),
                    ExperimentSummary {
                        id: e.id(),
                        name: e.name().to_owned(),
                        status: e.status(),
                        n_observations: e.n_observations(),
                    },
                )
            })
            .collect();
        listed.sort_by_key(|(created, _)| *created);
        Ok(listed.into_iter().map(|(_, s)| s).collect())
    }

    /// Stop an experiment. Idempotent.
    ///
    /// If an evaluation is outstanding the experiment stops as soon as it is
    /// recorded; the returned status is then still `running`.
    ///
    /// # Errors
    ///
    /// Returns lookup errors.
    pub fn stop_experiment(&self, id: ExperimentId, token: &str) -> Result<ExperimentStatus> {
        let handle = self.experiment(id, token)?;
        let mut experiment = handle.lock();
        experiment.stop();
        trace_info!(experiment_id = %id, n_observations = experiment.n_observations(), "stop requested");
        Ok(experiment.status())
    }
}

/// A builder for [`BoaService`].
///
/// # Defaults
///
/// - Session lifetime: 24 hours
/// - Evaluation timeout: none (feature `async`)
/// - Journal directory: none, history is kept in memory (feature `journal`)
pub struct ServiceBuilder {
    session_ttl: chrono::Duration,
    #[cfg(feature = "async")]
    evaluation_timeout: Option<core::time::Duration>,
    #[cfg(feature = "journal")]
    journal_dir: Option<std::path::PathBuf>,
}

impl ServiceBuilder {
    fn new() -> Self {
        Self {
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            #[cfg(feature = "async")]
            evaluation_timeout: None,
            #[cfg(feature = "journal")]
            journal_dir: None,
        }
    }

    /// How long session tokens stay valid.
    #[must_use]
    pub fn session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Upper bound on a single evaluation in [`BoaService::run_async`].
    #[cfg(feature = "async")]
    #[must_use]
    pub fn evaluation_timeout(mut self, timeout: core::time::Duration) -> Self {
        self.evaluation_timeout = Some(timeout);
        self
    }

    /// Persist each experiment's history to `<dir>/<experiment id>.jsonl`.
    #[cfg(feature = "journal")]
    #[must_use]
    pub fn journal_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    /// Build the service.
    #[must_use]
    pub fn build(self) -> BoaService {
        BoaService {
            experiments: RwLock::new(HashMap::new()),
            auth: AuthStore::new(self.session_ttl),
            #[cfg(feature = "async")]
            evaluation_timeout: self.evaluation_timeout,
            #[cfg(feature = "journal")]
            journal_dir: self.journal_dir,
        }
    }
}
