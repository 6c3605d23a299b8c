use std::sync::Arc;
use core::time::Duration;

use super::{Experiment, RunSummary, evaluate};
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::types::{ExperimentStatus, Point};

/// Evaluate `objective` at `point` on the blocking thread pool.
///
/// The outer `Result` carries task failures; the inner one is the
/// evaluation outcome. With `timeout` set, an evaluation that exceeds it is
/// reported as failed. The blocking task itself cannot be cancelled and runs
/// to completion in the background; its result is discarded.
pub(crate) async fn evaluate_blocking<O>(
    objective: Arc<O>,
    point: Point,
    timeout: Option<Duration>,
) -> Result<core::result::Result<f64, String>>
where
    O: Objective + Send + Sync + 'static,
{
    let handle = tokio::task::spawn_blocking(move || evaluate(&*objective, &point));
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => return Ok(Err(format!("evaluation exceeded {limit:?}"))),
        },
        None => handle.await,
    };
    joined.map_err(|e| Error::TaskError(e.to_string()))
}

impl Experiment {
    /// Run epochs with each evaluation on the blocking thread pool.
    ///
    /// Like [`run`](Self::run), but the objective is evaluated in
    /// [`spawn_blocking`](tokio::task::spawn_blocking), keeping the async
    /// runtime responsive. Epochs stay strictly sequential. With `timeout`
    /// set, an evaluation that exceeds it aborts the epoch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the experiment is stopped,
    /// [`Error::ObjectiveEvaluation`] if an evaluation fails or times out,
    /// and [`Error::TaskError`] if the blocking task panics.
    ///
    /// # Examples
    ///
    /// ```
    /// use boaas::prelude::*;
    ///
    /// # #[cfg(feature = "async")]
    /// # async fn example() -> boaas::Result<()> {
    /// let domain = Domain::bounded(vec![(-2.0, 2.0)])?;
    /// let config = ExperimentConfig::builder("async", domain).minimize().seed(1).build()?;
    /// let mut experiment = Experiment::new(config)?;
    ///
    /// experiment
    ///     .run_async(5, |x: &[f64]| Ok::<_, String>(x[0] * x[0]), None)
    ///     .await?;
    /// assert_eq!(experiment.n_observations(), 5);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_async<O>(
        &mut self,
        n_epochs: usize,
        objective: O,
        timeout: Option<Duration>,
    ) -> Result<RunSummary>
    where
        O: Objective + Send + Sync + 'static,
    {
        self.ensure_active()?;
        trace_info!(experiment_id = %self.id, n_epochs, "async run started");

        let objective = Arc::new(objective);
        let mut summary = RunSummary::default();
        for _ in 0..n_epochs {
            if self.status == ExperimentStatus::Stopped || self.stop_requested {
                summary.interrupted = true;
                break;
            }
            let suggestion = self.ask()?;
            let outcome = evaluate_blocking(
                Arc::clone(&objective),
                suggestion.point().to_vec(),
                timeout,
            )
            .await;
            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    // Release the suggestion before surfacing the task failure.
                    let _ = self.tell(&suggestion, Err::<f64, _>(e.to_string()));
                    return Err(e);
                }
            };
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
}
