use boaas::{Error, ExperimentStatus};

use super::{line, maximizing};

#[test]
fn starts_created_and_runs() {
    let mut experiment = maximizing(line(3), 1);
    assert_eq!(experiment.status(), ExperimentStatus::Created);
    experiment.run(1, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();
    assert_eq!(experiment.status(), ExperimentStatus::Running);
}

#[test]
fn run_after_stop_is_invalid() {
    let mut experiment = maximizing(line(3), 1);
    experiment.run(2, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();
    experiment.stop();
    assert_eq!(experiment.status(), ExperimentStatus::Stopped);

    assert!(matches!(
        experiment.run(1, |x: &[f64]| Ok::<_, String>(x[0])),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(experiment.ask(), Err(Error::InvalidState(_))));
}

#[test]
fn stop_is_idempotent() {
    let mut experiment = maximizing(line(3), 1);
    experiment.stop();
    experiment.stop();
    assert_eq!(experiment.status(), ExperimentStatus::Stopped);
}

#[test]
fn stopped_experiment_stays_readable() {
    let mut experiment = maximizing(line(3), 2);
    experiment.run(3, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();
    experiment.stop();

    assert_eq!(experiment.n_observations(), 3);
    assert_eq!(experiment.best_observation().unwrap().value, 3.0);
    assert_eq!(experiment.snapshot().status, ExperimentStatus::Stopped);
}

#[test]
fn zero_epoch_run_on_stopped_experiment_still_fails() {
    let mut experiment = maximizing(line(3), 1);
    experiment.stop();
    assert!(matches!(
        experiment.run(0, |x: &[f64]| Ok::<_, String>(x[0])),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn deferred_stop_records_the_outstanding_epoch() {
    let mut experiment = maximizing(line(3), 1);
    let s = experiment.ask().unwrap();
    experiment.stop();
    assert_eq!(experiment.status(), ExperimentStatus::Running);
    assert!(experiment.is_stopping());

    experiment.tell(&s, Ok::<_, &str>(7.0)).unwrap();
    assert_eq!(experiment.status(), ExperimentStatus::Stopped);
    assert_eq!(experiment.best_observation().unwrap().value, 7.0);
}

#[test]
fn deferred_stop_also_completes_on_failure() {
    let mut experiment = maximizing(line(3), 1);
    let s = experiment.ask().unwrap();
    experiment.stop();
    assert!(experiment.tell(&s, Err("boom")).is_err());
    assert_eq!(experiment.status(), ExperimentStatus::Stopped);
    assert_eq!(experiment.n_observations(), 0);
}
