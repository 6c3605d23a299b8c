use boaas::storage::MemoryStorage;
use boaas::{Error, Experiment, ExperimentSnapshot, ExperimentStatus, Observation};

use super::{line, maximizing};

fn temp_path(tag: &str) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut path = std::env::temp_dir();
    path.push(format!(
        "boaas_snapshot_{tag}_{}_{}.json",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path
}

#[test]
fn snapshot_round_trip_keeps_history() {
    let mut experiment = maximizing(line(4), 2);
    experiment.run(3, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();

    let snapshot = experiment.snapshot();
    assert_eq!(snapshot.version, 1);
    let restored = Experiment::from_snapshot(snapshot).unwrap();
    assert_eq!(restored.id(), experiment.id());
    assert_eq!(restored.observations(), experiment.observations());
    assert_eq!(restored.status(), ExperimentStatus::Running);
    assert_eq!(
        restored.best_observation().unwrap(),
        experiment.best_observation().unwrap()
    );
}

#[test]
fn restored_experiment_continues_without_reinitializing() {
    let mut experiment = maximizing(line(6), 2);
    experiment.run(2, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();

    let mut restored = Experiment::from_snapshot(experiment.snapshot()).unwrap();
    let s = restored.ask().unwrap();
    assert_eq!(s.epoch, 2);
    assert_ne!(
        s.selection.source,
        boaas::acquisition::SelectionSource::Initialization
    );
}

#[test]
fn save_and_load_through_a_file() {
    let path = temp_path("file");
    let mut experiment = maximizing(line(4), 2);
    experiment.run(2, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();
    experiment.stop();
    experiment.save(&path).unwrap();

    let loaded = Experiment::load(&path).unwrap();
    assert_eq!(loaded.status(), ExperimentStatus::Stopped);
    assert_eq!(loaded.n_observations(), 2);
    assert_eq!(loaded.name(), "test");

    std::fs::remove_file(&path).ok();
}

#[test]
fn unknown_snapshot_version_is_rejected() {
    let experiment = maximizing(line(2), 1);
    let mut snapshot: ExperimentSnapshot = experiment.snapshot();
    snapshot.version = 2;
    assert!(matches!(
        Experiment::from_snapshot(snapshot),
        Err(Error::Config(_))
    ));
}

#[test]
fn snapshot_with_foreign_points_is_rejected() {
    let mut experiment = maximizing(line(2), 1);
    experiment.run(1, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();
    let mut snapshot = experiment.snapshot();
    snapshot.observations[0].point = vec![99.0];
    assert!(matches!(
        Experiment::from_snapshot(snapshot),
        Err(Error::Domain(_))
    ));
}

#[test]
fn storage_with_foreign_points_is_rejected() {
    let config = boaas::config::ExperimentConfig::builder("foreign", line(3))
        .no_samples(1)
        .build()
        .unwrap();
    let storage = MemoryStorage::with_observations(vec![Observation::new(vec![99.0], 1e6, 0)]);
    assert!(matches!(
        Experiment::with_storage(config, storage),
        Err(Error::Domain(_))
    ));
}
