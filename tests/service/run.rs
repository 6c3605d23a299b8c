use std::sync::{Arc, Barrier};
use std::thread;

use boaas::objective::TableObjective;
use boaas::{BoaService, Error, ExperimentStatus};

use super::{PAYLOAD, session};

#[test]
fn full_client_lifecycle() {
    let service = BoaService::new();
    let user = session(&service, "boa_test@test.com");
    let id = service
        .create_experiment_json(&user.user_id, &user.token, PAYLOAD)
        .unwrap();

    let summary = service
        .run(id, &user.token, |x: &[f64]| Ok::<_, String>(x[0]), 5, true)
        .unwrap();
    assert_eq!(summary.epochs_completed, 5);
    assert!(!summary.interrupted);

    let best = service.best_observation(id, &user.token).unwrap();
    assert_eq!(best.point, vec![4.0]);
    assert_eq!(best.value, 4.0);

    assert_eq!(
        service.stop_experiment(id, &user.token).unwrap(),
        ExperimentStatus::Stopped
    );
    assert!(matches!(
        service.run(id, &user.token, |x: &[f64]| Ok::<_, String>(x[0]), 1, false),
        Err(Error::InvalidState(_))
    ));
    // Archived experiments stay readable.
    assert_eq!(service.observations(id, &user.token).unwrap().len(), 5);
}

#[test]
fn empty_experiment_has_no_best_observation() {
    let service = BoaService::new();
    let user = session(&service, "boa_test@test.com");
    let id = service
        .create_experiment_json(&user.user_id, &user.token, PAYLOAD)
        .unwrap();
    assert!(matches!(
        service.best_observation(id, &user.token),
        Err(Error::EmptyHistory)
    ));
}

#[test]
fn table_lookup_failure_aborts_the_run() {
    let service = BoaService::new();
    let user = session(&service, "boa_test@test.com");
    // Without an initialization sample the first proposal is [1].
    let payload = PAYLOAD.replace(r#""no_samples": 2"#, r#""no_samples": 0"#);
    let id = service
        .create_experiment_json(&user.user_id, &user.token, &payload)
        .unwrap();
    let table = TableObjective::new(vec![(vec![2.0], 0.2), (vec![3.0], 0.3), (vec![4.0], 0.4)]);

    match service.run(id, &user.token, table.clone(), 4, false) {
        Err(Error::ObjectiveEvaluation { epoch: 0, reason }) => {
            assert!(reason.contains("[1]"), "{reason}");
        }
        other => panic!("expected a failed lookup, got {other:?}"),
    }
    assert!(service.observations(id, &user.token).unwrap().is_empty());

    // The missing row is set aside, so later runs complete.
    for _ in 0..3 {
        let summary = service.run(id, &user.token, table.clone(), 4, false).unwrap();
        assert_eq!(summary.epochs_completed, 4);
    }
    let observations = service.observations(id, &user.token).unwrap();
    assert_eq!(observations.len(), 12);
    assert!(observations.iter().all(|o| o.point != vec![1.0]));
    // Epoch indices stay dense across failures.
    for (i, o) in observations.iter().enumerate() {
        assert_eq!(o.epoch, i as u64);
    }
}

#[test]
fn ask_tell_through_the_service() {
    let service = BoaService::new();
    let user = session(&service, "boa_test@test.com");
    let id = service
        .create_experiment_json(&user.user_id, &user.token, PAYLOAD)
        .unwrap();
    for _ in 0..3 {
        let s = service.ask(id, &user.token).unwrap();
        let value = s.point()[0] * 2.0;
        service.tell(id, &user.token, &s, Ok::<_, &str>(value)).unwrap();
    }
    assert_eq!(service.observations(id, &user.token).unwrap().len(), 3);
    assert_eq!(service.status(id, &user.token).unwrap(), ExperimentStatus::Running);
}

#[test]
fn stop_during_an_evaluation_interrupts_the_run() {
    let service = Arc::new(BoaService::new());
    let user = session(&service, "boa_test@test.com");
    let id = service
        .create_experiment_json(&user.user_id, &user.token, PAYLOAD)
        .unwrap();

    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let runner = {
        let service = Arc::clone(&service);
        let token = user.token.clone();
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        thread::spawn(move || {
            let objective = move |x: &[f64]| {
                entered.wait();
                release.wait();
                Ok::<_, String>(x[0])
            };
            service.run(id, &token, objective, 10, false)
        })
    };

    entered.wait();
    // The evaluation is outstanding: stop is deferred.
    assert_eq!(
        service.stop_experiment(id, &user.token).unwrap(),
        ExperimentStatus::Running
    );
    release.wait();

    let summary = runner.join().unwrap().unwrap();
    assert_eq!(summary.epochs_completed, 1);
    assert!(summary.interrupted);
    assert_eq!(service.status(id, &user.token).unwrap(), ExperimentStatus::Stopped);
    assert_eq!(service.observations(id, &user.token).unwrap().len(), 1);
}

#[test]
fn experiments_run_concurrently() {
    let service = Arc::new(BoaService::new());
    let user = session(&service, "boa_test@test.com");
    let ids: Vec<_> = (0..4)
        .map(|_| {
            service
                .create_experiment_json(&user.user_id, &user.token, PAYLOAD)
                .unwrap()
        })
        .collect();

    let handles: Vec<_> = ids
        .iter()
        .map(|&id| {
            let service = Arc::clone(&service);
            let token = user.token.clone();
            thread::spawn(move || service.run(id, &token, |x: &[f64]| Ok::<_, String>(x[0]), 4, false))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().unwrap().epochs_completed, 4);
    }
    for id in ids {
        assert_eq!(service.observations(id, &user.token).unwrap().len(), 4);
    }
}
