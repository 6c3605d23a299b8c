use std::sync::atomic::{AtomicBool, Ordering};

use boaas::config::ExperimentConfig;
use boaas::{Direction, Domain, Error, Experiment};

use super::{line, maximizing};

#[test]
fn identity_on_two_points_finds_the_larger() {
    let mut experiment = maximizing(line(2), 2);
    experiment.run(3, |x: &[f64]| Ok::<_, String>(x[0])).unwrap();

    let best = experiment.best_observation().unwrap();
    assert_eq!(best.point, vec![2.0]);
    assert_eq!(best.value, 2.0);
    assert_eq!(experiment.n_observations(), 3);
}

#[test]
fn empty_history_has_no_best() {
    let experiment = maximizing(line(3), 2);
    assert!(matches!(
        experiment.best_observation(),
        Err(Error::EmptyHistory)
    ));
}

#[test]
fn failing_point_aborts_one_epoch_only() {
    // [5] is the only point, so the first epoch must evaluate it.
    let domain = Domain::discrete(vec![vec![5.0]]).unwrap();
    let mut experiment = maximizing(domain, 1);
    let failed_once = AtomicBool::new(false);
    let objective = |x: &[f64]| {
        if x[0] == 5.0 && !failed_once.swap(true, Ordering::SeqCst) {
            Err("no matching row".to_string())
        } else {
            Ok(x[0])
        }
    };

    let err = experiment.run(1, &objective).unwrap_err();
    assert!(matches!(err, Error::ObjectiveEvaluation { epoch: 0, .. }));
    assert_eq!(experiment.n_observations(), 0);

    let summary = experiment.run(1, &objective).unwrap();
    assert_eq!(summary.epochs_completed, 1);
    assert_eq!(experiment.observations()[0].epoch, 0);
    assert_eq!(experiment.best_observation().unwrap().value, 5.0);
}

#[test]
fn always_failing_point_is_not_proposed_again() {
    let domain = Domain::discrete(vec![vec![5.0], vec![6.0], vec![7.0]]).unwrap();
    let mut experiment = maximizing(domain, 0);
    let objective = |x: &[f64]| {
        if x[0] == 5.0 {
            Err("no matching row".to_string())
        } else {
            Ok(x[0])
        }
    };

    // With no initialization sample the first pick is the first point.
    let err = experiment.run(1, &objective).unwrap_err();
    assert!(matches!(err, Error::ObjectiveEvaluation { epoch: 0, .. }));

    experiment.run(1, &objective).unwrap();
    assert_eq!(experiment.observations()[0].point, vec![6.0]);
}

#[test]
fn failing_initialization_point_costs_one_epoch() {
    let domain = Domain::discrete(vec![vec![5.0], vec![6.0], vec![7.0]]).unwrap();
    let mut experiment = maximizing(domain, 3);
    let objective = |x: &[f64]| {
        if x[0] == 5.0 {
            Err("no matching row".to_string())
        } else {
            Ok(x[0])
        }
    };

    let failures = (0..10)
        .filter(|_| experiment.run(1, &objective).is_err())
        .count();
    assert_eq!(failures, 1);
    let observations = experiment.observations();
    assert_eq!(observations.len(), 9);
    assert!(observations.iter().all(|o| o.point != vec![5.0]));
}

#[test]
fn history_grows_by_one_per_successful_epoch() {
    let mut experiment = maximizing(line(10), 3);
    let mut expected = 0;
    for i in 0..8 {
        let suggestion = experiment.ask().unwrap();
        let result = if i % 3 == 2 {
            Err("flaky")
        } else {
            Ok(suggestion.point()[0])
        };
        let ok = result.is_ok();
        let told = experiment.tell(&suggestion, result);
        assert_eq!(told.is_ok(), ok);
        if ok {
            expected += 1;
        }
        assert_eq!(experiment.n_observations(), expected);
    }
}

#[test]
fn best_observation_follows_direction() {
    for direction in [Direction::Maximize, Direction::Minimize] {
        let domain = Domain::bounded(vec![(-3.0, 3.0)]).unwrap();
        let builder = ExperimentConfig::builder("dir", domain).no_samples(4).seed(8);
        let builder = match direction {
            Direction::Maximize => builder.maximize(),
            Direction::Minimize => builder.minimize(),
        };
        let mut experiment = Experiment::new(builder.build().unwrap()).unwrap();
        experiment
            .run(8, |x: &[f64]| Ok::<_, String>(x[0].sin()))
            .unwrap();

        let observations = experiment.observations();
        let best = experiment.best_observation().unwrap();
        for o in &observations {
            assert!(!direction.is_better(o.value, best.value));
        }
    }
}

#[test]
fn ties_resolve_to_the_earliest_observation() {
    let mut experiment = maximizing(line(4), 4);
    experiment.run(4, |_: &[f64]| Ok::<_, String>(1.0)).unwrap();
    let first = experiment.observations()[0].clone();
    let best = experiment.best_observation().unwrap();
    assert_eq!(best.point, first.point);
    assert_eq!(best.epoch, 0);
}

#[test]
fn proposals_stay_in_the_domain() {
    let domain = Domain::discrete(vec![
        vec![1.0, 8.0],
        vec![2.0, 8.0],
        vec![2.0, 16.0],
        vec![4.0, 16.0],
        vec![4.0, 32.0],
    ])
    .unwrap();
    let mut experiment = maximizing(domain.clone(), 2);
    experiment
        .run(10, |x: &[f64]| Ok::<_, String>(x[0] * 10.0 - x[1]))
        .unwrap();
    for o in experiment.observations() {
        assert!(domain.validate(&o.point), "{:?} left the domain", o.point);
    }
}

#[test]
fn minimizes_a_bounded_quadratic() {
    let domain = Domain::bounded(vec![(-5.0, 5.0)]).unwrap();
    let config = ExperimentConfig::builder("quadratic", domain)
        .minimize()
        .no_samples(4)
        .seed(3)
        .build()
        .unwrap();
    let mut experiment = Experiment::new(config).unwrap();
    experiment
        .run(20, |x: &[f64]| Ok::<_, String>((x[0] - 1.0).powi(2)))
        .unwrap();
    assert!(experiment.best_observation().unwrap().value < 0.5);
}

#[test]
fn after_epoch_can_end_a_run() {
    use core::ops::ControlFlow;

    use boaas::Observation;
    use boaas::objective::Objective;

    struct StopAtTwo;
    impl Objective for StopAtTwo {
        type Error = String;
        fn evaluate(&self, point: &[f64]) -> Result<f64, String> {
            Ok(point[0])
        }
        fn after_epoch(&self, observation: &Observation) -> ControlFlow<()> {
            if observation.value >= 2.0 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    let domain = Domain::discrete(vec![vec![2.0], vec![3.0]]).unwrap();
    let mut experiment = maximizing(domain, 2);
    let summary = experiment.run(5, StopAtTwo).unwrap();
    assert_eq!(summary.epochs_completed, 1);
    assert!(!summary.interrupted);
}
