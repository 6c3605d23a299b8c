use boaas::acquisition::SelectionSource;
use boaas::config::ExperimentConfig;
use boaas::{Domain, Error, Experiment, ExperimentStatus};

use super::{line, maximizing};

#[test]
fn initialization_points_come_first() {
    let mut experiment = maximizing(line(6), 3);
    let mut seen = Vec::new();
    for _ in 0..3 {
        let s = experiment.ask().unwrap();
        assert_eq!(s.selection.source, SelectionSource::Initialization);
        seen.push(s.point().to_vec());
        experiment.tell(&s, Ok::<_, &str>(s.point()[0])).unwrap();
    }
    seen.sort_by(|a, b| a[0].total_cmp(&b[0]));
    seen.dedup();
    assert_eq!(seen.len(), 3, "initialization samples without replacement");

    let s = experiment.ask().unwrap();
    assert_ne!(s.selection.source, SelectionSource::Initialization);
}

#[test]
fn initialization_matches_domain_sample() {
    let domain = line(8);
    let expected = domain.sample_random(3, Some(42));
    let mut experiment = maximizing(domain, 3);
    for point in expected {
        let s = experiment.ask().unwrap();
        assert_eq!(s.point(), point.as_slice());
        experiment.tell(&s, Ok::<_, &str>(0.0)).unwrap();
    }
}

#[test]
fn epochs_are_numbered_by_history_length() {
    let mut experiment = maximizing(line(5), 2);
    for expected in 0..4 {
        let s = experiment.ask().unwrap();
        assert_eq!(s.epoch, expected);
        let o = experiment.tell(&s, Ok::<_, &str>(1.0)).unwrap();
        assert_eq!(o.epoch, expected);
    }
}

#[test]
fn suggestion_from_another_experiment_is_rejected() {
    let mut a = maximizing(line(3), 1);
    let mut b = maximizing(line(3), 1);
    let from_a = a.ask().unwrap();
    b.ask().unwrap();
    assert!(matches!(
        b.tell(&from_a, Ok::<_, &str>(1.0)),
        Err(Error::InvalidState(_))
    ));
    assert_eq!(b.n_observations(), 0);
}

#[test]
fn tell_without_ask_is_rejected() {
    let mut a = maximizing(line(3), 1);
    let s = a.ask().unwrap();
    a.tell(&s, Ok::<_, &str>(1.0)).unwrap();
    assert!(matches!(
        a.tell(&s, Ok::<_, &str>(2.0)),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn infinite_value_is_an_evaluation_error() {
    let mut experiment = maximizing(line(3), 1);
    let s = experiment.ask().unwrap();
    assert!(matches!(
        experiment.tell(&s, Ok::<_, &str>(f64::INFINITY)),
        Err(Error::ObjectiveEvaluation { .. })
    ));
    assert_eq!(experiment.n_observations(), 0);
    assert_eq!(experiment.status(), ExperimentStatus::Running);
}

#[test]
fn acquisition_reports_diagnostics() {
    let mut experiment = maximizing(line(6), 3);
    experiment
        .run(3, |x: &[f64]| Ok::<_, String>(-(x[0] - 4.0).powi(2)))
        .unwrap();
    // Three observed points leave positive variance elsewhere on the line.
    let s = experiment.ask().unwrap();
    assert_eq!(s.selection.source, SelectionSource::Acquisition);
    let prediction = s.selection.prediction.unwrap();
    assert!(prediction.variance >= 0.0);
    assert!(s.selection.score.unwrap() >= 0.0);
    assert!(experiment.domain().validate(s.point()));
}

#[test]
fn exhausted_discrete_domain_keeps_proposing_members() {
    let domain = line(2);
    let mut experiment = maximizing(domain.clone(), 2);
    experiment
        .run(6, |x: &[f64]| Ok::<_, String>(x[0]))
        .unwrap();
    assert_eq!(experiment.n_observations(), 6);
    for o in experiment.observations() {
        assert!(domain.validate(&o.point));
    }
}

#[test]
fn sampling_bounds_restrict_proposals() {
    let domain = Domain::bounded(vec![(0.0, 10.0)]).unwrap();
    let config = ExperimentConfig::builder("restricted", domain)
        .no_samples(3)
        .seed(2)
        .bounds(vec![(2.0, 4.0)])
        .optimize_acq(true)
        .build()
        .unwrap();
    let mut experiment = Experiment::new(config).unwrap();
    experiment
        .run(8, |x: &[f64]| Ok::<_, String>(x[0]))
        .unwrap();
    for o in experiment.observations() {
        assert!((2.0..=4.0).contains(&o.point[0]), "{:?}", o.point);
    }
}
