use boaas::acquisition::AcquisitionFunction;
use boaas::config::ExperimentConfig;
use boaas::model::{ForestConfig, GpConfig, Kernel, ModelConfig};
use boaas::{Domain, Experiment};

fn grid() -> Domain {
    Domain::discrete(
        (0..10)
            .flat_map(|i| (0..10).map(move |j| vec![f64::from(i), f64::from(j)]))
            .collect(),
    )
    .unwrap()
}

fn peak(x: &[f64]) -> Result<f64, String> {
    Ok(-((x[0] - 7.0).powi(2) + (x[1] - 2.0).powi(2)))
}

fn run(config: ExperimentConfig, epochs: usize) -> Experiment {
    let mut experiment = Experiment::new(config).unwrap();
    experiment.run(epochs, peak).unwrap();
    experiment
}

#[test]
fn every_kernel_makes_progress() {
    for kernel in [Kernel::Matern52, Kernel::Matern32, Kernel::Rbf] {
        let model = ModelConfig::GaussianProcess(GpConfig {
            kernel_func: kernel,
            noise_kernel: true,
            ..GpConfig::default()
        });
        let config = ExperimentConfig::builder("kernel", grid())
            .model(model)
            .no_samples(5)
            .seed(21)
            .build()
            .unwrap();
        let experiment = run(config, 25);
        assert!(
            experiment.best_observation().unwrap().value >= -10.0,
            "{kernel:?} did not approach the peak"
        );
    }
}

#[test]
fn random_forest_surrogate_runs() {
    let config = ExperimentConfig::builder("forest", grid())
        .model(ModelConfig::RandomForest(ForestConfig::default()))
        .no_samples(5)
        .seed(4)
        .build()
        .unwrap();
    let experiment = run(config, 15);
    assert_eq!(experiment.n_observations(), 15);
    for o in experiment.observations() {
        assert!(experiment.domain().validate(&o.point));
    }
}

#[test]
fn alternative_acquisition_functions_run() {
    for function in [
        AcquisitionFunction::ProbabilityOfImprovement,
        AcquisitionFunction::UpperConfidenceBound,
    ] {
        let config = ExperimentConfig::builder("acq", grid())
            .acquisition(function)
            .no_samples(4)
            .seed(9)
            .build()
            .unwrap();
        let experiment = run(config, 10);
        assert_eq!(experiment.n_observations(), 10);
    }
}

#[test]
fn outliers_do_not_leave_history() {
    let domain = Domain::bounded(vec![(0.0, 1.0)]).unwrap();
    let config = ExperimentConfig::builder("outlier", domain)
        .minimize()
        .outlier(true)
        .no_samples(3)
        .seed(5)
        .build()
        .unwrap();
    let mut experiment = Experiment::new(config).unwrap();
    let mut calls = 0;
    for _ in 0..12 {
        let s = experiment.ask().unwrap();
        calls += 1;
        let value = if calls == 2 { 1e9 } else { s.point()[0] };
        experiment.tell(&s, Ok::<_, &str>(value)).unwrap();
    }
    assert_eq!(experiment.n_observations(), 12);
    assert!(experiment.observations().iter().any(|o| o.value == 1e9));
}

#[test]
fn epsilon_is_accepted_in_objective_units() {
    let config = ExperimentConfig::builder("eps", grid())
        .epsilon(0.5)
        .no_samples(4)
        .seed(2)
        .build()
        .unwrap();
    let experiment = run(config, 8);
    assert_eq!(experiment.n_observations(), 8);
}
