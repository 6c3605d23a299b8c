mod auth;
mod ownership;
mod run;

use boaas::BoaService;
use boaas::auth::{Credentials, Registration, Session};

pub(crate) const PAYLOAD: &str = r#"{
    "name": "Harvard core",
    "domain": [[1], [2], [3], [4]],
    "model": {"gaussian_process": {"kernel_func": "Matern52", "scale_y": true,
              "scale_x": false, "noise_kernel": true, "use_scikit": true}},
    "optimization_type": "max",
    "initialization": {"type": "random", "random": {"no_samples": 2, "seed": 13}},
    "sampling_function": {"type": "expected_improvement", "epsilon": 0.03,
                          "optimize_acq": false, "outlier": false, "bounds": null}
}"#;

/// Register `user` and log in.
pub(crate) fn session(service: &BoaService, user: &str) -> Session {
    service
        .register(Registration {
            user_id: user.into(),
            name: "BOA Test".into(),
            password: "password".into(),
            confirm_password: "password".into(),
        })
        .unwrap();
    service
        .login(&Credentials {
            user_id: user.into(),
            password: "password".into(),
        })
        .unwrap()
}
