//! Tune a processor core against a table of simulated measurements.
//!
//! Each row of the table is one core configuration (13 integer columns:
//! pipeline depth, issue width, register file size, cache sizes and
//! latencies) together with the simulated cycle and instruction counts. The
//! objective is throughput in billions of instructions per second,
//! `inst / 1.1 * depth / cycle / 18`, looked up by exact match.
//!
//! The table here is synthetic so the demo is self-contained.
//!
//! Run with: `cargo run --example tabulated_core`

use boaas::auth::{Credentials, Registration};
use boaas::objective::TableObjective;
use boaas::prelude::*;

const INST: f64 = 1.0e9;

/// Simulated cycle count of one configuration.
fn cycles(depth: f64, width: f64, gpr_phys: f64, dcache_size: f64) -> f64 {
    // Deeper pipelines pay for hazards, wider ones saturate.
    let cpi = 0.4 + 0.02 * depth + 1.6 / width + 12.0 / gpr_phys + 48.0 / dcache_size;
    INST * cpi
}

fn build_table() -> TableObjective {
    let mut rows = Vec::new();
    for depth in [9.0, 12.0, 15.0, 18.0, 21.0, 24.0, 27.0, 30.0] {
        for width in [1.0, 2.0, 4.0, 8.0] {
            for gpr_phys in [40.0, 80.0, 130.0] {
                for dcache_size in [8.0, 32.0, 128.0] {
                    // br_resv, dmem_lat, load_lat, br_lat, fix_lat, fpu_lat,
                    // d2cache_lat, l2cache_size, icache_size stay fixed.
                    let key = vec![
                        depth,
                        width,
                        gpr_phys,
                        12.0,
                        77.0,
                        2.0,
                        1.0,
                        1.0,
                        4.0,
                        12.0,
                        2048.0,
                        64.0,
                        dcache_size,
                    ];
                    let bips = INST / 1.1 * depth / cycles(depth, width, gpr_phys, dcache_size) / 18.0;
                    rows.push((key, bips));
                }
            }
        }
    }
    TableObjective::new(rows)
}

fn main() -> boaas::Result<()> {
    let table = build_table();
    let domain = Domain::discrete(table.points())?;
    println!("Table has {} configurations", table.len());

    let service = BoaService::new();
    let user = Credentials {
        user_id: "boa_test@test.com".into(),
        password: "password".into(),
    };
    let session = match service.login(&user) {
        Ok(session) => session,
        Err(_) => {
            service.register(Registration {
                user_id: user.user_id.clone(),
                name: "BOA Test".into(),
                password: user.password.clone(),
                confirm_password: user.password.clone(),
            })?;
            service.login(&user)?
        }
    };

    let config = ExperimentConfig {
        name: "Harvard core".into(),
        domain,
        model: ModelConfig::GaussianProcess(GpConfig {
            kernel_func: Kernel::Matern52,
            scale_y: true,
            scale_x: false,
            noise_kernel: true,
            use_scikit: Some(true),
        }),
        optimization_type: Direction::Maximize,
        initialization: boaas::config::InitializationConfig::default(),
        sampling_function: boaas::config::SamplingConfig {
            epsilon: 0.03,
            ..Default::default()
        },
    };
    let id = service.create_experiment(&session.user_id, &session.token, config)?;

    let summary = service.run(id, &session.token, table, 60, false)?;
    println!("Completed {} epochs", summary.epochs_completed);

    let best = service.best_observation(id, &session.token)?;
    println!("Best configuration: {:?}", best.point);
    println!("Best bips: {:.4}", best.value);

    service.stop_experiment(id, &session.token)?;
    Ok(())
}
