use boaas::{AuthFailure, BoaService, Error, ExperimentStatus};
use uuid::Uuid;

use super::{PAYLOAD, session};

#[test]
fn other_users_cannot_touch_an_experiment() {
    let service = BoaService::new();
    let alice = session(&service, "alice@test.com");
    let bob = session(&service, "bob@test.com");
    let id = service
        .create_experiment_json(&alice.user_id, &alice.token, PAYLOAD)
        .unwrap();

    assert!(matches!(
        service.run(id, &bob.token, |x: &[f64]| Ok::<_, String>(x[0]), 1, false),
        Err(Error::Auth(AuthFailure::Forbidden { .. }))
    ));
    assert!(matches!(
        service.stop_experiment(id, &bob.token),
        Err(Error::Auth(AuthFailure::Forbidden { .. }))
    ));
    assert!(matches!(
        service.best_observation(id, &bob.token),
        Err(Error::Auth(AuthFailure::Forbidden { .. }))
    ));
    assert_eq!(service.status(id, &alice.token).unwrap(), ExperimentStatus::Created);
}

#[test]
fn unknown_experiment_is_not_found() {
    let service = BoaService::new();
    let alice = session(&service, "alice@test.com");
    assert!(matches!(
        service.status(Uuid::new_v4(), &alice.token),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn listing_only_shows_own_experiments() {
    let service = BoaService::new();
    let alice = session(&service, "alice@test.com");
    let bob = session(&service, "bob@test.com");
    let a1 = service
        .create_experiment_json(&alice.user_id, &alice.token, PAYLOAD)
        .unwrap();
    let a2 = service
        .create_experiment_json(&alice.user_id, &alice.token, PAYLOAD)
        .unwrap();
    service
        .create_experiment_json(&bob.user_id, &bob.token, PAYLOAD)
        .unwrap();

    let listed = service.list_experiments(&alice.token).unwrap();
    let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&a1) && ids.contains(&a2));
    assert!(listed.iter().all(|e| e.name == "Harvard core"));
}

#[test]
fn invalid_payload_is_a_config_error() {
    let service = BoaService::new();
    let alice = session(&service, "alice@test.com");
    let payload = PAYLOAD.replace("\"epsilon\"", "\"xi\"");
    assert!(matches!(
        service.create_experiment_json(&alice.user_id, &alice.token, &payload),
        Err(Error::Config(_))
    ));
}

#[test]
fn snapshots_can_be_imported_by_another_service() {
    let first = BoaService::new();
    let alice = session(&first, "alice@test.com");
    let id = first
        .create_experiment_json(&alice.user_id, &alice.token, PAYLOAD)
        .unwrap();
    first
        .run(id, &alice.token, |x: &[f64]| Ok::<_, String>(x[0]), 2, false)
        .unwrap();
    let snapshot = first.snapshot(id, &alice.token).unwrap();

    let second = BoaService::new();
    let alice2 = session(&second, "alice@test.com");
    let imported = second.import_snapshot(&alice2.token, snapshot.clone()).unwrap();
    assert_eq!(imported, id);
    assert_eq!(second.observations(id, &alice2.token).unwrap().len(), 2);
    assert!(matches!(
        second.import_snapshot(&alice2.token, snapshot),
        Err(Error::InvalidState(_))
    ));
}
