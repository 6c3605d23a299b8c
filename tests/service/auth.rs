use boaas::auth::Credentials;
use boaas::{AuthFailure, BoaService, Error, ErrorKind};

use super::{PAYLOAD, session};

#[test]
fn login_before_register_fails_as_unknown_user() {
    let service = BoaService::new();
    let err = service
        .login(&Credentials {
            user_id: "boa_test@test.com".into(),
            password: "password".into(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthFailure::UnknownUser(_))));
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[test]
fn token_must_belong_to_the_creating_user() {
    let service = BoaService::new();
    let alice = session(&service, "alice@test.com");
    let _bob = session(&service, "bob@test.com");
    assert!(matches!(
        service.create_experiment_json("bob@test.com", &alice.token, PAYLOAD),
        Err(Error::Auth(_))
    ));
}

#[test]
fn garbage_token_is_rejected() {
    let service = BoaService::new();
    let _ = session(&service, "alice@test.com");
    assert!(matches!(
        service.create_experiment_json("alice@test.com", "not-a-token", PAYLOAD),
        Err(Error::Auth(AuthFailure::InvalidToken))
    ));
}

#[test]
fn logout_revokes_access() {
    let service = BoaService::new();
    let alice = session(&service, "alice@test.com");
    let id = service
        .create_experiment_json("alice@test.com", &alice.token, PAYLOAD)
        .unwrap();
    service.logout(&alice.token);
    assert!(matches!(
        service.status(id, &alice.token),
        Err(Error::Auth(AuthFailure::InvalidToken))
    ));
}

#[test]
fn expired_session_is_rejected() {
    let service = BoaService::builder()
        .session_ttl(chrono::Duration::seconds(-1))
        .build();
    let alice = session(&service, "alice@test.com");
    assert!(matches!(
        service.list_experiments(&alice.token),
        Err(Error::Auth(AuthFailure::ExpiredToken))
    ));
}
