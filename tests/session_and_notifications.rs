use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use syndic_backend::middleware::{AuthContext, Capability};
use syndic_backend::models::{Resident, Role, UpdateResidentRequest};
use syndic_backend::services::email_service::payment_reminder_template;
use syndic_backend::services::resident_service::check_resident_update;
use syndic_backend::services::{AuthService, EmailService};
use syndic_backend::{AppError, Config};

fn config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        database_url: "postgres://localhost/syndic_test".to_string(),
        jwt_secret: "integration-secret".to_string(),
        jwt_access_expiry: 900,
        email_api_url: "http://127.0.0.1:9".to_string(),
        email_api_key: String::new(),
        email_from: "SyndicHub <noreply@example.com>".to_string(),
        email_enabled: false,
        minio_endpoint: "http://localhost:9000".to_string(),
        minio_access_key: "key".to_string(),
        minio_secret_key: "secret".to_string(),
        minio_bucket: "test".to_string(),
        minio_public_url: None,
        max_upload_size_mb: 5,
        currency: "MAD".to_string(),
    }
}

#[test]
fn guard_token_keeps_guard_capabilities_only() {
    let service = AuthService::new(config());
    let guard = AuthContext {
        user_id: Uuid::new_v4(),
        role: Role::Guard,
        residence_id: Some(Uuid::new_v4()),
    };

    let token = service.generate_access_token(&guard).unwrap();
    let restored = service
        .context_from_claims(&service.verify_token(&token).unwrap())
        .unwrap();

    assert!(restored.can(Capability::ViewAllIncidents));
    assert!(matches!(
        restored.require(Capability::RecordPayments),
        Err(AppError::Forbidden)
    ));
    assert!(restored.ensure_same_residence(Uuid::new_v4()).is_err());
}

#[test]
fn reminder_in_disabled_mode_is_reported_as_sent() {
    let service = EmailService::new(config());
    let template = payment_reminder_template(
        "Nadia",
        "Charges communes",
        Decimal::new(45050, 2),
        "MAD",
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
    );

    assert!(template.html.contains("450.50 MAD"));
    assert!(tokio_test::block_on(service.send("nadia@example.com", &template)).is_ok());
}

#[test]
fn shared_resident_keeps_identity_when_second_residence_edits_it() {
    let resident = Resident {
        id: Uuid::new_v4(),
        full_name: "Youssef".to_string(),
        email: "youssef@example.com".to_string(),
        phone_number: Some("+212611111111".to_string()),
        role: Role::Resident,
        verified: true,
        residence_id: Uuid::new_v4(),
        apartment_number: "7".to_string(),
        joined_at: Utc::now(),
    };
    let make_guard = UpdateResidentRequest {
        full_name: Some("Renamed".to_string()),
        email: None,
        phone_number: None,
        apartment_number: Some("0".to_string()),
        role: Some(Role::Guard),
    };

    assert!(matches!(
        check_resident_update(&resident, &make_guard, None, 2),
        Err(AppError::Validation { field, .. }) if field == "full_name"
    ));

    let move_apartment = UpdateResidentRequest {
        full_name: None,
        email: None,
        phone_number: None,
        apartment_number: Some("12".to_string()),
        role: None,
    };
    assert!(check_resident_update(&resident, &move_apartment, None, 2).is_ok());
}
