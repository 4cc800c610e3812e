mod common;

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use common::Harness;
use marketbackend::database::memory::MemoryFailure;
use marketbackend::database::RecordStore;
use marketbackend::errors::AppError;
use marketbackend::models::user::AccountStatus;
use marketbackend::services::auth::AuthService;
use marketbackend::services::jwt::JwtManager;
use marketbackend::utils::clock::Clock;

fn auth_service(h: &Harness) -> AuthService {
    let clock: Arc<dyn Clock> = Arc::new(h.clock.clone());
    AuthService::new(
        Arc::new(JwtManager::new("moderation-test-secret".to_string())),
        h.records.clone(),
        clock,
        vec!["dean@school.edu".to_string()],
    )
}

#[tokio::test]
async fn suspend_sets_expiry_from_now() {
    let h = Harness::new();
    let (user, _) = h.add_user("ana@school.edu").await;

    let until = h.moderation.suspend(&user.id, 7).await.unwrap();
    assert_eq!(until, h.now() + Duration::days(7));

    let stored = h.records.get_user_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.account_status, AccountStatus::Suspended);
    assert_eq!(stored.suspended_until, Some(until));
    assert_eq!(stored.effective_status(h.now()), AccountStatus::Suspended);
    assert_eq!(stored.effective_status(h.now() + Duration::days(8)), AccountStatus::Active);
}

#[tokio::test]
async fn invalid_durations_write_nothing() {
    let h = Harness::new();
    let (user, _) = h.add_user("ana@school.edu").await;
    let before = h.records.write_stats().await;

    for days in [0, -2, 3651] {
        let result = h.moderation.suspend(&user.id, days).await;
        assert!(matches!(result, Err(AppError::InvalidDuration(_))), "{}", days);
    }
    assert_eq!(h.records.write_stats().await, before);
}

#[tokio::test]
async fn freeze_and_reactivate() {
    let h = Harness::new();
    let (user, _) = h.add_user("ana@school.edu").await;
    h.moderation.suspend(&user.id, 3).await.unwrap();

    h.moderation.freeze(&user.id).await.unwrap();
    let frozen = h.moderation.get_user(&user.id).await.unwrap();
    assert_eq!(frozen.account_status, AccountStatus::Frozen);
    assert_eq!(frozen.suspended_until, None);

    h.moderation.reactivate(&user.id).await.unwrap();
    assert_eq!(h.moderation.get_user(&user.id).await.unwrap().account_status, AccountStatus::Active);
}

#[tokio::test]
async fn require_active_tracks_account_status() {
    let h = Harness::new();
    let (user, _) = h.add_user("ana@school.edu").await;
    assert_eq!(h.moderation.require_active(&user.id).await.unwrap().id, user.id);

    h.moderation.suspend(&user.id, 2).await.unwrap();
    assert!(matches!(h.moderation.require_active(&user.id).await, Err(AppError::AccountRestricted(_))));
    h.clock.advance(Duration::days(2));
    assert!(h.moderation.require_active(&user.id).await.is_ok());

    h.moderation.freeze(&user.id).await.unwrap();
    assert!(matches!(h.moderation.require_active(&user.id).await, Err(AppError::AccountRestricted(_))));

    h.moderation.delete(&user.id, "ana@school.edu").await.unwrap();
    assert!(matches!(
        h.moderation.require_active(&user.id).await,
        Err(AppError::AuthenticationError(_))
    ));
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let h = Harness::new();
    let ghost = Uuid::new_v4();
    assert!(matches!(h.moderation.freeze(&ghost).await, Err(AppError::UserNotFound(_))));
    assert!(matches!(h.moderation.suspend(&ghost, 1).await, Err(AppError::UserNotFound(_))));
    assert!(matches!(h.moderation.reset_credential(&ghost).await, Err(AppError::UserNotFound(_))));
    assert!(matches!(h.moderation.delete(&ghost, "x@school.edu").await, Err(AppError::UserNotFound(_))));
}

#[tokio::test]
async fn store_failure_propagates() {
    let h = Harness::new();
    let (user, _) = h.add_user("ana@school.edu").await;
    h.records.set_failure(Some(MemoryFailure::UserWrites)).await;
    assert!(matches!(h.moderation.freeze(&user.id).await, Err(AppError::RecordStoreError(_))));
}

#[tokio::test]
async fn delete_requires_matching_email() {
    let h = Harness::new();
    let (user, _) = h.add_user("ana@school.edu").await;

    let result = h.moderation.delete(&user.id, "ben@school.edu").await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
    assert_eq!(h.records.user_count().await, 1);

    h.moderation.delete(&user.id, " ANA@school.edu ").await.unwrap();
    assert_eq!(h.records.user_count().await, 0);
}

#[tokio::test]
async fn reset_credential_replaces_password() {
    let h = Harness::new();
    let auth = auth_service(&h);
    let user = auth.register("Ana@School.edu", "hunter22a", Some("Ana")).await.unwrap();
    assert_eq!(user.email, "ana@school.edu");
    assert!(auth.login("ana@school.edu", "hunter22a").await.is_ok());

    let temporary = h.moderation.reset_credential(&user.id).await.unwrap();
    assert_eq!(temporary.len(), 16);

    let stored = h.records.get_user_by_id(&user.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash.as_deref(), Some(temporary.as_str()));

    assert!(matches!(
        auth.login("ana@school.edu", "hunter22a").await,
        Err(AppError::AuthenticationError(_))
    ));
    assert!(auth.login("ana@school.edu", &temporary).await.is_ok());
}

#[tokio::test]
async fn login_respects_account_status() {
    let h = Harness::new();
    let auth = auth_service(&h);
    let user = auth.register("ana@school.edu", "hunter22a", None).await.unwrap();

    h.moderation.suspend(&user.id, 2).await.unwrap();
    assert!(matches!(
        auth.login("ana@school.edu", "hunter22a").await,
        Err(AppError::AccountRestricted(_))
    ));

    h.clock.advance(Duration::days(2) + Duration::seconds(1));
    assert!(auth.login("ana@school.edu", "hunter22a").await.is_ok());

    h.moderation.freeze(&user.id).await.unwrap();
    assert!(matches!(
        auth.login("ana@school.edu", "hunter22a").await,
        Err(AppError::AccountRestricted(_))
    ));
}

#[tokio::test]
async fn configured_admins_are_flagged_on_registration() {
    let h = Harness::new();
    let auth = auth_service(&h);
    let dean = auth.register("dean@school.edu", "hunter22a", None).await.unwrap();
    let student = auth.register("ana@school.edu", "hunter22a", None).await.unwrap();
    assert!(dean.is_admin);
    assert!(!student.is_admin);

    let duplicate = auth.register("ANA@school.edu", "another1pass", None).await;
    assert!(matches!(duplicate, Err(AppError::ValidationError(_))));
}
