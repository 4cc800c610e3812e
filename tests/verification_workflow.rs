mod common;

use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Barrier;
use uuid::Uuid;

use common::{complete_form, form, Harness, BUCKET};
use marketbackend::database::memory::MemoryFailure;
use marketbackend::database::RecordStore;
use marketbackend::errors::AppError;
use marketbackend::models::gate::{AccessGate, GateDecision, GateScreen, RestrictedAction};
use marketbackend::models::verification::{CopyThrough, Decision, ImageUpload, VerificationStatus};

#[tokio::test]
async fn never_applied_is_not_requested() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;

    assert_eq!(h.verification.latest_status(&session.email).await.unwrap(), None);
    assert_eq!(h.verification.access_gate(&session).await.unwrap(), AccessGate::NotRequested);
    assert_eq!(
        h.verification.check_action(&session, RestrictedAction::PostListing).await.unwrap(),
        GateDecision::Redirect { screen: GateScreen::VerificationPrompt }
    );
}

#[tokio::test]
async fn first_submission_creates_pending_request() {
    let h = Harness::new();
    let (user, session) = h.add_user("ana@school.edu").await;

    let request = h.verification.submit(&session, complete_form()).await.unwrap();
    assert_eq!(request.status, VerificationStatus::Pending);
    assert_eq!(request.user_id, user.id);
    assert_eq!(request.created_at, h.now());
    assert!(request.reviewed_at.is_none());

    let keys = h.blobs.keys(BUCKET).await;
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| k.starts_with(&format!("{}/", user.id))));
    assert!(request.id_image_url.starts_with(&format!("memory://{}/{}/id-", BUCKET, user.id)));
    assert!(request.cor_image_url.starts_with(&format!("memory://{}/{}/cor-", BUCKET, user.id)));

    assert_eq!(h.verification.access_gate(&session).await.unwrap(), AccessGate::Pending);
    assert_eq!(
        h.verification.check_action(&session, RestrictedAction::Messaging).await.unwrap(),
        GateDecision::Redirect { screen: GateScreen::VerificationStatus }
    );
}

#[tokio::test]
async fn missing_fields_are_rejected_before_any_write() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    let before = h.records.write_stats().await;

    let mut no_cor = complete_form();
    no_cor.cor_image = None;
    let mut empty_id = complete_form();
    empty_id.id_image = Some(ImageUpload::new(Vec::new(), "image/jpeg"));
    let mut wrong_type = complete_form();
    wrong_type.id_image = Some(ImageUpload::new(b"%PDF".to_vec(), "application/pdf"));

    for bad in [form("", "2021-00123"), form("09175550101", "   "), no_cor, empty_id, wrong_type] {
        let result = h.verification.submit(&session, bad).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))), "{:?}", result);
    }

    assert_eq!(h.records.write_stats().await, before);
    assert_eq!(h.blobs.upload_count().await, 0);
}

#[tokio::test]
async fn oversized_image_is_rejected() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    let service = h.verification.with_max_image_bytes(8);
    let mut big = complete_form();
    big.id_image = Some(ImageUpload::new(vec![0u8; 9], "image/jpeg"));
    assert!(matches!(service.submit(&session, big).await, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn pending_request_blocks_resubmission() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    h.verification.submit(&session, complete_form()).await.unwrap();
    let before = h.records.write_stats().await;
    let uploads = h.blobs.upload_count().await;

    let result = h.verification.submit(&session, form("09170000000", "2021-99999")).await;
    assert!(matches!(result, Err(AppError::AlreadyPending)));
    assert_eq!(h.records.write_stats().await, before);
    assert_eq!(h.blobs.upload_count().await, uploads);
}

#[tokio::test]
async fn approved_request_blocks_resubmission() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    let request = h.verification.submit(&session, complete_form()).await.unwrap();
    h.verification.decide(&request.id, Decision::Approved).await.unwrap();
    let before = h.records.write_stats().await;

    let result = h.verification.submit(&session, complete_form()).await;
    assert!(matches!(result, Err(AppError::AlreadyVerified)));
    assert_eq!(h.records.write_stats().await, before);
    assert_eq!(h.verification.access_gate(&session).await.unwrap(), AccessGate::Approved);
    assert_eq!(
        h.verification.check_action(&session, RestrictedAction::Checkout).await.unwrap(),
        GateDecision::Allow
    );
}

#[tokio::test]
async fn rejected_request_is_replaced_on_resubmission() {
    let h = Harness::new();
    let (user, session) = h.add_user("ana@school.edu").await;
    let first = h.verification.submit(&session, complete_form()).await.unwrap();
    h.verification.decide(&first.id, Decision::Rejected).await.unwrap();
    assert_eq!(h.verification.access_gate(&session).await.unwrap(), AccessGate::NotRequested);

    let before = h.records.write_stats().await;
    h.clock.advance(Duration::hours(3));
    let mut retry = form("09175550101", "2021-00123");
    retry.id_image = Some(ImageUpload::new(b"clearer id photo".to_vec(), "image/jpeg"));
    let second = h.verification.submit(&session, retry).await.unwrap();
    let after = h.records.write_stats().await;

    assert_eq!(after.deletes - before.deletes, 1);
    assert_eq!(after.inserts - before.inserts, 1);
    assert_eq!(after.updates, before.updates);

    let rows = h.records.find_verifications_by_email("ana@school.edu").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, second.id);
    assert_eq!(rows[0].status, VerificationStatus::Pending);
    assert!(h.records.get_verification(&first.id).await.unwrap().is_none());

    assert_ne!(second.id_image_url, first.id_image_url);
    let keys = h.blobs.keys(BUCKET).await;
    assert!(keys.iter().all(|k| k.starts_with(&format!("{}/", user.id))));
    for url in [&second.id_image_url, &second.cor_image_url] {
        let key = url.trim_start_matches(&format!("memory://{}/", BUCKET));
        assert!(h.blobs.get(BUCKET, key).await.is_some(), "missing blob {}", key);
    }
}

#[tokio::test]
async fn upload_failure_leaves_records_untouched() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    h.blobs.fail_uploads_matching(Some("/cor-")).await;
    let before = h.records.write_stats().await;

    let result = h.verification.submit(&session, complete_form()).await;
    assert!(matches!(result, Err(AppError::UploadError(_))));
    assert_eq!(h.records.write_stats().await, before);
    assert_eq!(h.records.verification_count().await, 0);
    assert_eq!(h.verification.latest_status(&session.email).await.unwrap(), None);
}

#[tokio::test]
async fn upload_failure_on_resubmission_keeps_rejected_request() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    let first = h.verification.submit(&session, complete_form()).await.unwrap();
    h.verification.decide(&first.id, Decision::Rejected).await.unwrap();

    h.blobs.fail_uploads_matching(Some("/id-")).await;
    let result = h.verification.submit(&session, form("09175550101", "2021-00555")).await;
    assert!(matches!(result, Err(AppError::UploadError(_))));
    assert_eq!(
        h.verification.latest_status(&session.email).await.unwrap(),
        Some(VerificationStatus::Rejected)
    );
}

#[tokio::test]
async fn record_store_outage_surfaces_as_store_error() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    h.records.set_failure(Some(MemoryFailure::VerificationWrites)).await;

    let result = h.verification.submit(&session, complete_form()).await;
    assert!(matches!(result, Err(AppError::RecordStoreError(_))));

    h.records.set_failure(Some(MemoryFailure::Reads)).await;
    assert!(matches!(h.verification.latest_status(&session.email).await, Err(AppError::RecordStoreError(_))));
}

#[tokio::test]
async fn approval_copies_contact_fields_to_user() {
    let h = Harness::new();
    let (user, session) = h.add_user("ana@school.edu").await;
    let request = h.verification.submit(&session, complete_form()).await.unwrap();
    h.clock.advance(Duration::minutes(30));

    let outcome = h.verification.decide(&request.id, Decision::Approved).await.unwrap();
    assert_eq!(outcome.copy_through, CopyThrough::Applied);
    assert_eq!(outcome.request.status, VerificationStatus::Approved);
    assert_eq!(outcome.request.reviewed_at, Some(h.now()));

    let updated = h.records.get_user_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(updated.phone_number.as_deref(), Some("09175550101"));
    assert_eq!(updated.student_id.as_deref(), Some("2021-00123"));
}

#[tokio::test]
async fn approval_creates_missing_user_record() {
    let h = Harness::new();
    let session = marketbackend::models::session::Session::new(Uuid::new_v4(), "new@school.edu");
    let request = h.verification.submit(&session, complete_form()).await.unwrap();

    h.verification.decide(&request.id, Decision::Approved).await.unwrap();
    let user = h.records.get_user_by_email("new@school.edu").await.unwrap().unwrap();
    assert_eq!(user.id, session.user_id);
    assert_eq!(user.student_id.as_deref(), Some("2021-00123"));
}

#[tokio::test]
async fn rejection_leaves_user_untouched() {
    let h = Harness::new();
    let (user, session) = h.add_user("ana@school.edu").await;
    let request = h.verification.submit(&session, complete_form()).await.unwrap();

    let outcome = h.verification.decide(&request.id, Decision::Rejected).await.unwrap();
    assert_eq!(outcome.copy_through, CopyThrough::Skipped);
    assert_eq!(h.records.get_user_by_id(&user.id).await.unwrap().unwrap(), user);
}

#[tokio::test]
async fn copy_through_failure_keeps_decision() {
    let h = Harness::new();
    let (user, session) = h.add_user("ana@school.edu").await;
    let request = h.verification.submit(&session, complete_form()).await.unwrap();
    h.records.set_failure(Some(MemoryFailure::UserWrites)).await;

    let outcome = h.verification.decide(&request.id, Decision::Approved).await.unwrap();
    assert!(matches!(outcome.copy_through, CopyThrough::Failed { .. }));

    h.records.set_failure(None).await;
    assert_eq!(
        h.verification.latest_status(&session.email).await.unwrap(),
        Some(VerificationStatus::Approved)
    );
    assert_eq!(h.records.get_user_by_id(&user.id).await.unwrap().unwrap().phone_number, None);
}

#[tokio::test]
async fn deciding_unknown_request_is_not_found() {
    let h = Harness::new();
    let result = h.verification.decide(&Uuid::new_v4(), Decision::Approved).await;
    assert!(matches!(result, Err(AppError::RequestNotFound(_))));
}

#[tokio::test]
async fn latest_status_is_read_only_and_stable() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    h.verification.submit(&session, complete_form()).await.unwrap();
    let before = h.records.write_stats().await;

    let first = h.verification.latest_status(&session.email).await.unwrap();
    let second = h.verification.latest_status(&session.email).await.unwrap();
    assert_eq!(first, Some(VerificationStatus::Pending));
    assert_eq!(first, second);
    assert_eq!(h.records.write_stats().await, before);
}

#[tokio::test]
async fn interleaved_submissions_both_land_as_pending() {
    let h = Harness::new();
    let (_, session) = h.add_user("ana@school.edu").await;
    h.records.pause_after_email_read(Arc::new(Barrier::new(2)), 2).await;

    let (a, b) = tokio::join!(
        h.verification.submit(&session, complete_form()),
        h.verification.submit(&session, form("09185550202", "2021-00456")),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.id, b.id);

    assert_eq!(h.records.verification_count().await, 2);
    let pending = h.verification.list_requests(Some(VerificationStatus::Pending), None).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(
        h.verification.latest_status(&session.email).await.unwrap(),
        Some(VerificationStatus::Pending)
    );

    let third = h.verification.submit(&session, complete_form()).await;
    assert!(matches!(third, Err(AppError::AlreadyPending)), "{:?}", third);
}

#[tokio::test]
async fn review_queue_filters_by_status() {
    let h = Harness::new();
    let (_, ana) = h.add_user("ana@school.edu").await;
    let (_, ben) = h.add_user("ben@school.edu").await;
    let a = h.verification.submit(&ana, complete_form()).await.unwrap();
    h.clock.advance(Duration::minutes(1));
    h.verification.submit(&ben, complete_form()).await.unwrap();
    h.verification.decide(&a.id, Decision::Approved).await.unwrap();

    let pending = h.verification.list_requests(Some(VerificationStatus::Pending), None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].email, "ben@school.edu");

    let all = h.verification.list_requests(None, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].email, "ben@school.edu");
    assert_eq!(h.verification.list_requests(None, Some(1)).await.unwrap().len(), 1);
}
