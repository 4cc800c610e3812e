//! Lifecycle of an applicant's identity-verification request.
//!
//! Applicants submit a request (phone, student id and two images); an
//! administrator approves or rejects it; the latest request's status drives
//! the [`AccessGate`] used by navigation. Only a rejected request may be
//! replaced by a new submission.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{ContactUpsert, RecordStore};
use crate::errors::{AppError, Result};
use crate::models::gate::{AccessGate, GateDecision, RestrictedAction};
use crate::models::session::Session;
use crate::models::verification::{
    CopyThrough, Decision, DecisionOutcome, ImageKind, ImageUpload, SubmissionForm, VerificationRequest,
    VerificationStatus,
};
use crate::storage::BlobStore;
use crate::utils::clock::Clock;
use crate::utils::crypto::content_digest;
use crate::utils::validation::Validator;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Hex digits of the content digest kept in a blob key.
const KEY_DIGEST_LEN: usize = 16;

pub struct VerificationService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    bucket: String,
    max_image_bytes: usize,
}

impl VerificationService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            records,
            blobs,
            clock,
            bucket: bucket.into(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Files a new verification request for the session's user.
    ///
    /// Both images are uploaded before any record is touched, and a rejected
    /// predecessor is swapped out in the same store call that inserts the new
    /// request, so a failure at any step leaves the applicant's records as
    /// they were.
    pub async fn submit(&self, session: &Session, form: SubmissionForm) -> Result<VerificationRequest> {
        let (id_image, cor_image) = self.validate(&form)?;

        let replaced = match self.latest_request(&session.email).await? {
            None => None,
            Some(latest) => match latest.status {
                VerificationStatus::Pending => return Err(AppError::AlreadyPending),
                VerificationStatus::Approved => return Err(AppError::AlreadyVerified),
                VerificationStatus::Rejected => Some(latest.id),
            },
        };

        let id_image_url = self.store_image(session, ImageKind::IdCard, id_image).await?;
        let cor_image_url = self
            .store_image(session, ImageKind::CertificateOfRegistration, cor_image)
            .await?;

        let request = VerificationRequest {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            email: session.email.clone(),
            phone: form.phone.trim().to_string(),
            student_id: form.student_id.trim().to_string(),
            id_image_url,
            cor_image_url,
            status: VerificationStatus::Pending,
            created_at: self.clock.now(),
            reviewed_at: None,
        };

        match replaced {
            Some(rejected_id) => self.records.replace_verification(&rejected_id, &request).await?,
            None => self.records.insert_verification(&request).await?,
        }

        info!(
            action = "verification_submitted",
            user = %session.email,
            request_id = %request.id,
            resubmission = replaced.is_some()
        );
        Ok(request)
    }

    /// The applicant's most recent request, if any.
    pub async fn latest_request(&self, email: &str) -> Result<Option<VerificationRequest>> {
        let rows = self.records.find_verifications_by_email(email).await?;
        Ok(rows.into_iter().next())
    }

    /// Status of the most recent request; `None` when the applicant never applied.
    pub async fn latest_status(&self, email: &str) -> Result<Option<VerificationStatus>> {
        Ok(self.latest_request(email).await?.map(|r| r.status))
    }

    pub async fn access_gate(&self, session: &Session) -> Result<AccessGate> {
        Ok(AccessGate::from_latest(self.latest_status(&session.email).await?))
    }

    pub async fn check_action(&self, session: &Session, action: RestrictedAction) -> Result<GateDecision> {
        Ok(self.access_gate(session).await?.for_action(action))
    }

    /// Records an administrator's decision.
    ///
    /// The status update must succeed. On approval the request's phone and
    /// student id are then copied onto the user record; that copy is
    /// best-effort and its failure is reported in the outcome instead of
    /// undoing the decision.
    pub async fn decide(&self, request_id: &Uuid, decision: Decision) -> Result<DecisionOutcome> {
        let request = self
            .records
            .get_verification(request_id)
            .await?
            .ok_or_else(|| AppError::RequestNotFound(request_id.to_string()))?;

        let now = self.clock.now();
        let status = decision.status();
        let changed = self.records.update_verification_status(request_id, status, now).await?;
        if changed == 0 {
            return Err(AppError::RequestNotFound(request_id.to_string()));
        }

        let request = VerificationRequest { status, reviewed_at: Some(now), ..request };
        info!(action = "verification_decided", request_id = %request_id, user = %request.email, status = %status);

        let copy_through = match decision {
            Decision::Approved => self.copy_through(&request).await,
            Decision::Rejected => CopyThrough::Skipped,
        };

        Ok(DecisionOutcome { request, copy_through })
    }

    /// Review queue, newest first.
    pub async fn list_requests(
        &self,
        status: Option<VerificationStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationRequest>> {
        self.records.list_verifications(status, limit).await
    }

    async fn copy_through(&self, request: &VerificationRequest) -> CopyThrough {
        let Some((phone_number, student_id)) = request.contact_fields() else {
            return CopyThrough::Skipped;
        };
        let contact = ContactUpsert {
            user_id: &request.user_id,
            email: &request.email,
            phone_number,
            student_id,
        };
        match self.records.upsert_user_contact(contact, self.clock.now()).await {
            Ok(()) => CopyThrough::Applied,
            Err(e) => {
                warn!(
                    action = "verification_copy_through_failed",
                    request_id = %request.id,
                    user = %request.email,
                    error = %e
                );
                CopyThrough::Failed { reason: e.to_string() }
            }
        }
    }

    fn validate<'a>(&self, form: &'a SubmissionForm) -> Result<(&'a ImageUpload, &'a ImageUpload)> {
        Validator::require("Phone number", &form.phone)?;
        Validator::require("Student ID", &form.student_id)?;
        Validator::validate_image("ID image", form.id_image.as_ref(), self.max_image_bytes)?;
        Validator::validate_image("COR image", form.cor_image.as_ref(), self.max_image_bytes)?;
        match (form.id_image.as_ref(), form.cor_image.as_ref()) {
            (Some(id_image), Some(cor_image)) => Ok((id_image, cor_image)),
            _ => Err(AppError::ValidationError("Both images are required".to_string())),
        }
    }

    async fn store_image(&self, session: &Session, kind: ImageKind, image: &ImageUpload) -> Result<String> {
        let key = blob_key(&session.user_id, kind, image);
        self.blobs
            .upload(&self.bucket, &key, &image.bytes, &image.content_type)
            .await
            .map_err(|e| match e {
                AppError::UploadError(_) => e,
                other => AppError::UploadError(other.to_string()),
            })?;
        Ok(self.blobs.public_url(&self.bucket, &key))
    }
}

/// `{user_id}/{kind}-{digest}.{ext}`: scoped to the applicant and addressed
/// by content, so a new image never lands on a URL already handed out.
pub fn blob_key(user_id: &Uuid, kind: ImageKind, image: &ImageUpload) -> String {
    let digest = content_digest(&image.bytes);
    format!(
        "{}/{}-{}.{}",
        user_id,
        kind.key_prefix(),
        &digest[..KEY_DIGEST_LEN],
        extension_for(&image.content_type)
    )
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_keys_are_scoped_and_content_addressed() {
        let user = Uuid::new_v4();
        let a = ImageUpload::new(b"front of id".to_vec(), "image/jpeg");
        let b = ImageUpload::new(b"another photo".to_vec(), "image/jpeg");

        let key = blob_key(&user, ImageKind::IdCard, &a);
        assert!(key.starts_with(&format!("{}/id-", user)));
        assert!(key.ends_with(".jpg"));
        assert_eq!(key, blob_key(&user, ImageKind::IdCard, &a));
        assert_ne!(key, blob_key(&user, ImageKind::IdCard, &b));
        assert_ne!(key, blob_key(&user, ImageKind::CertificateOfRegistration, &a));
    }

    #[test]
    fn png_keys_use_png_extension() {
        let image = ImageUpload::new(vec![1, 2, 3], "image/png");
        assert!(blob_key(&Uuid::new_v4(), ImageKind::CertificateOfRegistration, &image).ends_with(".png"));
    }
}
