#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use marketbackend::database::{MemoryStore, RecordStore};
use marketbackend::models::session::Session;
use marketbackend::models::user::UserRecord;
use marketbackend::models::verification::{ImageUpload, SubmissionForm};
use marketbackend::services::moderation_service::ModerationService;
use marketbackend::services::verification_service::VerificationService;
use marketbackend::storage::MemoryBlobStore;
use marketbackend::utils::clock::{Clock, ManualClock};

pub const BUCKET: &str = "verifications";

/// Services wired over in-memory stores and a clock that only moves on demand.
pub struct Harness {
    pub records: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub clock: ManualClock,
    pub verification: VerificationService,
    pub moderation: ModerationService,
}

impl Harness {
    pub fn new() -> Self {
        let records = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        Self {
            verification: VerificationService::new(records.clone(), blobs.clone(), shared_clock.clone(), BUCKET),
            moderation: ModerationService::new(records.clone(), shared_clock),
            records,
            blobs,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn add_user(&self, email: &str) -> (UserRecord, Session) {
        let user = UserRecord::new(Uuid::new_v4(), email, self.clock.now());
        self.records.insert_user(&user).await.unwrap();
        let session = Session::new(user.id, email);
        (user, session)
    }
}

pub fn form(phone: &str, student_id: &str) -> SubmissionForm {
    SubmissionForm {
        phone: phone.to_string(),
        student_id: student_id.to_string(),
        id_image: Some(ImageUpload::new(b"id card front".to_vec(), "image/jpeg")),
        cor_image: Some(ImageUpload::new(b"certificate of registration".to_vec(), "image/png")),
    }
}

pub fn complete_form() -> SubmissionForm {
    form("09175550101", "2021-00123")
}
