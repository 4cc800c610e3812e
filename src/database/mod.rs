//! Record Store: durable storage for verification requests and user records.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::Result;
use crate::models::user::{AccountStatus, UserRecord};
use crate::models::verification::{VerificationRequest, VerificationStatus};

pub use memory::MemoryStore;
pub use sqlite::SqliteDatabase;

/// Contact fields copied from an approved request onto a user record.
#[derive(Debug, Clone, Copy)]
pub struct ContactUpsert<'a> {
    pub user_id: &'a Uuid,
    pub email: &'a str,
    pub phone_number: Option<&'a str>,
    pub student_id: Option<&'a str>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All requests for an applicant, newest first.
    async fn find_verifications_by_email(&self, email: &str) -> Result<Vec<VerificationRequest>>;

    async fn get_verification(&self, id: &Uuid) -> Result<Option<VerificationRequest>>;

    /// Requests across all applicants, newest first.
    async fn list_verifications(
        &self,
        status: Option<VerificationStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationRequest>>;

    async fn insert_verification(&self, request: &VerificationRequest) -> Result<()>;

    /// Deletes `replaced_id` and inserts `request` as one unit: either both
    /// happen or neither does.
    async fn replace_verification(&self, replaced_id: &Uuid, request: &VerificationRequest) -> Result<()>;

    /// Returns the number of rows changed.
    async fn update_verification_status(
        &self,
        id: &Uuid,
        status: VerificationStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<u64>;

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<UserRecord>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn insert_user(&self, user: &UserRecord) -> Result<()>;

    async fn list_users(&self, limit: Option<i64>) -> Result<Vec<UserRecord>>;

    /// Updates phone and student id on the user matching `email`, creating
    /// the user when none exists.
    async fn upsert_user_contact(&self, contact: ContactUpsert<'_>, now: DateTime<Utc>) -> Result<()>;

    async fn update_account_status(
        &self,
        user_id: &Uuid,
        status: AccountStatus,
        suspended_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    async fn update_password_hash(&self, user_id: &Uuid, password_hash: &str, now: DateTime<Utc>) -> Result<u64>;

    async fn delete_user(&self, user_id: &Uuid) -> Result<u64>;
}
