//! In-process record store for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Barrier, Mutex, RwLock};
use uuid::Uuid;

use super::{ContactUpsert, RecordStore};
use crate::errors::{AppError, Result};
use crate::models::user::{AccountStatus, UserRecord};
use crate::models::verification::{VerificationRequest, VerificationStatus};

/// Kinds of backend failure the store can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFailure {
    /// Fail every operation.
    All,
    /// Fail only reads.
    Reads,
    /// Fail writes to verification requests.
    VerificationWrites,
    /// Fail writes to user records.
    UserWrites,
}

/// Counts of mutating calls that reached storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl WriteStats {
    pub fn total(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    verifications: Vec<VerificationRequest>,
    users: HashMap<Uuid, UserRecord>,
    stats: WriteStats,
    failure: Option<MemoryFailure>,
}

#[derive(Debug)]
struct ReadPause {
    barrier: Arc<Barrier>,
    remaining: usize,
}

/// Clones share the same underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
    pause: Arc<Mutex<Option<ReadPause>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_failure(&self, failure: Option<MemoryFailure>) {
        self.inner.write().await.failure = failure;
    }

    /// Makes the next `times` email lookups wait on `barrier` after reading
    /// and before returning, so callers can interleave read-then-write flows.
    pub async fn pause_after_email_read(&self, barrier: Arc<Barrier>, times: usize) {
        *self.pause.lock().await = (times > 0).then(|| ReadPause { barrier, remaining: times });
    }

    async fn take_pause(&self) -> Option<Arc<Barrier>> {
        let mut pause = self.pause.lock().await;
        let slot = pause.as_mut()?;
        let barrier = slot.barrier.clone();
        slot.remaining -= 1;
        if slot.remaining == 0 {
            *pause = None;
        }
        Some(barrier)
    }

    pub async fn write_stats(&self) -> WriteStats {
        self.inner.read().await.stats
    }

    pub async fn verification_count(&self) -> usize {
        self.inner.read().await.verifications.len()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

fn check(inner: &MemoryInner, op: MemoryFailure) -> Result<()> {
    match inner.failure {
        Some(MemoryFailure::All) => Err(AppError::RecordStoreError("simulated backend outage".to_string())),
        Some(failure) if failure == op => {
            Err(AppError::RecordStoreError(format!("simulated {:?} failure", failure)))
        }
        _ => Ok(()),
    }
}

fn newest_first(mut rows: Vec<VerificationRequest>) -> Vec<VerificationRequest> {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows
}

fn apply_limit<T>(mut rows: Vec<T>, limit: Option<i64>) -> Vec<T> {
    if let Some(limit) = limit {
        rows.truncate(limit.max(0) as usize);
    }
    rows
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_verifications_by_email(&self, email: &str) -> Result<Vec<VerificationRequest>> {
        let rows: Vec<VerificationRequest> = {
            let inner = self.inner.read().await;
            check(&inner, MemoryFailure::Reads)?;
            inner.verifications.iter().filter(|r| r.email == email).cloned().collect()
        };
        if let Some(barrier) = self.take_pause().await {
            barrier.wait().await;
        }
        Ok(newest_first(rows))
    }

    async fn get_verification(&self, id: &Uuid) -> Result<Option<VerificationRequest>> {
        let inner = self.inner.read().await;
        check(&inner, MemoryFailure::Reads)?;
        Ok(inner.verifications.iter().find(|r| &r.id == id).cloned())
    }

    async fn list_verifications(
        &self,
        status: Option<VerificationStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationRequest>> {
        let inner = self.inner.read().await;
        check(&inner, MemoryFailure::Reads)?;
        let rows = inner
            .verifications
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        Ok(apply_limit(newest_first(rows), limit))
    }

    async fn insert_verification(&self, request: &VerificationRequest) -> Result<()> {
        let mut inner = self.inner.write().await;
        check(&inner, MemoryFailure::VerificationWrites)?;
        if inner.verifications.iter().any(|r| r.id == request.id) {
            return Err(AppError::RecordStoreError(format!("duplicate verification id {}", request.id)));
        }
        inner.verifications.push(request.clone());
        inner.stats.inserts += 1;
        Ok(())
    }

    async fn replace_verification(&self, replaced_id: &Uuid, request: &VerificationRequest) -> Result<()> {
        let mut inner = self.inner.write().await;
        check(&inner, MemoryFailure::VerificationWrites)?;
        let before = inner.verifications.len();
        inner.verifications.retain(|r| &r.id != replaced_id);
        let removed = (before - inner.verifications.len()) as u64;
        inner.verifications.push(request.clone());
        inner.stats.deletes += removed;
        inner.stats.inserts += 1;
        Ok(())
    }

    async fn update_verification_status(
        &self,
        id: &Uuid,
        status: VerificationStatus,
        reviewed_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        check(&inner, MemoryFailure::VerificationWrites)?;
        let mut changed = 0;
        for row in inner.verifications.iter_mut().filter(|r| &r.id == id) {
            row.status = status;
            row.reviewed_at = Some(reviewed_at);
            changed += 1;
        }
        inner.stats.updates += changed;
        Ok(changed)
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<UserRecord>> {
        let inner = self.inner.read().await;
        check(&inner, MemoryFailure::Reads)?;
        Ok(inner.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.read().await;
        check(&inner, MemoryFailure::Reads)?;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        check(&inner, MemoryFailure::UserWrites)?;
        if inner.users.contains_key(&user.id) || inner.users.values().any(|u| u.email == user.email) {
            return Err(AppError::ValidationError("Email already exists".to_string()));
        }
        inner.users.insert(user.id, user.clone());
        inner.stats.inserts += 1;
        Ok(())
    }

    async fn list_users(&self, limit: Option<i64>) -> Result<Vec<UserRecord>> {
        let inner = self.inner.read().await;
        check(&inner, MemoryFailure::Reads)?;
        let mut users: Vec<UserRecord> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_limit(users, limit))
    }

    async fn upsert_user_contact(&self, contact: ContactUpsert<'_>, now: DateTime<Utc>) -> Result<()> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        check(inner, MemoryFailure::UserWrites)?;
        let existing = inner.users.values().find(|u| u.email == contact.email).map(|u| u.id);
        match existing.and_then(|id| inner.users.get_mut(&id)) {
            Some(user) => {
                user.phone_number = contact.phone_number.map(str::to_string);
                user.student_id = contact.student_id.map(str::to_string);
                user.updated_at = now;
                inner.stats.updates += 1;
            }
            None => {
                let mut user = UserRecord::new(*contact.user_id, contact.email, now);
                user.phone_number = contact.phone_number.map(str::to_string);
                user.student_id = contact.student_id.map(str::to_string);
                inner.users.insert(user.id, user);
                inner.stats.inserts += 1;
            }
        }
        Ok(())
    }

    async fn update_account_status(
        &self,
        user_id: &Uuid,
        status: AccountStatus,
        suspended_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        check(&inner, MemoryFailure::UserWrites)?;
        let changed = match inner.users.get_mut(user_id) {
            Some(user) => {
                user.account_status = status;
                user.suspended_until = suspended_until;
                user.updated_at = now;
                1
            }
            None => 0,
        };
        inner.stats.updates += changed;
        Ok(changed)
    }

    async fn update_password_hash(&self, user_id: &Uuid, password_hash: &str, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        check(&inner, MemoryFailure::UserWrites)?;
        let changed = match inner.users.get_mut(user_id) {
            Some(user) => {
                user.password_hash = Some(password_hash.to_string());
                user.updated_at = now;
                1
            }
            None => 0,
        };
        inner.stats.updates += changed;
        Ok(changed)
    }

    async fn delete_user(&self, user_id: &Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        check(&inner, MemoryFailure::UserWrites)?;
        let removed = inner.users.remove(user_id).map_or(0, |_| 1);
        inner.stats.deletes += removed;
        Ok(removed)
    }
}
