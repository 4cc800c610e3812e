use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::RecordStore;
use crate::errors::{AppError, Result};
use crate::models::user::{AccountStatus, UserRecord};
use crate::utils::clock::Clock;
use crate::utils::crypto::PasswordManager;
use crate::utils::validation::Validator;

/// Administrator actions on user accounts.
pub struct ModerationService {
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl ModerationService {
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    pub async fn get_user(&self, user_id: &Uuid) -> Result<UserRecord> {
        self.records
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    /// Confirms the account behind a session still exists and is not
    /// frozen or under a running suspension.
    pub async fn require_active(&self, user_id: &Uuid) -> Result<UserRecord> {
        let user = self
            .records
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::AuthenticationError("Account no longer exists".to_string()))?;
        user.require_active(self.clock.now())?;
        Ok(user)
    }

    pub async fn list_users(&self, limit: Option<i64>) -> Result<Vec<UserRecord>> {
        self.records.list_users(limit).await
    }

    pub async fn freeze(&self, user_id: &Uuid) -> Result<()> {
        self.set_status(user_id, AccountStatus::Frozen, None).await?;
        info!(action = "account_frozen", user_id = %user_id);
        Ok(())
    }

    /// Suspends the account for `days` days from now.
    pub async fn suspend(&self, user_id: &Uuid, days: i64) -> Result<DateTime<Utc>> {
        let days = Validator::validate_suspension_days(days)?;
        let until = self.clock.now() + Duration::days(days);
        self.set_status(user_id, AccountStatus::Suspended, Some(until)).await?;
        info!(action = "account_suspended", user_id = %user_id, days = days, until = %until);
        Ok(until)
    }

    pub async fn reactivate(&self, user_id: &Uuid) -> Result<()> {
        self.set_status(user_id, AccountStatus::Active, None).await?;
        info!(action = "account_reactivated", user_id = %user_id);
        Ok(())
    }

    /// Replaces the user's credential with a random temporary password and
    /// returns it; only its hash is stored.
    pub async fn reset_credential(&self, user_id: &Uuid) -> Result<String> {
        let temporary = PasswordManager::generate_temporary_password();
        let hash = PasswordManager::hash_password(&temporary)?;
        let changed = self.records.update_password_hash(user_id, &hash, self.clock.now()).await?;
        if changed == 0 {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }
        info!(action = "credential_reset", user_id = %user_id);
        Ok(temporary)
    }

    /// Permanently removes the account. `confirmation` must repeat the
    /// account's email address.
    pub async fn delete(&self, user_id: &Uuid, confirmation: &str) -> Result<()> {
        let user = self.get_user(user_id).await?;
        if !confirmation.trim().eq_ignore_ascii_case(&user.email) {
            warn!(action = "account_delete_unconfirmed", user_id = %user_id);
            return Err(AppError::ValidationError(
                "Type the account's email address to confirm deletion".to_string(),
            ));
        }
        let removed = self.records.delete_user(user_id).await?;
        if removed == 0 {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }
        info!(action = "account_deleted", user_id = %user_id, user = %user.email);
        Ok(())
    }

    async fn set_status(
        &self,
        user_id: &Uuid,
        status: AccountStatus,
        suspended_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let changed = self
            .records
            .update_account_status(user_id, status, suspended_until, self.clock.now())
            .await?;
        if changed == 0 {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }
        Ok(())
    }
}
