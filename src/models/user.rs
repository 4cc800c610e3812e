use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Frozen,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Frozen => "frozen",
            AccountStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "frozen" => Ok(AccountStatus::Frozen),
            "suspended" => Ok(AccountStatus::Suspended),
            other => Err(AppError::ValidationError(format!("Unknown account status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub student_id: Option<String>,
    pub account_status: AccountStatus,
    pub suspended_until: Option<DateTime<Utc>>,
    pub profile_photo: Option<String>,
    pub is_admin: bool,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(id: Uuid, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email: email.to_string(),
            display_name: None,
            phone_number: None,
            student_id: None,
            account_status: AccountStatus::Active,
            suspended_until: None,
            profile_photo: None,
            is_admin: false,
            password_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Status as it applies at `now`: a lapsed suspension counts as active.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AccountStatus {
        match (self.account_status, self.suspended_until) {
            (AccountStatus::Suspended, Some(until)) if until <= now => AccountStatus::Active,
            (status, _) => status,
        }
    }

    /// Fails with `AccountRestricted` unless the account is usable at `now`.
    pub fn require_active(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        match self.effective_status(now) {
            AccountStatus::Active => Ok(()),
            AccountStatus::Frozen => Err(AppError::AccountRestricted("This account is frozen".to_string())),
            AccountStatus::Suspended => {
                let until = self
                    .suspended_until
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "further notice".to_string());
                Err(AppError::AccountRestricted(format!("This account is suspended until {}", until)))
            }
        }
    }

    /// Name shown next to listings; falls back to the email's local part.
    pub fn public_name(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => email_local_part(&self.email).to_string(),
        }
    }
}

pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub student_id: Option<String>,
    pub account_status: AccountStatus,
    pub suspended_until: Option<DateTime<Utc>>,
    pub profile_photo: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            phone_number: user.phone_number,
            student_id: user.student_id,
            account_status: user.account_status,
            suspended_until: user.suspended_until,
            profile_photo: user.profile_photo,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}
