use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, Result};

/// The authenticated caller, passed explicitly into every operation that
/// acts on behalf of an applicant or administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

impl Session {
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self { user_id, email: email.into(), is_admin: false }
    }

    pub fn admin(user_id: Uuid, email: impl Into<String>) -> Self {
        Self { user_id, email: email.into(), is_admin: true }
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator access required".to_string()))
        }
    }
}
