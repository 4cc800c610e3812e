use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::RecordStore;
use crate::errors::{AppError, Result};
use crate::models::user::UserRecord;
use crate::services::jwt::JwtManager;
use crate::utils::clock::Clock;
use crate::utils::crypto::PasswordManager;
use crate::utils::validation::Validator;

pub struct AuthService {
    jwt_manager: Arc<JwtManager>,
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    admin_emails: HashSet<String>,
}

impl AuthService {
    pub fn new(
        jwt_manager: Arc<JwtManager>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        admin_emails: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            jwt_manager,
            records,
            clock,
            admin_emails: admin_emails.into_iter().map(|e| e.trim().to_lowercase()).collect(),
        }
    }

    pub async fn register(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<UserRecord> {
        let email = email.trim().to_lowercase();
        Validator::validate_email(&email)?;
        Validator::validate_password(password)?;
        if let Some(name) = display_name {
            Validator::validate_display_name(name)?;
        }

        if self.records.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::ValidationError("Email already exists".to_string()));
        }

        let mut user = UserRecord::new(Uuid::new_v4(), &email, self.clock.now());
        user.display_name = display_name.map(|n| n.trim().to_string());
        user.password_hash = Some(PasswordManager::hash_password(password)?);
        user.is_admin = self.admin_emails.contains(&email);

        self.records.insert_user(&user).await?;
        info!(action = "user_registered", user = %email, is_admin = user.is_admin);
        Ok(user)
    }

    /// Verifies the credential and returns a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let email = email.trim().to_lowercase();
        let invalid = || AppError::AuthenticationError("Invalid email or password".to_string());

        let user = self.records.get_user_by_email(&email).await?.ok_or_else(invalid)?;
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !PasswordManager::verify_password(password, hash)? {
            return Err(invalid());
        }

        user.require_active(self.clock.now())?;

        let token = self.jwt_manager.generate_token(&user.id, &user.email, user.is_admin)?;
        info!(action = "user_logged_in", user = %user.email);
        Ok(token)
    }
}
