use async_trait::async_trait;

use crate::errors::Result;
use crate::models::session::Session;

/// Resolves a bearer credential to the authenticated user, if any.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means the credential is unknown, invalid or expired.
    async fn current_user(&self, token: &str) -> Result<Option<Session>>;
}
