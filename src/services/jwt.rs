use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::session::Session;
use crate::services::identity::IdentityProvider;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

pub struct JwtManager {
    secret: String,
    ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: String) -> Self {
        Self { secret, ttl: Duration::hours(24) }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn generate_token(&self, user_id: &Uuid, email: &str, is_admin: bool) -> Result<String> {
        let now = Utc::now();
        let expiration = now + self.ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            is_admin,
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_ref()))
            .map_err(|e| AppError::AuthenticationError(format!("Failed to generate token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_ref()), &Validation::default())
            .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))
    }
}

impl TryFrom<Claims> for Session {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| AppError::AuthenticationError(format!("Invalid user ID in token: {}", e)))?;

        Ok(Session { user_id, email: claims.email, is_admin: claims.is_admin })
    }
}

#[async_trait]
impl IdentityProvider for JwtManager {
    async fn current_user(&self, token: &str) -> Result<Option<Session>> {
        match self.validate_token(token) {
            Ok(data) => Session::try_from(data.claims).map(Some),
            Err(e) => {
                debug!(action = "token_rejected", error = %e);
                Ok(None)
            }
        }
    }
}
