//! Runtime configuration read from the environment (and `.env`).

use crate::errors::{AppError, Result};
use crate::services::verification_service::DEFAULT_MAX_IMAGE_BYTES;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub upload_dir: String,
    pub public_base_url: String,
    pub verification_bucket: String,
    pub jwt_secret: Option<String>,
    pub port: u16,
    pub rate_limit_per_sec: u64,
    pub max_image_bytes: usize,
    pub name_cache_capacity: usize,
    pub name_cache_ttl_secs: i64,
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: &str| -> Result<String> {
            let value = text(key, default);
            if value.trim().is_empty() {
                return Err(AppError::ConfigError(format!("{} must not be empty", key)));
            }
            Ok(value)
        };

        Ok(Self {
            database_path: text("DATABASE_PATH", "marketplace.db"),
            upload_dir: text("UPLOAD_DIR", "uploads"),
            public_base_url: text("PUBLIC_BASE_URL", "http://localhost:8080/uploads"),
            verification_bucket: text("VERIFICATION_BUCKET", "verifications"),
            jwt_secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            port: parse("PORT", &number("PORT", "8080")?)?,
            rate_limit_per_sec: parse("RATE_LIMIT_PER_SEC", &number("RATE_LIMIT_PER_SEC", "5")?)?,
            max_image_bytes: parse("MAX_IMAGE_BYTES", &number("MAX_IMAGE_BYTES", &DEFAULT_MAX_IMAGE_BYTES.to_string())?)?,
            name_cache_capacity: parse("NAME_CACHE_CAPACITY", &number("NAME_CACHE_CAPACITY", "512")?)?,
            name_cache_ttl_secs: parse("NAME_CACHE_TTL_SECS", &number("NAME_CACHE_TTL_SECS", "300")?)?,
            admin_emails: text("ADMIN_EMAILS", "")
                .split(',')
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        })
    }

    /// The signing secret, required for anything that issues or checks tokens.
    pub fn require_jwt_secret(&self) -> Result<&str> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| AppError::ConfigError("JWT_SECRET must be set".to_string()))
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::ConfigError(format!("{} has invalid value '{}'", key, value)))
}
