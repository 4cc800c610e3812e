use crate::errors::{AppError, Result};
use crate::models::verification::ImageUpload;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex compiles")
});

/// Longest suspension an administrator can impose in one action.
pub const MAX_SUSPENSION_DAYS: i64 = 3650;

pub const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

pub struct Validator;

impl Validator {
    pub fn validate_email(email: &str) -> Result<()> {
        if !EMAIL_REGEX.is_match(email) {
            return Err(AppError::ValidationError("Invalid email format".to_string()));
        }

        if email.len() > 254 {
            return Err(AppError::ValidationError("Email too long".to_string()));
        }

        Ok(())
    }

    pub fn validate_password(password: &str) -> Result<()> {
        if password.len() < 8 {
            return Err(AppError::ValidationError("Password must be at least 8 characters long".to_string()));
        }

        if password.len() > 128 {
            return Err(AppError::ValidationError("Password must be less than 128 characters".to_string()));
        }

        let has_letter = password.chars().any(|c| c.is_alphabetic());
        let has_digit = password.chars().any(|c| c.is_numeric());

        if !has_letter || !has_digit {
            return Err(AppError::ValidationError("Password must contain at least one letter and one digit".to_string()));
        }

        Ok(())
    }

    /// Rejects a missing or whitespace-only form field.
    pub fn require(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(AppError::ValidationError(format!("{} is required", field)));
        }
        Ok(())
    }

    pub fn validate_display_name(name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 60 {
            return Err(AppError::ValidationError("Display name must be 1-60 characters".to_string()));
        }
        Ok(())
    }

    /// Checks presence, content type and size of an uploaded image.
    pub fn validate_image(field: &str, image: Option<&ImageUpload>, max_bytes: usize) -> Result<()> {
        let image = match image {
            Some(image) if !image.is_empty() => image,
            _ => return Err(AppError::ValidationError(format!("{} is required", field))),
        };
        if !ACCEPTED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
            return Err(AppError::ValidationError(format!(
                "{} must be a JPEG, PNG or WebP image, got '{}'",
                field, image.content_type
            )));
        }
        if image.bytes.len() > max_bytes {
            return Err(AppError::ValidationError(format!("{} exceeds {} bytes", field, max_bytes)));
        }
        Ok(())
    }

    pub fn validate_suspension_days(days: i64) -> Result<i64> {
        if days <= 0 {
            return Err(AppError::InvalidDuration(format!("{} is not a positive number of days", days)));
        }
        if days > MAX_SUSPENSION_DAYS {
            return Err(AppError::InvalidDuration(format!("{} exceeds the {} day maximum", days, MAX_SUSPENSION_DAYS)));
        }
        Ok(days)
    }

    /// Page sizes must be positive when given.
    pub fn validate_limit(limit: Option<i64>) -> Result<Option<i64>> {
        match limit {
            Some(limit) if limit < 1 => Err(AppError::ValidationError(format!("limit must be at least 1, got {}", limit))),
            _ => Ok(limit),
        }
    }

    /// Parses admin-entered text such as "7" into a suspension length.
    pub fn parse_suspension_days(input: &str) -> Result<i64> {
        let days = input
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::InvalidDuration(format!("'{}' is not a whole number of days", input.trim())))?;
        Self::validate_suspension_days(days)
    }
}
