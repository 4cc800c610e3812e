use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(VerificationStatus::Pending),
            "approved" => Ok(VerificationStatus::Approved),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(AppError::ValidationError(format!("Unknown verification status '{}'", other))),
        }
    }
}

/// An administrator's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(self) -> VerificationStatus {
        match self {
            Decision::Approved => VerificationStatus::Approved,
            Decision::Rejected => VerificationStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approved),
            "reject" | "rejected" => Ok(Decision::Rejected),
            other => Err(AppError::ValidationError(format!("Decision must be 'approved' or 'rejected', got '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VerificationRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub phone: String,
    pub student_id: String,
    pub id_image_url: String,
    pub cor_image_url: String,
    pub status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl VerificationRequest {
    /// Fields worth copying into the user record on approval, if any.
    pub fn contact_fields(&self) -> Option<(Option<&str>, Option<&str>)> {
        let phone = Some(self.phone.trim()).filter(|p| !p.is_empty());
        let student_id = Some(self.student_id.trim()).filter(|s| !s.is_empty());
        if phone.is_none() && student_id.is_none() {
            None
        } else {
            Some((phone, student_id))
        }
    }
}

/// A single uploaded image as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self { bytes, content_type: content_type.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Everything an applicant fills in on the verification screen.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub phone: String,
    pub student_id: String,
    pub id_image: Option<ImageUpload>,
    pub cor_image: Option<ImageUpload>,
}

/// Which of the two verification images a blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    IdCard,
    CertificateOfRegistration,
}

impl ImageKind {
    pub fn key_prefix(&self) -> &'static str {
        match self {
            ImageKind::IdCard => "id",
            ImageKind::CertificateOfRegistration => "cor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CopyThrough {
    /// Phone and student id were written to the user record.
    Applied,
    /// Nothing to copy (rejection, or no contact fields on the request).
    Skipped,
    /// The status update stuck but the user record could not be written.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DecisionOutcome {
    pub request: VerificationRequest,
    pub copy_through: CopyThrough,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(phone: &str, student_id: &str) -> VerificationRequest {
        VerificationRequest {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            email: "ana@school.edu".to_string(),
            phone: phone.to_string(),
            student_id: student_id.to_string(),
            id_image_url: "u1".to_string(),
            cor_image_url: "u2".to_string(),
            status: VerificationStatus::Pending,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Pending".parse::<VerificationStatus>().unwrap(), VerificationStatus::Pending);
        assert_eq!(" approved ".parse::<VerificationStatus>().unwrap(), VerificationStatus::Approved);
        assert!("not_requested".parse::<VerificationStatus>().is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [VerificationStatus::Pending, VerificationStatus::Approved, VerificationStatus::Rejected] {
            assert_eq!(status.as_str().parse::<VerificationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn decision_accepts_verb_and_adjective() {
        assert_eq!("approve".parse::<Decision>().unwrap(), Decision::Approved);
        assert_eq!("rejected".parse::<Decision>().unwrap(), Decision::Rejected);
        assert!("pending".parse::<Decision>().is_err());
    }

    #[test]
    fn contact_fields_skip_blank_values() {
        assert_eq!(request("0917", "2021-001").contact_fields(), Some((Some("0917"), Some("2021-001"))));
        assert_eq!(request("  ", "2021-001").contact_fields(), Some((None, Some("2021-001"))));
        assert_eq!(request("", " ").contact_fields(), None);
    }
}
