//! Navigation gating derived from the applicant's latest verification status.
//!
//! The gate is advisory: it tells the client where to send the user, it does
//! not protect any data by itself.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::models::verification::VerificationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessGate {
    Approved,
    Pending,
    NotRequested,
}

impl AccessGate {
    /// Maps the latest status (or its absence) to a gate value.
    ///
    /// A rejected request sends the applicant back to the call-to-action
    /// screen, same as never having applied.
    pub fn from_latest(status: Option<VerificationStatus>) -> Self {
        match status {
            Some(VerificationStatus::Approved) => AccessGate::Approved,
            Some(VerificationStatus::Pending) => AccessGate::Pending,
            Some(VerificationStatus::Rejected) | None => AccessGate::NotRequested,
        }
    }

    pub fn for_action(self, _action: RestrictedAction) -> GateDecision {
        match self {
            AccessGate::Approved => GateDecision::Allow,
            AccessGate::Pending => GateDecision::Redirect { screen: GateScreen::VerificationStatus },
            AccessGate::NotRequested => GateDecision::Redirect { screen: GateScreen::VerificationPrompt },
        }
    }
}

/// Actions that require a verified account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RestrictedAction {
    PostListing,
    PostRental,
    Messaging,
    Checkout,
}

impl FromStr for RestrictedAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post_listing" => Ok(RestrictedAction::PostListing),
            "post_rental" => Ok(RestrictedAction::PostRental),
            "messaging" => Ok(RestrictedAction::Messaging),
            "checkout" => Ok(RestrictedAction::Checkout),
            other => Err(AppError::ValidationError(format!("Unknown action '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GateScreen {
    /// Shows the pending request and a "Refresh Status" control.
    VerificationStatus,
    /// Invites the user to start verification.
    VerificationPrompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    Redirect { screen: GateScreen },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absence_maps_to_not_requested() {
        assert_eq!(AccessGate::from_latest(None), AccessGate::NotRequested);
    }

    #[test]
    fn each_status_maps_to_a_gate() {
        assert_eq!(AccessGate::from_latest(Some(VerificationStatus::Approved)), AccessGate::Approved);
        assert_eq!(AccessGate::from_latest(Some(VerificationStatus::Pending)), AccessGate::Pending);
        assert_eq!(AccessGate::from_latest(Some(VerificationStatus::Rejected)), AccessGate::NotRequested);
    }

    #[test]
    fn only_approved_is_allowed_through() {
        for action in [
            RestrictedAction::PostListing,
            RestrictedAction::PostRental,
            RestrictedAction::Messaging,
            RestrictedAction::Checkout,
        ] {
            assert_eq!(AccessGate::Approved.for_action(action), GateDecision::Allow);
            assert_eq!(
                AccessGate::Pending.for_action(action),
                GateDecision::Redirect { screen: GateScreen::VerificationStatus }
            );
            assert_eq!(
                AccessGate::NotRequested.for_action(action),
                GateDecision::Redirect { screen: GateScreen::VerificationPrompt }
            );
        }
    }

    #[test]
    fn parses_action_names() {
        assert_eq!("post_listing".parse::<RestrictedAction>().unwrap(), RestrictedAction::PostListing);
        assert!("dance".parse::<RestrictedAction>().is_err());
    }
}
