use colored::Colorize;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::CLI;
use crate::errors::{AppError, Result};
use crate::models::verification::{CopyThrough, Decision, VerificationStatus};
use crate::services::moderation_service::ModerationService;
use crate::services::verification_service::VerificationService;
use crate::utils::validation::Validator;

/// The services the admin console drives.
#[derive(Clone)]
pub struct AdminConsole {
    pub verification: Arc<VerificationService>,
    pub moderation: Arc<ModerationService>,
}

impl AdminConsole {
    pub fn new(verification: Arc<VerificationService>, moderation: Arc<ModerationService>) -> Self {
        Self { verification, moderation }
    }
}

fn parse_id(raw: Option<&String>, what: &str) -> Result<Uuid> {
    let raw = raw.ok_or_else(|| AppError::ValidationError(format!("Missing {}", what)))?;
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::ValidationError(format!("Invalid {} '{}'", what, raw)))
}

pub async fn handle_review_command(console: &AdminConsole, args: &[String]) -> Result<()> {
    let Some(sub) = args.first() else {
        println!("{}", "Review command usage:".cyan().bold());
        println!("  review list [status]");
        println!("  review approve <request_id>");
        println!("  review reject <request_id>");
        return Ok(());
    };

    match sub.as_str() {
        "list" => {
            let status = args.get(1).map(|s| s.parse::<VerificationStatus>()).transpose()?;
            let requests = console.verification.list_requests(status, None).await?;
            if requests.is_empty() {
                CLI::print_info("No verification requests found");
                return Ok(());
            }
            println!("\n{}", "📋 Verification Requests".cyan().bold());
            for request in requests {
                println!(
                    "{}  {}  {}  phone {}  student id {}  submitted {}",
                    request.id.to_string().yellow(),
                    request.status.to_string().bold(),
                    request.email,
                    request.phone,
                    request.student_id,
                    request.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        "approve" | "reject" => {
            let id = parse_id(args.get(1), "request id")?;
            let decision: Decision = sub.parse()?;
            let outcome = console.verification.decide(&id, decision).await?;
            CLI::print_success(&format!("Request {} is now {}", id, outcome.request.status));
            match outcome.copy_through {
                CopyThrough::Applied => CLI::print_info("Phone and student ID copied to the user record"),
                CopyThrough::Skipped => {}
                CopyThrough::Failed { reason } => {
                    CLI::print_error(&format!("User record was not updated: {}", reason))
                }
            }
        }
        other => {
            println!("{}", format!("Unknown review command '{}'", other).red());
        }
    }
    Ok(())
}

pub async fn handle_user_command(console: &AdminConsole, args: &[String]) -> Result<()> {
    let Some(sub) = args.first() else {
        CLI::print_user_help();
        return Ok(());
    };

    match sub.as_str() {
        "list" => {
            let users = console.moderation.list_users(None).await?;
            for user in users {
                println!(
                    "{}  {}  {}  {}",
                    user.id.to_string().yellow(),
                    user.email,
                    user.public_name(),
                    user.account_status.to_string().bold()
                );
            }
        }
        "freeze" => {
            let id = parse_id(args.get(1), "user id")?;
            console.moderation.freeze(&id).await?;
            CLI::print_success("Account frozen");
        }
        "suspend" => {
            let id = parse_id(args.get(1), "user id")?;
            let raw = args
                .get(2)
                .ok_or_else(|| AppError::InvalidDuration("Missing number of days".to_string()))?;
            let days = Validator::parse_suspension_days(raw)?;
            let until = console.moderation.suspend(&id, days).await?;
            CLI::print_success(&format!("Account suspended until {}", until.format("%Y-%m-%d %H:%M UTC")));
        }
        "reactivate" => {
            let id = parse_id(args.get(1), "user id")?;
            console.moderation.reactivate(&id).await?;
            CLI::print_success("Account reactivated");
        }
        "reset-credential" => {
            let id = parse_id(args.get(1), "user id")?;
            let temporary = console.moderation.reset_credential(&id).await?;
            CLI::print_success("Credential reset");
            println!("Temporary password (shown once): {}", temporary.yellow().bold());
        }
        "delete" => {
            let id = parse_id(args.get(1), "user id")?;
            let confirmation = match args.get(2) {
                Some(email) => email.clone(),
                None => {
                    let user = console.moderation.get_user(&id).await?;
                    println!("{}", format!("⚠️  This permanently deletes {}", user.email).red().bold());
                    CLI::get_input("Type the account email to confirm:")?
                }
            };
            console.moderation.delete(&id, &confirmation).await?;
            CLI::print_success("Account deleted");
        }
        other => {
            println!("{}", format!("Unknown user command '{}'", other).red());
        }
    }
    Ok(())
}

pub async fn handle_status_command(console: &AdminConsole, args: &[String]) -> Result<()> {
    let email = args
        .first()
        .ok_or_else(|| AppError::ValidationError("Usage: status <email>".to_string()))?;
    match console.verification.latest_status(email).await? {
        Some(status) => println!("{}: {}", email, status.to_string().bold()),
        None => println!("{}: {}", email, "not requested".dimmed()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, RecordStore};
    use crate::models::user::{AccountStatus, UserRecord};
    use crate::storage::MemoryBlobStore;
    use crate::utils::clock::{Clock, ManualClock};

    async fn console() -> (AdminConsole, Arc<MemoryStore>, UserRecord) {
        let store = Arc::new(MemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let user = UserRecord::new(Uuid::new_v4(), "ben@school.edu", clock.now());
        store.insert_user(&user).await.unwrap();
        let verification = VerificationService::new(store.clone(), Arc::new(MemoryBlobStore::new()), clock.clone(), "verifications");
        let moderation = ModerationService::new(store.clone(), clock);
        (AdminConsole::new(Arc::new(verification), Arc::new(moderation)), store, user)
    }

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn suspend_rejects_bad_duration_without_writing() {
        let (console, store, user) = console().await;
        let before = store.write_stats().await;
        let id = user.id.to_string();
        for days in ["0", "-3", "abc"] {
            let result = handle_user_command(&console, &args(&["suspend", &id, days])).await;
            assert!(matches!(result, Err(AppError::InvalidDuration(_))), "{}", days);
        }
        assert_eq!(store.write_stats().await, before);
    }

    #[tokio::test]
    async fn freeze_then_delete_with_confirmation() {
        let (console, store, user) = console().await;
        let id = user.id.to_string();
        handle_user_command(&console, &args(&["freeze", &id])).await.unwrap();
        let frozen = store.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(frozen.account_status, AccountStatus::Frozen);

        let wrong = handle_user_command(&console, &args(&["delete", &id, "someone@else.edu"])).await;
        assert!(matches!(wrong, Err(AppError::ValidationError(_))));
        handle_user_command(&console, &args(&["delete", &id, "ben@school.edu"])).await.unwrap();
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn review_rejects_unknown_request() {
        let (console, _store, _user) = console().await;
        let missing = Uuid::new_v4().to_string();
        let result = handle_review_command(&console, &args(&["approve", &missing])).await;
        assert!(matches!(result, Err(AppError::RequestNotFound(_))));
        let bad_id = handle_review_command(&console, &args(&["approve", "nope"])).await;
        assert!(matches!(bad_id, Err(AppError::ValidationError(_))));
    }
}
