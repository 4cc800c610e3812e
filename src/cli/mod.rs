mod commands;
pub use commands::*;

use crate::errors::{AppError, Result};
use colored::Colorize;
use std::io::{self, Write};

pub struct CLI;

impl CLI {
    pub fn print_header() {
        println!("{}", "=".repeat(50).bright_blue());
        println!("{}", "    Marketplace Backend - Admin Console    ".bright_yellow().bold());
        println!("{}", "=".repeat(50).bright_blue());
        println!();
    }

    pub fn print_success(message: &str) {
        println!("{} {}", "✅".green(), message.green());
    }

    pub fn print_error(message: &str) {
        println!("{} {}", "❌".red(), message.red());
    }

    pub fn print_info(message: &str) {
        println!("{} {}", "ℹ️".blue(), message.blue());
    }

    pub fn get_input(prompt: &str) -> Result<String> {
        print!("{} ", prompt.cyan());
        io::stdout().flush().map_err(|e| AppError::InternalError(format!("IO error: {}", e)))?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| AppError::InternalError(format!("Failed to read input: {}", e)))?;

        Ok(input.trim().to_string())
    }

    pub fn print_help() {
        println!("\n{}", "Available Commands:".cyan().bold());
        println!("  serve");
        println!("    Start the HTTP API (default when no command is given)");
        println!();
        println!("  review list [pending|approved|rejected]");
        println!("    Show the verification review queue");
        println!("  review approve <request_id>");
        println!("  review reject <request_id>");
        println!("    Decide a verification request");
        println!();
        println!("  status <email>");
        println!("    Show the latest verification status for an applicant");
        println!();
        Self::print_user_help();
        println!("  help");
        println!("    Show this help message");
        println!();
    }

    pub fn print_user_help() {
        println!("{}", "User Commands:".cyan().bold());
        println!("  user list");
        println!("  user freeze <user_id>");
        println!("  user suspend <user_id> <days>");
        println!("  user reactivate <user_id>");
        println!("  user reset-credential <user_id>");
        println!("  user delete <user_id> [confirm_email]");
        println!("    Deleting asks for the account email unless it is given");
        println!();
    }
}
