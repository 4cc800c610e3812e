use colored::Colorize;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use marketbackend::api;
use marketbackend::cli::{self, AdminConsole, CLI};
use marketbackend::config::AppConfig;
use marketbackend::database::{RecordStore, SqliteDatabase};
use marketbackend::errors::Result;
use marketbackend::services::moderation_service::ModerationService;
use marketbackend::services::verification_service::VerificationService;
use marketbackend::storage::{BlobStore, LocalBlobStore};
use marketbackend::utils::clock::{Clock, SystemClock};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().flatten_event(true))
        .init();
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("{}", format!("Application error: {}", e).red());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    match command {
        "serve" => api::start_http_server(&config).await,
        "review" | "user" | "status" => {
            let console = open_console(&config).await?;
            let rest = &args[2..];
            match command {
                "review" => cli::handle_review_command(&console, rest).await,
                "user" => cli::handle_user_command(&console, rest).await,
                _ => cli::handle_status_command(&console, rest).await,
            }
        }
        "help" | "--help" | "-h" => {
            CLI::print_header();
            CLI::print_help();
            Ok(())
        }
        _ => {
            println!("{}", "Unknown command. Use 'help' to see available commands.".red());
            Ok(())
        }
    }
}

async fn open_console(config: &AppConfig) -> Result<AdminConsole> {
    let records: Arc<dyn RecordStore> = Arc::new(SqliteDatabase::new(&config.database_path).await?);
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.upload_dir, &config.public_base_url));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let verification = VerificationService::new(records.clone(), blobs, clock.clone(), config.verification_bucket.clone())
        .with_max_image_bytes(config.max_image_bytes);
    let moderation = ModerationService::new(records, clock);
    Ok(AdminConsole::new(Arc::new(verification), Arc::new(moderation)))
}
