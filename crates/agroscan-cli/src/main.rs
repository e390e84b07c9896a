//! agroscan - command-line front-end for the crop diagnostic assistant.
//!
//! Log in, send a crop photo for diagnosis, and browse or prune the chat
//! history kept by the backend.

mod navigator;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agroscan_core::api::Route;
use agroscan_core::models::{ChatSummary, ImageUpload, RegistrationForm};
use agroscan_core::{ApiClient, Config, Navigator, RedirectToLogin};

use navigator::ConsoleNavigator;

#[derive(Parser)]
#[command(name = "agroscan", version, about = "Crop diagnostic assistant")]
struct Cli {
    /// Backend base URL (overrides config and AGROSCAN_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        /// Account email (defaults to the last one used)
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        document: String,
        #[arg(long)]
        company: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// List past diagnoses
    History {
        /// Chats per page
        #[arg(long)]
        limit: Option<u32>,
        /// Keep fetching until the whole history is loaded
        #[arg(long)]
        all: bool,
    },
    /// Send a crop photo with a description for diagnosis
    Diagnose {
        #[arg(long)]
        image: PathBuf,
        #[arg(long, short)]
        message: String,
    },
    /// Delete a chat from the history
    Delete { chat_id: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    info!(base_url = %config.base_url, storage = ?config.storage, "agroscan starting");

    let store = config.open_store()?;
    let navigator = Arc::new(ConsoleNavigator);
    let api = ApiClient::new(&config, store, Arc::new(RedirectToLogin::new(navigator.clone())))?;

    match cli.command {
        Command::Login { email } => login(&api, &mut config, email).await,
        Command::Register {
            name,
            email,
            document,
            company,
        } => register(&api, name, email, document, company).await,
        Command::Logout => {
            api.logout().await?;
            println!("Signed out.");
            Ok(())
        }
        Command::History { limit, all } => {
            history(&api, limit.unwrap_or(config.chat_page_size), all).await
        }
        Command::Diagnose { image, message } => {
            diagnose(&api, navigator.as_ref(), &image, &message).await
        }
        Command::Delete { chat_id } => {
            let uid = require_uid(&api).await?;
            api.delete_chat(&uid, &chat_id).await?;
            println!("Deleted chat {}", chat_id);
            Ok(())
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn require_uid(api: &ApiClient) -> Result<String> {
    api.session()
        .uid()
        .await
        .ok_or_else(|| anyhow!("Not signed in. Run `agroscan login` first."))
}

async fn login(api: &ApiClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    let login = api.login(&email, &password).await?;

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Signed in as {}", login.user.display_name());
    Ok(())
}

async fn register(
    api: &ApiClient,
    name: String,
    email: String,
    document_number: String,
    company_id: Option<String>,
) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm_password = rpassword::prompt_password("Confirm password: ")?;
    let form = RegistrationForm {
        name,
        email,
        document_number,
        password,
        confirm_password,
        company_id,
    };

    api.register(&form).await?;
    println!("Account created. Run `agroscan login` to sign in.");
    Ok(())
}

fn print_chat(chat: &ChatSummary) {
    let date = chat
        .created_at
        .as_deref()
        .map(|d| d.chars().take(10).collect::<String>())
        .unwrap_or_default();
    println!("{:<26} {:<10} {}", chat.chat_id, date, chat.label());
}

async fn history(api: &ApiClient, page_size: u32, all: bool) -> Result<()> {
    let uid = require_uid(api).await?;
    let history = api.chat_history(&uid, page_size);

    history.refresh().await?;
    if all {
        while history.load_more().await? {}
    }

    let chats = history.items();
    if chats.is_empty() {
        println!("No diagnoses yet.");
        return Ok(());
    }
    for chat in &chats {
        print_chat(chat);
    }
    if history.has_more() {
        println!("... {} of {} shown, use --all for the rest", chats.len(), history.total());
    }
    Ok(())
}

async fn diagnose(
    api: &ApiClient,
    navigator: &dyn Navigator,
    image: &Path,
    message: &str,
) -> Result<()> {
    let uid = require_uid(api).await?;
    let upload = ImageUpload::from_path(image)?;

    let chat_id = api
        .send_diagnosis(&uid, message, upload)
        .await
        .context("Diagnosis request failed")?;

    navigator.push(Route::Chat { chat_id });
    Ok(())
}
