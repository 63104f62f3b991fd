//! authkeep - command-line front end for an authkeep session.
//!
//! Renders the session state held by `SessionStore` and drives sign-in and
//! sign-out from the terminal.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use authkeep_core::{
    ApiClient, AuthError, Config, FileTokenStore, SessionPhase, SessionStore, SignInCredentials,
    TokenStoreKind,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Constants
// ============================================================================

const ENV_EMAIL: &str = "AUTHKEEP_EMAIL";
const ENV_PASSWORD: &str = "AUTHKEEP_PASSWORD";

const USAGE: &str = "\
Usage: authkeep <command>

Commands:
  status [--json]   Show the current session
  whoami            Print the signed-in user as JSON
  signin [EMAIL]    Sign in (password from AUTHKEEP_PASSWORD or prompt)
  signout           Sign out and forget the stored token

Environment:
  AUTHKEEP_API_URL      Backend base URL
  AUTHKEEP_TOKEN_STORE  file | keyring | memory
  RUST_LOG              Log filter (default: warn)";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status { json: bool },
    WhoAmI,
    SignIn { email: Option<String> },
    SignOut,
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args.first().map(String::as_str) {
            None | Some("status") => Ok(Command::Status {
                json: args.iter().any(|a| a == "--json"),
            }),
            Some("whoami") => Ok(Command::WhoAmI),
            Some("signin") | Some("login") => Ok(Command::SignIn {
                email: args.get(1).cloned(),
            }),
            Some("signout") | Some("logout") => Ok(Command::SignOut),
            Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),
            Some(other) => Err(anyhow::anyhow!("Unknown command: {}", other)),
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return Ok(ExitCode::FAILURE);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(ExitCode::SUCCESS);
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    info!(api = %config.api_base_url, store = %config.token_store, "Config loaded");

    let api = ApiClient::from_config(&config).context("Failed to create API client")?;
    let tokens = config.open_token_store()?;
    let store = SessionStore::start(api, tokens);

    match command {
        Command::Status { json } => status(&store, &config, json).await,
        Command::WhoAmI => whoami(&store).await,
        Command::SignIn { email } => sign_in(&store, &config, email).await,
        Command::SignOut => sign_out(&store).await,
        Command::Help => Ok(ExitCode::SUCCESS),
    }
}

async fn status(store: &SessionStore, config: &Config, json: bool) -> Result<ExitCode> {
    let state = store.ready().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Backend: {}", config.api_base_url);
    println!("Status:  {}", state.phase().display_name());
    if let Some(ref user) = state.user {
        println!("User:    {}", user.display());
    }
    if config.token_store == TokenStoreKind::File && state.phase() == SessionPhase::Authenticated {
        let entry = FileTokenStore::new(config.cache_dir()?).load_entry();
        if let Ok(Some(entry)) = entry {
            println!("Token:   saved {}", entry.age_display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn whoami(store: &SessionStore) -> Result<ExitCode> {
    match store.ready().await.user {
        Some(user) => {
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("Not signed in");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn sign_in(store: &SessionStore, config: &Config, email: Option<String>) -> Result<ExitCode> {
    let email = match email
        .or_else(|| std::env::var(ENV_EMAIL).ok())
        .or_else(|| config.last_email.clone())
    {
        Some(email) => email,
        None => prompt_email()?,
    };

    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password(format!("Password for {}: ", email))?,
    };

    let credentials = SignInCredentials::new(email, password);
    match store.sign_in(&credentials).await {
        Ok(()) => {
            if let Err(e) = Config::remember_email(&credentials.email) {
                warn!(error = %e, "Failed to save config");
            }
            let name = store
                .user()
                .map(|u| u.display())
                .unwrap_or_else(|| credentials.email.clone());
            println!("Signed in as {}", name);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            if let AuthError::Api(ref api_err) = e {
                warn!(error = %api_err, "Sign-in request failed");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn sign_out(store: &SessionStore) -> Result<ExitCode> {
    // Let the restore settle so a slow restore cannot race the reset
    store.ready().await;
    if let Err(e) = store.sign_out().await {
        warn!(error = %e, "Sign-out task failed");
    }
    println!("Signed out");
    Ok(ExitCode::SUCCESS)
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}
