//! cosplay-session - inspect and drive the cosplay generator's signed-in session.
//!
//! Restores the persisted session (refreshing credits from the remote
//! authority), runs one command against it and prints the result.

use std::io;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use cosplay_core::{Config, Session, SessionState, SessionStore};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: cosplay-session [command]

Commands:
  status            Show the signed-in user and credits (default)
  sign-in <email>   Sign in, fetching credits from the server
  sign-out          Sign out and forget the stored session
  credits <n>       Set the local credit balance
  spend [n]         Use n credits (default 1)
  config            Print the effective configuration";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    ShowConfig,
    Session(SessionCommand),
}

/// Commands that run against a restored session
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Status,
    SignIn(String),
    SignOut,
    SetCredits(u32),
    Spend(u32),
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let mut args = args.iter().map(String::as_str);
        let command = match args.next() {
            Some("config") => Command::ShowConfig,
            None | Some("status") => Command::Session(SessionCommand::Status),
            Some("sign-in") => {
                let email = args.next().context("sign-in requires an email")?;
                Command::Session(SessionCommand::SignIn(email.to_string()))
            }
            Some("sign-out") => Command::Session(SessionCommand::SignOut),
            Some("credits") => {
                let amount = args.next().context("credits requires an amount")?;
                Command::Session(SessionCommand::SetCredits(parse_amount(amount)?))
            }
            Some("spend") => {
                let amount = args.next().map(parse_amount).transpose()?.unwrap_or(1);
                Command::Session(SessionCommand::Spend(amount))
            }
            Some(other) => bail!("unknown command: {}", other),
        };
        if let Some(extra) = args.next() {
            bail!("unexpected argument: {}", extra);
        }
        Ok(command)
    }
}

fn parse_amount(raw: &str) -> Result<u32> {
    raw.parse()
        .with_context(|| format!("invalid credit amount: {}", raw))
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn describe(session: &Session) -> String {
    format!(
        "{} <{}>\nCredits: {} (synced {})",
        session.name(),
        session.email(),
        session.credits(),
        session.sync_age_display()
    )
}

fn print_state(state: &SessionState) {
    match state.user() {
        Some(session) => println!("{}", describe(session)),
        None => println!("Not signed in"),
    }
}

async fn run(command: Command, config: &Config) -> Result<ExitCode> {
    let command = match command {
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(config)?);
            return Ok(ExitCode::SUCCESS);
        }
        Command::Session(command) => command,
    };

    let store = SessionStore::from_config(config)?;
    let state = store.restore().await;

    match command {
        SessionCommand::Status => print_state(&state),
        SessionCommand::SignIn(email) => match store.sign_in(&email).await {
            Some(session) => println!("Signed in as {}", describe(&session)),
            None => {
                eprintln!("Email must not be empty");
                return Ok(ExitCode::from(2));
            }
        },
        SessionCommand::SignOut => {
            store.sign_out().await;
            println!("Signed out");
        }
        SessionCommand::SetCredits(amount) => match store.update_credits(amount).await {
            Some(session) => println!("Credits set to {}", session.credits()),
            None => println!("Not signed in; nothing to update"),
        },
        SessionCommand::Spend(amount) => {
            let Some(current) = store.user() else {
                eprintln!("Not signed in");
                return Ok(ExitCode::FAILURE);
            };
            let Some(remaining) = current.credits().checked_sub(amount) else {
                eprintln!(
                    "Not enough credits: {} available, {} requested",
                    current.credits(),
                    amount
                );
                return Ok(ExitCode::FAILURE);
            };
            store.update_credits(remaining).await;
            println!("Spent {}, {} remaining", amount, remaining);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {:#}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(api = %config.api_base_url, ?command, "cosplay-session starting");

    match run(command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Result<Config> {
    let mut config = Config::load()?;
    config.apply_env()?;
    Ok(config)
}
