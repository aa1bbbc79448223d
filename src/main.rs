use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vitatwin_client::consent::seed_scopes;
use vitatwin_client::{
    ClientConfig, ConsentDecision, ConsentPrompt, HealthSnapshot, RecoveryOutcome, SessionEventKind,
    VitaTwinClient,
};

#[derive(Parser)]
#[command(name = "vitatwin")]
#[command(version)]
#[command(about = "Command-line access to the VitaTwin API")]
struct Cli {
    /// Base URL of the VitaTwin API
    #[arg(long, global = true, env = "VITATWIN_API_BASE")]
    api_base: Option<String>,

    /// Grant the full recommended consent set without asking
    #[arg(long, global = true)]
    accept_all: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login(CredentialArgs),
    /// Create an account
    Signup(CredentialArgs),
    /// End the session
    Logout,
    /// Show whether a session token is stored
    Status,
    /// Inspect or grant data-use consent
    Consent {
        #[command(subcommand)]
        command: ConsentCommands,
    },
    /// Manage wearable providers
    Wearables {
        #[command(subcommand)]
        command: WearableCommands,
    },
    /// Health summary and chat with the twin
    Twin {
        /// JSON file with health inputs (demo values when omitted)
        #[arg(long, value_name = "FILE")]
        health: Option<PathBuf>,
        #[command(subcommand)]
        command: TwinCommands,
    },
}

#[derive(Subcommand)]
enum TwinCommands {
    /// Evaluate health inputs into signals
    Summary,
    /// Ask the twin a question
    Chat {
        #[arg(value_name = "QUESTION")]
        question: String,
    },
}

#[derive(clap::Args)]
struct CredentialArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "VITATWIN_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum ConsentCommands {
    /// List scopes and whether they are granted
    List,
    /// Grant scopes
    Grant {
        /// Scopes to grant
        #[arg(value_name = "SCOPE")]
        scopes: Vec<String>,
        /// Grant the full recommended set
        #[arg(long, conflicts_with = "scopes")]
        all: bool,
    },
}

#[derive(Subcommand)]
enum WearableCommands {
    /// Show connected providers
    Status,
    /// Connect a provider
    Connect {
        #[arg(value_name = "PROVIDER")]
        provider: String,
    },
    /// Pull data from a provider
    Sync {
        #[arg(value_name = "PROVIDER")]
        provider: String,
        /// Signals to request (defaults apply when omitted)
        #[arg(long = "signal", value_name = "SIGNAL")]
        signals: Vec<String>,
    },
}

/// Asks for consent on the terminal
struct TerminalPrompt {
    accept_all: bool,
}

#[async_trait]
impl ConsentPrompt for TerminalPrompt {
    async fn ask(&self, scopes: &[String]) -> ConsentDecision {
        if self.accept_all {
            return ConsentDecision::AcceptAll;
        }

        let mut stdout = tokio::io::stdout();
        let question = format!(
            "This action needs your consent for: {}\nGrant these [y], accept all recommended [a], or decline [N]? ",
            scopes.join(", ")
        );
        if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return ConsentDecision::Declined;
        }

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if stdin.read_line(&mut line).await.is_err() {
            return ConsentDecision::Declined;
        }

        parse_consent_answer(&line, scopes)
    }
}

/// Map a terminal answer to a decision; anything unrecognized declines
fn parse_consent_answer(answer: &str, scopes: &[String]) -> ConsentDecision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "a" | "all" => ConsentDecision::AcceptAll,
        "y" | "yes" => ConsentDecision::Custom(seed_scopes(scopes)),
        _ => ConsentDecision::Declined,
    }
}

fn render_outcome<T: serde::Serialize>(outcome: RecoveryOutcome<T>) -> Result<String> {
    Ok(match outcome.into_value() {
        Some(value) => serde_json::to_string_pretty(&value)?,
        None => "Consent declined; nothing was changed.".to_string(),
    })
}

fn print_outcome<T: serde::Serialize>(outcome: RecoveryOutcome<T>) -> Result<()> {
    println!("{}", render_outcome(outcome)?);
    Ok(())
}

async fn load_health(path: Option<&Path>) -> Result<HealthSnapshot> {
    match path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a valid health file", path.display()))
        }
        None => Ok(HealthSnapshot::sample()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                EnvFilter::new("vitatwin_client=debug,vitatwin=debug,warn")
            } else {
                EnvFilter::new("vitatwin_client=info,vitatwin=info,warn")
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    if let Some(path) = env_file_path {
        debug!(path = %path.display(), "Loaded environment from file");
    }

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
    if let Some(api_base) = cli.api_base {
        config = config.with_api_base(api_base);
    }
    let client = VitaTwinClient::new(config).context("Failed to create VitaTwin client")?;

    let mut session = client.events.subscribe();
    let result = run(&client, cli.command, cli.accept_all).await;

    for event in session.drain() {
        if let SessionEventKind::Invalidated { redirect_to } = event.kind {
            info!(redirect_to = %redirect_to, "Session invalidated");
            eprintln!("Your session has expired. Run `vitatwin login` to sign in again.");
        }
    }

    result
}

async fn run(client: &VitaTwinClient, command: Commands, accept_all: bool) -> Result<()> {
    let flow = client.consent_flow(Arc::new(TerminalPrompt { accept_all }));

    match command {
        Commands::Login(args) => {
            client.auth.login(&args.email, &args.password).await?;
            println!("Logged in as {}", args.email);
        }
        Commands::Signup(args) => {
            let auth = client.auth.signup(&args.email, &args.password).await?;
            if auth.access_token.is_some() {
                println!("Account created; you are logged in.");
            } else {
                println!("Account created. Run `vitatwin login` to sign in.");
            }
        }
        Commands::Logout => {
            client.auth.logout().await;
            println!("Logged out.");
        }
        Commands::Status => {
            if client.auth.is_authenticated().await {
                println!("Logged in.");
            } else {
                println!("Not logged in.");
            }
            if !client.tokens.is_durable() {
                println!("Warning: token storage is unavailable; the session will not persist.");
            }
        }
        Commands::Consent { command } => match command {
            ConsentCommands::List => {
                let scopes = client.consent.list().await?;
                for (scope, granted) in scopes {
                    println!("{:<28} {}", scope, if granted { "granted" } else { "-" });
                }
            }
            ConsentCommands::Grant { scopes, all } => {
                let scopes = if all {
                    vitatwin_client::consent::full_recommended_scopes()
                } else {
                    scopes
                };
                client.consent.grant_scopes(&scopes).await?;
                println!("Granted: {}", scopes.join(", "));
            }
        },
        Commands::Wearables { command } => match command {
            WearableCommands::Status => {
                let wearables = client.wearables.clone();
                let outcome = flow
                    .run(move || {
                        let wearables = wearables.clone();
                        async move { wearables.status().await }
                    })
                    .await?;
                let Some(providers) = outcome.into_value() else {
                    println!("Consent declined; nothing was changed.");
                    return Ok(());
                };
                if providers.is_empty() {
                    println!("No wearables connected.");
                }
                for provider in providers {
                    println!(
                        "{:<12} connected: {:<26} last sync: {}",
                        provider.provider,
                        provider.connected_at.as_deref().unwrap_or("-"),
                        provider.last_sync_at.as_deref().unwrap_or("-"),
                    );
                }
            }
            WearableCommands::Connect { provider } => {
                let wearables = client.wearables.clone();
                let outcome = flow
                    .run(move || {
                        let wearables = wearables.clone();
                        let provider = provider.clone();
                        async move { wearables.connect(&provider).await }
                    })
                    .await?;
                print_outcome(outcome)?;
            }
            WearableCommands::Sync { provider, signals } => {
                let wearables = client.wearables.clone();
                let outcome = flow
                    .run(move || {
                        let wearables = wearables.clone();
                        let provider = provider.clone();
                        let signals = signals.clone();
                        async move { wearables.sync(&provider, &signals).await }
                    })
                    .await?;
                print_outcome(outcome)?;
            }
        },
        Commands::Twin { health, command } => {
            let health = load_health(health.as_deref()).await?;
            let twin = client.twin.clone();
            match command {
                TwinCommands::Summary => {
                    let outcome = flow
                        .run(move || {
                            let twin = twin.clone();
                            let health = health.clone();
                            async move { twin.summary(&health).await }
                        })
                        .await?;
                    let Some(summary) = outcome.into_value() else {
                        println!("Consent declined; nothing was changed.");
                        return Ok(());
                    };
                    for signal in &summary.signals {
                        println!(
                            "{:<24} {:<10} {:?}",
                            signal.display_name(),
                            signal.value,
                            signal.status()
                        );
                    }
                    if !summary.disclaimer.is_empty() {
                        println!("\n{}", summary.disclaimer);
                    }
                }
                TwinCommands::Chat { question } => {
                    let outcome = flow
                        .run(move || {
                            let twin = twin.clone();
                            let health = health.clone();
                            let question = question.clone();
                            async move { twin.chat(&question, &health).await }
                        })
                        .await?;
                    match outcome.into_value() {
                        Some(reply) => println!("{}", reply),
                        None => println!("Consent declined; nothing was changed."),
                    }
                }
            }
        }
    }

    Ok(())
}
