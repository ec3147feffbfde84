use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use healzy::client::{ApiClient, FileStore, SessionManager, SessionState};
use healzy::config::ClientConfig;
use healzy::flashcards::{CardInput, FlashcardSetRequest};
use healzy::telemetry;

#[derive(Parser)]
#[command(name = "healzy-cli", version, about = "Healzy command-line client")]
struct Cli {
    /// Server URL (overrides HEALZY_API_URL)
    #[arg(long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HEALZY_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "HEALZY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with a Google ID token
    Google {
        #[arg(long)]
        id_token: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user from local state
    Whoami,
    /// Check the stored session against the server
    Verify,
    /// Manage flashcard sets
    #[command(subcommand)]
    Sets(SetCommands),
    /// Onboarding flag
    #[command(subcommand)]
    Onboarding(OnboardingCommands),
}

#[derive(Subcommand)]
enum SetCommands {
    List,
    Get { id: Uuid },
    Create(SetArgs),
    Update {
        id: Uuid,
        #[command(flatten)]
        set: SetArgs,
    },
    Delete { id: Uuid },
}

#[derive(Args)]
struct SetArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: Option<String>,
    /// Card as TERM=DEFINITION; repeatable
    #[arg(long = "card", value_parser = parse_card)]
    cards: Vec<CardInput>,
}

impl From<SetArgs> for FlashcardSetRequest {
    fn from(a: SetArgs) -> Self {
        Self {
            title: a.title,
            description: a.description,
            cards: a.cards,
        }
    }
}

#[derive(Subcommand)]
enum OnboardingCommands {
    /// Mark onboarding as done
    Complete,
    Status,
}

fn parse_card(raw: &str) -> Result<CardInput, String> {
    let (term, definition) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TERM=DEFINITION, got {:?}", raw))?;
    Ok(CardInput {
        term: term.trim().to_string(),
        definition: definition.trim().to_string(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = ClientConfig::from_env()?;
    if let Some(server) = cli.server {
        cfg.api_url = server;
    }
    let store = FileStore::open(cfg.data_dir.join("session.json"), true)
        .context("open session store")?;
    let mut session = SessionManager::new(ApiClient::from_config(&cfg)?, store);
    session.restore();

    match cli.command {
        Commands::Register {
            email,
            password,
            name,
        } => print_json(&session.register(&email, &password, name).await?)?,
        Commands::Login { email, password } => {
            print_json(&session.login(&email, &password).await?)?
        }
        Commands::Google { id_token } => print_json(&session.login_with_google(&id_token).await?)?,
        Commands::Logout => {
            session.logout()?;
            println!("Signed out");
        }
        Commands::Whoami => match session.state() {
            SessionState::Authenticated(s) => print_json(&s.user)?,
            _ => println!("Not signed in"),
        },
        Commands::Verify => {
            if session.revalidate().await? {
                println!("Session valid");
            } else {
                anyhow::bail!("session rejected by server; signed out");
            }
        }
        Commands::Sets(cmd) => match cmd {
            SetCommands::List => print_json(&session.list_sets().await?)?,
            SetCommands::Get { id } => print_json(&session.get_set(id).await?)?,
            SetCommands::Create(args) => {
                print_json(&session.create_set(&args.into()).await?)?
            }
            SetCommands::Update { id, set } => {
                print_json(&session.update_set(id, &set.into()).await?)?
            }
            SetCommands::Delete { id } => print_json(&session.delete_set(id).await?)?,
        },
        Commands::Onboarding(cmd) => match cmd {
            OnboardingCommands::Complete => {
                session.complete_onboarding()?;
                println!("Onboarding complete");
            }
            OnboardingCommands::Status => println!("{}", session.onboarding_complete()),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    telemetry::init("healzy=warn");

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "command failed");
            ExitCode::FAILURE
        }
    }
}
