use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use authwright::api::{device, ApiClient, SessionStore};
use authwright::collaborators::live::LiveCollaborators;
use authwright::config::AppConfig;
use authwright::events::EventBus;
use authwright::render::prompt::{Answerer, Prompter};
use authwright::render::{self, EventSink, JsonLines, Terminal};
use authwright::shutdown::cancel_on_interrupt;
use authwright::workflow::context::{InstallOptions, Integration};
use authwright::workflow::{MachineEvent, Orchestrator, Outcome};

/// How long the renderer gets to print the final event after the run ends.
const RENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "authwright", about = "Add authentication to your project")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Write logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install authentication into a project
    Install(InstallArgs),
    /// Sign in with the browser and cache the session
    Login,
    /// Remove the cached session
    Logout,
}

#[derive(Args)]
struct InstallArgs {
    /// Project directory
    #[arg(long, default_value = ".")]
    install_dir: PathBuf,

    /// Skip project detection
    #[arg(long, value_enum)]
    integration: Option<Integration>,

    #[arg(long)]
    client_id: Option<String>,

    #[arg(long)]
    api_key: Option<String>,

    /// Do not require a logged-in session
    #[arg(long)]
    skip_auth: bool,

    /// Stop after the installation; never commit or open a pull request
    #[arg(long)]
    no_commit: bool,

    /// Print events as JSON lines instead of progress text
    #[arg(long)]
    json: bool,

    /// Answer yes to every prompt
    #[arg(short, long)]
    yes: bool,
}

fn init_tracing(json: bool) {
    // Quiet by default so logs do not interleave with the wizard output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    tracing_subscriber::registry().with(filter).with(fmt).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = AppConfig::load(cli.config.as_deref())?;
    tracing::debug!(config = ?config, "Loaded configuration");

    match cli.command {
        Command::Install(args) => {
            let code = install(config, args).await?;
            // Collaborator tasks and a blocked stdin read may still be alive
            std::process::exit(code);
        }
        Command::Login => login(&config).await,
        Command::Logout => logout(&config).await,
    }
}

async fn install(config: AppConfig, args: InstallArgs) -> anyhow::Result<i32> {
    let install_dir = tokio::fs::canonicalize(&args.install_dir)
        .await
        .with_context(|| format!("Install directory {} not found", args.install_dir.display()))?;

    let options = InstallOptions {
        install_dir,
        skip_auth: args.skip_auth,
        no_commit: args.no_commit,
        client_id: args.client_id,
        api_key: args.api_key,
        integration: args.integration,
    };

    let branch_name = config.git.branch_name.clone();
    let collaborators = Arc::new(LiveCollaborators::new(config)?);
    let bus = EventBus::new();
    let events = bus.subscribe();

    let handle = Orchestrator::new(collaborators, bus)
        .with_branch_name(branch_name)
        .spawn(options);

    let sink: Box<dyn EventSink> = if args.json {
        Box::new(JsonLines::new(std::io::stdout()))
    } else {
        Box::new(Terminal::new(std::io::stdout()))
    };
    let (prompt_tx, prompt_rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(render::run(events, sink, prompt_tx));

    let answerer = if args.yes {
        Answerer::AssumeYes
    } else {
        Answerer::Interactive(Prompter::new(
            BufReader::new(tokio::io::stdin()),
            std::io::stderr(),
        ))
    };
    tokio::spawn(render::prompt::run(prompt_rx, answerer, handle.sender()));
    tokio::spawn(cancel_on_interrupt(handle.sender()));

    handle.send(MachineEvent::Start);
    let report = handle.join().await?;

    match tokio::time::timeout(RENDER_DRAIN_TIMEOUT, renderer).await {
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Renderer failed"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Renderer task panicked"),
        Err(_) => tracing::warn!("Renderer did not finish"),
        Ok(Ok(Ok(()))) => {}
    }

    Ok(match report.outcome {
        Outcome::Complete => 0,
        Outcome::Cancelled => 130,
        Outcome::Error => 1,
    })
}

async fn login(config: &AppConfig) -> anyhow::Result<()> {
    let api = ApiClient::new(&config.api.base_url)?;
    let store = SessionStore::new(config.session_path()?);
    let timeout = Duration::from_secs(config.api.device_timeout_secs);

    let (_, session) = device::run(&api, &config.api.client_id, timeout, |grant| {
        println!("Open {}", grant.verification_uri_complete);
        println!(
            "  or go to {} and enter code {}",
            grant.verification_uri, grant.user_code
        );
        println!("Waiting for approval...");
    })
    .await?;

    store.save(&session).await?;
    println!("Logged in. Session saved to {}", store.path().display());
    Ok(())
}

async fn logout(config: &AppConfig) -> anyhow::Result<()> {
    let store = SessionStore::new(config.session_path()?);
    if store.clear().await? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}
