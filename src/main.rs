//! teamslink CLI entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use teamslink::api::{ApiClient, GraphClient, HttpTransport, ReqwestTransport, RetryPolicy};
use teamslink::auth::{
    BrowserLoginFlow, CredentialStore, FileCredentialStore, OAuthSettings, TokenManager, TokenState,
};
use teamslink::clipboard::{ClipboardBroker, SystemClipboard};
use teamslink::config::{self, Config};
use teamslink::interrupt::Interrupt;
use teamslink::meeting::{
    Connectivity, FixedConnectivity, HistoryStore, MeetingOrchestrator, MeetingRecord, TcpProbe,
};
use teamslink::ui;

/// Connectivity probe budget
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "teamslink")]
#[command(about = "Generate Microsoft Teams meeting join links")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the Azure application to sign in with
    Onboard,

    /// Create an instant meeting and print its join link
    Meet {
        /// Don't copy the link to the clipboard
        #[arg(long)]
        no_copy: bool,

        /// Don't record the link in the history
        #[arg(long)]
        no_history: bool,

        /// Skip the network reachability check
        #[arg(long)]
        skip_connectivity_check: bool,

        /// Print the sign-in URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Sign in to Microsoft
    Login {
        /// Sign in again even if a valid session exists
        #[arg(long)]
        force: bool,

        /// Print the sign-in URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Remove the stored sign-in
    Logout,

    /// Show configuration and sign-in state
    Status,

    /// Recently generated links
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Delete configuration, sign-in and history
    Reset,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List recent links, newest first
    List,

    /// Remove a link from the history
    Remove {
        /// Exact join URL to remove
        url: String,
    },

    /// Remove every link
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "teamslink=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // The only Ctrl+C handler in the process; the login flow watches it too
    let interrupt = Interrupt::new();
    interrupt.spawn_listener()?;

    let outcome = tokio::select! {
        // Polled first, so a Ctrl+C during sign-in surfaces as a cancelled login
        biased;
        outcome = run(cli.command, &interrupt) => outcome,
        _ = interrupt.triggered() => {
            ui::print_warning("Interrupted");
            std::process::exit(130);
        }
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        ui::print_error(&e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, interrupt: &Interrupt) -> teamslink::Result<()> {
    match command {
        Commands::Onboard => config::onboard()?,

        Commands::Meet {
            no_copy,
            no_history,
            skip_connectivity_check,
            no_browser,
        } => {
            let config = load_valid_config()?;
            let login = login_flow(&config, interrupt, no_browser);
            run_meet(&config, login, !no_copy, !no_history, skip_connectivity_check).await?;
        }

        Commands::Login { force, no_browser } => {
            let config = load_valid_config()?;
            let login = login_flow(&config, interrupt, no_browser);
            run_login(&config, login, force).await?;
        }

        Commands::Logout => {
            let config = config::load()?;
            let login = login_flow(&config, interrupt, true);
            token_manager(&config, Arc::new(ReqwestTransport::new()), login)
                .logout()
                .await?;
            ui::print_success("Logged out successfully");
        }

        Commands::Status => {
            let config = config::load()?;
            run_status(&config)?;
        }

        Commands::History { action } => {
            let config = config::load()?;
            run_history(&config, action.unwrap_or(HistoryAction::List))?;
        }

        Commands::Reset => config::reset()?,
    }

    Ok(())
}

fn load_valid_config() -> teamslink::Result<Config> {
    let config = config::load()?;
    config.validate()?;
    Ok(config)
}

fn login_flow(config: &Config, interrupt: &Interrupt, no_browser: bool) -> BrowserLoginFlow {
    let flow = BrowserLoginFlow::new(config.redirect_port, config.login_timeout(), interrupt.clone());
    if no_browser {
        flow.without_browser()
    } else {
        flow
    }
}

fn token_manager(config: &Config, transport: Arc<dyn HttpTransport>, login: BrowserLoginFlow) -> TokenManager {
    TokenManager::new(
        OAuthSettings::from(config),
        Arc::new(FileCredentialStore::default_location()),
        transport,
        Arc::new(login),
    )
}

async fn run_meet(
    config: &Config,
    login: BrowserLoginFlow,
    copy: bool,
    record: bool,
    skip_connectivity_check: bool,
) -> teamslink::Result<()> {
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());
    let tokens = Arc::new(token_manager(config, transport.clone(), login));
    let graph = GraphClient::new(
        ApiClient::new(transport, RetryPolicy::from(&config.retry)),
        config.graph_base_url.as_str(),
    );
    let connectivity: Arc<dyn Connectivity> = if skip_connectivity_check {
        Arc::new(FixedConnectivity(true))
    } else {
        Arc::new(TcpProbe::for_url(&config.graph_base_url, PROBE_TIMEOUT)?)
    };

    // A spinner would garble the login prompt, so only show one when no login can happen
    let quiet = matches!(tokens.state()?, TokenState::Valid(_));

    let orchestrator = MeetingOrchestrator::new(
        tokens,
        graph,
        connectivity,
        chrono::Duration::minutes(config.meeting_duration_minutes),
    );

    let spinner = quiet.then(|| ui::spinner("Creating Teams meeting..."));
    let outcome = orchestrator.generate_meeting().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let meeting = outcome?;

    if record {
        let history = HistoryStore::default_location(config.history_limit);
        if let Err(e) = history.add(MeetingRecord::from(&meeting)) {
            tracing::warn!("Failed to record meeting in history: {}", e);
        }
    }

    ui::print_success(&meeting.subject);
    ui::print_link(&meeting.join_url);

    if copy {
        let clipboard = ClipboardBroker::spawn(SystemClipboard::default);
        match clipboard.copy(&meeting.join_url).await {
            Ok(()) => ui::print_step("Link copied to clipboard."),
            Err(e) => {
                tracing::warn!("{}", e);
                ui::print_warning(&e.user_message());
            }
        }
    }

    Ok(())
}

async fn run_login(config: &Config, login: BrowserLoginFlow, force: bool) -> teamslink::Result<()> {
    let tokens = token_manager(config, Arc::new(ReqwestTransport::new()), login);

    if force {
        tokens.login().await?;
    } else {
        tokens.get_token(true).await?;
    }

    if let TokenState::Valid(credential) = tokens.state()? {
        ui::print_success(&format!(
            "Signed in. Access token valid until {}",
            credential.expires_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        ));
    }
    ui::print_step("Run 'teamslink meet' to create a meeting link.");
    Ok(())
}

fn run_status(config: &Config) -> teamslink::Result<()> {
    ui::print_header("Status");
    println!("Config: {:?}", config::config_path());
    println!("Tenant: {}", config.tenant);
    println!(
        "Client id: {}",
        if config.client_id.is_empty() { "not set (run 'teamslink onboard')" } else { "✓" }
    );

    let store = FileCredentialStore::default_location();
    let state = TokenState::classify(store.load()?, chrono::Utc::now());
    let sign_in = match state {
        TokenState::NoCredential => "not signed in (run 'teamslink login')".to_string(),
        TokenState::Valid(c) => format!(
            "✓ valid until {}",
            c.expires_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        ),
        TokenState::Expired(_) => "expired, will refresh on next use".to_string(),
    };
    println!("Sign-in: {}", sign_in);

    let history = HistoryStore::default_location(config.history_limit).load()?;
    println!("Recent links: {}/{}", history.len(), history.limit());
    Ok(())
}

fn run_history(config: &Config, action: HistoryAction) -> teamslink::Result<()> {
    let store = HistoryStore::default_location(config.history_limit);

    match action {
        HistoryAction::List => {
            let history = store.load()?;
            if history.is_empty() {
                ui::print_step("No recent links.");
            }
            for record in history.records() {
                println!(
                    "  {}  {}\n    {}",
                    record.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                    record.title,
                    record.url
                );
            }
        }
        HistoryAction::Remove { url } => {
            if store.remove(&url)? {
                ui::print_success("Removed from history");
            } else {
                ui::print_warning("No such link in history");
            }
        }
        HistoryAction::Clear => {
            store.clear()?;
            ui::print_success("History cleared");
        }
    }

    Ok(())
}
