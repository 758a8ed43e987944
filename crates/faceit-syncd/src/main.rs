// # faceit-syncd - Faceit rank sync daemon
//
// Thin integration layer: reads configuration, wires the Faceit client,
// the link store and the user directory into faceit-sync-core, and runs
// either the periodic scheduler or a single command. All sync and link
// logic lives in faceit-sync-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `FACEIT_API_KEY`: Faceit Data API key (required)
// - `FACEIT_UNLINK_GROUPS`: Comma-separated group ids allowed to unlink (required)
// - `FACEIT_TIER_GROUPS`: Comma-separated `tier:group` pairs, exactly 10 (required)
// - `FACEIT_GAME`: Tracked game key (default: cs2)
// - `FACEIT_USER_TIMEOUT_SECS`: Per-user sync timeout, 1-300 (default: 30)
// - `FACEIT_LINK_STORE_PATH`: Link store file (default: ./faceit-links.json)
// - `FACEIT_DIRECTORY_PATH`: User directory snapshot (default: ./faceit-users.json)
// - `FACEIT_API_BASE`: Override of the Faceit API base URL
// - `FACEIT_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// The sync interval is fixed at 300 seconds.
//
// ## Example
//
// ```bash
// export FACEIT_API_KEY=your_key
// export FACEIT_UNLINK_GROUPS=6,9
// export FACEIT_TIER_GROUPS=1:21,2:22,3:23,4:24,5:25,6:26,7:27,8:28,9:29,10:30
//
// faceit-syncd run
// faceit-syncd link https://www.faceit.com/en/players/alice --user "uid-123"
// faceit-syncd unlink "uid-123" --invoker "uid-admin"
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faceit_sync_client::FaceitClient;
use faceit_sync_core::traits::{LinkStore, ProfileClient, UserDirectory};
use faceit_sync_core::{
    FileLinkStore, FileUserDirectory, GroupId, LinkCommands, SchedulerConfig, SyncConfig,
    SyncEvent, SyncScheduler, TierEntry,
};
use std::collections::BTreeSet;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long a running pass gets to wind down after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SyncdExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<SyncdExitCode> for ExitCode {
    fn from(code: SyncdExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser)]
#[command(name = "faceit-syncd", version, about = "Sync Faceit skill levels to server groups")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic sync until SIGINT/SIGTERM (default)
    Run,

    /// Run a single sync pass and print each user's outcome
    SyncOnce,

    /// Link a Faceit account to a local user
    Link {
        /// Faceit username or profile URL
        input: String,

        /// Local user id requesting the link
        #[arg(long)]
        user: String,
    },

    /// Remove the link held by a local user
    Unlink {
        /// Local user id to unlink
        target: String,

        /// Local user id running the command (permission check)
        #[arg(long)]
        invoker: String,
    },
}

/// Application configuration
struct Config {
    api_key: String,
    unlink_groups: Vec<String>,
    tier_groups: String,
    game: Option<String>,
    user_timeout_secs: Option<String>,
    link_store_path: String,
    directory_path: String,
    api_base: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: env::var("FACEIT_API_KEY").context("FACEIT_API_KEY is required")?,
            unlink_groups: env::var("FACEIT_UNLINK_GROUPS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            tier_groups: env::var("FACEIT_TIER_GROUPS").unwrap_or_default(),
            game: env::var("FACEIT_GAME").ok(),
            user_timeout_secs: env::var("FACEIT_USER_TIMEOUT_SECS").ok(),
            link_store_path: env::var("FACEIT_LINK_STORE_PATH")
                .unwrap_or_else(|_| "./faceit-links.json".to_string()),
            directory_path: env::var("FACEIT_DIRECTORY_PATH")
                .unwrap_or_else(|_| "./faceit-users.json".to_string()),
            api_base: env::var("FACEIT_API_BASE").ok(),
            log_level: env::var("FACEIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the environment and build the core configuration
    fn to_sync_config(&self) -> Result<SyncConfig> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!(
                "FACEIT_API_KEY is required. \
                Set it via: export FACEIT_API_KEY=your_key"
            );
        }

        if self.unlink_groups.is_empty() {
            anyhow::bail!(
                "FACEIT_UNLINK_GROUPS must contain at least one group. \
                Set it via: export FACEIT_UNLINK_GROUPS=6,9"
            );
        }

        let tier_table = parse_tier_groups(&self.tier_groups)?;

        let mut scheduler = SchedulerConfig::default();
        if let Some(ref raw) = self.user_timeout_secs {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("FACEIT_USER_TIMEOUT_SECS is not a number: {raw}"))?;
            if !(1..=300).contains(&secs) {
                anyhow::bail!(
                    "FACEIT_USER_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                    secs
                );
            }
            scheduler.user_timeout_secs = secs;
        }

        let unlink_groups: BTreeSet<GroupId> =
            self.unlink_groups.iter().map(|g| GroupId::new(g.as_str())).collect();

        let mut config = SyncConfig::new(self.api_key.clone(), unlink_groups, tier_table)
            .with_scheduler(scheduler);
        if let Some(ref game) = self.game {
            config = config.with_game(game.trim());
        }

        config.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "FACEIT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Parse `tier:group` pairs, e.g. `1:21,2:22,...`
fn parse_tier_groups(raw: &str) -> Result<Vec<TierEntry>> {
    if raw.trim().is_empty() {
        anyhow::bail!(
            "FACEIT_TIER_GROUPS is required: 10 comma-separated tier:group pairs. \
            Example: export FACEIT_TIER_GROUPS=1:21,2:22,...,10:30"
        );
    }

    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (tier, group) = pair
                .split_once(':')
                .with_context(|| format!("FACEIT_TIER_GROUPS entry '{pair}' is not tier:group"))?;
            let tier: i64 = tier
                .trim()
                .parse()
                .with_context(|| format!("FACEIT_TIER_GROUPS tier '{tier}' is not a number"))?;
            Ok(TierEntry::new(tier, group.trim()))
        })
        .collect()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SyncdExitCode::ConfigError.into();
        }
    };

    let sync_config = match env_config.to_sync_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return SyncdExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(env_config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncdExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncdExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let services = match Services::build(&env_config, &sync_config).await {
            Ok(services) => services,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return SyncdExitCode::ConfigError;
            }
        };

        let result = match cli.command.unwrap_or(Command::Run) {
            Command::Run => run_daemon(services, &sync_config).await,
            Command::SyncOnce => sync_once(services, &sync_config).await,
            Command::Link { input, user } => {
                run_link(services, &sync_config, &input, &user).await
            }
            Command::Unlink { target, invoker } => {
                run_unlink(services, &sync_config, &target, &invoker).await
            }
        };

        match result {
            Ok(()) => SyncdExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                SyncdExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Collaborators shared by every command
struct Services {
    profiles: Arc<dyn ProfileClient>,
    links: Arc<dyn LinkStore>,
    directory: Arc<dyn UserDirectory>,
}

impl Services {
    async fn build(env_config: &Config, sync_config: &SyncConfig) -> Result<Self> {
        let client = match env_config.api_base {
            Some(ref base) => FaceitClient::with_base_url(sync_config.api_key.clone(), base.clone())?,
            None => FaceitClient::new(sync_config.api_key.clone())?,
        };

        let links = FileLinkStore::new(&env_config.link_store_path).await?;
        let directory = FileUserDirectory::new(&env_config.directory_path).await?;

        info!("Link store: {}", env_config.link_store_path);
        info!("User directory: {}", env_config.directory_path);

        Ok(Self {
            profiles: Arc::new(client),
            links: Arc::new(links),
            directory: Arc::new(directory),
        })
    }
}

/// Run the periodic scheduler until a shutdown signal arrives
async fn run_daemon(services: Services, config: &SyncConfig) -> Result<()> {
    info!("Starting faceit-syncd");
    info!(
        "Tracking game '{}' with {} tier groups",
        config.game,
        config.tier_table.len()
    );

    let (scheduler, mut events) =
        SyncScheduler::new(services.profiles, services.directory, services.links, config)?;

    // Ends when the scheduler (and its sender) is dropped
    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SyncEvent::UserReconciled { local_user_id, outcome } => {
                    debug!("{}: {}", local_user_id, outcome)
                }
                other => debug!("Sync event: {:?}", other),
            }
        }
    });

    let handle = scheduler.spawn();

    let signal = wait_for_shutdown_signal().await?;
    info!("Received shutdown signal: {}", signal);

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.shutdown()).await {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
    }

    let _ = event_logger.await;
    info!("faceit-syncd stopped");
    Ok(())
}

/// Run one pass and print the outcomes
async fn sync_once(services: Services, config: &SyncConfig) -> Result<()> {
    let links = Arc::clone(&services.links);
    let (scheduler, _events) =
        SyncScheduler::new(services.profiles, services.directory, services.links, config)?;

    let report = scheduler.run_pass().await?;
    for entry in &report.outcomes {
        println!("{}\t{}\t{}", entry.link.local_user_id, entry.link.profile_id, entry.outcome);
    }
    println!("{}", report.summary());

    links.flush().await?;
    Ok(())
}

async fn run_link(services: Services, config: &SyncConfig, input: &str, user: &str) -> Result<()> {
    let commands = LinkCommands::new(services.profiles, services.links, config)?;
    println!("{}", commands.handle_link(input, user).await);
    Ok(())
}

async fn run_unlink(
    services: Services,
    config: &SyncConfig,
    target: &str,
    invoker: &str,
) -> Result<()> {
    let invoker_groups = match services.directory.find_by_local_id(invoker).await? {
        Some(handle) => handle.current_groups().await?,
        None => BTreeSet::new(),
    };

    let commands = LinkCommands::new(services.profiles, services.links, config)?;
    println!("{}", commands.handle_unlink(target, &invoker_groups).await);
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
