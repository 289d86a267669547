// Gavel entry point.
//
// Startup sequence:
// 1. Parse arguments, resolve the base directory
// 2. Initialize tracing (log to file, not terminal)
// 3. Load config, seeding defaults on first run
// 4. Authenticate (stored token or REST login) and resolve the viewer
// 5. Open the socket session
// 6. Spawn the synchronizer task
// 7. Run the TUI until the user quits
// 8. Wait for the synchronizer to leave the room and close the socket

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use directories::ProjectDirs;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use gavel_core::api::ApiClient;
use gavel_core::client::{Session, SessionConfig};
use gavel_core::config::{self, Config};
use gavel_core::model::Viewer;
use gavel_core::reducer::TeamBalance;
use gavel_core::session::RetryPolicy;
use gavel_core::sync::{self, SyncConfig};
use gavel_core::transport::{socket_url, TungsteniteConnector};
use gavel_tui::tui;

#[derive(Parser)]
#[command(name = "gavel", about = "Live cricket auction room in the terminal")]
struct Args {
    /// Auction event to join
    event_id: String,

    /// Directory holding config/ and logs/ (defaults to the platform data dir)
    #[arg(long, env = "GAVEL_HOME")]
    base_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let base_dir = resolve_base_dir(args.base_dir)?;

    init_tracing(&base_dir)?;
    info!("Gavel starting up for event {}", args.event_id);

    let config = config::load_config(&base_dir).context("failed to load configuration")?;
    info!("Config loaded: server={}", config.server.base_url);

    let (token, viewer, initial_balance) = authenticate(&config, &args.event_id).await?;
    info!(
        "Signed in as {} ({:?})",
        viewer.user_id.as_deref().unwrap_or("unknown user"),
        viewer.role
    );

    let session = Session::open(
        SessionConfig {
            url: socket_url(&config.server.base_url),
            token: Some(token),
            retry: RetryPolicy::from(&config.retry),
        },
        Arc::new(TungsteniteConnector),
    );

    let mut sync_config = SyncConfig::new(&config, args.event_id, viewer);
    sync_config.initial_balance = initial_balance;
    sync_config.state_dir = Some(base_dir.clone());

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let sync_handle = tokio::spawn(async move {
        if let Err(e) = sync::run(session, sync_config, cmd_rx, ui_tx).await {
            error!("Synchronizer error: {}", e);
        }
    });

    // Blocks until the user confirms quit or presses Ctrl+C.
    if let Err(e) = tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {}", e);
    }

    if tokio::time::timeout(std::time::Duration::from_secs(5), sync_handle)
        .await
        .is_err()
    {
        warn!("Synchronizer did not shut down within 5s");
    }

    info!("Gavel shut down cleanly");
    Ok(())
}

fn resolve_base_dir(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    match ProjectDirs::from("", "", "gavel") {
        Some(dirs) => Ok(dirs.data_local_dir().to_path_buf()),
        None => std::env::current_dir().context("failed to read current directory"),
    }
}

/// Produce a bearer token plus the viewer identity, logging in over REST
/// when no token is stored. The team record, when reachable, seeds an
/// estimated balance until the server pushes one.
async fn authenticate(
    config: &Config,
    event_id: &str,
) -> anyhow::Result<(String, Viewer, Option<TeamBalance>)> {
    let creds = &config.credentials;
    let mut api = ApiClient::new(&config.server.base_url);

    let (token, viewer) = match (&creds.token, &creds.email, &creds.password) {
        (Some(token), _, _) => {
            api = api.with_token(token.clone());
            let viewer = Viewer {
                user_id: creds.user_id.clone(),
                team_id: creds.team_id.clone(),
                role: creds.role,
            };
            (token.clone(), viewer)
        }
        (None, Some(email), Some(password)) => {
            let auth = api
                .login(email, password)
                .await
                .context("login failed")?;
            (auth.token, Viewer::from(&auth.user))
        }
        _ => anyhow::bail!(
            "no credentials: set token or email/password in config/credentials.toml"
        ),
    };

    // Catch a mistyped event id before the room join does.
    match api.get_event(event_id).await {
        Ok(event) => info!("Event {}: {} ({:?})", event.id, event.name, event.status),
        Err(e) => warn!("Could not load event {}: {}", event_id, e),
    }

    let balance = match &viewer.team_id {
        Some(team_id) if viewer.is_team_owner() => match api.get_team(team_id).await {
            Ok(team) => TeamBalance::projected(&team),
            Err(e) => {
                warn!("Could not load team {}: {}", team_id, e);
                None
            }
        },
        _ => None,
    };

    Ok((token, viewer, balance))
}

/// Initialize tracing to log to a file (not the terminal, which is used by the TUI).
fn init_tracing(base_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let log_file = std::fs::File::create(log_dir.join("gavel.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gavel=info,gavel_core=info,gavel_tui=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
