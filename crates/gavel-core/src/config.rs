// Configuration loading and parsing (client.toml, credentials.toml), plus
// the small state.toml the client writes back itself.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::model::Role;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("could not write default config: {message}")]
    DefaultsWriteError { message: String },

    #[error("could not save state: {message}")]
    StateWriteError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub retry: RetryConfig,
    pub auction: AuctionConfig,
    pub notifications: NotificationConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// client.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire client.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ClientFile {
    server: ServerConfig,
    #[serde(default)]
    retry: RetryConfig,
    #[serde(default)]
    auction: AuctionConfig,
    #[serde(default)]
    notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// REST base URL, e.g. `https://host/api`. The socket endpoint is
    /// derived from it.
    pub base_url: String,
}

/// Bounded reconnection policy parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 5_000,
            factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuctionConfig {
    pub player_timer_secs: u32,
    pub settle_delay_ms: u64,
    pub default_bid_increment: u64,
    pub join_timeout_secs: u64,
    pub auto_start: bool,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        AuctionConfig {
            player_timer_secs: 20,
            settle_delay_ms: 5_500,
            default_bid_increment: 50,
            join_timeout_secs: 10,
            auto_start: true,
        }
    }
}

impl AuctionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

/// Auto-dismiss windows for notifications, by severity.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Success and info notifications.
    pub info_secs: u64,
    /// Error and warning notifications.
    pub error_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            info_secs: 5,
            error_secs: 7,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

/// Either a ready bearer token or an email/password pair for REST login.
/// The identity fields are only needed when a raw token is supplied, since a
/// login response carries the user record itself.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub token: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub user_id: Option<String>,
    pub team_id: Option<String>,
    pub role: Option<Role>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/client.toml` and
/// (optionally) `config/credentials.toml`, both relative to `base_dir`.
///
/// Does not create anything; missing files are errors here.
/// `load_config()` seeds defaults first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- client.toml (required) ---
    let client_path = config_dir.join("client.toml");
    let client_text = read_file(&client_path)?;
    let client_file: ClientFile =
        toml::from_str(&client_text).map_err(|e| ConfigError::ParseError {
            path: client_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        server: client_file.server,
        retry: client_file.retry,
        auction: client_file.auction,
        notifications: client_file.notifications,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// `client.toml` as shipped, written into `config/` on first run.
const DEFAULT_CLIENT_TOML: &str = include_str!("../../../defaults/client.toml");

/// Write any missing default files into `base_dir/config`. Returns the
/// paths written; existing files are never touched. Credentials have no
/// default and must be created by the user.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsWriteError {
        message: format!("failed to create {}: {e}", config_dir.display()),
    })?;

    let mut written = Vec::new();
    for (name, content) in [("client.toml", DEFAULT_CLIENT_TOML)] {
        let target = config_dir.join(name);
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(ConfigError::DefaultsWriteError {
                    message: format!("failed to create {}: {e}", target.display()),
                })
            }
        };
        file.write_all(content.as_bytes())
            .map_err(|e| ConfigError::DefaultsWriteError {
                message: format!("failed to write {}: {e}", target.display()),
            })?;
        written.push(target);
    }
    Ok(written)
}

/// Write missing defaults into `base_dir/config`, then load from there.
/// Saved UI state overrides the matching `client.toml` settings.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    let mut config = load_config_from(base_dir)?;
    load_ui_state(base_dir)?.apply(&mut config);
    Ok(config)
}

// ---------------------------------------------------------------------------
// Saved UI state (state.toml)
// ---------------------------------------------------------------------------

/// Preferences toggled inside the client, kept across runs in
/// `config/state.toml`. Unset fields leave `client.toml` in charge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<bool>,
}

impl UiState {
    pub fn apply(&self, config: &mut Config) {
        if let Some(auto_start) = self.auto_start {
            config.auction.auto_start = auto_start;
        }
    }
}

fn state_path(base_dir: &Path) -> PathBuf {
    base_dir.join("config").join("state.toml")
}

/// Read `config/state.toml`. A missing file is an empty state.
pub fn load_ui_state(base_dir: &Path) -> Result<UiState, ConfigError> {
    let path = state_path(base_dir);
    if !path.exists() {
        return Ok(UiState::default());
    }
    let text = read_file(&path)?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError { path, source: e })
}

/// Replace `config/state.toml` with `state`.
pub fn save_ui_state(base_dir: &Path, state: &UiState) -> Result<(), ConfigError> {
    let path = state_path(base_dir);
    let text = toml::to_string(state).map_err(|e| ConfigError::StateWriteError {
        message: e.to_string(),
    })?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::StateWriteError {
            message: format!("failed to create {}: {e}", dir.display()),
        })?;
    }
    std::fs::write(&path, text).map_err(|e| ConfigError::StateWriteError {
        message: format!("failed to write {}: {e}", path.display()),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Upper bound for any configured timer or display window.
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

fn validate(config: &Config) -> Result<(), ConfigError> {
    let url = config.server.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: "server.base_url".into(),
            message: format!("must start with http:// or https://, got {url:?}"),
        });
    }

    let retry = &config.retry;
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "retry.initial_delay_ms".into(),
            message: "must be > 0".into(),
        });
    }
    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::ValidationError {
            field: "retry.max_delay_ms".into(),
            message: format!(
                "must be >= retry.initial_delay_ms ({}), got {}",
                retry.initial_delay_ms, retry.max_delay_ms
            ),
        });
    }
    if !retry.factor.is_finite() || retry.factor < 1.0 {
        return Err(ConfigError::ValidationError {
            field: "retry.factor".into(),
            message: format!("must be a finite number >= 1.0, got {}", retry.factor),
        });
    }

    let auction_fields: &[(&str, u64)] = &[
        ("auction.player_timer_secs", u64::from(config.auction.player_timer_secs)),
        ("auction.default_bid_increment", config.auction.default_bid_increment),
        ("auction.join_timeout_secs", config.auction.join_timeout_secs),
    ];
    for (name, val) in auction_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    // Every duration becomes a timer deadline; keep them within a day.
    let windows: &[(&str, u64, u64)] = &[
        ("retry.max_delay_ms", retry.max_delay_ms, MAX_WINDOW_SECS * 1_000),
        ("auction.player_timer_secs", u64::from(config.auction.player_timer_secs), MAX_WINDOW_SECS),
        ("auction.settle_delay_ms", config.auction.settle_delay_ms, MAX_WINDOW_SECS * 1_000),
        ("auction.join_timeout_secs", config.auction.join_timeout_secs, MAX_WINDOW_SECS),
        ("notifications.info_secs", config.notifications.info_secs, MAX_WINDOW_SECS),
        ("notifications.error_secs", config.notifications.error_secs, MAX_WINDOW_SECS),
    ];
    for (name, val, max) in windows {
        if val > max {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be <= {max}, got {val}"),
            });
        }
    }

    let creds = &config.credentials;
    if creds.email.is_some() != creds.password.is_some() {
        return Err(ConfigError::ValidationError {
            field: "credentials.email".into(),
            message: "email and password must be given together".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
