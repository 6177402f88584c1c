//! Configuration for the `taskboard` client.
//!
//! Layered configuration, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicit `--config`
//! path that doesn't exist is.

use std::path::PathBuf;
use std::time::Duration;

use taskboard_proto::hub::Scope;
use taskboard_proto::task::{TaskPriority, TaskStatus};

use crate::gateway::GatewayOptions;
use crate::notice::{DEFAULT_NOTICE_DURATION, DEFAULT_NOTICE_LIMIT};
use crate::notify::hub::HubTimeouts;
use crate::session::Session;
use crate::view::{SortKey, SortOrder};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    hub: HubFileConfig,
    session: SessionFileConfig,
    board: BoardFileConfig,
    notices: NoticesFileConfig,
}

/// `[api]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[hub]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HubFileConfig {
    url: Option<String>,
    room: Option<String>,
    connect_timeout_secs: Option<u64>,
    hello_timeout_secs: Option<u64>,
}

/// `[session]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    email: Option<String>,
    name: Option<String>,
    token: Option<String>,
}

/// `[board]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BoardFileConfig {
    rollback_failed_moves: Option<bool>,
}

/// `[notices]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NoticesFileConfig {
    limit: Option<usize>,
    duration_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Backend --
    /// CRUD endpoint for tasks.
    pub api_url: String,
    /// Overall HTTP request timeout. `None` leaves it to the OS.
    pub request_timeout: Option<Duration>,

    // -- Notification hub --
    /// Hub WebSocket URL. Without one the client runs with an in-process bus.
    pub hub_url: Option<String>,
    /// Room to join besides the global scope.
    pub room: Option<String>,
    pub connect_timeout: Duration,
    /// Timeout for the hub's welcome after hello.
    pub hello_timeout: Duration,

    // -- Session --
    pub email: Option<String>,
    pub user_name: Option<String>,
    pub token: Option<String>,

    // -- Board --
    /// Restore the previous status when a drag move fails to save.
    pub rollback_failed_moves: bool,

    // -- Notices --
    /// How many notices are visible at once.
    pub notice_limit: usize,
    pub notice_duration: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3000/api/tasks/crud".to_string(),
            request_timeout: None,
            hub_url: None,
            room: None,
            connect_timeout: Duration::from_secs(10),
            hello_timeout: Duration::from_secs(5),
            email: None,
            user_name: None,
            token: None,
            rollback_failed_moves: false,
            notice_limit: DEFAULT_NOTICE_LIMIT,
            notice_duration: DEFAULT_NOTICE_DURATION,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read,
    /// or if any config file cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// CLI > file > default. Separate from `load()` for testing.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            api_url: cli
                .api_url
                .clone()
                .or_else(|| file.api.url.clone())
                .unwrap_or(defaults.api_url),
            request_timeout: file
                .api
                .request_timeout_secs
                .map(Duration::from_secs)
                .or(defaults.request_timeout),
            hub_url: cli.hub_url.clone().or_else(|| file.hub.url.clone()),
            room: cli.room.clone().or_else(|| file.hub.room.clone()),
            connect_timeout: file
                .hub
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            hello_timeout: file
                .hub
                .hello_timeout_secs
                .map_or(defaults.hello_timeout, Duration::from_secs),
            email: cli.email.clone().or_else(|| file.session.email.clone()),
            user_name: cli.user_name.clone().or_else(|| file.session.name.clone()),
            token: cli.token.clone().or_else(|| file.session.token.clone()),
            rollback_failed_moves: cli.rollback_failed_moves
                || file
                    .board
                    .rollback_failed_moves
                    .unwrap_or(defaults.rollback_failed_moves),
            notice_limit: file.notices.limit.unwrap_or(defaults.notice_limit),
            notice_duration: file
                .notices
                .duration_ms
                .map_or(defaults.notice_duration, Duration::from_millis),
        }
    }

    /// The signed-in session, if an email is configured.
    #[must_use]
    pub fn to_session(&self) -> Option<Session> {
        let email = self.email.as_deref().filter(|e| !e.trim().is_empty())?;
        let mut session = Session::new(email);
        if let Some(name) = &self.user_name {
            session = session.with_name(name.clone());
        }
        if let Some(token) = &self.token {
            session = session.with_token(token.clone());
        }
        Some(session)
    }

    /// Hub scope for published notifications.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.room
            .as_deref()
            .filter(|r| !r.is_empty())
            .map_or(Scope::Global, |r| Scope::Room(r.to_string()))
    }

    #[must_use]
    pub const fn hub_timeouts(&self) -> HubTimeouts {
        HubTimeouts {
            connect: self.connect_timeout,
            hello: self.hello_timeout,
        }
    }

    #[must_use]
    pub const fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            rollback_failed_moves: self.rollback_failed_moves,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Multi-user task board client")]
pub struct CliArgs {
    /// Task CRUD endpoint.
    #[arg(long, env = "TASKBOARD_API_URL")]
    pub api_url: Option<String>,

    /// WebSocket URL of the notification hub.
    #[arg(long, env = "TASKBOARD_HUB_URL")]
    pub hub_url: Option<String>,

    /// Hub room to share notifications in (default: global).
    #[arg(long, env = "TASKBOARD_ROOM")]
    pub room: Option<String>,

    /// Account email; required for any change.
    #[arg(long, env = "TASKBOARD_EMAIL")]
    pub email: Option<String>,

    /// Display name shown to other users.
    #[arg(long, env = "TASKBOARD_USER")]
    pub user_name: Option<String>,

    /// Bearer token for the backend.
    #[arg(long, env = "TASKBOARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Restore a card's previous column when saving a drag fails.
    #[arg(long)]
    pub rollback_failed_moves: bool,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", env = "TASKBOARD_LOG")]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to do once connected. Defaults to `board`.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the three board columns.
    Board,
    /// Print the filtered, sorted list view.
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<TaskStatus>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<TaskPriority>,
        #[arg(long, value_enum, default_value_t)]
        sort: SortKey,
        #[arg(long, value_enum, default_value_t)]
        order: SortOrder,
    },
    /// Create a task.
    Add {
        title: String,
        /// Due date, `YYYY-MM-DD`.
        #[arg(long)]
        due: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_parser = parse_priority, default_value = "medium")]
        priority: TaskPriority,
        #[arg(long, value_parser = parse_status, default_value = "todo")]
        status: TaskStatus,
    },
    /// Drag a card to another column and position.
    Move {
        id: String,
        #[arg(value_parser = parse_status)]
        to: TaskStatus,
        /// Position in the destination column (default: end).
        #[arg(long)]
        index: Option<usize>,
    },
    /// Set a task's status from the list view.
    Status {
        id: String,
        #[arg(value_parser = parse_status)]
        status: TaskStatus,
    },
    /// Delete a task.
    Delete { id: String },
    /// Stay connected and print notices until interrupted.
    Watch,
}

fn parse_status(raw: &str) -> Result<TaskStatus, String> {
    raw.parse().map_err(|e: taskboard_proto::task::ParseEnumError| e.to_string())
}

fn parse_priority(raw: &str) -> Result<TaskPriority, String> {
    raw.parse().map_err(|e: taskboard_proto::task::ParseEnumError| e.to_string())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// An explicit path must exist; the default path may be missing.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskboard").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
