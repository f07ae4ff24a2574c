use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const PLACEHOLDER_URL: &str = "https://placeholder.supabase.co";
const PLACEHOLDER_KEY: &str = "placeholder-key";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub local: LocalSettings,
    pub feed: FeedSettings,
    pub sessions: SessionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Hosted backend (rows, identity and photo storage)
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    /// Secret the identity service signs access tokens with; enables local verification
    pub jwt_secret: Option<String>,
    #[serde(default = "default_photo_bucket")]
    pub photo_bucket: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Which store the service runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Remote,
    Demo,
}

impl BackendSettings {
    /// Remote mode needs both the URL and the anon key, neither left at its placeholder
    pub fn mode(&self) -> BackendMode {
        let url = self.url.as_deref().map(str::trim).unwrap_or_default();
        let key = self.anon_key.as_deref().map(str::trim).unwrap_or_default();

        if url.is_empty() || key.is_empty() || url == PLACEHOLDER_URL || key == PLACEHOLDER_KEY {
            BackendMode::Demo
        } else {
            BackendMode::Remote
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Demo-mode persistence
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSettings {
    pub data_dir: String,
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    /// How long to wait for the store to materialise a match after a like
    #[serde(default = "default_match_check_delay_ms")]
    pub match_check_delay_ms: u64,
}

impl FeedSettings {
    pub fn match_check_delay(&self) -> Duration {
        Duration::from_millis(self.match_check_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    #[serde(default = "default_max_viewers")]
    pub max_viewers: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_photo_bucket() -> String { "profilepictures".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_token_ttl_secs() -> u64 { 7 * 24 * 3600 }
fn default_match_check_delay_ms() -> u64 { 500 }
fn default_idle_ttl_secs() -> u64 { 3600 }
fn default_max_viewers() -> u64 { 10_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with YWM__)
    /// 5. SUPABASE_URL / SUPABASE_ANON_KEY / SUPABASE_JWT_SECRET
    pub fn load() -> Result<Self, ConfigError> {
        let settings = with_defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., YWM__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("YWM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = with_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("YWM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("backend.photo_bucket", default_photo_bucket())?
        .set_default("backend.timeout_secs", default_timeout_secs())?
        .set_default("local.data_dir", "data")?
        .set_default("local.token_ttl_secs", default_token_ttl_secs())?
        .set_default("feed.match_check_delay_ms", default_match_check_delay_ms())?
        .set_default("sessions.idle_ttl_secs", default_idle_ttl_secs())?
        .set_default("sessions.max_viewers", default_max_viewers())?
        .set_default("logging.level", default_log_level())?
        .set_default("logging.format", default_log_format())
}

/// Apply the backend variables the hosted project hands out
/// (`SUPABASE_*`, or the `VITE_SUPABASE_*` names a web build already carries)
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let lookup = |name: &str| {
        env::var(name)
            .or_else(|_| env::var(format!("VITE_{}", name)))
            .ok()
    };

    let mut builder = Config::builder().add_source(settings);

    if let Some(url) = lookup("SUPABASE_URL") {
        builder = builder.set_override("backend.url", url)?;
    }
    if let Some(key) = lookup("SUPABASE_ANON_KEY") {
        builder = builder.set_override("backend.anon_key", key)?;
    }
    if let Some(secret) = lookup("SUPABASE_JWT_SECRET") {
        builder = builder.set_override("backend.jwt_secret", secret)?;
    }

    builder.build()
}
