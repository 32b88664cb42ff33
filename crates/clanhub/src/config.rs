use anyhow::anyhow;
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs::{self, File},
    io::{Read, Write},
    path::PathBuf,
};
use time::{format_description::well_known::Iso8601, OffsetDateTime};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to Settings.toml file holding configuration options
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level to run with the service (default: info)
    #[arg(short, long)]
    pub level: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Settings {
    pub config: Option<String>,
    pub level: Option<String>,
    pub db_settings: DBSettings,
    pub api_settings: APISettings,
    pub auth_settings: AuthSettings,
    pub stats_settings: StatsSettings,
    pub webhook_settings: WebhookSettings,
    pub media_settings: MediaSettings,
}

impl Settings {
    fn apply_cli_overrides(&mut self, cli_settings: &CliSettings) {
        if let Some(level) = &cli_settings.level {
            self.level = Some(level.clone());
        }
        if let Some(config) = &cli_settings.config {
            self.config = Some(config.clone());
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DBSettings {
    pub data_folder: String,
    pub read_max_connections: u32,
    pub read_min_connections: u32,
    pub write_max_connections: u32,
    pub write_min_connections: u32,
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub sqlite: SqliteSettings,
}

impl Default for DBSettings {
    fn default() -> Self {
        DBSettings {
            data_folder: String::from("./data"),
            read_max_connections: 12,
            read_min_connections: 2,
            write_max_connections: 4,
            write_min_connections: 1,
            idle_timeout_secs: 600,   // 10 minutes
            acquire_timeout_secs: 15, // 15 seconds
            sqlite: SqliteSettings::default(),
        }
    }
}

/// Pragmas applied to every sqlite connection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SqliteSettings {
    /// `file` or `memory`
    pub mode: String,
    pub busy_timeout_ms: u32,
    pub journal_mode: String,
    pub synchronous: String,
    pub cache_size: i32,
    pub foreign_keys: bool,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            mode: String::from("file"),
            busy_timeout_ms: 5000,
            journal_mode: String::from("WAL"),
            synchronous: String::from("NORMAL"),
            cache_size: 100000,
            foreign_keys: true,
        }
    }
}

impl SqliteSettings {
    pub fn testing() -> Self {
        Self {
            mode: String::from("memory"),
            busy_timeout_ms: 1000,
            journal_mode: String::from("MEMORY"),
            synchronous: String::from("OFF"),
            cache_size: 10000,
            foreign_keys: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct APISettings {
    pub domain: String,
    pub port: String,
    pub origins: Vec<String>,
    /// Largest accepted upload body (proof images plus form fields)
    pub max_upload_bytes: usize,
}

impl Default for APISettings {
    fn default() -> Self {
        APISettings {
            domain: String::from("127.0.0.1"),
            port: String::from("9990"),
            origins: vec![String::from("http://localhost:5173")],
            max_upload_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AuthSettings {
    /// Operators allowed to call the admin endpoints.
    /// Generate `token_hash` with the `hash-token` binary.
    pub operators: Vec<OperatorSettings>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperatorSettings {
    pub name: String,
    /// Argon2 PHC string of the operator's bearer token
    pub token_hash: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsSettings {
    /// Base url of the game statistics api
    pub base_url: String,
    /// Clan group id on the stats service
    pub group_id: u64,
    /// Optional api key sent as `x-api-key`
    pub api_key: Option<String>,
    /// Minimum spacing between two requests to the stats api, the public api is heavily rate limited
    pub min_request_interval_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        StatsSettings {
            base_url: String::from("https://api.wiseoldman.net/v2/"),
            group_id: 0,
            api_key: None,
            min_request_interval_ms: 5000,
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct WebhookSettings {
    /// Chat webhook to announce new submissions to, notifications are skipped when unset
    pub url: Option<String>,
    /// Public site url used to build links in notifications
    pub site_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Folder proof images are written to, one sub folder per bucket
    pub media_folder: String,
    /// Url prefix the media folder is reachable under
    pub public_base_url: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        MediaSettings {
            media_folder: String::from("./data/media"),
            public_base_url: String::from("http://127.0.0.1:9990/media"),
        }
    }
}

pub fn get_settings() -> Result<Settings, anyhow::Error> {
    get_settings_with_cli(Cli::parse().into())
}

pub struct CliSettings {
    pub config: Option<String>,
    pub level: Option<String>,
}

impl From<Cli> for CliSettings {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            level: cli.level,
        }
    }
}

fn default_config_path() -> PathBuf {
    PathBuf::from("./config/local.toml")
}

fn read_settings(path: &PathBuf) -> Result<Settings, anyhow::Error> {
    let mut file = File::open(path).map_err(|e| anyhow!("Failed to find file: {}", e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| anyhow!("Failed to read config: {}", e))?;
    toml::from_str(&content).map_err(|e| anyhow!("Failed to map config to settings: {}", e))
}

pub fn get_settings_with_cli(cli_settings: CliSettings) -> Result<Settings, anyhow::Error> {
    let mut settings = if let Some(config_path) = cli_settings.config.clone() {
        let path = PathBuf::from(config_path);
        let absolute_path = if path.is_absolute() {
            path
        } else {
            env::current_dir()?.join(path)
        };
        read_settings(&absolute_path)?
    } else {
        let default_path = default_config_path();
        if default_path.exists() {
            read_settings(&default_path)?
        } else {
            let default_settings = Settings::default();

            if let Some(parent) = default_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("Failed to create config directory: {}", e))?;
            }

            let toml_content = toml::to_string(&default_settings)
                .map_err(|e| anyhow!("Failed to serialize default settings: {}", e))?;

            let mut file = fs::File::create(&default_path)
                .map_err(|e| anyhow!("Failed to create config file: {}", e))?;
            file.write_all(toml_content.as_bytes())
                .map_err(|e| anyhow!("Failed to write default config: {}", e))?;

            default_settings
        }
    };

    settings.apply_cli_overrides(&cli_settings);

    Ok(settings)
}

pub fn setup_logger(
    level: Option<String>,
    filter_targets: Vec<String>,
) -> Result<(), fern::InitError> {
    let rust_log = get_log_level(level);
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let now = OffsetDateTime::now_utc()
                .format(&Iso8601::DEFAULT)
                .unwrap_or_default();
            out.finish(format_args!(
                "[{} {}] {}: {}",
                now,
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .level(rust_log)
        .filter(move |metadata| {
            !filter_targets
                .iter()
                .any(|filter| metadata.target().starts_with(filter))
        })
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

pub fn get_log_level(level: Option<String>) -> LevelFilter {
    match level {
        Some(level) => parse_level(&level),
        None => parse_level(&env::var("RUST_LOG").unwrap_or_default()),
    }
}
