//! Process configuration.
//!
//! Values are layered, highest precedence first: command-line flags,
//! environment variables, the TOML config file, built-in defaults.

use clap::{CommandFactory, FromArgMatches, Parser};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::services::cache::{self, DEFAULT_TTL};
use crate::services::openweather::OPENWEATHER_API_URL;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_HOST: &str = "127.0.0.1";

/// Command-line flags; each one can also come from the named env variable.
#[derive(Debug, Parser)]
#[command(name = "weather-proxy-api", version, about)]
pub struct Cli {
    /// Port the HTTP server listens on [default: 8000]
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address the HTTP server binds to [default: 127.0.0.1]
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// OpenWeatherMap API key
    #[arg(long = "apiKey", env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Debug log level with human-readable output
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Name of the config file
    #[arg(long, env = "CONFIG", default_value = "config.toml")]
    pub config: String,

    /// Directory holding the config file
    #[arg(long = "configPath", env = "CONFIG_PATH", default_value = ".")]
    pub config_path: PathBuf,

    /// Serve repeated lookups from the in-memory cache [default: true]
    #[arg(long = "cacheEnabled", env = "CACHE_ENABLED")]
    pub cache_enabled: Option<bool>,

    /// Cache time-to-live in seconds [default: 300]
    #[arg(long = "cacheTtlSecs", env = "CACHE_TTL_SECS")]
    pub cache_ttl_secs: Option<u64>,

    /// Upstream current-weather endpoint
    #[arg(long = "upstreamUrl", env = "UPSTREAM_URL")]
    pub upstream_url: Option<String>,
}

impl Cli {
    /// Clap command whose `--version` carries the build commit.
    pub fn command_with_build_info() -> clap::Command {
        Self::command().version(version_line())
    }
}

/// `--version` text: crate version plus the commit it was built from.
fn version_line() -> String {
    format!("{} (commit {})", crate::VERSION, crate::COMMIT)
}

/// Keys accepted in the config file. All optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FileConfig {
    port: Option<u16>,
    host: Option<String>,
    api_key: Option<String>,
    debug: Option<bool>,
    cache_enabled: Option<bool>,
    cache_ttl_secs: Option<u64>,
    upstream_url: Option<String>,
}

impl FileConfig {
    /// Read and parse `path`. A missing file is `Ok(None)`.
    fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api_key: String,
    pub debug: bool,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub upstream_url: String,
    /// Config file actually read, if any.
    pub config_file: Option<PathBuf>,
    /// Config file looked for.
    pub config_candidate: PathBuf,
}

impl AppConfig {
    /// Parse flags and environment, then layer the config file underneath.
    pub fn load() -> Result<Self, ConfigError> {
        let matches = Cli::command_with_build_info().get_matches();
        let cli = match Cli::from_arg_matches(&matches) {
            Ok(cli) => cli,
            Err(e) => e.exit(),
        };
        Self::from_cli(cli)
    }

    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let candidate = cli.config_path.join(&cli.config);
        let file = FileConfig::read(&candidate)?;
        Self::merge(cli, candidate, file)
    }

    fn merge(
        cli: Cli,
        candidate: PathBuf,
        file: Option<FileConfig>,
    ) -> Result<Self, ConfigError> {
        let config_file = file.as_ref().map(|_| candidate.clone());
        let file = file.unwrap_or_default();

        let api_key = cli
            .api_key
            .or(file.api_key)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let cache_ttl_secs = cli
            .cache_ttl_secs
            .or(file.cache_ttl_secs)
            .unwrap_or(DEFAULT_TTL.as_secs());
        if cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "cacheTtlSecs must be greater than zero".to_string(),
            ));
        }
        let cache_ttl = Duration::from_secs(cache_ttl_secs);
        if !cache::supports_ttl(cache_ttl) {
            return Err(ConfigError::InvalidValue(format!(
                "cacheTtlSecs {} is too large",
                cache_ttl_secs
            )));
        }

        let upstream_url = cli
            .upstream_url
            .or(file.upstream_url)
            .unwrap_or_else(|| OPENWEATHER_API_URL.to_string());
        url::Url::parse(&upstream_url).map_err(|e| {
            ConfigError::InvalidValue(format!("upstreamUrl '{}': {}", upstream_url, e))
        })?;

        Ok(Self {
            host: cli
                .host
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
            api_key,
            debug: cli.debug || file.debug.unwrap_or(false),
            cache_enabled: cli.cache_enabled.or(file.cache_enabled).unwrap_or(true),
            cache_ttl,
            upstream_url,
            config_file,
            config_candidate: candidate,
        })
    }
}
