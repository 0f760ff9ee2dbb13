use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::email::smtp::SmtpSettings;
use crate::rate_limit::{RateLimit, RateLimitError};

const CONFIG_NAMES: &[&str] = &["config.toml", "config.yml", "config.yaml"];

const DEFAULT_LOG_FILE: &str = "/var/log/dispatch.log";
const DEFAULT_TARGET_DIR: &str = "/etc/dispatch/targets-enabled";
const DEFAULT_PORT: u16 = 2525;
const DEFAULT_RATE_LIMIT: &str = "inf";

/// Run a webserver that provides a JSON api for emails.
#[derive(Parser, Debug, Default)]
#[command(name = "dispatch", version, about = "A mail forwarding API service")]
pub struct Cli {
    /// Path to a specific config file (default "./config.toml")
    #[arg(long, env = "DISPATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to log file (default "/var/log/dispatch.log")
    #[arg(short = 'l', long, env = "DISPATCH_LOG_FILE")]
    pub log_file: Option<String>,

    /// Path to target configs (default "/etc/dispatch/targets-enabled")
    #[arg(short = 't', long, env = "DISPATCH_TARGET_DIR")]
    pub target_dir: Option<PathBuf>,

    /// Check the config for errors and exit
    #[arg(long)]
    pub check: bool,

    /// The IP address to bind the web server to
    #[arg(short = 'a', long, env = "DISPATCH_ADDRESS")]
    pub address: Option<IpAddr>,

    /// The port to bind the webserver to
    #[arg(short = 'p', long, env = "DISPATCH_PORT")]
    pub port: Option<u16>,

    /// The rate limit at which to send emails in the format 'inf|<num>/<duration>'.
    /// inf for infinite or 1/10s for 1 email per 10 seconds.
    #[arg(short = 'r', long, env = "DISPATCH_RATE_LIMIT")]
    pub rate_limit: Option<String>,

    /// The SMTP server to send email through
    #[arg(short = 'x', long, env = "DISPATCH_SMTP_SERVER")]
    pub smtp_server: Option<String>,

    /// The port to use for the SMTP server
    #[arg(short = 'o', long, env = "DISPATCH_SMTP_PORT")]
    pub smtp_port: Option<u16>,

    /// Authenticate the SMTP server with this user
    #[arg(short = 'u', long, env = "DISPATCH_SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// Authenticate the SMTP server with this password
    #[arg(short = 'w', long, env = "DISPATCH_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Seconds to wait on the SMTP server before giving up
    #[arg(long, env = "DISPATCH_SMTP_TIMEOUT")]
    pub smtp_timeout: Option<u64>,

    /// Include debug statements in log output
    #[arg(short = 'D', long, hide = true)]
    pub debug: bool,
}

/// Configuration file contents. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub log_file: Option<String>,
    pub target_dir: Option<PathBuf>,
    pub rate_limit: Option<String>,
    pub web: WebSection,
    pub smtp: SmtpSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub address: Option<IpAddr>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No config file found.")]
    NotFound,

    #[error("Error opening config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error parsing config {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Error parsing config {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("error parsing limit: {0}")]
    RateLimit(#[from] RateLimitError),
}

/// Fully resolved process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_file: PathBuf,
    pub log_file: String,
    pub target_dir: PathBuf,
    pub address: IpAddr,
    pub port: u16,
    pub rate_limit: RateLimit,
    pub smtp: SmtpSettings,
    pub debug: bool,
    pub check: bool,
}

impl Settings {
    /// Locate and read the config file, then layer flags/env over it.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let path = discover(cli.config.as_deref(), &search_dirs(home.as_deref()))
            .ok_or(ConfigError::NotFound)?;
        let file = read_file_config(&path)?;
        Self::layer(cli, file, path)
    }

    /// Flags (and their env fallbacks) win over the file, the file wins over defaults.
    pub fn layer(cli: &Cli, file: FileConfig, config_file: PathBuf) -> Result<Self, ConfigError> {
        let rate_limit: RateLimit = cli
            .rate_limit
            .clone()
            .or(file.rate_limit)
            .unwrap_or_else(|| DEFAULT_RATE_LIMIT.to_string())
            .parse()?;

        let defaults = SmtpSettings::default();
        let smtp = SmtpSettings {
            host: cli.smtp_server.clone().or(file.smtp.server).unwrap_or(defaults.host),
            port: cli.smtp_port.or(file.smtp.port).unwrap_or(defaults.port),
            username: cli
                .smtp_username
                .clone()
                .or(file.smtp.username)
                .unwrap_or_default(),
            password: cli
                .smtp_password
                .clone()
                .or(file.smtp.password)
                .unwrap_or_default(),
            timeout: cli
                .smtp_timeout
                .or(file.smtp.timeout)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };

        Ok(Settings {
            config_file,
            log_file: cli
                .log_file
                .clone()
                .or(file.log_file)
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
            target_dir: cli
                .target_dir
                .clone()
                .or(file.target_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR)),
            address: cli
                .address
                .or(file.web.address)
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: cli.port.or(file.web.port).unwrap_or(DEFAULT_PORT),
            rate_limit,
            smtp,
            debug: cli.debug,
            check: cli.check,
        })
    }
}

fn search_dirs(home: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    if let Some(home) = home {
        dirs.push(home.join(".config").join("dispatch"));
    }
    dirs.push(PathBuf::from("/etc/dispatch"));
    dirs
}

/// An explicit path is used as-is (even if missing, so the read reports it).
/// Otherwise the first known config name found in `dirs`.
pub fn discover(explicit: Option<&Path>, dirs: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    dirs.iter()
        .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

pub fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file_config(path, &content)
}

pub fn parse_file_config(path: &Path, content: &str) -> Result<FileConfig, ConfigError> {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false);

    if is_yaml {
        if content.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}
