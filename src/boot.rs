use log::{debug, error, info, warn};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use env_logger::{Env, Target};

use crate::config::Settings;
use crate::dispatch::Dispatch;
use crate::email::smtp::SmtpRelay;
use crate::email::MailError;
use crate::targets::{TargetError, TargetStore};

#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("error opening log file {path}: {source}")]
    LogFile { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Targets(#[from] TargetError),

    #[error("error configuring SMTP relay: {0}")]
    Relay(#[from] MailError),
}

/// `stdout`, `-` or empty log to stdout; a directory gets `dispatch.log` inside it.
pub fn log_file_path(log_file: &str) -> Option<PathBuf> {
    if log_file.is_empty() || log_file == "-" || log_file.eq_ignore_ascii_case("stdout") {
        return None;
    }
    let path = Path::new(log_file);
    if path.is_dir() {
        Some(path.join("dispatch.log"))
    } else {
        Some(path.to_path_buf())
    }
}

/// Install the global logger. `RUST_LOG` still wins over the default level.
pub fn init_logging(log_file: &str, debug: bool) -> Result<(), BootError> {
    let level = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(level));

    match log_file_path(log_file) {
        None => {
            builder.target(Target::Stdout);
        }
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| BootError::LogFile { path, source })?;
            builder.target(Target::Pipe(Box::new(file)));
        }
    }

    // A second init (tests) keeps the first logger.
    let _ = builder.try_init();
    Ok(())
}

/// Load targets and build the relay.
pub fn load(settings: &Settings) -> Result<Dispatch, BootError> {
    debug!("config: smtp={:?}", settings.smtp);
    debug!("config: targets={}", settings.target_dir.display());

    let targets = TargetStore::load(&settings.target_dir)?;
    if targets.is_empty() {
        warn!("No targets loaded from {}", settings.target_dir.display());
    } else {
        info!("Loaded {} targets: {}", targets.len(), targets.names().join(", "));
    }

    let relay = SmtpRelay::new(settings.smtp.clone())?;
    Ok(Dispatch::new(targets, Box::new(relay)))
}

/// One-line summary printed by `--check`.
pub fn check_summary(settings: &Settings) -> String {
    format!(
        "config: webserver={}:{} rate-limit={} targets={}",
        settings.address,
        settings.port,
        settings.rate_limit,
        settings.target_dir.display()
    )
}

/// Startup sequence. Any failure ends the process before a socket is bound.
pub fn run(settings: &Settings) -> Dispatch {
    if let Err(e) = init_logging(&settings.log_file, settings.debug) {
        eprintln!("{}", e);
        process::exit(1);
    }
    info!("config: file={}", settings.config_file.display());

    if !settings.target_dir.is_dir() {
        error!("Target directory {} does not exist", settings.target_dir.display());
        process::exit(1);
    }

    let dispatch = match load(settings) {
        Ok(d) => d,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if settings.check {
        info!("{}", check_summary(settings));
        info!("Config file format checks out, exiting");
        if !settings.debug {
            info!("Use the --debug flag for more info");
        }
        process::exit(0);
    }

    dispatch
}
