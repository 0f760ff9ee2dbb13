use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use serde::Deserialize;

use crate::address;
use crate::fields::Fields;

/// A recipient profile, addressed by its auth token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub auth_token: String,
    pub from: String,
    pub to: Vec<String>,
    pub name: String,
    pub defaults: Fields,
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("could not read target directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("{path} has no 'auth-token'")]
    MissingToken { path: PathBuf },

    #[error("{path} has no usable 'to' addresses")]
    NoRecipients { path: PathBuf },
}

/// On-disk shape of a target definition.
#[derive(Debug, Deserialize)]
struct TargetFile {
    #[serde(rename = "auth-token", default)]
    auth_token: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: Option<Recipients>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    defaults: HashMap<String, String>,
}

/// `to: a@example.com` or `to: [a@example.com, b@example.com]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    fn into_vec(self) -> Vec<String> {
        match self {
            Recipients::One(addr) => vec![addr],
            Recipients::Many(list) => list,
        }
    }
}

/// Auth token to target map. Built once at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct TargetStore {
    targets: HashMap<String, Target>,
}

impl TargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every target file in `dir` (non-recursive). Bad entries are
    /// logged and skipped; only an unreadable directory is an error.
    pub fn load(dir: &Path) -> Result<Self, TargetError> {
        let entries = fs::read_dir(dir).map_err(|source| TargetError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| !n.starts_with('.'))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        debug!("Found {} targets in {}", paths.len(), dir.display());

        let mut store = Self::new();
        for path in &paths {
            debug!("loading target {}", path.display());
            match load_target(path) {
                Ok(target) => {
                    debug!("loaded target '{}' ({} recipients)", target.name, target.to.len());
                    store.add(target);
                }
                Err(e @ TargetError::Io { .. }) | Err(e @ TargetError::Parse { .. }) => {
                    error!("error: skipping target: {}", e)
                }
                Err(e) => warn!("skipping target: {}", e),
            }
        }
        Ok(store)
    }

    /// Insert or replace a target by its token.
    pub fn add(&mut self, target: Target) {
        if self.targets.contains_key(&target.auth_token) {
            warn!("target '{}' replaces an earlier target with the same auth-token", target.name);
        }
        self.targets.insert(target.auth_token.clone(), target);
    }

    pub fn lookup(&self, token: &str) -> Option<&Target> {
        self.targets.get(token)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.targets.values().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

fn load_target(path: &Path) -> Result<Target, TargetError> {
    let data = fs::read_to_string(path).map_err(|source| TargetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_target(path, &data)
}

/// Parse one target document. `path` supplies the default name.
pub fn parse_target(path: &Path, data: &str) -> Result<Target, TargetError> {
    let file: TargetFile = serde_yaml::from_str(data).map_err(|source| TargetError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let auth_token = file.auth_token.trim().to_string();
    if auth_token.is_empty() {
        return Err(TargetError::MissingToken {
            path: path.to_path_buf(),
        });
    }

    let mut to = Vec::new();
    for raw in file.to.map(Recipients::into_vec).unwrap_or_default() {
        match address::format_address(&raw) {
            Ok(formatted) => to.push(formatted),
            Err(e) => warn!("{}: {}", path.display(), e),
        }
    }
    if to.is_empty() {
        return Err(TargetError::NoRecipients {
            path: path.to_path_buf(),
        });
    }

    let name = if file.name.trim().is_empty() {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        file.name
    };

    let defaults = file
        .defaults
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();

    Ok(Target {
        auth_token,
        from: file.from.trim().to_string(),
        to,
        name,
        defaults,
    })
}
