use crate::error::ConfigError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs::read_to_string};
use tracing::{info, warn};

pub const DEFAULT_CATEGORIES: [&str; 4] = ["Price", "Quality", "Service", "Location"];

// Docker-style secret consulted when the token is not in the environment
const TOKEN_SECRET: &str = "dinnerclub_backup_token";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub snapshot_path: PathBuf,
    pub categories: Vec<String>,
    pub allow_self_vote: bool,
    pub backup: Option<BackupConfig>, // None disables the remote mirror
}

/// Where and how the snapshot is mirrored on a contents API.
#[derive(Clone)]
pub struct BackupConfig {
    pub api_base: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
    pub token: String,
    pub timeout: Duration,
}

impl fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupConfig")
            .field("api_base", &self.api_base)
            .field("repo", &self.repo)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let categories = parse_categories(&try_load(
            &lookup,
            "DINNERCLUB_CATEGORIES",
            &DEFAULT_CATEGORIES.join(","),
        ))?;

        let backup = match lookup("DINNERCLUB_BACKUP_REPO") {
            Some(repo) if !repo.trim().is_empty() => {
                let token = lookup("DINNERCLUB_BACKUP_TOKEN")
                    .or_else(|| read_secret(TOKEN_SECRET))
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingSecret("DINNERCLUB_BACKUP_REPO".into()))?;
                let timeout_secs: u64 = parse(&lookup, "DINNERCLUB_BACKUP_TIMEOUT_SECS", "30")?;
                Some(BackupConfig {
                    api_base: try_load(&lookup, "DINNERCLUB_BACKUP_API", "https://api.github.com"),
                    repo: repo.trim().to_string(),
                    path: try_load(&lookup, "DINNERCLUB_BACKUP_PATH", "dinnerclub.json"),
                    branch: try_load(&lookup, "DINNERCLUB_BACKUP_BRANCH", "main"),
                    token: token.trim().to_string(),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            _ => {
                info!("DINNERCLUB_BACKUP_REPO not set, remote backup disabled");
                None
            }
        };

        Ok(Self {
            addr: try_load(&lookup, "DINNERCLUB_ADDR", "127.0.0.1:3000"),
            snapshot_path: PathBuf::from(try_load(
                &lookup,
                "DINNERCLUB_SNAPSHOT",
                "dinnerclub.json",
            )),
            categories,
            allow_self_vote: parse_flag(&lookup, "DINNERCLUB_ALLOW_SELF_VOTE")?,
            backup,
        })
    }
}

fn try_load<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parse<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    try_load(lookup, key, default)
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match try_load(lookup, key, "false").trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_categories(raw: &str) -> Result<Vec<String>, ConfigError> {
    let categories: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if categories.is_empty() {
        return Err(ConfigError::Invalid {
            key: "DINNERCLUB_CATEGORIES".into(),
            message: "at least one category is required".into(),
        });
    }
    Ok(categories)
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");
    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
}
