use crate::error::{ForkSyncError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    pub github_token: Option<String>,
    pub api_timeout_secs: u64,
    pub git_timeout_secs: u64,
    pub check_concurrency: usize,
    pub remote_base: String,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub fail_fast: bool,
    pub dry_run: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &self.github_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("git_timeout_secs", &self.git_timeout_secs)
            .field("check_concurrency", &self.check_concurrency)
            .field("remote_base", &self.remote_base)
            .field("exclude", &self.exclude)
            .field("fail_fast", &self.fail_fast)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: None,
            api_timeout_secs: 30,
            git_timeout_secs: 300,
            check_concurrency: 1,
            remote_base: "https://github.com".to_string(),
            exclude: Vec::new(),
            fail_fast: false,
            dry_run: false,
        }
    }
}

/// Values given on the command line. They sit on top of every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub token: Option<String>,
    pub check_concurrency: Option<usize>,
    pub exclude: Vec<String>,
    pub fail_fast: bool,
    pub dry_run: bool,
}

impl Config {
    /// Layers defaults, the TOML file, `FORKSYNC_*` and `GITHUB_TOKEN`, then
    /// the CLI. An explicit `config_path` must exist; the default one may not.
    pub fn load(config_path: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match config_path {
            Some(path) if !path.exists() => {
                return Err(ForkSyncError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                let default_file = config_dir().join("forksync").join("config.toml");
                if default_file.exists() {
                    figment = figment.merge(Toml::file(&default_file));
                }
            }
        }

        figment = figment.merge(Env::prefixed("FORKSYNC_"));

        // An empty GITHUB_TOKEN or --token counts as unset, so a lower layer
        // still gets to supply the token.
        if std::env::var("GITHUB_TOKEN").is_ok_and(|t| !t.trim().is_empty()) {
            figment = figment.merge(
                Env::raw()
                    .only(&["GITHUB_TOKEN"])
                    .map(|_| "github_token".into()),
            );
        }
        if let Some(token) = cli.token.as_deref().filter(|t| !t.trim().is_empty()) {
            figment = figment.merge(Serialized::default("github_token", token));
        }
        if let Some(n) = cli.check_concurrency {
            figment = figment.merge(Serialized::default("check_concurrency", n));
        }
        if cli.fail_fast {
            figment = figment.merge(Serialized::default("fail_fast", true));
        }
        if cli.dry_run {
            figment = figment.merge(Serialized::default("dry_run", true));
        }

        let mut config: Config = figment
            .extract()
            .map_err(|e| ForkSyncError::Config(e.to_string()))?;
        config.exclude.extend(cli.exclude.iter().cloned());
        Ok(config)
    }

    pub fn token(&self) -> Result<&str> {
        match self.github_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ForkSyncError::MissingToken),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs.max(1))
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs.max(1))
    }
}

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}
