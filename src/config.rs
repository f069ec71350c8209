use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Overrides the primary root.
pub const PRIMARY_ROOT_ENV: &str = "PACKAGE_HOME";

/// Additional roots, separated like `PATH`.
pub const ADDITIONAL_ROOTS_ENV: &str = "ADDITIONAL_PACKAGE_PATH";

/// `0`/`false`/`no` turns the secure-transport capability off.
pub const SSL_ENV: &str = "PACKAGE_SSL";

/// Path of a JSON configuration file (read by the command-line tool).
pub const CONFIG_ENV: &str = "GEMENV_CONFIG";

/// Package sources used when none are configured.
pub const DEFAULT_SOURCES: &[&str] = &["https://rubygems.org"];

/// Version segment of the default primary root,
/// `<installation root>/packages/<runtime version>`.
pub const RUNTIME_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR")
);

/// Recognised options. Every field is optional; unset fields fall back to
/// the environment and then to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Primary (read-write) root
    pub primary_root: Option<PathBuf>,
    /// Extra read-mostly roots, searched before the primary root
    pub additional_roots: Option<Vec<PathBuf>>,
    /// Parent of the default `packages/<runtime version>` root
    pub installation_root: Option<PathBuf>,
    pub runtime_version: Option<String>,
    pub ssl_available: Option<bool>,
    pub sources: Option<Vec<String>>,
}

impl Config {
    /// Read a JSON configuration file.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration file {}", path.display()))
    }

    /// Options taken from the process environment.
    pub fn from_env<R: Runtime + ?Sized>(runtime: &R) -> Self {
        let primary_root = runtime
            .env_var(PRIMARY_ROOT_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let additional_roots = runtime
            .env_var(ADDITIONAL_ROOTS_ENV)
            .ok()
            .map(|v| split_path_list(&v));

        let ssl_available = runtime
            .env_var(SSL_ENV)
            .ok()
            .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                other => {
                    warn!("Ignoring {}={:?}: expected true or false", SSL_ENV, other);
                    None
                }
            });

        Self {
            primary_root,
            additional_roots,
            ssl_available,
            ..Self::default()
        }
    }

    /// Layer `overrides` on top of `self`; fields set in `overrides` win.
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            primary_root: overrides.primary_root.or(self.primary_root),
            additional_roots: overrides.additional_roots.or(self.additional_roots),
            installation_root: overrides.installation_root.or(self.installation_root),
            runtime_version: overrides.runtime_version.or(self.runtime_version),
            ssl_available: overrides.ssl_available.or(self.ssl_available),
            sources: overrides.sources.or(self.sources),
        }
    }

    pub fn runtime_version(&self) -> &str {
        self.runtime_version.as_deref().unwrap_or(RUNTIME_VERSION)
    }

    /// Secure transport is assumed present unless switched off.
    pub fn ssl_available(&self) -> bool {
        self.ssl_available.unwrap_or(true)
    }

    pub fn sources(&self) -> Vec<String> {
        match &self.sources {
            Some(sources) => sources.clone(),
            None => DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Split a `PATH`-style list with the platform separator, dropping empty
/// entries.
pub fn split_path_list(value: &str) -> Vec<PathBuf> {
    env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}
