//! Repository roots: where installed packages are searched for.
//!
//! There is one primary root and any number of additional roots. The
//! resolved search order is the additional roots followed by the primary
//! root, with duplicates removed (first occurrence wins).

use anyhow::Context;
use log::{debug, info};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::package::{GEMS_DIR, SPECIFICATIONS_DIR};
use crate::runtime::{Runtime, normalize_path};

/// Subdirectories every root is provisioned with, including the
/// default-scope `gems`/`specifications` pair.
pub const DIRECTORIES: [&str; 6] = [
    "cache",
    "doc",
    GEMS_DIR,
    SPECIFICATIONS_DIR,
    "default/gems",
    "default/specifications",
];

/// Explicitly configured roots. Unset fields are derived on resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryPaths {
    primary: Option<PathBuf>,
    additional: Option<Vec<PathBuf>>,
}

/// A resolved root set, immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoots {
    primary: PathBuf,
    all: Vec<PathBuf>,
}

impl RepositoryPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both the primary and the additional roots.
    pub fn reconfigure(&mut self, primary: impl Into<PathBuf>, additional: Vec<PathBuf>) {
        self.primary = Some(primary.into());
        self.additional = Some(additional);
    }

    /// Forget explicit roots so they are derived again.
    pub fn reset(&mut self) {
        self.primary = None;
        self.additional = None;
    }

    /// Primary root: explicit, then `config.primary_root`, then the default
    /// directory. The result is provisioned before it is returned.
    #[tracing::instrument(skip(self, runtime, config))]
    pub fn resolved_primary<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        config: &Config,
    ) -> Result<PathBuf> {
        let primary = match self.primary.as_ref().or(config.primary_root.as_ref()) {
            Some(path) => path.clone(),
            None => default_dir(runtime, config)?,
        };
        provision(runtime, &primary);
        Ok(primary)
    }

    /// Additional roots: explicit, then `config.additional_roots`, else none.
    pub fn resolved_additional(&self, config: &Config) -> Vec<PathBuf> {
        self.additional
            .as_ref()
            .or(config.additional_roots.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve the full search order.
    pub fn resolve<R: Runtime + ?Sized>(&self, runtime: &R, config: &Config) -> Result<ResolvedRoots> {
        let primary = self.resolved_primary(runtime, config)?;
        let additional = self.resolved_additional(config);
        let all = dedup_roots(additional.into_iter().chain([primary.clone()]));

        info!("Using primary root: {}", primary.display());
        debug!("Repository roots: {:?}", all);
        Ok(ResolvedRoots { primary, all })
    }
}

impl ResolvedRoots {
    pub fn primary(&self) -> &Path {
        &self.primary
    }

    /// Additional roots followed by the primary root, without duplicates.
    pub fn all(&self) -> &[PathBuf] {
        &self.all
    }
}

/// Remove duplicate roots, keeping the first occurrence of each.
///
/// Paths are compared after lexical normalization, so `/srv/a/` and
/// `/srv/./a` are the same root.
pub fn dedup_roots(roots: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    roots
        .into_iter()
        .filter(|root| seen.insert(normalize_path(root)))
        .collect()
}

/// The default primary root: `<installation root>/packages/<runtime version>`.
#[tracing::instrument(skip(runtime, config))]
pub fn default_dir<R: Runtime + ?Sized>(runtime: &R, config: &Config) -> Result<PathBuf> {
    Ok(installation_root(runtime, config)?
        .join("packages")
        .join(config.runtime_version()))
}

fn installation_root<R: Runtime + ?Sized>(runtime: &R, config: &Config) -> Result<PathBuf> {
    if let Some(root) = &config.installation_root {
        return Ok(root.clone());
    }
    if runtime.is_privileged() {
        return Ok(system_installation_root());
    }
    let data_dir = runtime
        .data_dir()
        .context("Could not find the user data directory")?;
    Ok(data_dir.join("gemenv"))
}

#[cfg(target_os = "macos")]
fn system_installation_root() -> PathBuf {
    PathBuf::from("/opt/gemenv")
}

#[cfg(target_os = "windows")]
fn system_installation_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\gemenv")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_installation_root() -> PathBuf {
    PathBuf::from("/usr/local/lib/gemenv")
}

/// Create the standard layout under `root`, including missing parents.
///
/// Best effort: each subdirectory is attempted on its own and failures (a
/// read-only root, an unwritable parent) are logged and ignored, so a
/// read-only installation still resolves.
#[tracing::instrument(skip(runtime))]
pub fn provision<R: Runtime + ?Sized>(runtime: &R, root: &Path) {
    for dir in DIRECTORIES {
        let path = root.join(dir);
        if runtime.is_dir(&path) {
            continue;
        }
        if let Err(e) = runtime.create_dir_all(&path) {
            debug!("Could not create {}: {:#}", path.display(), e);
        }
    }
}
