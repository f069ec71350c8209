//! Process-wide package environment.
//!
//! [`Environment`] binds the repository roots, the registry built from them,
//! a searcher over that registry and the activation table together. Roots,
//! registry and searcher are computed lazily, once per generation;
//! [`Environment::use_paths`] and [`Environment::clear_paths`] start a new
//! generation. Activations are never discarded.

mod activation;

use log::debug;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::package::{PackageSpec, Registry, Requirement};
use crate::paths::{self, RepositoryPaths, ResolvedRoots};
use crate::runtime::Runtime;
use crate::searcher::Searcher;

pub use activation::{FeatureLoader, LogLoader};
use activation::Activation;

const SSL_UNAVAILABLE: &str = "SSL is not installed on this system";

pub struct Environment<R: Runtime, L: FeatureLoader = LogLoader> {
    runtime: R,
    loader: L,
    config: Config,
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    paths: RepositoryPaths,
    roots: Option<Arc<ResolvedRoots>>,
    registry: Option<Arc<Registry>>,
    searcher: Option<Arc<Searcher>>,
    ssl_available: Option<bool>,
    activation: Activation,
}

impl State {
    fn invalidate(&mut self) {
        self.roots = None;
        self.registry = None;
        self.searcher = None;
    }
}

impl<R: Runtime, L: FeatureLoader> Environment<R, L> {
    pub fn new(runtime: R, loader: L, config: Config) -> Self {
        Self {
            runtime,
            loader,
            config,
            state: RwLock::new(State::default()),
        }
    }

    /// Seed the module search path, e.g. with the host's own library
    /// directories. Activated packages are placed in front of these.
    pub fn with_load_path(self, load_path: Vec<PathBuf>) -> Self {
        self.state.write().activation.load_path = load_path;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Configured options overlaid with the current process environment.
    fn effective_config(&self) -> Config {
        self.config.clone().merge(Config::from_env(&self.runtime))
    }

    /// Return a cached value, or take the write lock and build it.
    fn cached<T>(
        &self,
        get: impl Fn(&State) -> Option<T>,
        build: impl FnOnce(&Self, &mut State) -> Result<T>,
    ) -> Result<T> {
        let state = self.state.upgradable_read();
        if let Some(value) = get(&*state) {
            return Ok(value);
        }
        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        build(self, &mut *state)
    }

    fn build_roots(&self, state: &mut State) -> Result<Arc<ResolvedRoots>> {
        if let Some(roots) = &state.roots {
            return Ok(Arc::clone(roots));
        }
        let roots = Arc::new(state.paths.resolve(&self.runtime, &self.effective_config())?);
        state.roots = Some(Arc::clone(&roots));
        Ok(roots)
    }

    fn build_registry(&self, state: &mut State) -> Result<Arc<Registry>> {
        if let Some(registry) = &state.registry {
            return Ok(Arc::clone(registry));
        }
        let roots = self.build_roots(state)?;
        let registry = Arc::new(Registry::scan(&self.runtime, roots.all()));
        state.registry = Some(Arc::clone(&registry));
        Ok(registry)
    }

    fn build_searcher(&self, state: &mut State) -> Result<Arc<Searcher>> {
        if let Some(searcher) = &state.searcher {
            return Ok(Arc::clone(searcher));
        }
        let searcher = Arc::new(Searcher::new(self.build_registry(state)?));
        state.searcher = Some(Arc::clone(&searcher));
        Ok(searcher)
    }

    /// The resolved roots of the current generation.
    pub fn roots(&self) -> Result<Arc<ResolvedRoots>> {
        self.cached(|s| s.roots.clone(), Self::build_roots)
    }

    pub fn registry(&self) -> Result<Arc<Registry>> {
        self.cached(|s| s.registry.clone(), Self::build_registry)
    }

    pub fn searcher(&self) -> Result<Arc<Searcher>> {
        self.cached(|s| s.searcher.clone(), Self::build_searcher)
    }

    /// The primary root.
    pub fn dir(&self) -> Result<PathBuf> {
        Ok(self.roots()?.primary().to_path_buf())
    }

    /// Every root in search order; the primary root appears exactly once.
    pub fn path(&self) -> Result<Vec<PathBuf>> {
        Ok(self.roots()?.all().to_vec())
    }

    /// The primary root used when nothing overrides it.
    pub fn default_dir(&self) -> Result<PathBuf> {
        paths::default_dir(&self.runtime, &self.effective_config())
    }

    /// Use explicit roots instead of configured or environment ones.
    pub fn use_paths(&self, primary: impl Into<PathBuf>, additional: Vec<PathBuf>) {
        let mut state = self.state.write();
        state.paths.reconfigure(primary, additional);
        state.invalidate();
    }

    /// Drop cached roots, registry and searcher; the next lookup derives them
    /// again from the configuration and the current environment. Activated
    /// packages stay activated.
    pub fn clear_paths(&self) {
        let mut state = self.state.write();
        state.paths.reset();
        state.invalidate();
        debug!("Cleared repository paths");
    }

    /// Rescan the current roots on next access, e.g. after an install.
    pub fn refresh(&self) {
        let mut state = self.state.write();
        state.registry = None;
        state.searcher = None;
    }

    /// Create the standard layout under `root`, ignoring failures.
    pub fn provision(&self, root: &Path) {
        paths::provision(&self.runtime, root);
    }

    pub fn all_load_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.searcher()?.all_load_paths())
    }

    pub fn latest_load_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.searcher()?.latest_load_paths())
    }

    pub fn required_location(
        &self,
        name: &str,
        file: impl AsRef<Path>,
        requirement: &Requirement,
    ) -> Result<PathBuf> {
        self.searcher()?
            .required_location(&self.runtime, name, file.as_ref(), requirement)
    }

    /// The newest installed package providing `file`, if any.
    pub fn find_package_for(&self, file: impl AsRef<Path>) -> Result<Option<Arc<PackageSpec>>> {
        Ok(self.searcher()?.find(&self.runtime, file.as_ref()))
    }

    /// Data directory of a package: `<full path>/data/<name>`.
    ///
    /// Uses the activated version when there is one, else the newest
    /// installed version. `None` for unknown packages or when the directory
    /// does not exist.
    pub fn datadir(&self, name: &str) -> Result<Option<PathBuf>> {
        let active = self.state.read().activation.loaded_specs.get(name).cloned();
        let spec = match active {
            Some(spec) => spec,
            None => match self.registry()?.find_best(name, &Requirement::any()) {
                Ok(spec) => spec,
                Err(Error::UnknownPackage(_)) => return Ok(None),
                Err(e) => return Err(e),
            },
        };

        let data_dir = spec.data_dir();
        Ok(self.runtime.is_dir(&data_dir).then_some(data_dir))
    }

    pub fn ssl_available(&self) -> bool {
        let explicit = self.state.read().ssl_available;
        explicit.unwrap_or_else(|| self.effective_config().ssl_available())
    }

    pub fn set_ssl_available(&self, available: bool) {
        self.state.write().ssl_available = Some(available);
    }

    /// Fail unless secure transport is available.
    pub fn ensure_ssl_available(&self) -> Result<()> {
        if self.ssl_available() {
            Ok(())
        } else {
            Err(Error::CapabilityUnavailable(SSL_UNAVAILABLE.to_string()))
        }
    }

    /// Activated packages by name.
    pub fn loaded_specs(&self) -> BTreeMap<String, Arc<PackageSpec>> {
        self.state.read().activation.loaded_specs.clone()
    }

    /// The module search path, most recently activated package first.
    pub fn load_path(&self) -> Vec<PathBuf> {
        self.state.read().activation.load_path.clone()
    }

    /// Auto-load files that have run, in load order.
    pub fn loaded_features(&self) -> Vec<PathBuf> {
        self.state.read().activation.loaded_features.clone()
    }

    pub fn user_home(&self) -> Option<PathBuf> {
        self.runtime.home_dir()
    }

    /// Package sources collaborators fetch from.
    pub fn sources(&self) -> Vec<String> {
        self.effective_config().sources()
    }
}
