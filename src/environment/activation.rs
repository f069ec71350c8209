//! Package activation: pick a version, put its library directories on the
//! module search path and run its auto-load files.

use anyhow::Result as AnyResult;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::package::{PackageSpec, Requirement};
use crate::runtime::Runtime;
use crate::searcher::locate;

use super::Environment;

/// Executes the auto-load files of activated packages.
#[cfg_attr(test, mockall::automock)]
pub trait FeatureLoader: Send + Sync {
    /// Load one file; `source` is its content.
    fn load(&self, path: &Path, source: &str) -> AnyResult<()>;
}

/// Loader that accepts every file and only logs it. Used when the host has
/// nothing to execute, e.g. the command-line tool.
pub struct LogLoader;

impl FeatureLoader for LogLoader {
    fn load(&self, path: &Path, source: &str) -> AnyResult<()> {
        debug!("Loaded {} ({} bytes)", path.display(), source.len());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(super) struct Activation {
    pub(super) loaded_specs: BTreeMap<String, Arc<PackageSpec>>,
    pub(super) load_path: Vec<PathBuf>,
    pub(super) loaded_features: Vec<PathBuf>,
}

impl Activation {
    /// Put `dirs` in front of the load path, keeping their order.
    fn prepend_load_path(&mut self, dirs: Vec<PathBuf>) {
        let fresh: Vec<PathBuf> = dirs
            .into_iter()
            .filter(|dir| !self.load_path.contains(dir))
            .collect();
        self.load_path.splice(0..0, fresh);
    }
}

impl<R: Runtime, L: FeatureLoader> Environment<R, L> {
    /// Activate the best installed match for `name`.
    ///
    /// Activating the already-active version again is a no-op. Any other
    /// version of an active package is a [`Error::VersionConflict`].
    ///
    /// The write lock is released before auto-load files run, so a loader may
    /// call back into the environment. A failing auto-load file is reported
    /// once and the package stays activated: activating it again returns `Ok`
    /// without retrying the auto-load files that did not run.
    #[tracing::instrument(skip(self))]
    pub fn activate(&self, name: &str, requirement: &Requirement) -> Result<Arc<PackageSpec>> {
        let spec = {
            let mut state = self.state.write();
            let spec = self.build_registry(&mut state)?.find_best(name, requirement)?;

            if let Some(active) = state.activation.loaded_specs.get(name) {
                if active.version() == spec.version() {
                    debug!("{} is already active", active.full_name());
                    return Ok(Arc::clone(active));
                }
                return Err(Error::VersionConflict {
                    name: name.to_string(),
                    active: active.version().clone(),
                    requested: spec.version().clone(),
                });
            }

            state.activation.prepend_load_path(spec.lib_dirs());
            state
                .activation
                .loaded_specs
                .insert(name.to_string(), Arc::clone(&spec));
            spec
        };
        info!("Activated {}", spec.full_name());

        for file in spec.autoload() {
            self.autoload(&spec, file)?;
        }

        Ok(spec)
    }

    fn autoload(&self, spec: &PackageSpec, file: &Path) -> Result<()> {
        let path = locate(&self.runtime, spec, file).ok_or_else(|| Error::FileNotFound {
            name: spec.name().to_string(),
            file: file.to_path_buf(),
        })?;

        if self.state.read().activation.loaded_features.contains(&path) {
            return Ok(());
        }

        let load_failed = |source| Error::LoadFailed {
            name: spec.name().to_string(),
            file: path.clone(),
            source,
        };
        let source = self.runtime.read_to_string(&path).map_err(load_failed)?;
        self.loader.load(&path, &source).map_err(load_failed)?;

        debug!("Auto-loaded {}", path.display());
        self.state.write().activation.loaded_features.push(path);
        Ok(())
    }
}
