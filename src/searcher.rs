//! Load-path queries over a registry snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::package::{PackageSpec, Registry, Requirement};
use crate::runtime::Runtime;
use crate::runtime::path::join_within;

/// Answers "where is the code of package X" against one registry
/// generation. Holds no state of its own.
#[derive(Debug, Clone)]
pub struct Searcher {
    registry: Arc<Registry>,
}

impl Searcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Library directories of every installed version of every package.
    pub fn all_load_paths(&self) -> Vec<PathBuf> {
        self.registry
            .all_specs()
            .flat_map(|spec| spec.lib_dirs())
            .collect()
    }

    /// Library directories of the newest version of each package only.
    pub fn latest_load_paths(&self) -> Vec<PathBuf> {
        self.registry
            .latest_specs()
            .iter()
            .flat_map(|spec| spec.lib_dirs())
            .collect()
    }

    /// Absolute path of `file` inside the best match for `name`.
    ///
    /// Library directories are tried in declared order; the first one that
    /// contains the file wins.
    #[tracing::instrument(skip(self, runtime))]
    pub fn required_location<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        name: &str,
        file: &Path,
        requirement: &Requirement,
    ) -> Result<PathBuf> {
        let spec = self.registry.find_best(name, requirement)?;
        locate(runtime, &spec, file).ok_or_else(|| Error::FileNotFound {
            name: name.to_string(),
            file: file.to_path_buf(),
        })
    }

    /// The first package, in name order, whose newest version contains `file`.
    #[tracing::instrument(skip(self, runtime))]
    pub fn find<R: Runtime + ?Sized>(&self, runtime: &R, file: &Path) -> Option<Arc<PackageSpec>> {
        self.registry
            .latest_specs()
            .into_iter()
            .find(|spec| locate(runtime, spec, file).is_some())
    }
}

/// First library directory of `spec` containing `file`.
pub(crate) fn locate<R: Runtime + ?Sized>(
    runtime: &R,
    spec: &PackageSpec,
    file: &Path,
) -> Option<PathBuf> {
    spec.lib_dirs()
        .iter()
        .filter_map(|lib| join_within(lib, file))
        .find(|candidate| runtime.exists(candidate))
}
