use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::spec::{SPEC_EXTENSION, SPECIFICATIONS_DIR};

/// Subdirectory of a root holding bundled ("default scope") packages. It has
/// its own `gems` and `specifications` directories.
pub const DEFAULT_SCOPE_DIR: &str = "default";

/// A specification file together with the directory its package tree is
/// relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFile {
    pub path: PathBuf,
    pub base_dir: PathBuf,
}

/// Find all specification files under a root.
///
/// Directory structure:
/// - `<root>/specifications/<name>-<version>.json`
/// - `<root>/default/specifications/<name>-<version>.json`
#[tracing::instrument(skip(runtime))]
pub fn find_spec_files<R: Runtime + ?Sized>(runtime: &R, root: &Path) -> Result<Vec<SpecFile>> {
    let mut spec_files = Vec::new();

    for base_dir in [root.to_path_buf(), root.join(DEFAULT_SCOPE_DIR)] {
        let spec_dir = base_dir.join(SPECIFICATIONS_DIR);
        if !runtime.is_dir(&spec_dir) {
            continue;
        }

        for path in runtime.read_dir(&spec_dir)? {
            let is_spec = path.extension().and_then(|e| e.to_str()) == Some(SPEC_EXTENSION);
            if is_spec && !runtime.is_dir(&path) {
                spec_files.push(SpecFile {
                    path,
                    base_dir: base_dir.clone(),
                });
            }
        }
    }

    Ok(spec_files)
}
