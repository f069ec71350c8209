use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::Version;

/// Subdirectory of a root holding unpacked package trees.
pub const GEMS_DIR: &str = "gems";

/// Subdirectory of a root holding one specification file per package.
pub const SPECIFICATIONS_DIR: &str = "specifications";

/// Extension of specification files.
pub const SPEC_EXTENSION: &str = "json";

const DEFAULT_REQUIRE_PATH: &str = "lib";

/// On-disk specification schema.
#[derive(Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    name: String,
    version: String,
    #[serde(default = "default_require_paths")]
    require_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    autorequire: Option<AutoRequire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

/// `autorequire` accepts a single file or a list of files.
#[derive(Serialize, Deserialize, Debug)]
#[serde(untagged)]
enum AutoRequire {
    One(String),
    Many(Vec<String>),
}

fn default_require_paths() -> Vec<String> {
    vec![DEFAULT_REQUIRE_PATH.to_string()]
}

/// Immutable description of one installed package.
///
/// `base_dir` is the root (or default-scope directory) the specification was
/// discovered under; the package tree lives at `<base_dir>/gems/<full_name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    name: String,
    version: Version,
    require_paths: Vec<PathBuf>,
    autoload: Vec<PathBuf>,
    summary: Option<String>,
    base_dir: PathBuf,
}

impl PackageSpec {
    /// A specification with the default `lib` require path and no auto-load files.
    pub fn new(name: impl Into<String>, version: Version, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version,
            require_paths: vec![PathBuf::from(DEFAULT_REQUIRE_PATH)],
            autoload: Vec::new(),
            summary: None,
            base_dir: base_dir.into(),
        }
    }

    pub fn with_require_paths<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.require_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_autoload<P: Into<PathBuf>>(mut self, files: impl IntoIterator<Item = P>) -> Self {
        self.autoload = files.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a specification document.
    pub fn from_json(text: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawSpec = serde_json::from_str(text)
            .map_err(|e| Error::Parse(format!("invalid specification: {}", e)))?;

        validate_name(&raw.name)?;
        let version = Version::parse(&raw.version)?;

        let require_paths = raw
            .require_paths
            .iter()
            .map(|p| package_relative(&raw.name, "require path", p))
            .collect::<Result<Vec<_>>>()?;

        let autoload = match raw.autorequire {
            None => Vec::new(),
            Some(AutoRequire::One(file)) => vec![file],
            Some(AutoRequire::Many(files)) => files,
        }
        .iter()
        .map(|f| package_relative(&raw.name, "autorequire entry", f))
        .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: raw.name,
            version,
            require_paths,
            autoload,
            summary: raw.summary,
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Load a specification file. The file stem must equal the full name.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path, base_dir: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        let spec = Self::from_json(&content, base_dir)?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != spec.full_name() {
            return Err(Error::Parse(format!(
                "specification {} describes {}",
                path.display(),
                spec.full_name()
            )));
        }
        Ok(spec)
    }

    /// Serialize back to the on-disk schema.
    pub fn to_json(&self) -> String {
        let raw = RawSpec {
            name: self.name.clone(),
            version: self.version.to_string(),
            require_paths: self
                .require_paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            autorequire: (!self.autoload.is_empty()).then(|| {
                AutoRequire::Many(
                    self.autoload
                        .iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect(),
                )
            }),
            summary: self.summary.clone(),
        };
        // A struct of strings always serializes
        serde_json::to_string_pretty(&raw).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn require_paths(&self) -> &[PathBuf] {
        &self.require_paths
    }

    pub fn autoload(&self) -> &[PathBuf] {
        &self.autoload
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<name>-<version>`
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// `<base_dir>/gems/<full_name>`
    pub fn full_path(&self) -> PathBuf {
        self.base_dir.join(GEMS_DIR).join(self.full_name())
    }

    /// Absolute library directories, in declared order.
    pub fn lib_dirs(&self) -> Vec<PathBuf> {
        let full_path = self.full_path();
        self.require_paths.iter().map(|p| full_path.join(p)).collect()
    }

    /// `<full_path>/data/<name>`
    pub fn data_dir(&self) -> PathBuf {
        self.full_path().join("data").join(&self.name)
    }

    /// `<base_dir>/specifications/<full_name>.json`
    pub fn spec_file(&self) -> PathBuf {
        self.base_dir
            .join(SPECIFICATIONS_DIR)
            .join(format!("{}.{}", self.full_name(), SPEC_EXTENSION))
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name != name.trim()
        || name.contains(['/', '\\'])
        || name == "."
        || name == "..";
    if invalid {
        return Err(Error::Parse(format!("invalid package name: '{}'", name)));
    }
    Ok(())
}

fn package_relative(name: &str, what: &str, entry: &str) -> Result<PathBuf> {
    let path = PathBuf::from(entry);
    let escapes = entry.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(Error::Parse(format!(
            "{} '{}' of package '{}' must be a relative path inside the package",
            what, entry, name
        )));
    }
    Ok(path)
}
