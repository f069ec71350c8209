//! In-memory catalogue of installed packages.
//!
//! The registry is built by scanning the specification files of every
//! repository root. A broken specification only hides that one package: it
//! is logged and skipped so everything else stays resolvable.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::{PackageSpec, Requirement, find_spec_files};

/// Package name -> installed versions, kept in ascending version order.
#[derive(Debug, Default)]
pub struct Registry {
    specs: BTreeMap<String, Vec<Arc<PackageSpec>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every specification under `roots`.
    ///
    /// Roots are scanned in order; when the same name and version is found in
    /// more than one root, the first one wins.
    #[tracing::instrument(skip(runtime))]
    pub fn scan<R: Runtime + ?Sized>(runtime: &R, roots: &[PathBuf]) -> Self {
        let mut registry = Self::new();

        for root in roots {
            let spec_files = match find_spec_files(runtime, root) {
                Ok(files) => files,
                Err(e) => {
                    warn!("Skipping unreadable root {}: {:#}", root.display(), e);
                    continue;
                }
            };

            for file in spec_files {
                match PackageSpec::load(runtime, &file.path, &file.base_dir) {
                    Ok(spec) => {
                        registry.add(spec);
                    }
                    Err(e) => {
                        warn!("Skipping specification {}: {}", file.path.display(), e);
                    }
                }
            }
        }

        debug!(
            "Indexed {} package versions across {} roots",
            registry.len(),
            roots.len()
        );
        registry
    }

    /// Insert a specification. Returns `false` if that name and version is
    /// already present.
    pub fn add(&mut self, spec: PackageSpec) -> bool {
        let versions = self.specs.entry(spec.name().to_string()).or_default();
        match versions.binary_search_by(|existing| existing.version().cmp(spec.version())) {
            Ok(_) => {
                debug!("Ignoring duplicate {} from {}", spec.full_name(), spec.base_dir().display());
                false
            }
            Err(pos) => {
                versions.insert(pos, Arc::new(spec));
                true
            }
        }
    }

    /// All installed versions of `name`, lowest first. Unknown names yield an
    /// empty slice.
    pub fn find(&self, name: &str) -> &[Arc<PackageSpec>] {
        self.specs.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// The highest installed version of `name` satisfying `requirement`.
    pub fn find_best(&self, name: &str, requirement: &Requirement) -> Result<Arc<PackageSpec>> {
        let versions = self.find(name);
        if versions.is_empty() {
            return Err(Error::UnknownPackage(name.to_string()));
        }

        requirement
            .best_match(versions, |spec| spec.version())
            .cloned()
            .ok_or_else(|| Error::NoMatchingVersion {
                name: name.to_string(),
                requirement: requirement.clone(),
            })
    }

    /// The highest version of every installed package, ordered by name.
    pub fn latest_specs(&self) -> Vec<Arc<PackageSpec>> {
        self.specs
            .values()
            .filter_map(|versions| versions.last().cloned())
            .collect()
    }

    /// Every installed specification, ordered by name then version.
    pub fn all_specs(&self) -> impl Iterator<Item = &Arc<PackageSpec>> {
        self.specs.values().flatten()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    /// Number of installed package versions.
    pub fn len(&self) -> usize {
        self.specs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Version;
    use crate::runtime::MockRuntime;
    use crate::test_utils::test_root;
    use mockall::predicate::eq;

    fn spec(name: &str, version: &str) -> PackageSpec {
        PackageSpec::new(name, Version::parse(version).unwrap(), test_root())
    }

    fn registry(specs: &[(&str, &str)]) -> Registry {
        let mut registry = Registry::new();
        for (name, version) in specs {
            registry.add(spec(name, version));
        }
        registry
    }

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn test_find_unknown_is_empty() {
        let registry = registry(&[("a", "0.0.1")]);
        assert!(registry.find("xyzzy").is_empty());
    }

    #[test]
    fn test_find_sorted_ascending() {
        let registry = registry(&[("a", "0.0.10"), ("a", "0.0.2"), ("a", "0.0.1")]);
        let versions: Vec<String> = registry
            .find("a")
            .iter()
            .map(|s| s.version().to_string())
            .collect();
        assert_eq!(versions, vec!["0.0.1", "0.0.2", "0.0.10"]);
    }

    #[test]
    fn test_add_rejects_duplicate_identity() {
        let mut registry = registry(&[("a", "1.0")]);
        assert!(!registry.add(spec("a", "1.0.0")));
        assert!(registry.add(spec("a", "1.1")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_find_best_without_requirement_is_highest() {
        let registry = registry(&[("a", "0.0.1"), ("a", "0.0.2"), ("b", "0.0.2")]);
        let best = registry.find_best("a", &Requirement::any()).unwrap();
        assert_eq!(best.full_name(), "a-0.0.2");
    }

    #[test]
    fn test_find_best_with_requirement() {
        let registry = registry(&[("a", "0.0.1"), ("a", "0.0.2")]);

        let best = registry.find_best("a", &req("<0.0.2")).unwrap();
        assert_eq!(best.full_name(), "a-0.0.1");

        let best = registry.find_best("a", &req("=0.0.2")).unwrap();
        assert_eq!(best.full_name(), "a-0.0.2");
    }

    #[test]
    fn test_find_best_errors() {
        let registry = registry(&[("a", "0.0.1")]);

        assert!(matches!(
            registry.find_best("xyzzy", &Requirement::any()),
            Err(Error::UnknownPackage(name)) if name == "xyzzy"
        ));
        assert!(matches!(
            registry.find_best("a", &req("> 1")),
            Err(Error::NoMatchingVersion { name, .. }) if name == "a"
        ));
    }

    #[test]
    fn test_latest_specs() {
        let registry = registry(&[("a", "0.0.1"), ("a", "0.0.2"), ("b", "0.0.2"), ("c", "1.2")]);
        let latest: Vec<String> = registry.latest_specs().iter().map(|s| s.full_name()).collect();
        assert_eq!(latest, vec!["a-0.0.2", "b-0.0.2", "c-1.2"]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(registry.all_specs().count(), 4);
    }

    #[test]
    fn test_scan_skips_corrupt_specifications() {
        let mut runtime = MockRuntime::new();
        let root = test_root();
        let spec_dir = root.join("specifications");

        runtime
            .expect_is_dir()
            .with(eq(spec_dir.clone()))
            .returning(|_| true);
        runtime
            .expect_is_dir()
            .with(eq(root.join("default/specifications")))
            .returning(|_| false);
        runtime
            .expect_is_dir()
            .returning(|_| false);
        runtime
            .expect_read_dir()
            .with(eq(spec_dir.clone()))
            .returning(|p| Ok(vec![p.join("a-0.0.1.json"), p.join("broken-1.0.json")]));
        runtime
            .expect_read_to_string()
            .with(eq(spec_dir.join("a-0.0.1.json")))
            .returning(|_| Ok(r#"{"name": "a", "version": "0.0.1"}"#.to_string()));
        runtime
            .expect_read_to_string()
            .with(eq(spec_dir.join("broken-1.0.json")))
            .returning(|_| Ok("{ this is not json".to_string()));

        let registry = Registry::scan(&runtime, &[root]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("a").len(), 1);
        assert!(registry.find("broken").is_empty());
    }

    #[test]
    fn test_scan_first_root_wins() {
        let mut runtime = MockRuntime::new();
        let first = PathBuf::from("/first");
        let second = PathBuf::from("/second");

        runtime
            .expect_is_dir()
            .returning(|p| p.ends_with("specifications") && !p.ends_with("default/specifications"));
        runtime
            .expect_read_dir()
            .returning(|p| Ok(vec![p.join("a-1.0.json")]));
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(r#"{"name": "a", "version": "1.0"}"#.to_string()));

        let registry = Registry::scan(&runtime, &[first.clone(), second]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("a")[0].base_dir(), first);
    }

    #[test]
    fn test_scan_unreadable_root_is_skipped() {
        let mut runtime = MockRuntime::new();

        runtime.expect_is_dir().returning(|p| p.ends_with("specifications"));
        runtime
            .expect_read_dir()
            .with(eq(PathBuf::from("/locked/specifications")))
            .returning(|_| Err(anyhow::anyhow!("permission denied")));
        runtime
            .expect_read_dir()
            .returning(|_| Ok(vec![]));

        let registry = Registry::scan(
            &runtime,
            &[PathBuf::from("/locked"), PathBuf::from("/open")],
        );
        assert!(registry.is_empty());
    }
}
