//! Lexical path helpers used when comparing repository roots and resolving
//! package-relative files.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep a leading `..` on relative paths; drop it at the root
                match result.components().next_back() {
                    Some(Component::Normal(_)) => {
                        result.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => result.push(component),
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if `path` is `dir` or lies under it, comparing normalized components.
///
/// `/gems/a-1/lib/../../b-1/lib/x` is NOT under `/gems/a-1/lib`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(dir))
}

/// Join a package-relative path onto `base`, refusing anything that would
/// land outside of `base` (absolute paths or `..` escapes).
pub fn join_within(base: &Path, relative: &Path) -> Option<PathBuf> {
    if relative.is_absolute() || relative.has_root() {
        return None;
    }
    let joined = normalize_path(&base.join(relative));
    is_path_under(&joined, base).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_simple() {
        assert_eq!(
            normalize_path(Path::new("/srv/gems/a-1/lib")),
            PathBuf::from("/srv/gems/a-1/lib")
        );
    }

    #[test]
    fn test_normalize_path_dots_and_parents() {
        assert_eq!(
            normalize_path(Path::new("/srv/./gems/../gems/a-1/./lib")),
            PathBuf::from("/srv/gems/a-1/lib")
        );
    }

    #[test]
    fn test_normalize_path_trailing_separator() {
        // Roots given as "/srv/home/" and "/srv/home" must compare equal
        assert_eq!(
            normalize_path(Path::new("/srv/home/")),
            normalize_path(Path::new("/srv/home"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_path_parent_at_root() {
        assert_eq!(
            normalize_path(Path::new("/srv/../../../etc")),
            PathBuf::from("/etc")
        );
    }

    #[test]
    fn test_normalize_path_relative_keeps_leading_parent() {
        assert_eq!(
            normalize_path(Path::new("../lib/../code.rb")),
            PathBuf::from("../code.rb")
        );
    }

    #[test]
    fn test_is_path_under() {
        let lib = Path::new("/srv/gems/a-1/lib");
        assert!(is_path_under(Path::new("/srv/gems/a-1/lib/code.rb"), lib));
        assert!(is_path_under(lib, lib));
        assert!(!is_path_under(
            Path::new("/srv/gems/a-1/lib/../../b-1/lib/code.rb"),
            lib
        ));
        // Component comparison, not string prefix
        assert!(!is_path_under(Path::new("/srv/gems/a-1/library"), lib));
    }

    #[test]
    fn test_join_within() {
        let lib = Path::new("/srv/gems/a-1/lib");
        assert_eq!(
            join_within(lib, Path::new("a/code.rb")),
            Some(PathBuf::from("/srv/gems/a-1/lib/a/code.rb"))
        );
        assert_eq!(
            join_within(lib, Path::new("a/../code.rb")),
            Some(PathBuf::from("/srv/gems/a-1/lib/code.rb"))
        );
        assert_eq!(join_within(lib, Path::new("../../b-1/lib/code.rb")), None);
        #[cfg(unix)]
        assert_eq!(join_within(lib, Path::new("/etc/passwd")), None);
    }
}
