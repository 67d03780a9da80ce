//! Path containment checks for generated file writes.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

/// A path resolved outside the project root.
///
/// Carried through `anyhow` so callers can branch on it with
/// `err.downcast_ref::<PathEscapeError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEscapeError {
    pub path: PathBuf,
}

impl fmt::Display for PathEscapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path '{}' resolves outside the project root",
            self.path.display()
        )
    }
}

impl std::error::Error for PathEscapeError {}

/// Validates that target paths stay inside the project root.
///
/// The root is canonicalized once at construction. Target paths are
/// normalized lexically (they may not exist yet), so `..` segments are
/// resolved without touching the filesystem.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    pub fn new(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("canonicalize project root {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` to an absolute path inside the project root.
    ///
    /// Relative paths are joined onto the root. Fails with
    /// [`PathEscapeError`] when the normalized result lies outside the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let normalized = normalize(&joined).ok_or_else(|| PathEscapeError {
            path: path.to_path_buf(),
        })?;
        if !normalized.starts_with(&self.root) {
            return Err(PathEscapeError {
                path: path.to_path_buf(),
            }
            .into());
        }
        Ok(normalized)
    }
}

/// Resolve `.` and `..` components lexically. Returns `None` when `..`
/// underflows past the filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> (tempfile::TempDir, PathGuard) {
        let temp = tempfile::tempdir().expect("tempdir");
        let guard = PathGuard::new(temp.path()).expect("guard");
        (temp, guard)
    }

    #[test]
    fn resolves_relative_paths_inside_root() {
        let (_temp, guard) = guard();
        let resolved = guard.resolve("src/app.py").expect("resolve");
        assert!(resolved.starts_with(guard.root()));
        assert!(resolved.ends_with("src/app.py"));
    }

    #[test]
    fn resolves_dotted_paths_that_stay_inside() {
        let (_temp, guard) = guard();
        let resolved = guard.resolve("src/../src/./app.py").expect("resolve");
        assert!(resolved.ends_with("src/app.py"));
    }

    #[test]
    fn rejects_parent_traversal() {
        let (_temp, guard) = guard();
        let err = guard.resolve("../outside.py").unwrap_err();
        assert!(err.downcast_ref::<PathEscapeError>().is_some());
    }

    #[test]
    fn rejects_absolute_paths_outside_root() {
        let (_temp, guard) = guard();
        let err = guard.resolve("/etc/passwd").unwrap_err();
        assert!(err.downcast_ref::<PathEscapeError>().is_some());
    }

    #[test]
    fn rejects_traversal_hidden_behind_segments() {
        let (_temp, guard) = guard();
        let err = guard.resolve("src/../../other/file.py").unwrap_err();
        let escape = err.downcast_ref::<PathEscapeError>().expect("escape error");
        assert_eq!(escape.path, PathBuf::from("src/../../other/file.py"));
    }

    #[test]
    fn accepts_absolute_paths_inside_root() {
        let (_temp, guard) = guard();
        let inside = guard.root().join("pkg/mod.py");
        let resolved = guard.resolve(&inside).expect("resolve");
        assert_eq!(resolved, inside);
    }
}
