//! Path validation for artifact writes.
//!
//! Purely lexical: no filesystem access, no symlink resolution. Callers
//! that need the target to exist check separately.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{EngineError, Result};

static COMPONENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap());

/// Validate and normalize a relative artifact path.
///
/// Accepts forward-slash separated relative paths whose components contain
/// only `[A-Za-z0-9_.-]` (extensions allowed). Rejects empty paths,
/// absolute paths, backslashes, and `.`/`..` segments.
pub fn validate_artifact_path(raw: &str) -> Result<String> {
    let invalid = |reason: &str| EngineError::PathInvalid {
        path: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    if raw.contains('\\') {
        return Err(invalid("backslashes are not allowed"));
    }
    if raw.starts_with('/') {
        return Err(invalid("absolute paths are not allowed"));
    }

    let mut components = Vec::new();
    for component in raw.split('/') {
        if component.is_empty() {
            return Err(invalid("empty path component"));
        }
        if component == "." || component == ".." {
            return Err(invalid("'.' and '..' segments are not allowed"));
        }
        if !COMPONENT_RE.is_match(component) {
            return Err(invalid(
                "components may only contain alphanumerics, '_', '-', and '.'",
            ));
        }
        components.push(component);
    }

    Ok(components.join("/"))
}

/// Check that `candidate` resolves strictly under `root` and return the
/// normalized path. Resolution is lexical: `..` segments are folded
/// without touching the filesystem.
pub fn validate_within_root(candidate: &Path, root: &Path) -> Result<PathBuf> {
    let root_normal = normalize_lexically(root);
    let candidate_normal = normalize_lexically(candidate);

    if candidate_normal.starts_with(&root_normal) && candidate_normal != root_normal {
        Ok(candidate_normal)
    } else {
        Err(EngineError::PathEscape {
            path: candidate.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

/// Fold `.` and `..` components without resolving symlinks. A `..` at the
/// top of a relative path is kept (it cannot be folded away).
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_simple_filename() {
        assert_eq!(validate_artifact_path("Tier.java").unwrap(), "Tier.java");
    }

    #[test]
    fn test_accepts_nested_relative_path() {
        assert_eq!(
            validate_artifact_path("domain/entity/Tier.java").unwrap(),
            "domain/entity/Tier.java"
        );
    }

    #[test]
    fn test_accepts_multi_dot_extension() {
        assert_eq!(
            validate_artifact_path("Tier.spec.java").unwrap(),
            "Tier.spec.java"
        );
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            validate_artifact_path(""),
            Err(EngineError::PathInvalid { .. })
        ));
        assert!(validate_artifact_path("   ").is_err());
    }

    #[test]
    fn test_rejects_absolute() {
        assert!(validate_artifact_path("/etc/passwd").is_err());
    }

    #[test]
    fn test_rejects_parent_segments() {
        assert!(validate_artifact_path("../Tier.java").is_err());
        assert!(validate_artifact_path("a/../Tier.java").is_err());
        assert!(validate_artifact_path("./Tier.java").is_err());
    }

    #[test]
    fn test_rejects_backslash_and_odd_chars() {
        assert!(validate_artifact_path("a\\b.java").is_err());
        assert!(validate_artifact_path("a b.java").is_err());
        assert!(validate_artifact_path("ti$r.java").is_err());
    }

    #[test]
    fn test_rejects_double_slash() {
        assert!(validate_artifact_path("a//b.java").is_err());
    }

    #[test]
    fn test_within_root_accepts_child() {
        let root = Path::new("/sessions/s1/iteration-1/code");
        let child = root.join("domain/Tier.java");
        assert_eq!(validate_within_root(&child, root).unwrap(), child);
    }

    #[test]
    fn test_within_root_rejects_escape() {
        let root = Path::new("/sessions/s1/iteration-1/code");
        let escape = root.join("../../secrets.txt");
        assert!(matches!(
            validate_within_root(&escape, root),
            Err(EngineError::PathEscape { .. })
        ));
    }

    #[test]
    fn test_within_root_rejects_root_itself() {
        let root = Path::new("/sessions/s1/iteration-1/code");
        assert!(validate_within_root(root, root).is_err());
    }

    #[test]
    fn test_within_root_folds_internal_dotdot() {
        let root = Path::new("/sessions/s1/code");
        let candidate = root.join("a/../b.java");
        assert_eq!(
            validate_within_root(&candidate, root).unwrap(),
            root.join("b.java")
        );
    }
}
