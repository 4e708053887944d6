/*!
 * Relative POSIX path handling for content and metadata trees
 *
 * Every path the library hands out is relative, `/`-separated and
 * case-preserving. The empty string names the tree root.
 */

use crate::error::{PreservError, Result};
use std::path::{Component, Path};

/// Normalize a caller-supplied relative path.
///
/// Backslashes are not treated as separators. Leading/trailing slashes and
/// `.` components are dropped; `..`, absolute paths and NUL bytes are rejected.
pub fn normalize_rel(path: &str) -> Result<String> {
    if path.contains('\0') {
        return Err(PreservError::InvalidPath(path.to_string()));
    }
    if path.starts_with('/') {
        return Err(PreservError::InvalidPath(path.to_string()));
    }

    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(PreservError::InvalidPath(path.to_string())),
            p => parts.push(p),
        }
    }
    Ok(parts.join("/"))
}

/// Render a relative filesystem path with `/` separators
pub fn to_posix(rel: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| PreservError::InvalidPath(rel.display().to_string()))?,
            ),
            Component::CurDir => continue,
            _ => return Err(PreservError::InvalidPath(rel.display().to_string())),
        }
    }
    Ok(parts.join("/"))
}

/// Parent of a normalized path (`""` for top-level entries)
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(p, _)| p)
}

/// Last component of a normalized path
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, n)| n)
}

pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Ancestors of a normalized path, nearest first, ending with `""`
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = path;
    while !current.is_empty() {
        current = parent(current);
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_rel() {
        assert_eq!(normalize_rel("a/b/c.txt").unwrap(), "a/b/c.txt");
        assert_eq!(normalize_rel("./a//b/").unwrap(), "a/b");
        assert_eq!(normalize_rel("").unwrap(), "");
        assert_eq!(normalize_rel("Trial/README.md").unwrap(), "Trial/README.md");
    }

    #[test]
    fn test_normalize_rejects_escapes() {
        assert!(normalize_rel("../etc/passwd").is_err());
        assert!(normalize_rel("a/../../b").is_err());
        assert!(normalize_rel("/abs").is_err());
        assert!(normalize_rel("a\0b").is_err());
    }

    #[test]
    fn test_to_posix() {
        let rel: PathBuf = ["trial", "sub", "x.json"].iter().collect();
        assert_eq!(to_posix(&rel).unwrap(), "trial/sub/x.json");
        assert!(to_posix(Path::new("../x")).is_err());
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent("a/b/c"), "a/b");
        assert_eq!(parent("a"), "");
        assert_eq!(file_name("a/b/c"), "c");
        assert_eq!(file_name("a"), "a");
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b"), "a/b");
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("a/b/c"), vec!["a/b", "a", ""]);
        assert_eq!(ancestors("a"), vec![""]);
        assert!(ancestors("").is_empty());
    }
}
