/*!
Logical path handling.

Logical paths are `/`-delimited strings relative to a repository root. They
are translated to platform paths only at the filesystem boundary, and paths
read back from the filesystem are always reported with `/` separators.
*/

use std::path::{Component, Path, PathBuf};

/// Resolve a logical path under `root`.
///
/// Empty and `.` components are skipped and a leading `/` is ignored. `..`
/// removes the previous component but can never climb above `root`.
pub fn resolve(root: &Path, logical: &str) -> PathBuf {
    let mut parts: Vec<&str> = Vec::new();
    for part in logical.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    resolved
}

/// Join two logical paths with a single `/`.
pub fn join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{name}"),
    }
}

/// Render a relative platform path as a logical path.
pub fn to_logical(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Last component of a logical path.
pub fn base_name(logical: &str) -> &str {
    let trimmed = logical.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_and_nested() {
        let root = Path::new("/srv/depot");
        assert_eq!(resolve(root, "a.txt"), PathBuf::from("/srv/depot/a.txt"));
        assert_eq!(
            resolve(root, "runs/1/metrics.json"),
            PathBuf::from("/srv/depot/runs/1/metrics.json")
        );
        assert_eq!(resolve(root, ""), PathBuf::from("/srv/depot"));
    }

    #[test]
    fn test_resolve_cleans_components() {
        let root = Path::new("/srv/depot");
        assert_eq!(resolve(root, "/a//./b/"), PathBuf::from("/srv/depot/a/b"));
        assert_eq!(resolve(root, "a/../b"), PathBuf::from("/srv/depot/b"));
    }

    #[test]
    fn test_resolve_never_escapes_root() {
        let root = Path::new("/srv/depot");
        assert_eq!(resolve(root, "../../etc/passwd"), PathBuf::from("/srv/depot/etc/passwd"));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("runs", "a.txt"), "runs/a.txt");
        assert_eq!(join("runs/", "a.txt"), "runs/a.txt");
        assert_eq!(join("", "a.txt"), "a.txt");
        assert_eq!(join("runs", ""), "runs");
    }

    #[test]
    fn test_to_logical_uses_forward_slashes() {
        let relative: PathBuf = ["runs", "1", "out.bin"].iter().collect();
        assert_eq!(to_logical(&relative), "runs/1/out.bin");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/c.tar.gz"), "c.tar.gz");
        assert_eq!(base_name("c.txt"), "c.txt");
        assert_eq!(base_name("a/b/"), "b");
    }
}
