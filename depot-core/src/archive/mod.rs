/*!
Gzipped tar archives of directory trees.

Every archive holds a single top-level folder named after the archive file:
`runs/42/output.tar.gz` contains `output/...`. The folder is written when
packing and stripped again on every read, so callers only ever deal with
paths relative to the directory that was packed.
*/

pub mod extract;
pub mod pack;

use crate::paths;

pub use extract::{list_entries, unpack_archive, unpack_entry};
pub use pack::pack_directory;

/// File suffix every archive path must carry.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Top-level folder name stored inside the archive at `archive_path`.
///
/// This is the base file name with exactly one trailing `.tar.gz` removed.
/// Returns `None` when the suffix is missing or nothing is left once it is
/// removed.
///
/// ```rust
/// use depot_core::archive::archive_folder_name;
///
/// assert_eq!(archive_folder_name("runs/42/output.tar.gz"), Some("output"));
/// assert_eq!(archive_folder_name("output.zip"), None);
/// ```
pub fn archive_folder_name(archive_path: &str) -> Option<&str> {
    let stem = paths::base_name(archive_path).strip_suffix(ARCHIVE_SUFFIX)?;
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_name_from_nested_path() {
        assert_eq!(archive_folder_name("a/b/checkpoint.tar.gz"), Some("checkpoint"));
        assert_eq!(archive_folder_name("checkpoint.tar.gz"), Some("checkpoint"));
    }

    #[test]
    fn test_folder_name_strips_only_one_suffix() {
        assert_eq!(archive_folder_name("x.tar.gz.tar.gz"), Some("x.tar.gz"));
        assert_eq!(archive_folder_name("model.v2.tar.gz"), Some("model.v2"));
    }

    #[test]
    fn test_folder_name_ignores_directories_named_like_archives() {
        assert_eq!(archive_folder_name("old.tar.gz/new.tar.gz"), Some("new"));
    }

    #[test]
    fn test_folder_name_rejects_other_suffixes() {
        assert_eq!(archive_folder_name("bad.zip"), None);
        assert_eq!(archive_folder_name("bad.tgz"), None);
        assert_eq!(archive_folder_name("bad.tar"), None);
    }

    #[test]
    fn test_folder_name_rejects_empty_stem() {
        assert_eq!(archive_folder_name(".tar.gz"), None);
        assert_eq!(archive_folder_name("dir/.tar.gz"), None);
    }
}
