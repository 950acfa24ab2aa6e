/*!
The repository contract.

A repository stores artifacts under logical, `/`-delimited paths relative to
its root. [`Repository`] is the port every storage backend implements; the
disk backend is the only one compiled into this crate. Backends are picked
by the scheme of the repository URL, see [`for_url`].
*/

pub mod disk;

use std::fmt;
use std::path::Path;

use crate::config::RepositoryConfig;
use crate::walk::ListStream;
use crate::Result;

pub use disk::{plan_upload, DiskRepository, FileTransfer};

/// Storage abstraction for artifacts, directories and archives.
///
/// All `path` arguments are logical paths relative to the repository root.
/// Errors are always one of the three repository kinds: `NotFound`, `Read`
/// or `Write`.
pub trait Repository: fmt::Debug + Send + Sync {
    /// URL identifying the repository root, e.g. `file:///srv/depot`
    fn root_url(&self) -> String;

    /// Read the file at `path`
    ///
    /// # Errors
    /// * `NotFound` - nothing exists at `path`
    /// * `Read` - the file exists but could not be read
    fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Write `data` to `path`, creating parent directories and replacing any
    /// existing content. The write is not atomic.
    fn put(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Recursively copy `repo_dir` from the repository into `local_dir`
    fn get_directory(&self, repo_dir: &str, local_dir: &Path) -> Result<()>;

    /// Recursively copy `local_dir` into the repository at `repo_dir`, one
    /// file at a time. Files written before a failure are left in place.
    fn put_directory(&self, local_dir: &Path, repo_dir: &str) -> Result<()>;

    /// Extract the archive at `archive_path` into `local_path`
    fn get_archive(&self, archive_path: &str, local_path: &Path) -> Result<()>;

    /// Extract the single entry `entry_path` of the archive at `archive_path`
    /// into `local_path`
    fn get_archive_entry(&self, archive_path: &str, entry_path: &str, local_path: &Path)
        -> Result<()>;

    /// Pack `local_dir` (or only `local_dir/include_path`) into a `.tar.gz`
    /// archive at `archive_path`
    fn put_archive(&self, local_dir: &Path, archive_path: &str, include_path: Option<&str>)
        -> Result<()>;

    /// Delete the file or directory tree at `path`. Succeeds if nothing is
    /// there.
    fn delete(&self, path: &str) -> Result<()>;

    /// Files directly under `path`, prefixed with `path` so they can be passed
    /// back to [`Repository::get`]. Directories are skipped and a missing
    /// `path` lists as empty.
    fn list(&self, path: &str) -> Result<Vec<String>>;

    /// File names inside the archive at `archive_path`, relative to the
    /// archive's top-level folder
    fn list_archive_entries(&self, archive_path: &str) -> Result<Vec<String>>;

    /// Every file under `folder` with its checksum. A missing folder yields
    /// an empty stream.
    fn list_recursive(&self, folder: &str) -> ListStream;

    /// Every file under `folder` named `filename`, without checksums
    fn match_filenames_recursive(&self, folder: &str, filename: &str) -> ListStream;

    /// Whether anything exists at `path`
    fn exists(&self, path: &str) -> Result<bool>;
}

/// Open the repository identified by `url`.
///
/// `file:///some/dir` and plain paths open a [`DiskRepository`].
///
/// # Example
/// ```rust
/// let dir = tempfile::tempdir().unwrap();
/// let url = format!("file://{}", dir.path().display());
///
/// let repository = depot_core::for_url(&url)?;
/// repository.put("runs/1/params.json", br#"{"lr": 0.1}"#)?;
/// assert_eq!(repository.list("runs/1")?, vec!["runs/1/params.json"]);
/// # Ok::<(), depot_core::RepositoryError>(())
/// ```
pub fn for_url(url: &str) -> Result<Box<dyn Repository>> {
    RepositoryConfig::from_url(url)?.open()
}
