/*!
Local filesystem repository.
*/

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::Repository;
use crate::archive::{self, archive_folder_name, ARCHIVE_SUFFIX};
use crate::paths;
use crate::walk::{ListStream, TreeWalk};
use crate::{RepositoryError, Result};

#[cfg(feature = "metrics")]
use crate::observability::{OperationTimer, RepositoryMetrics};

/// Repository backed by a directory on the local filesystem
///
/// Logical paths map directly onto files below the root directory. There is
/// no index: the directory tree is the whole state of the repository.
///
/// # Example
/// ```rust
/// use depot_core::{DiskRepository, Repository};
///
/// let dir = tempfile::tempdir().unwrap();
/// let repository = DiskRepository::new(dir.path())?;
///
/// repository.put("checkpoints/step-100/model.bin", &[0u8, 1, 2])?;
/// assert_eq!(repository.get("checkpoints/step-100/model.bin")?, vec![0u8, 1, 2]);
/// # Ok::<(), depot_core::RepositoryError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DiskRepository {
    root: PathBuf,
}

/// One file to copy when uploading a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    /// Local file to read
    pub source: PathBuf,
    /// Logical destination path in the repository
    pub dest: String,
}

impl DiskRepository {
    /// Create a repository rooted at `root`
    ///
    /// A relative root is resolved against the current working directory.
    /// The directory does not have to exist yet.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| {
                    RepositoryError::config(format!(
                        "Cannot resolve relative repository root {}: {e}",
                        root.display()
                    ))
                })?
                .join(root)
        };
        debug!(root = %root.display(), "Opened disk repository");
        Ok(Self { root })
    }

    /// Root directory of the repository
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the full path for a logical path
    fn resolve_path(&self, path: &str) -> PathBuf {
        paths::resolve(&self.root, path)
    }

    /// Ensure the parent directory exists, creating it if necessary
    fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RepositoryError::on_write(format!("Failed to create directory {}", parent.display()), e)
            })?;
        }
        Ok(())
    }

    /// Fail with `NotFound` unless a file exists at `full_path`
    fn require_existing(&self, full_path: &Path) -> Result<()> {
        match fs::metadata(full_path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RepositoryError::not_found(
                format!("Path does not exist: {}", full_path.display()),
            )),
            Err(e) => Err(RepositoryError::read(format!(
                "Failed to stat {}: {e}",
                full_path.display()
            ))),
        }
    }

    /// Open an existing archive for reading and derive its folder name
    fn open_archive<'a>(&self, archive_path: &'a str) -> Result<(BufReader<File>, &'a str)> {
        let full_path = self.resolve_path(archive_path);
        self.require_existing(&full_path)?;

        let folder_name = archive_folder_name(archive_path).ok_or_else(|| {
            RepositoryError::read(format!(
                "{archive_path} is not a {ARCHIVE_SUFFIX} archive"
            ))
        })?;
        let file = File::open(&full_path).map_err(|e| {
            RepositoryError::on_read(format!("Failed to open {}", full_path.display()), e)
        })?;
        Ok((BufReader::new(file), folder_name))
    }

    /// Write `data` to `path` without recording it as a separate operation
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve_path(path);
        self.ensure_parent_dir(&full_path)?;
        fs::write(&full_path, data).map_err(|e| {
            RepositoryError::on_write(format!("Failed to write {}", full_path.display()), e)
        })?;
        debug!(path, bytes = data.len(), "Wrote file");
        Ok(())
    }

    /// Pack into a freshly created archive file. The caller removes the file
    /// if this fails.
    fn write_archive(
        &self,
        full_path: &Path,
        local_dir: &Path,
        folder_name: &str,
        include_path: Option<&str>,
    ) -> Result<()> {
        let file = File::create(full_path).map_err(|e| {
            RepositoryError::on_write(format!("Failed to create {}", full_path.display()), e)
        })?;

        let writer =
            archive::pack_directory(BufWriter::new(file), local_dir, folder_name, include_path)?;

        // The archive only counts as written once flush and sync succeed.
        let file = writer.into_inner().map_err(|e| {
            RepositoryError::on_write(
                format!("Failed to flush {}", full_path.display()),
                e.into_error(),
            )
        })?;
        file.sync_all().map_err(|e| {
            RepositoryError::on_write(format!("Failed to sync {}", full_path.display()), e)
        })
    }

    #[cfg(feature = "metrics")]
    fn instrumented<T>(&self, operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let timer = OperationTimer::start(operation);
        let result = f();
        timer.finish(result.is_ok());
        result
    }

    #[cfg(not(feature = "metrics"))]
    fn instrumented<T>(&self, _operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        f()
    }

    #[cfg(feature = "metrics")]
    fn record_stream(&self, operation: &'static str) {
        RepositoryMetrics::global().record_operation(operation);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_stream(&self, _operation: &'static str) {}
}

/// Plan the upload of every file under `local_dir` into `repo_dir`.
///
/// Files are listed depth first in name order. Directories produce no entries
/// of their own. Symlinks are followed.
pub fn plan_upload(local_dir: &Path, repo_dir: &str) -> Result<Vec<FileTransfer>> {
    let mut plan = Vec::new();
    for entry in WalkDir::new(local_dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            RepositoryError::write(format!("Failed to walk {}: {e}", local_dir.display()))
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(local_dir).map_err(|e| {
            RepositoryError::write(format!("Failed to plan {}: {e}", entry.path().display()))
        })?;
        let dest = if relative.as_os_str().is_empty() {
            // local_dir itself is a file
            paths::join(repo_dir, &entry.file_name().to_string_lossy())
        } else {
            paths::join(repo_dir, &paths::to_logical(relative))
        };
        plan.push(FileTransfer {
            source: entry.into_path(),
            dest,
        });
    }
    Ok(plan)
}

/// Copy `src` to `dst`, recursing into directories and following symlinks
fn copy_tree(src: &Path, dst: &Path) -> io::Result<usize> {
    if !fs::metadata(src)?.is_dir() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
        return Ok(1);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

impl Repository for DiskRepository {
    fn root_url(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.instrumented("get", || {
            let full_path = self.resolve_path(path);
            fs::read(&full_path).map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    RepositoryError::not_found(format!("Get: path does not exist: {path}"))
                } else {
                    RepositoryError::read(format!("Failed to read {}: {e}", full_path.display()))
                }
            })
        })
    }

    fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        self.instrumented("put", || self.write_file(path, data))
    }

    fn get_directory(&self, repo_dir: &str, local_dir: &Path) -> Result<()> {
        self.instrumented("get_directory", || {
            let copied = copy_tree(&self.resolve_path(repo_dir), local_dir).map_err(|e| {
                RepositoryError::read(format!(
                    "Failed to copy directory from {repo_dir} to {}: {e}",
                    local_dir.display()
                ))
            })?;
            debug!(repo_dir, local_dir = %local_dir.display(), copied, "Copied directory out of repository");
            Ok(())
        })
    }

    fn put_directory(&self, local_dir: &Path, repo_dir: &str) -> Result<()> {
        self.instrumented("put_directory", || {
            let plan = plan_upload(local_dir, repo_dir)?;
            for transfer in &plan {
                let data = fs::read(&transfer.source).map_err(|e| {
                    RepositoryError::on_write(
                        format!("Failed to read {}", transfer.source.display()),
                        e,
                    )
                })?;
                self.write_file(&transfer.dest, &data)?;
            }
            debug!(local_dir = %local_dir.display(), repo_dir, files = plan.len(), "Uploaded directory");
            Ok(())
        })
    }

    fn get_archive(&self, archive_path: &str, local_path: &Path) -> Result<()> {
        self.instrumented("get_archive", || {
            let (reader, folder_name) = self.open_archive(archive_path)?;
            let files = archive::unpack_archive(reader, folder_name, local_path)?;
            info!(archive = archive_path, local_path = %local_path.display(), files, "Extracted archive");
            Ok(())
        })
    }

    fn get_archive_entry(
        &self,
        archive_path: &str,
        entry_path: &str,
        local_path: &Path,
    ) -> Result<()> {
        self.instrumented("get_archive_entry", || {
            let (reader, folder_name) = self.open_archive(archive_path)?;
            archive::unpack_entry(reader, folder_name, entry_path, local_path)?;
            Ok(())
        })
    }

    fn put_archive(
        &self,
        local_dir: &Path,
        archive_path: &str,
        include_path: Option<&str>,
    ) -> Result<()> {
        self.instrumented("put_archive", || {
            let folder_name = archive_folder_name(archive_path).ok_or_else(|| {
                RepositoryError::write(format!(
                    "PutArchive: archive path must end with {ARCHIVE_SUFFIX}: {archive_path}"
                ))
            })?;

            let full_path = self.resolve_path(archive_path);
            self.ensure_parent_dir(&full_path)?;
            if let Err(e) = self.write_archive(&full_path, local_dir, folder_name, include_path) {
                // A partial archive would read back as corrupt rather than absent
                if let Err(cleanup) = fs::remove_file(&full_path) {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(archive = archive_path, error = %cleanup, "Failed to remove partial archive");
                    }
                }
                return Err(e);
            }

            info!(archive = archive_path, local_dir = %local_dir.display(), "Created archive");
            Ok(())
        })
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.instrumented("delete", || {
            let full_path = self.resolve_path(path);
            let removed = match fs::symlink_metadata(&full_path) {
                Ok(meta) if meta.is_dir() => fs::remove_dir_all(&full_path),
                Ok(_) => fs::remove_file(&full_path),
                Err(e) => Err(e),
            };
            match removed {
                Ok(()) => {
                    debug!(path, "Deleted");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(RepositoryError::on_write(
                    format!("Failed to delete {}", full_path.display()),
                    e,
                )),
            }
        })
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        self.instrumented("list", || {
            let full_path = self.resolve_path(path);
            let entries = match fs::read_dir(&full_path) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => {
                    return Err(RepositoryError::read(format!(
                        "Failed to list {}: {e}",
                        full_path.display()
                    )))
                }
            };

            let mut names = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| {
                    RepositoryError::read(format!("Failed to list {}: {e}", full_path.display()))
                })?;
                let file_type = entry.file_type().map_err(|e| {
                    RepositoryError::read(format!(
                        "Failed to stat {}: {e}",
                        entry.path().display()
                    ))
                })?;
                if !file_type.is_dir() {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            names.sort();
            Ok(names.iter().map(|name| paths::join(path, name)).collect())
        })
    }

    fn list_archive_entries(&self, archive_path: &str) -> Result<Vec<String>> {
        self.instrumented("list_archive_entries", || {
            let (reader, folder_name) = self.open_archive(archive_path)?;
            archive::list_entries(reader, folder_name)
        })
    }

    // Streams are counted when opened. Their work happens as the caller pulls
    // items, so there is no latency or error to record here.
    fn list_recursive(&self, folder: &str) -> ListStream {
        self.record_stream("list_recursive");
        Box::new(TreeWalk::checksums(&self.root, &self.resolve_path(folder)))
    }

    fn match_filenames_recursive(&self, folder: &str, filename: &str) -> ListStream {
        self.record_stream("match_filenames_recursive");
        Box::new(TreeWalk::matching_name(
            &self.root,
            &self.resolve_path(folder),
            filename,
        ))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.instrumented("exists", || {
            let full_path = self.resolve_path(path);
            match fs::symlink_metadata(&full_path) {
                Ok(_) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(RepositoryError::read(format!(
                    "Failed to stat {}: {e}",
                    full_path.display()
                ))),
            }
        })
    }
}
