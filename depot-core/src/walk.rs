/*!
Checksummed recursive traversal.

Walks a directory subtree depth-first in name order and yields one
[`ListEntry`] per file. Traversal is lazy: nothing is read from disk until the
caller pulls the next item, so dropping the stream stops the walk.

A folder that does not exist produces an empty stream, the same as an empty
prefix in an object store. Any other failure is yielded once as an `Err` and
the stream ends.
*/

use md5::{Digest, Md5};
use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::paths;
use crate::{RepositoryError, Result};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// 128-bit MD5 digest of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 16]);

impl Checksum {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Digest of an in-memory buffer
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(data);
        Self::finish(hasher)
    }

    /// Digest of everything `reader` yields, read in fixed-size chunks
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..n]);
        }
        Ok(Self::finish(hasher))
    }

    /// Digest of the file at `path`
    pub fn of_file(path: &Path) -> io::Result<Self> {
        Self::of_reader(File::open(path)?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn finish(hasher: Md5) -> Self {
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One file found by a recursive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Logical path relative to the repository root
    pub path: String,
    /// Content digest, present for checksummed listings only
    pub checksum: Option<Checksum>,
}

/// Stream of recursive listing results.
///
/// At most one `Err` is yielded and it is always the last item.
pub type ListStream = Box<dyn Iterator<Item = Result<ListEntry>> + Send>;

#[derive(Debug, Clone)]
enum Emit {
    Checksums,
    MatchingName(String),
}

/// Lazy depth-first walk over a folder below a repository root.
pub struct TreeWalk {
    root: PathBuf,
    inner: walkdir::IntoIter,
    emit: Emit,
    finished: bool,
}

impl TreeWalk {
    /// Walk `folder` and checksum every file found.
    pub fn checksums(root: &Path, folder: &Path) -> Self {
        Self::new(root, folder, Emit::Checksums)
    }

    /// Walk `folder` and report every file whose base name equals `filename`.
    pub fn matching_name(root: &Path, folder: &Path, filename: impl Into<String>) -> Self {
        Self::new(root, folder, Emit::MatchingName(filename.into()))
    }

    fn new(root: &Path, folder: &Path, emit: Emit) -> Self {
        debug!(folder = %folder.display(), "Starting recursive walk");
        Self {
            root: root.to_path_buf(),
            inner: WalkDir::new(folder).sort_by_file_name().into_iter(),
            emit,
            finished: false,
        }
    }

    fn visit(&self, entry: &DirEntry) -> Result<Option<ListEntry>> {
        let checksum = match &self.emit {
            Emit::Checksums => Some(Checksum::of_file(entry.path()).map_err(|e| {
                RepositoryError::read(format!(
                    "Failed to checksum {}: {e}",
                    entry.path().display()
                ))
            })?),
            Emit::MatchingName(filename) => {
                if entry.file_name() != OsStr::new(filename) {
                    return Ok(None);
                }
                None
            }
        };
        Ok(Some(ListEntry {
            path: self.logical(entry.path())?,
            checksum,
        }))
    }

    fn logical(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root).map_err(|e| {
            RepositoryError::read(format!(
                "{} is outside repository root {}: {e}",
                path.display(),
                self.root.display()
            ))
        })?;
        Ok(paths::to_logical(relative))
    }

    fn fail(&mut self, err: RepositoryError) -> Option<Result<ListEntry>> {
        warn!(error = %err, "Recursive walk stopped");
        self.finished = true;
        Some(Err(err))
    }
}

impl Iterator for TreeWalk {
    type Item = Result<ListEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let entry = match self.inner.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    let missing_root = err.depth() == 0
                        && err
                            .io_error()
                            .is_some_and(|io| io.kind() == io::ErrorKind::NotFound);
                    if missing_root {
                        self.finished = true;
                        return None;
                    }
                    return self.fail(RepositoryError::read(format!("Failed to walk: {err}")));
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            match self.visit(&entry) {
                Ok(Some(item)) => return Some(Ok(item)),
                Ok(None) => continue,
                Err(err) => return self.fail(err),
            }
        }
        None
    }
}

impl FusedIterator for TreeWalk {}
