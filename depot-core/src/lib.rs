/*!
# Depot Core

Artifact repository abstraction with a local filesystem backend.

A repository stores files, directory trees and `.tar.gz` archives under
logical `/`-delimited paths relative to a root URL. This crate provides:

- The [`Repository`] contract shared by all storage backends
- [`DiskRepository`], the local filesystem implementation
- Archive packing and extraction with a single top-level folder per archive
- Lazy, checksummed recursive listings that treat a missing folder as empty
- One error taxonomy for every backend: not found, read failure, write failure

## Usage

```rust
use depot_core::{for_url, Repository};

let dir = tempfile::tempdir().unwrap();
let work = tempfile::tempdir().unwrap();
std::fs::write(work.path().join("weights.bin"), [1u8, 2, 3]).unwrap();

let repository = for_url(&format!("file://{}", dir.path().display()))?;

// Store a directory as an archive and read it back
repository.put_archive(work.path(), "runs/1/checkpoint.tar.gz", None)?;
assert_eq!(
    repository.list_archive_entries("runs/1/checkpoint.tar.gz")?,
    vec!["weights.bin"]
);

// Every stored file, with its checksum
for entry in repository.list_recursive("runs") {
    let entry = entry?;
    println!("{} {}", entry.path, entry.checksum.unwrap());
}
# Ok::<(), depot_core::RepositoryError>(())
```
*/

pub mod archive;
pub mod config;
pub mod error;
pub mod observability;
pub mod paths;
pub mod repository;
pub mod walk;


pub use config::{RepositoryConfig, StorageBackend};
pub use error::{ErrorKind, RepositoryError, Result};
pub use repository::{for_url, DiskRepository, FileTransfer, Repository};
pub use walk::{Checksum, ListEntry, ListStream};
