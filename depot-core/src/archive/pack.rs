/*!
Archive creation.
*/

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::Builder;
use tracing::debug;
use walkdir::WalkDir;

use crate::paths;
use crate::{RepositoryError, Result};

/// Write a gzipped tar of `local_dir` to `writer`, nested under `folder_name`.
///
/// With `include_path`, only `local_dir/include_path` is archived, still
/// stored as `folder_name/include_path/...`. Directories get their own
/// entries so empty ones survive a round trip. Files are added in name order,
/// depth first.
///
/// The tar trailer and gzip footer are written before returning; the
/// returned writer has not been flushed.
pub fn pack_directory<W: Write>(
    writer: W,
    local_dir: &Path,
    folder_name: &str,
    include_path: Option<&str>,
) -> Result<W> {
    let (source, prefix) = match include_path {
        Some(include) => (
            paths::resolve(local_dir, include),
            paths::resolve(Path::new(folder_name), include),
        ),
        None => (local_dir.to_path_buf(), PathBuf::from(folder_name)),
    };

    fs::metadata(&source)
        .map_err(|e| RepositoryError::on_write(format!("Cannot archive {}", source.display()), e))?;

    let mut builder = Builder::new(GzEncoder::new(writer, Compression::default()));
    let mut files = 0usize;

    for entry in WalkDir::new(&source).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            RepositoryError::write(format!("Failed to walk {}: {e}", source.display()))
        })?;
        let relative = entry.path().strip_prefix(&source).map_err(|e| {
            RepositoryError::write(format!(
                "Failed to compute archive name for {}: {e}",
                entry.path().display()
            ))
        })?;
        let name = if relative.as_os_str().is_empty() {
            prefix.clone()
        } else {
            prefix.join(relative)
        };

        let appended = if entry.file_type().is_dir() {
            builder.append_dir(&name, entry.path())
        } else {
            files += 1;
            builder.append_path_with_name(entry.path(), &name)
        };
        appended.map_err(|e| {
            RepositoryError::on_write(format!("Failed to archive {}", entry.path().display()), e)
        })?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| RepositoryError::on_write("Failed to finish tar stream", e))?;
    let writer = encoder
        .finish()
        .map_err(|e| RepositoryError::on_write("Failed to finish gzip stream", e))?;

    debug!(source = %source.display(), files, "Packed directory");
    Ok(writer)
}
