/*!
Archive extraction and listing.

Entry names are validated before anything touches the disk: absolute paths
and `..` components are refused so an archive can never write outside the
destination directory.
*/

use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Entry, EntryType};
use tracing::debug;

use crate::{RepositoryError, Result};

/// Extract every entry of the archive in `reader` into `dest`, stripping the
/// top-level `folder_name`. Returns the number of files written.
pub fn unpack_archive<R: Read>(reader: R, folder_name: &str, dest: &Path) -> Result<usize> {
    create_dest(dest)?;

    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut files = 0usize;
    for_each_entry(&mut archive, folder_name, |entry, relative| {
        if relative.is_empty() {
            return Ok(());
        }
        if materialize(entry, &dest.join(join_components(relative)))? {
            files += 1;
        }
        Ok(())
    })?;

    debug!(dest = %dest.display(), files, "Unpacked archive");
    Ok(files)
}

/// Extract the single entry `entry_path` (relative to the archive's folder)
/// into `dest`.
///
/// A file entry lands at `dest/<file name>`. A directory entry lands at
/// `dest/<directory name>/...` together with everything below it. An entry
/// that is not in the archive is a read error.
pub fn unpack_entry<R: Read>(
    reader: R,
    folder_name: &str,
    entry_path: &str,
    dest: &Path,
) -> Result<usize> {
    let wanted: Vec<String> = entry_path
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .map(str::to_string)
        .collect();
    if wanted.is_empty() || wanted.iter().any(|part| part == "..") {
        return Err(RepositoryError::read(format!(
            "Invalid archive entry path: {entry_path:?}"
        )));
    }
    let parent_len = wanted.len() - 1;

    create_dest(dest)?;

    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut matched = 0usize;
    for_each_entry(&mut archive, folder_name, |entry, relative| {
        if !relative.starts_with(&wanted) {
            return Ok(());
        }
        matched += 1;
        materialize(entry, &dest.join(join_components(&relative[parent_len..])))?;
        Ok(())
    })?;

    if matched == 0 {
        return Err(RepositoryError::read(format!(
            "Entry {entry_path} not found in archive"
        )));
    }
    debug!(entry = entry_path, dest = %dest.display(), matched, "Unpacked archive entry");
    Ok(matched)
}

/// Names of all non-directory entries, relative to the archive's folder, in
/// archive order.
pub fn list_entries<R: Read>(reader: R, folder_name: &str) -> Result<Vec<String>> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut names = Vec::new();
    for_each_entry(&mut archive, folder_name, |entry, relative| {
        if entry.header().entry_type() != EntryType::Directory && !relative.is_empty() {
            names.push(relative.join("/"));
        }
        Ok(())
    })?;
    Ok(names)
}

/// Drive `visit` over every entry with its validated, folder-stripped name.
fn for_each_entry<'a, R, F>(
    archive: &'a mut Archive<R>,
    folder_name: &str,
    mut visit: F,
) -> Result<()>
where
    R: 'a + Read,
    F: FnMut(&mut Entry<'a, R>, &[String]) -> Result<()>,
{
    let entries = archive
        .entries()
        .map_err(|e| RepositoryError::read(format!("Failed to read archive: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| RepositoryError::read(format!("Failed to read archive entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| RepositoryError::read(format!("Invalid archive entry name: {e}")))?
            .into_owned();

        let mut components = safe_components(&path)?;
        if components.first().map(String::as_str) == Some(folder_name) {
            components.remove(0);
        }
        visit(&mut entry, &components)?;
    }
    Ok(())
}

/// Split an entry name into normal components, refusing anything that
/// could resolve outside the extraction directory.
fn safe_components(path: &Path) -> Result<Vec<String>> {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => components.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(RepositoryError::read(format!(
                    "Refusing unsafe archive entry {}",
                    path.display()
                )));
            }
        }
    }
    Ok(components)
}

fn join_components(components: &[String]) -> PathBuf {
    components.iter().collect()
}

fn create_dest(dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)
        .map_err(|e| RepositoryError::on_write(format!("Failed to create {}", dest.display()), e))
}

/// Write one entry to `target`. Returns whether a regular file was written.
fn materialize<R: Read>(entry: &mut Entry<'_, R>, target: &Path) -> Result<bool> {
    let entry_type = entry.header().entry_type();
    match entry_type {
        EntryType::Directory => {
            fs::create_dir_all(target).map_err(|e| {
                RepositoryError::on_write(format!("Failed to create {}", target.display()), e)
            })?;
            Ok(false)
        }
        EntryType::Regular | EntryType::Continuous => {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    RepositoryError::on_write(format!("Failed to create {}", parent.display()), e)
                })?;
            }
            entry.unpack(target).map_err(|e| {
                RepositoryError::on_write(format!("Failed to extract {}", target.display()), e)
            })?;
            Ok(true)
        }
        other => {
            debug!(target = %target.display(), entry_type = ?other, "Skipping unsupported archive entry");
            Ok(false)
        }
    }
}
