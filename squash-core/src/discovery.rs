//! Input discovery: turns command-line paths into `FileInput`s.
//!
//! Files are categorized by extension. Directories contribute their
//! top-level files only; subdirectories are not searched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::profile::Category;
use crate::scheduler::FileInput;
use crate::streaming::FileSource;
use crate::utils::get_filename_safe;

/// Lists the files `paths` refer to that have a known category.
///
/// Directory entries are sorted by path so batches are reproducible.
/// Paths with unknown extensions are skipped.
///
/// # Errors
///
/// * `CoreError::Io` - if a path cannot be read
/// * `CoreError::NoFilesFound` - if nothing usable was found
pub fn find_processable_files(paths: &[PathBuf]) -> CoreResult<Vec<(PathBuf, Category)>> {
    let mut found = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|entry| entry.is_file())
                .collect();
            entries.sort();
            for entry in entries {
                match Category::from_path(&entry) {
                    Some(category) => found.push((entry, category)),
                    None => debug!("Skipping {}: unknown extension", entry.display()),
                }
            }
        } else if path.is_file() {
            match Category::from_path(path) {
                Some(category) => found.push((path.clone(), category)),
                None => warn!("Skipping {}: unknown extension", path.display()),
            }
        } else {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
    }

    if found.is_empty() {
        Err(CoreError::NoFilesFound)
    } else {
        Ok(found)
    }
}

/// Discovers inputs and opens each as a file-backed `FileInput`.
pub async fn discover_inputs(paths: &[PathBuf]) -> CoreResult<Vec<FileInput>> {
    let mut inputs = Vec::new();
    for (path, category) in find_processable_files(paths)? {
        inputs.push(open_input(&path, category).await?);
    }
    Ok(inputs)
}

async fn open_input(path: &Path, category: Category) -> CoreResult<FileInput> {
    let name = get_filename_safe(path)?;
    let source = FileSource::open(path).await?;
    Ok(FileInput::new(name, category, Arc::new(source)))
}
