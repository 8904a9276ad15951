//! # Static File Collection
//!
//! `collectstatic`: copy every file under the configured source directories
//! into the static root, keeping relative paths. Existing files are
//! overwritten; later source directories win on conflicts.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::StaticFilesConfig;
use crate::error::{DatastoreError, Result};

/// Copy all static files, returning how many were copied
pub fn collect_static(config: &StaticFilesConfig) -> Result<usize> {
    fs::create_dir_all(&config.static_root).map_err(|e| DatastoreError::io(&config.static_root, e))?;

    let mut copied = 0;
    for source in &config.source_dirs {
        if !source.is_dir() {
            warn!(source = %source.display(), "Static source directory does not exist, skipping");
            continue;
        }
        copied += copy_tree(source, &config.static_root)?;
    }

    info!(
        copied = copied,
        static_root = %config.static_root.display(),
        "Static files collected"
    );
    Ok(copied)
}

fn copy_tree(source: &Path, destination: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
            DatastoreError::io(path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| DatastoreError::validation(e.to_string()))?;
        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| DatastoreError::io(parent, e))?;
        }
        fs::copy(entry.path(), &target).map_err(|e| DatastoreError::io(entry.path(), e))?;
        debug!(file = %relative.display(), "Copied static file");
        copied += 1;
    }
    Ok(copied)
}
