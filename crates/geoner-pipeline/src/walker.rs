//! Input directory listing

use std::path::{Path, PathBuf};

use geoner_core::{GeonerError, Result};

/// Lists the regular files directly inside a directory
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: Vec::new(),
        }
    }

    /// Only accept these extensions (case-insensitive, leading dot optional)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }

    /// Files to process, sorted by name
    ///
    /// Subdirectories are not descended into.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(GeonerError::NotFound(format!(
                "Input directory {}",
                self.root.display()
            )));
        }

        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            GeonerError::DocumentError(format!(
                "Failed to list {}: {e}",
                self.root.display()
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                GeonerError::DocumentError(format!(
                    "Failed to list {}: {e}",
                    self.root.display()
                ))
            })?;
            let path = entry.path();

            if !path.is_file() {
                tracing::debug!("Skipping non-file {}", path.display());
                continue;
            }
            if !self.accepts(&path) {
                tracing::debug!("Skipping {} (extension filter)", path.display());
                continue;
            }
            files.push(path);
        }

        files.sort();
        Ok(files)
    }
}
