//! Filesystem access for generated DSP files
//!
//! The DSP engine watches the files it reads, so every write goes to a
//! temporary sibling first and is renamed over the target. If the rename
//! fails the contents are written directly instead.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Filesystem rooted at the DSP working directory
///
/// Paths passed to these methods are relative to the implementation's root.
pub trait FileSystem: Send + Sync {
    /// Replace `relative` with `contents` without exposing a partial file
    fn write_atomic(&self, relative: &Path, contents: &str) -> Result<()>;

    fn read_to_string(&self, relative: &Path) -> Result<String>;

    fn exists(&self, relative: &Path) -> bool;
}

/// [`FileSystem`] over a local directory
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a relative path
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

impl FileSystem for LocalFileSystem {
    fn write_atomic(&self, relative: &Path, contents: &str) -> Result<()> {
        write_file_atomic(&self.resolve(relative), contents.as_bytes())
    }

    fn read_to_string(&self, relative: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(self.resolve(relative))?)
    }

    fn exists(&self, relative: &Path) -> bool {
        self.resolve(relative).exists()
    }
}

/// Write `contents` to `path` via a temporary sibling and a rename
pub(crate) fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, contents)?;

    match std::fs::rename(&tmp_path, path) {
        Ok(()) => {
            debug!("Wrote {:?}", path);
            Ok(())
        }
        Err(e) => {
            warn!("Atomic rename to {:?} failed ({}), writing directly", path, e);
            let _ = std::fs::remove_file(&tmp_path);
            std::fs::write(path, contents)?;
            Ok(())
        }
    }
}
