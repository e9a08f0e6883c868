//! Virtual filesystem seen by the shell.
//!
//! Paths are forward-slash and absolute, rooted at the environment's logical
//! root. [`HostFs`] backs the tree with a host directory.

mod host;
mod path;

pub use host::HostFs;
pub use path::{extension, file_name, join, normalize_path, parent, resolve_path, strip_extension};

use std::path::PathBuf;
use thiserror::Error;

pub type VfsResult<T> = Result<T, VfsError>;

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("{0}: no such file or directory")]
    NotFound(String),

    #[error("{0}: not a directory")]
    NotADirectory(String),

    #[error("{0}: is a directory")]
    IsADirectory(String),

    #[error("{0}: path escapes root")]
    Escape(String),

    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl VfsError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    /// Seconds since the Unix epoch.
    pub mtime: u64,
}

pub trait Vfs: Send + Sync {
    fn stat(&self, path: &str) -> VfsResult<FileInfo>;

    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.stat(path).map(|info| info.is_dir).unwrap_or(false)
    }

    fn read(&self, path: &str) -> VfsResult<Vec<u8>>;

    /// At most `len` bytes from the start of the file.
    fn read_head(&self, path: &str, len: usize) -> VfsResult<Vec<u8>>;

    fn write(&self, path: &str, data: &[u8]) -> VfsResult<()>;

    fn append(&self, path: &str, data: &[u8]) -> VfsResult<()>;

    /// Create the file if missing and bump its modification time.
    fn touch(&self, path: &str) -> VfsResult<()>;

    fn mkdir(&self, path: &str, parents: bool) -> VfsResult<()>;

    fn remove(&self, path: &str, recursive: bool) -> VfsResult<()>;

    fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Copy a file, or a directory tree.
    fn copy(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Entries of a directory, sorted by name.
    fn readdir(&self, path: &str) -> VfsResult<Vec<FileInfo>>;

    /// Paths of the regular files in `dir` named `*.{ext}`.
    fn list_glob(&self, dir: &str, ext: &str) -> VfsResult<Vec<String>> {
        Ok(self
            .readdir(dir)?
            .into_iter()
            .filter(|entry| !entry.is_dir && extension(&entry.name) == Some(ext))
            .map(|entry| entry.path)
            .collect())
    }

    /// Host location of a virtual path, for collaborators that run host tools.
    fn host_path(&self, path: &str) -> VfsResult<PathBuf>;
}
