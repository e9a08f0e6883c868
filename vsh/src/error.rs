//! Error types for vsh

use crate::build::BuildError;
use crate::process::ExitStatus;
use crate::vfs::VfsError;
use thiserror::Error;

/// Result type alias for shell operations
pub type ShellResult<T> = Result<T, ShellError>;

/// Everything that can go wrong while handling one input line.
///
/// None of these end the shell loop except [`ShellError::Exit`], which is a
/// request rather than a failure.
#[derive(Error, Debug)]
pub enum ShellError {
    /// Malformed quoting in the input line
    #[error("parsing error: {0}")]
    Parse(String),

    /// `$NAME` reference to a variable the environment does not define
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// Command resolution found no target
    #[error("unable to find command: {0}")]
    NotFound(String),

    /// Source directory failed to build
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The process runtime could not launch the target
    #[error("unable to start {name}: {source}")]
    Start {
        name: String,
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully
    #[error("{name}: {status}")]
    Runtime { name: String, status: ExitStatus },

    /// Reading the next line failed
    #[error("input error: {0}")]
    Input(std::io::Error),

    /// Built-in called with bad arguments
    #[error("{0}")]
    Usage(String),

    /// Virtual filesystem error
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// IO error (shell output, pipes, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Exit requested (not really an error)
    #[error("exit with code {0}")]
    Exit(i32),
}
