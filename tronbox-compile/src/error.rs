use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Various error types
#[derive(Debug, Error)]
pub enum CompileError {
    /// Required configuration is missing or malformed
    #[error("Configuration Error: {0}")]
    Config(String),
    /// The compiler backend failed or reported errors
    #[error("Solc Error: {0}")]
    Solc(String),
    /// A source file or one of its imports could not be read
    #[error("Could not resolve \"{}\": {io}", path.display())]
    Resolve { path: PathBuf, io: io::Error },
    /// Filesystem IO error while persisting outputs
    #[error(transparent)]
    Io(#[from] CompileIoError),
    /// Serialization of a persisted document failed
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// A persistence task did not run to completion
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// The failure classes a caller can distinguish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised before any compiler invocation or filesystem write
    Configuration,
    /// The compiler backend failed, nothing was persisted
    Compilation,
    /// Writing artifacts or build info failed
    Persistence,
}

impl CompileError {
    pub(crate) fn io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        CompileIoError::new(err, path).into()
    }
    pub(crate) fn solc(msg: impl Into<String>) -> Self {
        CompileError::Solc(msg.into())
    }
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CompileError::Config(msg.into())
    }
    pub(crate) fn resolve(err: io::Error, path: impl Into<PathBuf>) -> Self {
        CompileError::Resolve { path: path.into(), io: err }
    }

    /// Returns the class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Config(_) => ErrorKind::Configuration,
            CompileError::Solc(_) | CompileError::Resolve { .. } => ErrorKind::Compilation,
            CompileError::Io(_) | CompileError::SerdeJson(_) | CompileError::Join(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("\"{}\": {io}", self.path.display())]
pub struct CompileIoError {
    io: io::Error,
    path: PathBuf,
}

impl CompileIoError {
    pub fn new(io: io::Error, path: impl Into<PathBuf>) -> Self {
        Self { io, path: path.into() }
    }

    /// The path the failed operation was performed on
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl From<CompileIoError> for io::Error {
    fn from(err: CompileIoError) -> Self {
        err.io
    }
}
