use std::path::PathBuf;

use thiserror::Error;

use crate::mount::MountId;

/// The internal error taxonomy for this crate.
///
/// Public facade operations collapse this into a `bool` at the edge (this crate's
/// "errors are not thrown across the API boundary" contract), but every fallible
/// helper returns this type so the reason is never thrown away before it has to be.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{path} already exists")]
    AlreadyExists { path: PathBuf },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("format error: {0}")]
    Format(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),
}

impl VfsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn unknown_mount(id: MountId) -> Self {
        Self::NotFound(format!("mount {id} is not registered"))
    }

    pub fn unknown_file(id: u64) -> Self {
        Self::NotFound(format!("file {id} is not indexed"))
    }
}

pub type Result<T> = std::result::Result<T, VfsError>;
