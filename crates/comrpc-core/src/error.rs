use std::path::PathBuf;

/// Errors raised while loading the libraries that host services.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The OS loader refused the library.
    #[error("failed to load library {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// The path cannot be handed to the OS loader.
    #[error("invalid library path: {0}")]
    InvalidPath(PathBuf),

    /// Dynamic loading is not available on this platform.
    #[error("dynamic library loading is not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, CoreError>;
