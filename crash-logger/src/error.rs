use std::path::PathBuf;

/// An error that can occur while recording a crash or attaching a
/// [`crate::CrashHandler`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// For simplicity sake, only one [`crate::CrashHandler`] can be attached
    /// at any one time.
    #[error("a crash handler is already installed")]
    HandlerAlreadyInstalled,
    /// The storage medium backing the crash directory is not available
    #[error("the storage medium for '{0}' is not available")]
    StorageUnavailable(PathBuf),
    /// The crash directory, or one of its parents, could not be created
    #[error("failed to create crash directory '{path}'")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The notification sink failed to show the crash notice
    #[error("failed to show crash notice: {0}")]
    Notify(String),
    /// An I/O or other syscall failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
