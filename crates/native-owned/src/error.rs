/// Failure reported by a native finalizer.
///
/// Owners log and discard these; they exist so resource kinds can describe
/// what went wrong without panicking inside a teardown path.
#[derive(thiserror::Error, Debug)]
pub enum FinalizeError {
    #[error("Close failed: {0}")]
    Close(String),
    #[error("Shutdown failed: {0}")]
    Shutdown(String),
    #[cfg(windows)]
    #[error("{0}")]
    Windows(#[from] windows_core::Error),
}
