//! Central error types for depth-matte.
//!
//! Construction-time failures are fatal and surface as `MatteError`. Per-frame
//! failures never reach this type: `filter` drops the frame instead.
//! All errors implement `Serialize` so a host can forward them over IPC.

use serde::Serialize;
use thiserror::Error;

use crate::rendering::RenderTargetError;

/// Main error type for depth-matte operations.
#[derive(Error, Debug)]
pub enum MatteError {
    /// The shader compiler rejected the effect source
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// A named effect parameter has no binding in the shader
    #[error("Effect parameter '{name}' not found")]
    MissingParameter { name: String },

    /// A named technique has no matching entry points in the shader
    #[error("Effect technique '{name}' not found")]
    MissingTechnique { name: String },

    /// Pipeline or bind group layout failed validation
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// No adapter or device could be created
    #[error("GPU unavailable: {0}")]
    GpuUnavailable(String),

    /// Off-screen target could not be prepared
    #[error("Render target error: {0}")]
    RenderTarget(#[from] RenderTargetError),

    /// Copying a texture back to the CPU failed
    #[error("Readback failed: {0}")]
    Readback(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error (config, log files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Serialize for MatteError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<String> for MatteError {
    fn from(msg: String) -> Self {
        MatteError::Other(msg)
    }
}

impl From<&str> for MatteError {
    fn from(msg: &str) -> Self {
        MatteError::Other(msg.to_string())
    }
}

impl From<wgpu::RequestDeviceError> for MatteError {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        MatteError::GpuUnavailable(err.to_string())
    }
}

/// Extension trait for adding context to Results.
///
/// # Example
/// ```ignore
/// use crate::error::{MatteResult, ResultExt};
///
/// fn load() -> MatteResult<String> {
///     std::fs::read_to_string("compositor.json").context("failed to read compositor config")
/// }
/// ```
pub trait ResultExt<T> {
    /// Add context to an error, converting it to MatteError::Other.
    fn context(self, msg: &str) -> MatteResult<T>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> MatteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> MatteResult<T> {
        self.map_err(|e| MatteError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> MatteResult<T> {
        self.map_err(|e| MatteError::Other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types.
pub trait OptionExt<T> {
    fn context(self, msg: &str) -> MatteResult<T>;

    fn with_context<F: FnOnce() -> String>(self, f: F) -> MatteResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> MatteResult<T> {
        self.ok_or_else(|| MatteError::Other(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> MatteResult<T> {
        self.ok_or_else(|| MatteError::Other(f()))
    }
}

/// Type alias for Results using MatteError.
pub type MatteResult<T> = Result<T, MatteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_error_display() {
        let err = MatteError::MissingParameter {
            name: "mask_image".to_string(),
        };
        assert_eq!(err.to_string(), "Effect parameter 'mask_image' not found");

        let err = MatteError::MissingTechnique {
            name: "draw".to_string(),
        };
        assert!(err.to_string().contains("'draw'"));
    }

    #[test]
    fn test_error_serialization() {
        let err = MatteError::ShaderCompilation("expected ';'".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Shader compilation failed: expected ';'\"");
    }

    #[test]
    fn test_render_target_error_converts() {
        let err: MatteError = RenderTargetError::ZeroSize {
            width: 0,
            height: 16,
        }
        .into();
        assert!(matches!(err, MatteError::RenderTarget(_)));
        assert!(err.to_string().contains("0x16"));
    }

    #[test]
    fn test_from_io_and_json() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(MatteError::from(io_err), MatteError::Io(_)));

        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(MatteError::from(json_err), MatteError::Json(_)));
    }

    #[test]
    fn test_from_string() {
        let err: MatteError = "adapter lost".into();
        assert!(matches!(err, MatteError::Other(_)));
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<(), &str> = Err("original error");
        let msg = result.context("operation failed").unwrap_err().to_string();
        assert!(msg.contains("operation failed"));
        assert!(msg.contains("original error"));
    }

    #[test]
    fn test_result_ext_with_context_is_lazy_on_ok() {
        let result: Result<i32, &str> = Ok(42);
        let value = result
            .with_context(|| panic!("context must not be evaluated"))
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_option_ext_context() {
        let opt: Option<i32> = None;
        let msg = opt
            .with_context(|| format!("no binding for group {}", 0))
            .unwrap_err()
            .to_string();
        assert!(msg.contains("no binding for group 0"));
        assert_eq!(Some(3).context("unused").unwrap(), 3);
    }
}
