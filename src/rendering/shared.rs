//! Process-wide shared graphics context.
//!
//! Compositors that do not get a host-provided device share one lazily
//! created `GraphicsContext`, so only one wgpu device exists per process.

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;

use super::GraphicsContext;
use crate::error::{MatteError, MatteResult};

/// Holder for the shared graphics context.
pub struct SharedContext {
    context: RwLock<Option<Arc<GraphicsContext>>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self {
            context: RwLock::new(None),
        }
    }

    /// Get or create the shared context.
    pub fn get_or_init(&self) -> MatteResult<Arc<GraphicsContext>> {
        {
            let context = self.context.read();
            if let Some(c) = context.as_ref() {
                return Ok(Arc::clone(c));
            }
        }

        let mut context = self.context.write();

        // Another thread may have initialized it while we waited.
        if let Some(c) = context.as_ref() {
            return Ok(Arc::clone(c));
        }

        log::info!("[SharedContext] Initializing shared graphics context...");
        let created = GraphicsContext::new_blocking().map_err(|e| {
            MatteError::GpuUnavailable(format!("Failed to initialize shared graphics context: {}", e))
        })?;

        let created = Arc::new(created);
        *context = Some(Arc::clone(&created));

        log::info!("[SharedContext] Shared graphics context initialized");
        Ok(created)
    }

    pub fn is_initialized(&self) -> bool {
        self.context.read().is_some()
    }

    /// Drop the shared reference. Compositors still holding the device keep it alive.
    pub fn shutdown(&self) {
        if self.context.write().take().is_some() {
            log::info!("[SharedContext] Shared graphics context shut down");
        }
    }
}

impl Default for SharedContext {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    pub static ref SHARED_CONTEXT: SharedContext = SharedContext::new();
}

/// The process-wide graphics context, created on first use.
pub fn shared_context() -> MatteResult<Arc<GraphicsContext>> {
    SHARED_CONTEXT.get_or_init()
}
