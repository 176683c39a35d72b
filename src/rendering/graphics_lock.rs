//! Process-wide graphics guard.
//!
//! Every graphics operation (compositor construction and destruction, `filter`,
//! texture upload and readback) runs while holding this guard. It is
//! re-entrant: the owning thread may enter again, other threads block until
//! the outermost guard is dropped.

use lazy_static::lazy_static;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

lazy_static! {
    static ref GRAPHICS_LOCK: ReentrantMutex<()> = ReentrantMutex::new(());
}

/// Proof that the current thread is inside the graphics context.
///
/// Not `Send`: it must be dropped on the thread that entered.
#[must_use = "the graphics context is left as soon as the guard is dropped"]
pub struct GraphicsLockGuard {
    _guard: ReentrantMutexGuard<'static, ()>,
}

impl std::fmt::Debug for GraphicsLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsLockGuard")
    }
}

/// Enter the graphics context, blocking while another thread holds it.
pub fn enter_graphics() -> GraphicsLockGuard {
    GraphicsLockGuard {
        _guard: GRAPHICS_LOCK.lock(),
    }
}

/// Enter the graphics context only if no other thread holds it.
pub fn try_enter_graphics() -> Option<GraphicsLockGuard> {
    GRAPHICS_LOCK
        .try_lock()
        .map(|guard| GraphicsLockGuard { _guard: guard })
}
