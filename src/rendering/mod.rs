//! GPU compositing for depth-sensor video frames.
//!
//! ## Components
//! - `graphics_lock`: process-wide re-entrant graphics guard
//! - `context`: wgpu device/queue ownership, texture upload and readback
//! - `shared`: lazily created process-wide context
//! - `effect`: WGSL effects with named parameters and techniques
//! - `render_target`: reusable off-screen target
//! - `alpha_mask`: the alpha-mask compositor

pub mod alpha_mask;
pub mod context;
pub mod effect;
pub mod graphics_lock;
pub mod render_target;
pub mod shared;


pub use alpha_mask::{AlphaMaskCompositor, ALPHA_MASK_SHADER};
pub use context::{GraphicsContext, GraphicsGuard};
pub use effect::{EffectSource, ParamBinding, Technique};
pub use graphics_lock::{enter_graphics, try_enter_graphics, GraphicsLockGuard};
pub use render_target::{RenderTarget, RenderTargetError};
pub use shared::{shared_context, SharedContext, SHARED_CONTEXT};
