//! depth-matte: alpha-mask compositing for depth-sensor video capture.
//!
//! A capture stage hands over a color frame and a single-channel mask (body
//! index or depth derived). [`AlphaMaskCompositor::filter`] returns the color
//! frame with `alpha *= mask.r`, rendered on the GPU once per video frame.
//!
//! ```ignore
//! let context = depth_matte::shared_context()?;
//! let gfx = context.enter();
//! let mut compositor = AlphaMaskCompositor::new(&gfx)?;
//! if let Some(frame) = compositor.filter(&gfx, &color, &mask) {
//!     output.push(frame);
//! }
//! ```
//!
//! Native resources acquired during device setup (wait handles, COM
//! interfaces, sensor sessions) are owned through the re-exported
//! [`native_owned`] crate.

pub mod config;
pub mod error;
pub mod logging;
pub mod rendering;

pub use native_owned;

pub use config::{CompositorConfig, COMPOSITOR_CONFIG};
pub use error::{MatteError, MatteResult};
pub use logging::init_logging;
pub use rendering::{
    enter_graphics, shared_context, try_enter_graphics, AlphaMaskCompositor, EffectSource,
    GraphicsContext, GraphicsGuard, RenderTarget, RenderTargetError,
};
