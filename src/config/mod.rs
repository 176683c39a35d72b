//! Compositor configuration management.
//!
//! One typed config behind a `parking_lot::RwLock`, loadable from JSON.
//! Components snapshot it at construction; `with_config` constructors take an
//! explicit value instead.

pub mod compositor;

pub use compositor::{
    get_compositor_config, load_compositor_config, save_compositor_config,
    set_compositor_config, CompositorConfig, GpuPowerPreference, OutputFormat,
    COMPOSITOR_CONFIG,
};
