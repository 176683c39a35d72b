//! Compositor configuration.
//!
//! Settings read when a `GraphicsContext` or `AlphaMaskCompositor` is created.
//! Changing them later does not affect existing instances.

use std::path::Path;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::MatteResult;

/// Pixel format of the composite render target.
///
/// Only linear formats: an sRGB target would re-encode the color channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    #[default]
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
}

impl OutputFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            OutputFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            OutputFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            OutputFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

/// Adapter selection hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GpuPowerPreference {
    None,
    LowPower,
    #[default]
    HighPerformance,
}

impl GpuPowerPreference {
    pub fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            GpuPowerPreference::None => wgpu::PowerPreference::None,
            GpuPowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositorConfig {
    /// Format of the composite texture.
    pub output_format: OutputFormat,
    /// Near plane of the pixel-space orthographic projection.
    pub ortho_near: f32,
    /// Far plane of the pixel-space orthographic projection.
    pub ortho_far: f32,
    /// Largest accepted render target edge, on top of the device limit.
    pub max_target_dimension: Option<u32>,
    pub power_preference: GpuPowerPreference,
    /// Accept a software adapter when creating our own device.
    pub force_fallback_adapter: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            ortho_near: -100.0,
            ortho_far: 100.0,
            max_target_dimension: None,
            power_preference: GpuPowerPreference::default(),
            force_fallback_adapter: false,
        }
    }
}

impl CompositorConfig {
    /// Fix values the pipeline cannot use.
    pub fn validate(&mut self) {
        if !(self.ortho_near.is_finite() && self.ortho_far.is_finite())
            || self.ortho_near >= self.ortho_far
        {
            let defaults = Self::default();
            self.ortho_near = defaults.ortho_near;
            self.ortho_far = defaults.ortho_far;
        }
        if self.max_target_dimension == Some(0) {
            self.max_target_dimension = None;
        }
    }

    pub fn from_json(json: &str) -> MatteResult<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.validate();
        Ok(config)
    }

    pub fn to_json(&self) -> MatteResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reset all settings to defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

lazy_static! {
    /// Global compositor configuration.
    ///
    /// # Example
    /// ```ignore
    /// COMPOSITOR_CONFIG.write().max_target_dimension = Some(4096);
    /// let compositor = AlphaMaskCompositor::new(&gfx)?;
    /// ```
    pub static ref COMPOSITOR_CONFIG: RwLock<CompositorConfig> = RwLock::new(CompositorConfig::default());
}

// ============================================================================
// Getters / Setters
// ============================================================================

/// Snapshot of the current configuration.
pub fn get_compositor_config() -> CompositorConfig {
    COMPOSITOR_CONFIG.read().clone()
}

/// Replace the configuration at once.
pub fn set_compositor_config(mut config: CompositorConfig) {
    config.validate();
    log::debug!("[CONFIG] set_compositor_config({:?})", config);
    *COMPOSITOR_CONFIG.write() = config;
}

pub fn get_max_target_dimension() -> Option<u32> {
    COMPOSITOR_CONFIG.read().max_target_dimension
}

pub fn set_max_target_dimension(limit: Option<u32>) {
    log::debug!("[CONFIG] set_max_target_dimension({:?})", limit);
    COMPOSITOR_CONFIG.write().max_target_dimension = limit.filter(|&l| l > 0);
}

pub fn reset_compositor_config() {
    COMPOSITOR_CONFIG.write().reset();
    log::debug!("[CONFIG] Compositor settings reset to defaults");
}

/// Load a JSON config file and make it current.
pub fn load_compositor_config(path: &Path) -> MatteResult<CompositorConfig> {
    let json = std::fs::read_to_string(path)?;
    let config = CompositorConfig::from_json(&json)?;
    log::info!("[CONFIG] Loaded compositor config from {:?}", path);
    *COMPOSITOR_CONFIG.write() = config.clone();
    Ok(config)
}

/// Write the current config as JSON.
pub fn save_compositor_config(path: &Path) -> MatteResult<()> {
    let json = COMPOSITOR_CONFIG.read().to_json()?;
    std::fs::write(path, json)?;
    Ok(())
}
