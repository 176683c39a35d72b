//! Reusable off-screen render target.
//!
//! Holds at most one backing texture. `begin` sizes it for the coming frame,
//! reusing the texture when the size is unchanged and replacing it otherwise.

use thiserror::Error;
use wgpu::{Device, Texture, TextureFormat, TextureView};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderTargetError {
    #[error("Render target size {width}x{height} is empty")]
    ZeroSize { width: u32, height: u32 },

    #[error("Render target size {width}x{height} exceeds limit {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },

    #[error("Render target allocation failed: {0}")]
    Allocation(String),
}

#[derive(Debug)]
pub struct RenderTarget {
    format: TextureFormat,
    max_dimension: Option<u32>,
    texture: Option<Texture>,
    view: Option<TextureView>,
    rendered: bool,
    allocations: u64,
}

impl RenderTarget {
    pub fn new(format: TextureFormat, max_dimension: Option<u32>) -> Self {
        Self {
            format,
            max_dimension,
            texture: None,
            view: None,
            rendered: false,
            allocations: 0,
        }
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Forget the previous frame's output. The backing texture is kept.
    pub fn reset(&mut self) {
        self.rendered = false;
    }

    /// Prepare a `width` x `height` target and return the view to render into.
    pub fn begin(
        &mut self,
        device: &Device,
        width: u32,
        height: u32,
    ) -> Result<&TextureView, RenderTargetError> {
        self.rendered = false;

        if width == 0 || height == 0 {
            return Err(RenderTargetError::ZeroSize { width, height });
        }

        let device_limit = device.limits().max_texture_dimension_2d;
        let limit = self
            .max_dimension
            .map_or(device_limit, |max| max.min(device_limit));
        if width > limit || height > limit {
            return Err(RenderTargetError::TooLarge {
                width,
                height,
                limit,
            });
        }

        if self.size() != Some((width, height)) {
            self.release();
            self.allocate(device, width, height)?;
        }

        self.view
            .as_ref()
            .ok_or_else(|| RenderTargetError::Allocation("render target view missing".to_string()))
    }

    fn allocate(&mut self, device: &Device, width: u32, height: u32) -> Result<(), RenderTargetError> {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Render Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            texture.destroy();
            return Err(RenderTargetError::Allocation(err.to_string()));
        }

        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        self.allocations += 1;
        log::debug!(
            "[RENDER_TARGET] Allocated {}x{} {:?} (allocation #{})",
            width,
            height,
            self.format,
            self.allocations
        );
        Ok(())
    }

    /// Mark the frame as rendered; `texture` returns it until the next `reset`/`begin`.
    pub fn end(&mut self) {
        self.rendered = self.texture.is_some();
    }

    /// Output of the last completed frame.
    pub fn texture(&self) -> Option<&Texture> {
        if self.rendered {
            self.texture.as_ref()
        } else {
            None
        }
    }

    /// Size of the backing texture, rendered or not.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.texture.as_ref().map(|t| (t.width(), t.height()))
    }

    /// Number of backing textures currently held (0 or 1).
    pub fn live_textures(&self) -> usize {
        usize::from(self.texture.is_some())
    }

    /// Total backing textures created over this target's lifetime.
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    /// Destroy the backing texture.
    pub fn release(&mut self) {
        self.view = None;
        self.rendered = false;
        if let Some(texture) = self.texture.take() {
            texture.destroy();
        }
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.release();
    }
}
