//! wgpu device ownership and guarded access.
//!
//! A `GraphicsContext` owns (or adopts) the device and queue. All work against
//! them goes through a `GraphicsGuard`, obtained with [`GraphicsContext::enter`].

use std::sync::Arc;

use wgpu::{Device, Queue};

use super::graphics_lock::{enter_graphics, GraphicsLockGuard};
use crate::config::{get_compositor_config, CompositorConfig};
use crate::error::{MatteError, MatteResult};

/// GPU device and queue shared by compositors.
pub struct GraphicsContext {
    device: Arc<Device>,
    queue: Arc<Queue>,
    adapter_info: Option<wgpu::AdapterInfo>,
}

impl GraphicsContext {
    /// Create a device using the global compositor config.
    pub async fn new() -> MatteResult<Self> {
        Self::with_config(&get_compositor_config()).await
    }

    /// Create a device using an explicit config.
    pub async fn with_config(config: &CompositorConfig) -> MatteResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference.to_wgpu(),
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .map_err(|e| MatteError::GpuUnavailable(format!("Failed to find GPU adapter: {}", e)))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "[GRAPHICS] Using GPU adapter: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("depth-matte device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        // Errors outside an error scope are logged; frames are dropped, not the process.
        device.on_uncaptured_error(Box::new(|err| {
            log::error!("[GRAPHICS] Uncaptured GPU error: {}", err);
        }));

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info: Some(adapter_info),
        })
    }

    pub fn new_blocking() -> MatteResult<Self> {
        pollster::block_on(Self::new())
    }

    pub fn with_config_blocking(config: &CompositorConfig) -> MatteResult<Self> {
        pollster::block_on(Self::with_config(config))
    }

    /// Adopt a device owned by the host.
    pub fn from_device(device: Arc<Device>, queue: Arc<Queue>) -> Self {
        Self {
            device,
            queue,
            adapter_info: None,
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Adapter details, when this context created its own device.
    pub fn adapter_info(&self) -> Option<&wgpu::AdapterInfo> {
        self.adapter_info.as_ref()
    }

    /// Enter the process-wide graphics context for work on this device.
    pub fn enter(&self) -> GraphicsGuard<'_> {
        GraphicsGuard {
            context: self,
            _lock: enter_graphics(),
        }
    }
}

/// A live graphics-context guard bound to one device.
pub struct GraphicsGuard<'a> {
    context: &'a GraphicsContext,
    _lock: GraphicsLockGuard,
}

impl<'a> GraphicsGuard<'a> {
    pub fn context(&self) -> &'a GraphicsContext {
        self.context
    }

    pub fn device(&self) -> &'a Arc<Device> {
        &self.context.device
    }

    pub fn queue(&self) -> &'a Arc<Queue> {
        &self.context.queue
    }

    /// Whether `device` is the device this guard was entered for.
    pub fn owns_device(&self, device: &Arc<Device>) -> bool {
        Arc::ptr_eq(&self.context.device, device)
    }

    /// Upload a tightly packed RGBA8 image as a color texture.
    pub fn create_color_texture(&self, width: u32, height: u32, rgba: &[u8]) -> MatteResult<wgpu::Texture> {
        self.upload_texture(
            "Color Image",
            wgpu::TextureFormat::Rgba8Unorm,
            width,
            height,
            rgba,
        )
    }

    /// Upload a single-channel 8-bit mask. Intensity lands in the red channel.
    pub fn create_mask_texture(&self, width: u32, height: u32, mask: &[u8]) -> MatteResult<wgpu::Texture> {
        self.upload_texture("Mask Image", wgpu::TextureFormat::R8Unorm, width, height, mask)
    }

    fn upload_texture(
        &self,
        label: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> MatteResult<wgpu::Texture> {
        if width == 0 || height == 0 {
            return Err(MatteError::Other(format!(
                "{} must not be empty ({}x{})",
                label, width, height
            )));
        }
        let bytes_per_texel = texel_size(format)?;
        let expected = (width as usize) * (height as usize) * (bytes_per_texel as usize);
        if data.len() != expected {
            return Err(MatteError::Other(format!(
                "{} data is {} bytes, expected {} for {}x{}",
                label,
                data.len(),
                expected,
                width,
                height
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_texel * width),
                rows_per_image: Some(height),
            },
            size,
        );

        Ok(texture)
    }

    /// Copy a texture back to the CPU as tightly packed rows.
    ///
    /// The texture needs `COPY_SRC` usage and an uncompressed color format.
    pub fn read_texture(&self, texture: &wgpu::Texture) -> MatteResult<Vec<u8>> {
        let device = &self.context.device;
        let (width, height) = (texture.width(), texture.height());
        let bytes_per_texel = texel_size(texture.format())?;

        let bytes_per_row = bytes_per_texel * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = bytes_per_row.div_ceil(align) * align;
        let buffer_size = (padded_bytes_per_row as u64) * (height as u64);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Texture Read Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Texture Read Encoder"),
        });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.context.queue.submit(Some(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = flume::bounded(1);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| MatteError::Readback(format!("Device poll failed: {}", e)))?;
        rx.recv()
            .map_err(|_| MatteError::Readback("Map callback was dropped".to_string()))?
            .map_err(|e| MatteError::Readback(format!("Buffer map failed: {}", e)))?;

        let result = {
            let data = buffer_slice.get_mapped_range();
            let mut result = Vec::with_capacity((bytes_per_row * height) as usize);
            for row in 0..height {
                let start = (row * padded_bytes_per_row) as usize;
                let end = start + bytes_per_row as usize;
                result.extend_from_slice(&data[start..end]);
            }
            result
        };
        buffer.unmap();

        Ok(result)
    }
}

/// Bytes per texel for formats copied one texel at a time.
///
/// Block-compressed formats and combined depth-stencil formats have no single
/// per-texel size, so tightly packed rows cannot describe them.
pub(crate) fn texel_size(format: wgpu::TextureFormat) -> MatteResult<u32> {
    if format.block_dimensions() != (1, 1) {
        return Err(MatteError::Readback(format!(
            "Block-compressed format {:?} is not supported",
            format
        )));
    }
    format.block_copy_size(None).ok_or_else(|| {
        MatteError::Readback(format!("Unsupported texture format {:?}", format))
    })
}
