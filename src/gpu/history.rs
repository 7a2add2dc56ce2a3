//! Frame history ring buffer
//!
//! A fixed number of equally sized frame slots stored as one layered texture.
//! The write cursor advances after every successfully rendered frame; slots are
//! overwritten in place and never reallocated. Depth is fixed at build time -
//! the program builder bakes it into generated index arithmetic, so changing it
//! means rebuilding both the storage and the program together.

use log::debug;

/// Pure cursor arithmetic for the ring, kept separate from the texture so the
/// addressing invariants are testable without a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCursor {
    depth: u32,
    frame: u64,
}

impl RingCursor {
    /// Panics if `depth < 2`; slot arithmetic divides by `depth` and feedback
    /// needs at least one slot besides the one being written.
    pub fn new(depth: u32) -> Self {
        assert!(depth >= 2, "ring depth must be at least 2, got {}", depth);
        Self { depth, frame: 0 }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Completed frames so far; also the tick number of the frame currently
    /// being rendered.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The slot written this tick.
    pub fn write_slot(&self) -> u32 {
        (self.frame % self.depth as u64) as u32
    }

    /// The slot holding the frame `delay` ticks back. `delay >= depth` wraps
    /// onto a slot between 1 and `depth - 1` frames old; the wrapped value is
    /// clamped away from 0 so the current write slot is never returned.
    pub fn read_slot(&self, delay: u32) -> u32 {
        let wrapped = (delay % self.depth).max(1);
        (self.write_slot() + self.depth - wrapped) % self.depth
    }

    /// Advance after a successful render.
    pub fn advance(&mut self) {
        self.frame += 1;
    }
}

/// GPU storage for the ring: one 2D array texture, one layer per slot.
pub struct FrameHistory {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    cursor: RingCursor,
    size: (u32, u32),
}

impl FrameHistory {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, width: u32, height: u32, depth: u32) -> Self {
        debug!("allocating frame history: {}x{} x{} layers", width, height, depth);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame history"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: depth,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("frame history view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        Self {
            texture,
            view,
            cursor: RingCursor::new(depth),
            size: (width, height),
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn cursor(&self) -> RingCursor {
        self.cursor
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Copy the just-rendered frame into the current write slot and advance
    /// the cursor. Encoded into `encoder`; the cursor moves immediately, so
    /// call this once per successfully drawn frame only.
    pub fn record(&mut self, encoder: &mut wgpu::CommandEncoder, frame: &wgpu::Texture) {
        let layer = self.cursor.write_slot();
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: frame,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: self.size.0,
                height: self.size.1,
                depth_or_array_layers: 1,
            },
        );
        self.cursor.advance();
    }
}
