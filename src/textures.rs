use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Logical dimensions of a loaded texture, used to normalize source
/// rectangles in the command stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureInfo {
    pub width: f64,
    pub height: f64,
}

pub struct Texture {
    pub bind_group: wgpu::BindGroup,
    pub info: TextureInfo,
}

/// The engine's fixed texture palette, indexed by the command stream. Built
/// once per surface generation; the previous generation's handles are
/// dropped wholesale, never reused.
pub struct TextureSet {
    textures: Vec<Texture>,
    infos: Vec<TextureInfo>,
}

impl TextureSet {
    /// Decodes and uploads every image in order. Any failure is fatal; the
    /// engine cannot run without its full palette.
    pub fn load_all(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        paths: &[String],
    ) -> Result<Self> {
        let mut textures = Vec::with_capacity(paths.len());
        for path in paths {
            let texture = load_png(device, queue, layout, sampler, Path::new(path))
                .with_context(|| format!("Loading texture {path}"))?;
            textures.push(texture);
        }
        let infos = textures.iter().map(|t| t.info).collect();
        Ok(Self { textures, infos })
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn infos(&self) -> &[TextureInfo] {
        &self.infos
    }

    pub fn bind_group(&self, index: usize) -> &wgpu::BindGroup {
        &self.textures[index].bind_group
    }
}

fn load_png(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    path: &Path,
) -> Result<Texture> {
    let bytes = fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
    let img = image::load_from_memory(&bytes).context("Decoding image")?.to_rgba8();
    let (w, h) = img.dimensions();
    let rgba = img.into_raw();

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Palette Texture"),
        size: wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &rgba,
        wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(4 * w), rows_per_image: Some(h) },
        wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Palette Texture BG"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    });

    Ok(Texture { bind_group, info: TextureInfo { width: f64::from(w), height: f64::from(h) } })
}
