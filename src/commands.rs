use std::ops::Range;

use anyhow::{bail, Result};
use glam::{Mat4, Vec3};

use crate::textures::TextureInfo;

// Quad command layout, 16 values per quad:
//  0: texture index
//  1-4: srcX srcY srcW srcH (texels)
//  5-8: dstX dstY dstW dstH (logical units)
//  9: rotation (radians)
// 10-11: anchorX anchorY (normalized)
// 12-15: r g b a
pub const QUAD_STRIDE: usize = 16;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadInstance {
    pub model: [[f32; 4]; 4],
    pub uv_rect: [f32; 4],
    pub color: [f32; 4],
}

/// Consecutive quads sharing a texture, drawn with a single bind + draw.
pub struct QuadBatch {
    pub texture_index: usize,
    pub instances: Range<u32>,
}

#[derive(Default)]
pub struct FrameBatches {
    pub instances: Vec<QuadInstance>,
    pub batches: Vec<QuadBatch>,
}

impl FrameBatches {
    pub fn quad_count(&self) -> usize {
        self.instances.len()
    }
}

/// Rejects command streams that are not a whole number of quads. A short
/// tail would silently drop a partial quad otherwise.
pub fn quad_count(data: &[f64]) -> Result<usize> {
    if data.len() % QUAD_STRIDE != 0 {
        bail!(
            "Command stream length {} is not a multiple of {QUAD_STRIDE}",
            data.len()
        );
    }
    Ok(data.len() / QUAD_STRIDE)
}

/// Model transform for one quad: position the pivot at (dstX, dstY), rotate
/// about it, offset by the anchor, then size the unit quad. The unit quad
/// spans (0,0)-(1,1) with its origin at the top-left corner.
pub fn quad_model(dst: [f64; 4], rotation: f64, anchor: [f64; 2]) -> Mat4 {
    let [dst_x, dst_y, dst_w, dst_h] = dst;
    let anchor_offset =
        Vec3::new((-anchor[0] * dst_w) as f32, (-anchor[1] * dst_h) as f32, 0.0);
    Mat4::from_translation(Vec3::new(dst_x as f32, dst_y as f32, 0.0))
        * Mat4::from_rotation_z(rotation as f32)
        * Mat4::from_translation(anchor_offset)
        * Mat4::from_scale(Vec3::new(dst_w as f32, dst_h as f32, 1.0))
}

/// Decodes the flat command stream into instance data, coalescing runs of
/// quads that share a texture so the renderer binds each texture once per
/// run. Emission order is preserved, so overlap between quads draws exactly
/// as the script issued it.
pub fn build_batches(data: &[f64], textures: &[TextureInfo]) -> Result<FrameBatches> {
    let count = quad_count(data)?;
    let mut frame = FrameBatches::default();
    if count == 0 {
        return Ok(frame);
    }
    if textures.is_empty() {
        bail!("Command stream references textures but none are loaded");
    }

    for quad in data.chunks_exact(QUAD_STRIDE) {
        let texture_index = (quad[0] as isize).clamp(0, textures.len() as isize - 1) as usize;
        let texture = &textures[texture_index];

        let u0 = quad[1] / texture.width;
        let v0 = quad[2] / texture.height;
        let du = quad[3] / texture.width;
        let dv = quad[4] / texture.height;

        let instance = QuadInstance {
            model: quad_model([quad[5], quad[6], quad[7], quad[8]], quad[9], [quad[10], quad[11]])
                .to_cols_array_2d(),
            uv_rect: [u0 as f32, v0 as f32, du as f32, dv as f32],
            color: [quad[12] as f32, quad[13] as f32, quad[14] as f32, quad[15] as f32],
        };

        let index = frame.instances.len() as u32;
        frame.instances.push(instance);
        match frame.batches.last_mut() {
            Some(batch) if batch.texture_index == texture_index => {
                batch.instances.end = index + 1;
            }
            _ => {
                frame
                    .batches
                    .push(QuadBatch { texture_index, instances: index..index + 1 });
            }
        }
    }
    Ok(frame)
}
