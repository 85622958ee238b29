//! Vertex output: layout, quad building, and the bounds-checked writer

use bytemuck::{Pod, Zeroable};
use cinder_core::Vec3;

/// One output vertex, interleaved as `(u, v, x, y, z, alpha)`.
/// 24 bytes, tightly packed for direct GPU upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    pub u: f32,
    pub v: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub alpha: f32,
}

/// Floats per vertex in the interleaved layout
pub const FLOATS_PER_VERTEX: usize = 6;

/// Each particle expands to two triangles
pub const VERTICES_PER_PARTICLE: usize = 6;

/// Per-vertex `(u, v)` slot indices into a tile's `[u0, v0, u1, v1]` quad.
/// Slot 0/2 are left/right u, slot 1/3 are top/bottom v.
pub const QUAD_UV_SLOTS: [[usize; 2]; VERTICES_PER_PARTICLE] =
    [[0, 3], [0, 1], [2, 3], [2, 3], [0, 1], [2, 1]];

/// Per-vertex corner signs matching `QUAD_UV_SLOTS`: bottom-left,
/// top-left, bottom-right, then the second triangle
const QUAD_CORNERS: [[f32; 2]; VERTICES_PER_PARTICLE] = [
    [-1.0, -1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [1.0, 1.0],
];

/// Expand one particle into its camera-plane quad.
///
/// `size` is the full edge length; `rotation` is radians around the quad
/// normal; `uv` is the tile quad from [`crate::animation::tile_uv`].
pub fn build_quad(
    center: Vec3,
    size: f32,
    rotation: f32,
    uv: [f32; 4],
    alpha: f32,
) -> [ParticleVertex; VERTICES_PER_PARTICLE] {
    let half = size * 0.5;
    let (sin, cos) = rotation.sin_cos();

    let mut quad = [ParticleVertex::default(); VERTICES_PER_PARTICLE];
    for (i, vertex) in quad.iter_mut().enumerate() {
        let ox = QUAD_CORNERS[i][0] * half;
        let oy = QUAD_CORNERS[i][1] * half;
        vertex.u = uv[QUAD_UV_SLOTS[i][0]];
        vertex.v = uv[QUAD_UV_SLOTS[i][1]];
        vertex.x = center.x + ox * cos - oy * sin;
        vertex.y = center.y + ox * sin + oy * cos;
        vertex.z = center.z;
        vertex.alpha = alpha;
    }
    quad
}

/// Cursor over a caller-provided vertex buffer.
///
/// Writes whole particles only: a quad that does not fit is dropped and
/// the writer is marked truncated, so the buffer never holds a torn quad.
pub struct VertexWriter<'a> {
    out: &'a mut [ParticleVertex],
    written: usize,
    truncated: bool,
}

impl<'a> VertexWriter<'a> {
    pub fn new(out: &'a mut [ParticleVertex]) -> Self {
        Self {
            out,
            written: 0,
            truncated: false,
        }
    }

    /// Wrap a raw float buffer, using the largest prefix that holds
    /// whole vertices
    pub fn from_floats(floats: &'a mut [f32]) -> Self {
        let usable = floats.len() - floats.len() % FLOATS_PER_VERTEX;
        Self::new(bytemuck::cast_slice_mut(&mut floats[..usable]))
    }

    /// Total vertex capacity of the underlying buffer
    pub fn capacity(&self) -> usize {
        self.out.len()
    }

    /// Vertices written so far
    pub fn vertex_count(&self) -> usize {
        self.written
    }

    /// Bytes covered by the written vertices
    pub fn bytes_written(&self) -> usize {
        self.written * std::mem::size_of::<ParticleVertex>()
    }

    /// True once a quad has been dropped for lack of space
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Append one particle quad. Returns false and marks the writer
    /// truncated when the quad does not fit.
    pub fn push_quad(&mut self, quad: &[ParticleVertex; VERTICES_PER_PARTICLE]) -> bool {
        if self.written + VERTICES_PER_PARTICLE > self.out.len() {
            self.truncated = true;
            return false;
        }
        self.out[self.written..self.written + VERTICES_PER_PARTICLE].copy_from_slice(quad);
        self.written += VERTICES_PER_PARTICLE;
        true
    }

    /// The vertices written so far
    pub fn written_slice(&self) -> &[ParticleVertex] {
        &self.out[..self.written]
    }
}
