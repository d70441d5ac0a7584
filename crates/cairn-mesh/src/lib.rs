//! CPU block mesher: culled quads, vertex AO, crack overlay, solid sides.
#![forbid(unsafe_code)]

use cairn_map::BlockPos;
use thiserror::Error;

mod build;
mod neighborhood;

pub use build::{FACE_COUNT, build_block_mesh};
pub use neighborhood::Neighborhood;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("corrupt block data at {pos:?}: {reason}")]
    CorruptBlock { pos: BlockPos, reason: &'static str },
}

/// Feature flags forwarded from configuration into each build.
#[derive(Clone, Copy, Debug, Default)]
pub struct MesherFlags {
    pub smooth_lighting: bool,
    pub water_reflections: bool,
}

/// Transient crack state for one voxel, merged into the next build of the
/// containing block rather than queued as separate work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlay {
    pub wx: i32,
    pub wy: i32,
    pub wz: i32,
    pub level: u8,
}

impl Overlay {
    #[inline]
    pub fn block_pos(&self) -> BlockPos {
        BlockPos::containing(self.wx, self.wy, self.wz)
    }
}

/// CPU-side vertex/index buffers for one block.
#[derive(Default, Clone, Debug)]
pub struct BlockMesh {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub idx: Vec<u16>,
    pub col: Vec<u8>,
}

impl BlockMesh {
    /// One quad: corners in winding order, shared normal, per-corner color.
    pub fn add_quad(&mut self, corners: [[f32; 3]; 4], n: [f32; 3], rgba: [[u8; 4]; 4]) {
        let base = (self.pos.len() / 3) as u16;
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        for i in 0..4 {
            self.pos.extend_from_slice(&corners[i]);
            self.norm.extend_from_slice(&n);
            self.uv.extend_from_slice(&uvs[i]);
            self.col.extend_from_slice(&rgba[i]);
        }
        self.idx
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.idx.len() / 6
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }
}

/// Finished build output: the mesh plus which faces of the block are fully
/// opaque (bit per face, consumer-side occlusion culling).
#[derive(Debug)]
pub struct MeshOutput {
    pub mesh: BlockMesh,
    pub solid_sides: u8,
}
