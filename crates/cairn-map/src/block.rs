use serde::{Deserialize, Serialize};

use crate::pos::BlockPos;

/// Edge length of a block in voxels.
pub const BLOCK_SIZE: usize = 16;
/// Voxel count of a full block.
pub const BLOCK_VOLUME: usize = BLOCK_SIZE * BLOCK_SIZE * BLOCK_SIZE;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voxel(pub u16);

impl Voxel {
    pub const AIR: Voxel = Voxel(0);
    pub const STONE: Voxel = Voxel(1);
    pub const DIRT: Voxel = Voxel(2);
    pub const GRASS: Voxel = Voxel(3);
    pub const WATER: Voxel = Voxel(7);
    /// Ids at or above this are malformed data.
    pub const MAX_ID: u16 = 4096;

    #[inline]
    pub fn is_air(self) -> bool {
        self == Voxel::AIR
    }

    #[inline]
    pub fn is_liquid(self) -> bool {
        self == Voxel::WATER
    }

    #[inline]
    pub fn is_opaque(self) -> bool {
        !self.is_air() && !self.is_liquid()
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 < Voxel::MAX_ID
    }
}

/// Voxel contents of one block.
#[derive(Clone, Debug)]
pub struct BlockData {
    pub voxels: Vec<Voxel>,
}

impl BlockData {
    pub fn filled(v: Voxel) -> Self {
        Self {
            voxels: vec![v; BLOCK_VOLUME],
        }
    }

    pub fn air() -> Self {
        Self::filled(Voxel::AIR)
    }

    pub fn from_voxels(voxels: Vec<Voxel>) -> Self {
        let mut v = voxels;
        if v.len() != BLOCK_VOLUME {
            v.resize(BLOCK_VOLUME, Voxel::AIR);
        }
        Self { voxels: v }
    }

    #[inline]
    pub fn idx(x: usize, y: usize, z: usize) -> usize {
        (y * BLOCK_SIZE + z) * BLOCK_SIZE + x
    }

    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> Voxel {
        self.voxels[Self::idx(x, y, z)]
    }

    #[inline]
    pub fn set_local(&mut self, x: usize, y: usize, z: usize, v: Voxel) {
        self.voxels[Self::idx(x, y, z)] = v;
    }

    /// Voxel at a world coordinate, if it falls inside the block at `pos`.
    /// Reads a truncated buffer as absent rather than out of bounds.
    #[inline]
    pub fn get_world(&self, pos: BlockPos, wx: i32, wy: i32, wz: i32) -> Option<Voxel> {
        let (bx, by, bz) = pos.base();
        let s = BLOCK_SIZE as i32;
        if wx < bx || wx >= bx + s || wy < by || wy >= by + s || wz < bz || wz >= bz + s {
            return None;
        }
        self.voxels
            .get(Self::idx(
                (wx - bx) as usize,
                (wy - by) as usize,
                (wz - bz) as usize,
            ))
            .copied()
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.voxels.iter().any(|v| *v != Voxel::AIR)
    }

    #[inline]
    pub fn is_all_air(&self) -> bool {
        !self.has_non_air()
    }

    /// Structural validity: correct buffer length and in-range ids.
    pub fn is_well_formed(&self) -> bool {
        self.voxels.len() == BLOCK_VOLUME && self.voxels.iter().all(|v| v.is_valid())
    }
}
