use serde::{Deserialize, Serialize};

use crate::block::BLOCK_SIZE;

/// Integer coordinate of a block in the map grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Offsets to the six face-adjacent neighbors, in mesher face order
/// (0=+Y,1=-Y,2=+X,3=-X,4=+Z,5=-Z).
pub const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (0, 1, 0),
    (0, -1, 0),
    (1, 0, 0),
    (-1, 0, 0),
    (0, 0, 1),
    (0, 0, -1),
];

impl BlockPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    #[inline]
    pub fn face_neighbors(self) -> [BlockPos; 6] {
        FACE_OFFSETS.map(|(dx, dy, dz)| self.offset(dx, dy, dz))
    }

    /// Block containing the given world voxel coordinate.
    #[inline]
    pub fn containing(wx: i32, wy: i32, wz: i32) -> Self {
        let s = BLOCK_SIZE as i32;
        Self {
            x: wx.div_euclid(s),
            y: wy.div_euclid(s),
            z: wz.div_euclid(s),
        }
    }

    /// World coordinate of this block's minimum corner.
    #[inline]
    pub fn base(self) -> (i32, i32, i32) {
        let s = BLOCK_SIZE as i32;
        (self.x * s, self.y * s, self.z * s)
    }

    #[inline]
    pub fn distance_sq(self, other: BlockPos) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        let dz = i64::from(self.z - other.z);
        dx * dx + dy * dy + dz * dz
    }
}

impl From<(i32, i32, i32)> for BlockPos {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<BlockPos> for (i32, i32, i32) {
    fn from(value: BlockPos) -> Self {
        (value.x, value.y, value.z)
    }
}
