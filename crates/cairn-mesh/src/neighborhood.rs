use cairn_map::{BlockHandle, BlockPos, FACE_OFFSETS, Map, Voxel};

/// The pinned block handles one build reads: the center block plus whatever
/// neighbors were resident at request time. Owning a `Neighborhood` is what
/// keeps the blocks loaded from request through build to result consumption;
/// dropping it releases every pin.
pub struct Neighborhood {
    center: BlockHandle,
    // 3x3x3 cube around the center, indexed by (dx+1, dy+1, dz+1).
    // Face-only gathering leaves the diagonal slots None; slot 13 (the
    // center offset) is always None.
    neighbors: [Option<BlockHandle>; 27],
}

#[inline]
fn slot(dx: i32, dy: i32, dz: i32) -> usize {
    (((dy + 1) * 3 + (dz + 1)) * 3 + (dx + 1)) as usize
}

impl Neighborhood {
    pub fn new(center: BlockHandle) -> Self {
        Self {
            center,
            neighbors: std::array::from_fn(|_| None),
        }
    }

    /// Pin `pos` and the neighbor set needed for a correct boundary build:
    /// the full 26-cube when smooth lighting is on, the 6 face neighbors
    /// otherwise. Missing neighbors are skipped; a missing center means the
    /// block is not loaded and no neighborhood is created.
    pub fn gather(map: &Map, pos: BlockPos, full: bool) -> Option<Self> {
        let center = map.lookup_block(pos)?;
        let mut out = Self::new(center);
        if full {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    for dx in -1..=1 {
                        if dx == 0 && dy == 0 && dz == 0 {
                            continue;
                        }
                        if let Some(h) = map.lookup_block(pos.offset(dx, dy, dz)) {
                            out.neighbors[slot(dx, dy, dz)] = Some(h);
                        }
                    }
                }
            }
        } else {
            for (dx, dy, dz) in FACE_OFFSETS {
                if let Some(h) = map.lookup_block(pos.offset(dx, dy, dz)) {
                    out.neighbors[slot(dx, dy, dz)] = Some(h);
                }
            }
        }
        let want = if full { 27 } else { 7 };
        if out.handle_count() < want {
            log::trace!(
                "neighborhood for {:?}: {}/{} blocks resident",
                pos,
                out.handle_count(),
                want
            );
        }
        Some(out)
    }

    #[inline]
    pub fn center(&self) -> &BlockHandle {
        &self.center
    }

    #[inline]
    pub fn pos(&self) -> BlockPos {
        self.center.pos()
    }

    /// Number of pinned blocks, center included.
    pub fn handle_count(&self) -> usize {
        1 + self.neighbors.iter().filter(|n| n.is_some()).count()
    }

    /// Voxel at a world coordinate; None when it falls in a block that is
    /// not part of this neighborhood (unloaded boundary) or outside the
    /// 3x3x3 cube. Malformed neighbor buffers read as absent.
    pub fn voxel_at(&self, wx: i32, wy: i32, wz: i32) -> Option<Voxel> {
        let bp = BlockPos::containing(wx, wy, wz);
        let c = self.center.pos();
        if bp == c {
            return self.center.get_world(wx, wy, wz);
        }
        let (dx, dy, dz) = (bp.x - c.x, bp.y - c.y, bp.z - c.z);
        if dx.abs() > 1 || dy.abs() > 1 || dz.abs() > 1 {
            return None;
        }
        self.neighbors[slot(dx, dy, dz)]
            .as_ref()
            .and_then(|h| h.get_world(wx, wy, wz))
    }

    /// Whether the face-adjacent neighbor block in `FACE_OFFSETS[face]`
    /// direction is part of this neighborhood.
    pub fn has_face_neighbor(&self, face: usize) -> bool {
        let (dx, dy, dz) = FACE_OFFSETS[face];
        self.neighbors[slot(dx, dy, dz)].is_some()
    }
}
