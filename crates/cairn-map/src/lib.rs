//! Block storage with thread-safe pin counting.
#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

pub mod block;
pub mod pos;

pub use block::{BLOCK_SIZE, BLOCK_VOLUME, BlockData, Voxel};
pub use pos::{BlockPos, FACE_OFFSETS};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("block {0:?} is not resident")]
    NotResident(BlockPos),
    #[error("block {0:?} has {1} live pin(s)")]
    Pinned(BlockPos, u32),
}

struct MapSlot {
    data: Arc<BlockData>,
    pins: Arc<AtomicU32>,
}

/// Resident block index, owned by the main thread.
///
/// Structural mutation (`insert_block`, `remove_block`, `set_voxel`,
/// `evict_unpinned`) requires `&mut Map` and therefore cannot happen off the
/// owning thread. Worker threads only ever see [`BlockHandle`]s, whose drop
/// is an atomic pin decrement.
#[derive(Default)]
pub struct Map {
    slots: HashMap<BlockPos, MapSlot>,
}

/// Pinned, read-only view of a resident block. `Send`; dropping releases the
/// pin. Acquired only through [`Map::lookup_block`].
pub struct BlockHandle {
    pos: BlockPos,
    data: Arc<BlockData>,
    _pin: PinGuard,
}

struct PinGuard(Arc<AtomicU32>);

impl Drop for PinGuard {
    fn drop(&mut self) {
        let prev = self.0.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            // Underflow would mean a double release; restore and complain.
            self.0.fetch_add(1, Ordering::AcqRel);
            log::error!("map: pin count underflow on release");
        }
    }
}

impl BlockHandle {
    #[inline]
    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    #[inline]
    pub fn data(&self) -> &BlockData {
        &self.data
    }

    /// Voxel at a world coordinate, if it falls inside this block.
    #[inline]
    pub fn get_world(&self, wx: i32, wy: i32, wz: i32) -> Option<Voxel> {
        self.data.get_world(self.pos, wx, wy, wz)
    }
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn is_resident(&self, pos: BlockPos) -> bool {
        self.slots.contains_key(&pos)
    }

    /// Live pin count for a resident block, 0 when absent.
    pub fn pin_count(&self, pos: BlockPos) -> u32 {
        self.slots
            .get(&pos)
            .map(|s| s.pins.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    pub fn insert_block(&mut self, pos: BlockPos, data: BlockData) {
        self.slots.insert(
            pos,
            MapSlot {
                data: Arc::new(data),
                pins: Arc::new(AtomicU32::new(0)),
            },
        );
    }

    /// Pin and return the block at `pos`; absent (never blocking) when the
    /// block is not resident.
    pub fn lookup_block(&self, pos: BlockPos) -> Option<BlockHandle> {
        let slot = self.slots.get(&pos)?;
        slot.pins.fetch_add(1, Ordering::AcqRel);
        Some(BlockHandle {
            pos,
            data: Arc::clone(&slot.data),
            _pin: PinGuard(Arc::clone(&slot.pins)),
        })
    }

    #[inline]
    pub fn get_voxel(&self, wx: i32, wy: i32, wz: i32) -> Option<Voxel> {
        let pos = BlockPos::containing(wx, wy, wz);
        self.slots.get(&pos).map(|s| {
            let (bx, by, bz) = pos.base();
            s.data
                .get_local((wx - bx) as usize, (wy - by) as usize, (wz - bz) as usize)
        })
    }

    /// Edit one voxel. Copy-on-write: builds already holding a pin keep
    /// reading their original snapshot. False when the containing block is
    /// not resident.
    pub fn set_voxel(&mut self, wx: i32, wy: i32, wz: i32, v: Voxel) -> bool {
        let pos = BlockPos::containing(wx, wy, wz);
        let Some(slot) = self.slots.get_mut(&pos) else {
            return false;
        };
        let (bx, by, bz) = pos.base();
        Arc::make_mut(&mut slot.data).set_local(
            (wx - bx) as usize,
            (wy - by) as usize,
            (wz - bz) as usize,
            v,
        );
        true
    }

    /// Structurally remove a block. Refuses while any pin is live.
    pub fn remove_block(&mut self, pos: BlockPos) -> Result<(), MapError> {
        let slot = self.slots.get(&pos).ok_or(MapError::NotResident(pos))?;
        let pins = slot.pins.load(Ordering::Acquire);
        if pins > 0 {
            return Err(MapError::Pinned(pos, pins));
        }
        self.slots.remove(&pos);
        Ok(())
    }

    /// Drop every unpinned block for which `keep` is false. Returns the
    /// number of blocks evicted. This is the main-thread structural drain;
    /// pinned blocks are skipped and retried on a later sweep.
    pub fn evict_unpinned(&mut self, keep: impl Fn(BlockPos) -> bool) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|pos, slot| keep(*pos) || slot.pins.load(Ordering::Acquire) > 0);
        before - self.slots.len()
    }
}
