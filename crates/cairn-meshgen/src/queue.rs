use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use cairn_map::{BlockPos, Map};
use cairn_mesh::{Neighborhood, Overlay};
use hashbrown::HashSet;

use crate::{AckTarget, QueuedMeshUpdate};

/// Thread-safe, deduplicating, priority-aware queue of pending mesh
/// updates.
///
/// One mutex guards all queue state; no operation holds it across a
/// blocking wait. A position is *pending* (queued, unclaimed), *in flight*
/// (claimed by exactly one worker), or absent. At most one pending entry
/// exists per position: repeat requests merge into it. A request for an
/// in-flight position queues a fresh entry so the edit is reprocessed after
/// the running build completes.
pub struct MeshUpdateQueue {
    inner: Mutex<QueueInner>,
    work_cv: Condvar,
    // Sampled once at construction; decides the neighbor pin radius.
    smooth_lighting: bool,
}

struct QueueInner {
    pending: VecDeque<QueuedMeshUpdate>,
    urgents: HashSet<BlockPos>,
    inflight: HashSet<BlockPos>,
    overlay: Option<Overlay>,
    stopped: bool,
}

impl MeshUpdateQueue {
    pub fn new(smooth_lighting: bool) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                urgents: HashSet::new(),
                inflight: HashSet::new(),
                overlay: None,
                stopped: false,
            }),
            work_cv: Condvar::new(),
            smooth_lighting,
        }
    }

    /// Queue a mesh update for `pos`, pinning the block and its neighbor
    /// set from `map`.
    ///
    /// Returns whether anything new was queued or merged; in particular a
    /// neighbor-triggered duplicate of an already-urgent, already-acked
    /// pending entry reports false so callers skip redundant wake-ups.
    /// A block the map cannot supply reports false with nothing created.
    pub fn request_update(
        &self,
        map: &Map,
        pos: BlockPos,
        ack_to: Option<AckTarget>,
        urgent: bool,
        from_neighbor: bool,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if let Some(i) = inner.pending.iter().position(|e| e.pos == pos) {
            let mut added = false;
            let promote;
            {
                let entry = &mut inner.pending[i];
                if let Some(a) = ack_to {
                    if !entry.ack_list.contains(&a) {
                        entry.ack_list.push(a);
                        added = true;
                    }
                }
                promote = urgent && !entry.urgent;
                if promote {
                    entry.urgent = true;
                    added = true;
                }
            }
            if promote {
                inner.urgents.insert(pos);
            }
            if !added && from_neighbor {
                log::trace!("meshgen: duplicate neighbor update for {:?}", pos);
            }
            return added;
        }

        // No pending entry: the position is either absent or in flight. In
        // both cases a fresh entry is queued (an in-flight build never picks
        // up late edits; the new entry reprocesses them after done()).
        let Some(blocks) = Neighborhood::gather(map, pos, self.smooth_lighting) else {
            return false;
        };
        inner.pending.push_back(QueuedMeshUpdate {
            pos,
            ack_list: ack_to.into_iter().collect(),
            urgent,
            overlay: None,
            blocks,
        });
        if urgent {
            inner.urgents.insert(pos);
        }
        self.work_cv.notify_one();
        true
    }

    /// Claim the next update: oldest urgent pending entry not in flight,
    /// else oldest pending entry not in flight. Moves the position into the
    /// in-flight set and samples the current overlay into the entry when it
    /// targets the popped block. Non-blocking.
    pub fn pop(&self) -> Option<QueuedMeshUpdate> {
        let mut inner = self.inner.lock().unwrap();
        Self::pop_locked(&mut inner)
    }

    /// Blocking variant for workers: waits on the queue's condvar (bounded
    /// by `pacing`) until an entry is claimable or the queue shuts down.
    /// None means shutdown, never "try again".
    pub fn pop_blocking(&self, pacing: Duration) -> Option<QueuedMeshUpdate> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.stopped {
                return None;
            }
            if let Some(e) = Self::pop_locked(&mut inner) {
                return Some(e);
            }
            let (guard, _timeout) = self.work_cv.wait_timeout(inner, pacing).unwrap();
            inner = guard;
        }
    }

    fn pop_locked(inner: &mut QueueInner) -> Option<QueuedMeshUpdate> {
        let claimable = |e: &QueuedMeshUpdate| !inner.inflight.contains(&e.pos);
        let i = if inner.urgents.is_empty() {
            inner.pending.iter().position(claimable)
        } else {
            inner
                .pending
                .iter()
                .position(|e| e.urgent && claimable(e))
                .or_else(|| inner.pending.iter().position(claimable))
        }?;
        let mut entry = inner.pending.remove(i)?;
        inner.urgents.remove(&entry.pos);
        inner.inflight.insert(entry.pos);
        if let Some(ov) = inner.overlay {
            if ov.block_pos() == entry.pos {
                entry.overlay = Some(ov);
            }
        }
        Some(entry)
    }

    /// Release a position claimed by `pop`, exactly once per pop. Until
    /// called, the position cannot be claimed again; a deferred pending
    /// entry for it becomes claimable now.
    pub fn done(&self, pos: BlockPos) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.inflight.remove(&pos) {
            log::error!("meshgen: done({:?}) for a position not in flight", pos);
            return;
        }
        if inner.pending.iter().any(|e| e.pos == pos) {
            self.work_cv.notify_one();
        }
    }

    /// Publish the current crack overlay; sampled at pop time for the block
    /// containing it. None clears.
    pub fn set_overlay(&self, overlay: Option<Overlay>) {
        self.inner.lock().unwrap().overlay = overlay;
    }

    /// Pending entry count (in-flight positions excluded); diagnostics and
    /// backpressure only.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn debug_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock().unwrap();
        (inner.pending.len(), inner.inflight.len())
    }

    /// Stop accepting blocking pops and wake every waiting worker.
    pub fn shutdown(&self) {
        self.inner.lock().unwrap().stopped = true;
        self.work_cv.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().unwrap().stopped
    }
}
