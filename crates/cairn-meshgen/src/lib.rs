//! Background mesh update pipeline: deduplicating priority queue, worker
//! pool, and result delivery back to the main thread.
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cairn_map::{BlockPos, Map};
use cairn_mesh::{BlockMesh, MesherFlags, Neighborhood, Overlay, build_block_mesh};
use crossbeam_channel::{Receiver, Sender, unbounded};

mod config;
mod queue;

pub use config::MeshgenConfig;
pub use queue::MeshUpdateQueue;

/// Opaque identifier of a peer to notify once a block's mesh is ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AckTarget(pub u64);

/// One pending or claimed mesh update. Owns the pinned neighborhood from
/// request time until it is transferred into a result or dropped on the
/// failure path.
pub struct QueuedMeshUpdate {
    pub pos: BlockPos,
    pub ack_list: Vec<AckTarget>,
    pub urgent: bool,
    pub overlay: Option<Overlay>,
    pub blocks: Neighborhood,
}

/// Finished build, handed to the main thread. The consumer takes ownership
/// of the mesh and must drop `blocks` (releasing the pins) once the mesh is
/// integrated.
pub struct MeshUpdateResult {
    pub pos: BlockPos,
    pub mesh: BlockMesh,
    pub solid_sides: u8,
    pub ack_list: Vec<AckTarget>,
    pub urgent: bool,
    pub blocks: Neighborhood,
}

fn worker_loop(
    queue: Arc<MeshUpdateQueue>,
    urgent_tx: Sender<MeshUpdateResult>,
    normal_tx: Sender<MeshUpdateResult>,
    flags: MesherFlags,
    pacing: Duration,
) {
    while let Some(job) = queue.pop_blocking(pacing) {
        let pos = job.pos;
        match build_block_mesh(pos, &job.blocks, job.overlay.as_ref(), flags) {
            Ok(out) => {
                let result = MeshUpdateResult {
                    pos,
                    mesh: out.mesh,
                    solid_sides: out.solid_sides,
                    ack_list: job.ack_list,
                    urgent: job.urgent,
                    blocks: job.blocks,
                };
                let tx = if result.urgent { &urgent_tx } else { &normal_tx };
                let _ = tx.send(result);
            }
            Err(e) => {
                // One bad block never stops the worker. Dropping the
                // neighborhood only decrements pin counts; structural map
                // release stays on the main thread.
                log::warn!("meshgen: dropping update for {:?}: {}", pos, e);
                drop(job.blocks);
            }
        }
        queue.done(pos);
    }
    log::debug!("meshgen: worker exiting");
}

/// Composition root: owns the queue, the worker pool, and the two result
/// channels. One instance per client; the consumer polls `collect_result`
/// once per main-loop iteration.
pub struct MeshUpdateManager {
    cfg: MeshgenConfig,
    queue: Arc<MeshUpdateQueue>,
    urgent_tx: Sender<MeshUpdateResult>,
    urgent_rx: Receiver<MeshUpdateResult>,
    normal_tx: Sender<MeshUpdateResult>,
    normal_rx: Receiver<MeshUpdateResult>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl MeshUpdateManager {
    pub fn new(cfg: MeshgenConfig) -> Self {
        let (urgent_tx, urgent_rx) = unbounded();
        let (normal_tx, normal_rx) = unbounded();
        Self {
            cfg,
            queue: Arc::new(MeshUpdateQueue::new(cfg.smooth_lighting)),
            urgent_tx,
            urgent_rx,
            normal_tx,
            normal_rx,
            workers: Vec::new(),
        }
    }

    /// Queue an update for `pos`; with `update_neighbors`, also queue its
    /// six face neighbors at normal priority (a boundary edit changes their
    /// culling and lighting, but never ahead of the edited block itself).
    pub fn request_update(
        &self,
        map: &Map,
        pos: BlockPos,
        ack_to: Option<AckTarget>,
        urgent: bool,
        update_neighbors: bool,
    ) {
        self.queue.request_update(map, pos, ack_to, urgent, false);
        if update_neighbors {
            for n in pos.face_neighbors() {
                self.queue.request_update(map, n, None, false, true);
            }
        }
    }

    /// Oldest urgent result if any, else oldest normal result. Non-blocking.
    pub fn collect_result(&self) -> Option<MeshUpdateResult> {
        self.urgent_rx
            .try_recv()
            .ok()
            .or_else(|| self.normal_rx.try_recv().ok())
    }

    pub fn set_overlay(&self, overlay: Option<Overlay>) {
        self.queue.set_overlay(overlay);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// (pending, in-flight) counts for diagnostics overlays.
    pub fn debug_counts(&self) -> (usize, usize) {
        self.queue.debug_counts()
    }

    pub fn start(&mut self) {
        if !self.workers.is_empty() {
            log::warn!("meshgen: start() on a running pool");
            return;
        }
        let n = self.cfg.effective_workers();
        let flags = self.cfg.mesher_flags();
        let pacing = self.cfg.pacing();
        log::info!("meshgen: starting {} mesh worker(s)", n);
        for i in 0..n {
            let queue = Arc::clone(&self.queue);
            let urgent_tx = self.urgent_tx.clone();
            let normal_tx = self.normal_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("cairn-mesh-{i}"))
                .spawn(move || worker_loop(queue, urgent_tx, normal_tx, flags, pacing))
                .expect("spawn mesh worker");
            self.workers.push(handle);
        }
    }

    /// Signal every worker to stop; wakes any pop waiting on the queue so
    /// termination is prompt. Results already produced stay collectable.
    pub fn stop(&self) {
        log::info!("meshgen: stopping mesh workers");
        self.queue.shutdown();
    }

    /// Join all worker threads.
    pub fn wait(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("meshgen: worker thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty() && !self.queue.is_stopped()
    }
}

impl Drop for MeshUpdateManager {
    fn drop(&mut self) {
        self.queue.shutdown();
        self.wait();
    }
}
