use std::thread;
use std::time::{Duration, Instant};

use cairn_map::{BlockData, BlockPos, Map, MapError, Voxel};
use cairn_meshgen::{AckTarget, MeshUpdateManager, MeshUpdateResult, MeshgenConfig};

fn test_config(workers: usize) -> MeshgenConfig {
    MeshgenConfig {
        workers,
        pacing_ms: 5,
        smooth_lighting: false,
        water_reflections: false,
    }
}

fn map_with(positions: &[BlockPos]) -> Map {
    let mut map = Map::new();
    for p in positions {
        map.insert_block(*p, BlockData::filled(Voxel::STONE));
    }
    map
}

fn drain(mgr: &MeshUpdateManager, want: usize, timeout: Duration) -> Vec<MeshUpdateResult> {
    let deadline = Instant::now() + timeout;
    let mut out = Vec::new();
    while out.len() < want && Instant::now() < deadline {
        match mgr.collect_result() {
            Some(r) => out.push(r),
            None => thread::sleep(Duration::from_millis(1)),
        }
    }
    out
}

fn wait_idle(mgr: &MeshUpdateManager, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while mgr.debug_counts() != (0, 0) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(mgr.debug_counts(), (0, 0), "pipeline did not go idle");
}

#[test]
fn urgent_results_are_collected_before_normal_ones() {
    let a = BlockPos::new(0, 0, 0);
    let b = BlockPos::new(1, 0, 0);
    let c = BlockPos::new(2, 0, 0);
    let map = map_with(&[a, b, c]);

    let mut mgr = MeshUpdateManager::new(test_config(1));
    // Queue everything before the pool starts so completion order is fixed.
    mgr.request_update(&map, a, None, false, false);
    mgr.request_update(&map, b, None, false, false);
    mgr.request_update(&map, c, None, true, false);
    mgr.start();

    wait_idle(&mgr, Duration::from_secs(5));
    let results = drain(&mgr, 3, Duration::from_secs(5));
    assert_eq!(results.len(), 3);
    // The urgent block never waits behind normal results.
    assert_eq!(results[0].pos, c);
    assert!(results[0].urgent);
    assert_eq!(results[1].pos, a);
    assert_eq!(results[2].pos, b);

    mgr.stop();
    mgr.wait();
}

#[test]
fn two_workers_claim_distinct_positions() {
    let a = BlockPos::new(0, 0, 0);
    let b = BlockPos::new(5, 0, 0);
    let map = map_with(&[a, b]);

    let mut mgr = MeshUpdateManager::new(test_config(2));
    mgr.start();
    mgr.request_update(&map, a, None, false, false);
    mgr.request_update(&map, b, None, false, false);

    let results = drain(&mgr, 2, Duration::from_secs(5));
    assert_eq!(results.len(), 2);
    let mut got: Vec<BlockPos> = results.iter().map(|r| r.pos).collect();
    got.sort_by_key(|p| p.x);
    assert_eq!(got, vec![a, b]);
    assert_eq!(mgr.debug_counts(), (0, 0));

    mgr.stop();
    mgr.wait();
}

#[test]
fn results_transfer_acks_and_held_blocks_to_the_consumer() {
    let p = BlockPos::new(0, 0, 0);
    let mut map = map_with(&[p]);

    let mut mgr = MeshUpdateManager::new(test_config(1));
    mgr.start();
    mgr.request_update(&map, p, Some(AckTarget(42)), true, false);

    let mut results = drain(&mgr, 1, Duration::from_secs(5));
    let r = results.pop().unwrap();
    assert_eq!(r.pos, p);
    assert_eq!(r.ack_list, vec![AckTarget(42)]);
    assert!(r.urgent);
    // Fully solid block with no loaded neighbors: nothing rendered, every
    // side reported solid.
    assert!(r.mesh.is_empty());
    assert_eq!(r.solid_sides, 0x3f);

    // The pins ride along with the result; structural removal must refuse
    // until the consumer lets go.
    assert_eq!(map.pin_count(p), 1);
    assert!(matches!(map.remove_block(p), Err(MapError::Pinned(_, 1))));
    drop(r);
    assert_eq!(map.pin_count(p), 0);
    map.remove_block(p).unwrap();

    mgr.stop();
    mgr.wait();
}

#[test]
fn edits_during_flight_produce_a_second_result() {
    let p = BlockPos::new(0, 0, 0);
    let map = map_with(&[p]);

    let mut mgr = MeshUpdateManager::new(test_config(1));
    mgr.start();
    mgr.request_update(&map, p, None, false, false);
    wait_idle(&mgr, Duration::from_secs(5));
    mgr.request_update(&map, p, None, false, false);

    let results = drain(&mgr, 2, Duration::from_secs(5));
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.pos == p));

    mgr.stop();
    mgr.wait();
}

#[test]
fn neighbor_expansion_queues_resident_neighbors_at_normal_priority() {
    let a = BlockPos::new(0, 0, 0);
    let b = BlockPos::new(1, 0, 0);
    let c = BlockPos::new(2, 0, 0);
    let map = map_with(&[a, b, c]);

    let mut mgr = MeshUpdateManager::new(test_config(1));
    mgr.request_update(&map, b, None, true, true);
    // The edited block plus its two resident face neighbors; unloaded
    // neighbors are skipped without error.
    assert_eq!(mgr.queue_len(), 3);

    mgr.start();
    wait_idle(&mgr, Duration::from_secs(5));
    let results = drain(&mgr, 3, Duration::from_secs(5));
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].pos, b, "edited block outranks its neighbors");
    assert!(results[0].urgent);
    assert!(!results[1].urgent);

    mgr.stop();
    mgr.wait();
}

#[test]
fn stop_terminates_an_idle_pool_promptly() {
    let mut mgr = MeshUpdateManager::new(test_config(2));
    mgr.start();
    assert!(mgr.is_running());
    thread::sleep(Duration::from_millis(20));

    let t0 = Instant::now();
    mgr.stop();
    mgr.wait();
    assert!(t0.elapsed() < Duration::from_secs(1));
    assert!(!mgr.is_running());
}
