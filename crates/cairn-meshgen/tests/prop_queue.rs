use std::collections::HashSet;

use cairn_map::{BlockData, BlockPos, Map, Voxel};
use cairn_meshgen::MeshUpdateQueue;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Request { pos: u8, urgent: bool, from_neighbor: bool },
    Pop,
    Done { pos: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, any::<bool>(), any::<bool>()).prop_map(|(pos, urgent, from_neighbor)| {
            Op::Request {
                pos,
                urgent,
                from_neighbor,
            }
        }),
        Just(Op::Pop),
        (0u8..4).prop_map(|pos| Op::Done { pos }),
    ]
}

fn block_pos(i: u8) -> BlockPos {
    BlockPos::new(i32::from(i), 0, 0)
}

proptest! {
    // Random interleavings of request/pop/done: a position is never claimed
    // twice without an intervening done, pop never misses claimable work,
    // and no accepted update is ever lost.
    #[test]
    fn queue_state_machine_holds_under_random_ops(
        ops in prop::collection::vec(op_strategy(), 0..80),
    ) {
        let mut map = Map::new();
        for i in 0u8..4 {
            map.insert_block(block_pos(i), BlockData::filled(Voxel::STONE));
        }
        let q = MeshUpdateQueue::new(false);
        let mut pending: HashSet<BlockPos> = HashSet::new();
        let mut inflight: HashSet<BlockPos> = HashSet::new();

        for op in ops {
            match op {
                Op::Request { pos, urgent, from_neighbor } => {
                    let p = block_pos(pos);
                    let fresh = !pending.contains(&p);
                    let r = q.request_update(&map, p, None, urgent, from_neighbor);
                    if fresh {
                        prop_assert!(r, "a fresh request for a resident block must be accepted");
                        pending.insert(p);
                    }
                }
                Op::Pop => match q.pop() {
                    Some(e) => {
                        prop_assert!(pending.remove(&e.pos));
                        prop_assert!(
                            !inflight.contains(&e.pos),
                            "{:?} claimed twice without done",
                            e.pos
                        );
                        inflight.insert(e.pos);
                    }
                    None => {
                        prop_assert!(
                            pending.iter().all(|p| inflight.contains(p)),
                            "pop returned nothing while claimable work existed"
                        );
                    }
                },
                Op::Done { pos } => {
                    let p = block_pos(pos);
                    // Calling done for a position that is not in flight is
                    // the defensive path: logged, state untouched.
                    q.done(p);
                    inflight.remove(&p);
                }
            }
            let (q_pending, q_inflight) = q.debug_counts();
            prop_assert_eq!(q_pending, pending.len());
            prop_assert_eq!(q_inflight, inflight.len());
        }

        // Drain: everything accepted must come out exactly once.
        for p in inflight.drain() {
            q.done(p);
        }
        while let Some(e) = q.pop() {
            prop_assert!(pending.remove(&e.pos));
            q.done(e.pos);
        }
        prop_assert!(pending.is_empty(), "accepted updates were lost");
        prop_assert_eq!(q.debug_counts(), (0, 0));
    }
}
