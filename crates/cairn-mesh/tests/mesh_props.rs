use cairn_map::{BLOCK_VOLUME, BlockData, BlockPos, Map, Voxel};
use cairn_mesh::{MesherFlags, Neighborhood, build_block_mesh};
use proptest::prelude::*;

fn sparse_block(cells: &[(usize, u16)]) -> BlockData {
    let mut d = BlockData::air();
    for (i, id) in cells {
        d.voxels[*i] = Voxel(*id);
    }
    d
}

proptest! {
    #[test]
    fn mesh_buffers_stay_consistent(
        cells in prop::collection::vec((0..BLOCK_VOLUME, 0u16..10), 0..200),
        smooth in any::<bool>(),
        reflections in any::<bool>(),
    ) {
        let p = BlockPos::new(0, 0, 0);
        let mut map = Map::new();
        map.insert_block(p, sparse_block(&cells));
        for n in p.face_neighbors() {
            map.insert_block(n, BlockData::air());
        }
        let nbhd = Neighborhood::gather(&map, p, smooth).unwrap();
        let flags = MesherFlags { smooth_lighting: smooth, water_reflections: reflections };
        let out = build_block_mesh(p, &nbhd, None, flags).unwrap();

        let m = &out.mesh;
        let verts = m.vertex_count();
        prop_assert_eq!(m.pos.len() % 12, 0);
        prop_assert_eq!(m.norm.len(), m.pos.len());
        prop_assert_eq!(m.uv.len() / 2, verts);
        prop_assert_eq!(m.col.len() / 4, verts);
        prop_assert_eq!(m.idx.len() % 6, 0);
        prop_assert!(m.idx.iter().all(|i| (*i as usize) < verts));
        // An all-air block must mesh to nothing.
        if cells.iter().all(|(_, id)| *id == 0) {
            prop_assert!(m.is_empty());
        }
    }
}
