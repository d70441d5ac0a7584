use cairn_map::{BLOCK_SIZE, BlockPos, Voxel};

use crate::{BlockMesh, MeshError, MeshOutput, MesherFlags, Neighborhood, Overlay};

pub const FACE_COUNT: usize = 6;

// Face order matches FACE_OFFSETS: 0=+Y,1=-Y,2=+X,3=-X,4=+Z,5=-Z.
// origin is the u=0,v=0 corner of the face quad; u_axis x v_axis points
// along the outward normal.
struct Face {
    normal: (i32, i32, i32),
    origin: (i32, i32, i32),
    u_axis: (i32, i32, i32),
    v_axis: (i32, i32, i32),
    shade: f32,
}

const FACES: [Face; FACE_COUNT] = [
    Face {
        normal: (0, 1, 0),
        origin: (0, 1, 0),
        u_axis: (0, 0, 1),
        v_axis: (1, 0, 0),
        shade: 1.0,
    },
    Face {
        normal: (0, -1, 0),
        origin: (0, 0, 0),
        u_axis: (1, 0, 0),
        v_axis: (0, 0, 1),
        shade: 0.5,
    },
    Face {
        normal: (1, 0, 0),
        origin: (1, 0, 0),
        u_axis: (0, 1, 0),
        v_axis: (0, 0, 1),
        shade: 0.8,
    },
    Face {
        normal: (-1, 0, 0),
        origin: (0, 0, 0),
        u_axis: (0, 0, 1),
        v_axis: (0, 1, 0),
        shade: 0.8,
    },
    Face {
        normal: (0, 0, 1),
        origin: (0, 0, 1),
        u_axis: (1, 0, 0),
        v_axis: (0, 1, 0),
        shade: 0.65,
    },
    Face {
        normal: (0, 0, -1),
        origin: (0, 0, 0),
        u_axis: (0, 1, 0),
        v_axis: (1, 0, 0),
        shade: 0.65,
    },
];

// AO brightness by open-corner count, darkest first.
const AO_FACTORS: [f32; 4] = [0.55, 0.7, 0.85, 1.0];

#[inline]
fn add3(a: (i32, i32, i32), b: (i32, i32, i32)) -> (i32, i32, i32) {
    (a.0 + b.0, a.1 + b.1, a.2 + b.2)
}

#[inline]
fn scale3(a: (i32, i32, i32), s: i32) -> (i32, i32, i32) {
    (a.0 * s, a.1 * s, a.2 * s)
}

/// Whether a face of `v` against neighbor voxel `n` is visible.
/// `None` neighbors are unloaded boundaries and contribute nothing.
#[inline]
fn face_visible(v: Voxel, n: Option<Voxel>) -> bool {
    let Some(n) = n else {
        return false;
    };
    if v.is_liquid() {
        n.is_air()
    } else {
        n.is_air() || n.is_liquid()
    }
}

/// Vertex AO from the three voxels flanking a face corner.
#[inline]
fn corner_ao(nbhd: &Neighborhood, outside: (i32, i32, i32), du: (i32, i32, i32), dv: (i32, i32, i32)) -> f32 {
    let occ = |p: (i32, i32, i32)| {
        nbhd.voxel_at(p.0, p.1, p.2)
            .map(|v| v.is_opaque())
            .unwrap_or(false)
    };
    let side1 = occ(add3(outside, du));
    let side2 = occ(add3(outside, dv));
    let corner = occ(add3(add3(outside, du), dv));
    let open = if side1 && side2 {
        0
    } else {
        3 - (side1 as usize + side2 as usize + corner as usize)
    };
    AO_FACTORS[open]
}

/// Build the mesh for the block at `pos` from its pinned neighborhood.
///
/// Pure and safe to call concurrently for distinct positions: reads only the
/// neighborhood snapshot. Faces against unloaded neighbor blocks are not
/// emitted (the boundary is treated as non-contributing and the block is
/// remeshed when the neighbor loads). Returns `MeshError::CorruptBlock` for
/// malformed center data; the caller discards the request and carries on.
pub fn build_block_mesh(
    pos: BlockPos,
    nbhd: &Neighborhood,
    overlay: Option<&Overlay>,
    flags: MesherFlags,
) -> Result<MeshOutput, MeshError> {
    debug_assert_eq!(pos, nbhd.pos());
    let data = nbhd.center().data();
    if data.voxels.len() != cairn_map::BLOCK_VOLUME {
        return Err(MeshError::CorruptBlock {
            pos,
            reason: "voxel buffer length mismatch",
        });
    }
    if !data.is_well_formed() {
        return Err(MeshError::CorruptBlock {
            pos,
            reason: "voxel id out of range",
        });
    }

    let (bx, by, bz) = pos.base();
    let mut mesh = BlockMesh::default();

    for z in 0..BLOCK_SIZE {
        for y in 0..BLOCK_SIZE {
            for x in 0..BLOCK_SIZE {
                let v = data.get_local(x, y, z);
                if v.is_air() {
                    continue;
                }
                let w = (bx + x as i32, by + y as i32, bz + z as i32);
                for face in &FACES {
                    let n_at = add3(w, face.normal);
                    if !face_visible(v, nbhd.voxel_at(n_at.0, n_at.1, n_at.2)) {
                        continue;
                    }
                    emit_face(&mut mesh, nbhd, w, v, face, overlay, flags);
                }
            }
        }
    }

    Ok(MeshOutput {
        mesh,
        solid_sides: solid_sides_mask(nbhd),
    })
}

fn emit_face(
    mesh: &mut BlockMesh,
    nbhd: &Neighborhood,
    w: (i32, i32, i32),
    v: Voxel,
    face: &Face,
    overlay: Option<&Overlay>,
    flags: MesherFlags,
) {
    let o = add3(w, face.origin);
    let corners_i = [
        o,
        add3(o, face.u_axis),
        add3(o, add3(face.u_axis, face.v_axis)),
        add3(o, face.v_axis),
    ];
    let corners = corners_i.map(|c| [c.0 as f32, c.1 as f32, c.2 as f32]);
    let normal = [
        face.normal.0 as f32,
        face.normal.1 as f32,
        face.normal.2 as f32,
    ];

    let mut shade = face.shade;
    if let Some(ov) = overlay {
        if (ov.wx, ov.wy, ov.wz) == w {
            // Crack overlay darkens the voxel's faces by level.
            shade *= (1.0 - f32::from(ov.level) * 0.06).max(0.3);
        }
    }

    let alpha: u8 = if v.is_liquid() {
        // Top faces of water carry the reflection tag when enabled.
        if flags.water_reflections && face.normal == (0, 1, 0) {
            200
        } else {
            180
        }
    } else {
        255
    };

    let outside = add3(w, face.normal);
    let rgba = std::array::from_fn(|i| {
        let ao = if flags.smooth_lighting {
            let (su, sv) = match i {
                0 => (-1, -1),
                1 => (1, -1),
                2 => (1, 1),
                _ => (-1, 1),
            };
            corner_ao(
                nbhd,
                outside,
                scale3(face.u_axis, su),
                scale3(face.v_axis, sv),
            )
        } else {
            1.0
        };
        let c = (255.0 * shade * ao) as u8;
        [c, c, c, alpha]
    });

    mesh.add_quad(corners, normal, rgba);
}

/// Bit i set when every voxel on face i's boundary layer is opaque.
fn solid_sides_mask(nbhd: &Neighborhood) -> u8 {
    let data = nbhd.center().data();
    let s = BLOCK_SIZE;
    let mut mask = 0u8;
    for (i, face) in FACES.iter().enumerate() {
        let solid = (0..s * s).all(|j| {
            let (a, b) = (j / s, j % s);
            let (x, y, z) = match face.normal {
                (0, 1, 0) => (a, s - 1, b),
                (0, -1, 0) => (a, 0, b),
                (1, 0, 0) => (s - 1, a, b),
                (-1, 0, 0) => (0, a, b),
                (0, 0, 1) => (a, b, s - 1),
                _ => (a, b, 0),
            };
            data.get_local(x, y, z).is_opaque()
        });
        if solid {
            mask |= 1 << i;
        }
    }
    mask
}
