use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use cairn_map::{BLOCK_SIZE, BlockData, BlockPos, Map, Voxel};
use cairn_mesh::{BlockMesh, Overlay};
use cairn_meshgen::{AckTarget, MeshUpdateManager, MeshgenConfig};
use clap::Parser;
use fastnoise_lite::{FastNoiseLite, NoiseType};
use hashbrown::HashMap;

#[derive(Parser, Debug)]
#[command(name = "cairn", about = "Headless driver for the block mesh pipeline")]
struct Args {
    /// Pipeline config file (TOML); defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured worker count.
    #[arg(long)]
    workers: Option<usize>,
    /// Main-loop iterations to simulate.
    #[arg(long, default_value_t = 240)]
    ticks: u32,
    /// Horizontal radius of the generated map, in blocks.
    #[arg(long, default_value_t = 3)]
    radius: i32,
    #[arg(long, default_value_t = 1337)]
    seed: i32,
}

const SEA_LEVEL: i32 = 11;
const CRACK_STEPS: u8 = 10;

fn terrain_height(noise: &FastNoiseLite, wx: i32, wz: i32) -> i32 {
    let n = noise.get_noise_2d(wx as f32 * 2.0, wz as f32 * 2.0);
    12 + (n * 7.0) as i32
}

fn generate_block(noise: &FastNoiseLite, pos: BlockPos) -> BlockData {
    let (bx, by, bz) = pos.base();
    let mut data = BlockData::air();
    for z in 0..BLOCK_SIZE {
        for x in 0..BLOCK_SIZE {
            let wx = bx + x as i32;
            let wz = bz + z as i32;
            let h = terrain_height(noise, wx, wz);
            for y in 0..BLOCK_SIZE {
                let wy = by + y as i32;
                let v = if wy < h - 3 {
                    Voxel::STONE
                } else if wy < h {
                    Voxel::DIRT
                } else if wy == h {
                    Voxel::GRASS
                } else if wy <= SEA_LEVEL {
                    Voxel::WATER
                } else {
                    Voxel::AIR
                };
                data.set_local(x, y, z, v);
            }
        }
    }
    data
}

fn populate(map: &mut Map, noise: &FastNoiseLite, radius: i32) {
    for bz in -radius..=radius {
        for bx in -radius..=radius {
            for by in 0..2 {
                let pos = BlockPos::new(bx, by, bz);
                map.insert_block(pos, generate_block(noise, pos));
            }
        }
    }
    log::info!("map: generated {} blocks", map.len());
}

/// Topmost non-air voxel in the column, scanning the two generated layers.
fn surface_y(map: &Map, wx: i32, wz: i32) -> Option<i32> {
    (0..2 * BLOCK_SIZE as i32)
        .rev()
        .find(|wy| map.get_voxel(wx, *wy, wz).is_some_and(|v| !v.is_air()))
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => match MeshgenConfig::from_path(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("config {:?} load error: {}; using defaults", path, e);
                MeshgenConfig::default()
            }
        },
        None => MeshgenConfig::default(),
    };
    if let Some(w) = args.workers {
        cfg.workers = w;
    }

    let mut noise = FastNoiseLite::with_seed(args.seed);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));

    let mut map = Map::new();
    populate(&mut map, &noise, args.radius);

    let mut manager = MeshUpdateManager::new(cfg);
    manager.start();

    // Initial scene build: every resident block at normal priority.
    let span = BLOCK_SIZE as i32 * args.radius;
    for bz in -args.radius..=args.radius {
        for bx in -args.radius..=args.radius {
            for by in 0..2 {
                manager.request_update(&map, BlockPos::new(bx, by, bz), None, false, false);
            }
        }
    }

    let mut scene: HashMap<BlockPos, BlockMesh> = HashMap::new();
    let mut built: u64 = 0;
    let mut acked: u64 = 0;
    let mut evicted: usize = 0;
    let mut dug: u64 = 0;

    for tick in 0..args.ticks {
        // One dig site at a time; the crack overlay advances every tick and
        // the voxel breaks on the last step.
        let step = (tick % u32::from(CRACK_STEPS)) as u8;
        let site = tick / u32::from(CRACK_STEPS);
        let wx = (site as i32 * 37 % (2 * span + 1)) - span;
        let wz = (site as i32 * 53 % (2 * span + 1)) - span;
        if let Some(wy) = surface_y(&map, wx, wz) {
            let pos = BlockPos::containing(wx, wy, wz);
            if step < CRACK_STEPS - 1 {
                manager.set_overlay(Some(Overlay {
                    wx,
                    wy,
                    wz,
                    level: step,
                }));
                manager.request_update(&map, pos, None, true, false);
            } else {
                manager.set_overlay(None);
                map.set_voxel(wx, wy, wz, Voxel::AIR);
                manager.request_update(&map, pos, Some(AckTarget(u64::from(site))), true, true);
                dug += 1;
            }
        }

        while let Some(result) = manager.collect_result() {
            built += 1;
            acked += result.ack_list.len() as u64;
            scene.insert(result.pos, result.mesh);
            // Dropping the rest of the result releases the held pins.
        }

        if tick % 60 == 59 {
            // Main-thread structural drain; pinned blocks survive the sweep
            // and are retried on the next pass.
            let keep = args.radius - 1;
            evicted += map.evict_unpinned(|p| p.x.abs() <= keep && p.z.abs() <= keep);
            let (pending, inflight) = manager.debug_counts();
            log::info!(
                "tick {}: scene={} built={} pending={} inflight={} evicted={}",
                tick,
                scene.len(),
                built,
                pending,
                inflight,
                evicted
            );
        }

        thread::sleep(Duration::from_millis(2));
    }

    // Let outstanding builds finish, then drain what they produced.
    let deadline = Instant::now() + Duration::from_secs(10);
    while manager.debug_counts() != (0, 0) && Instant::now() < deadline {
        while let Some(result) = manager.collect_result() {
            built += 1;
            acked += result.ack_list.len() as u64;
            scene.insert(result.pos, result.mesh);
        }
        thread::sleep(Duration::from_millis(2));
    }
    while let Some(result) = manager.collect_result() {
        built += 1;
        acked += result.ack_list.len() as u64;
        scene.insert(result.pos, result.mesh);
    }

    manager.stop();
    manager.wait();

    let leaked = scene.keys().filter(|p| map.pin_count(**p) > 0).count();
    if leaked > 0 {
        log::error!("map: {} blocks still pinned after shutdown", leaked);
    }
    log::info!(
        "done: {} meshes built, {} digs, {} acks, {} blocks evicted, {} in scene",
        built,
        dug,
        acked,
        evicted,
        scene.len()
    );
}
