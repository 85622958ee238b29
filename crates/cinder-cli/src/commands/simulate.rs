//! Headless simulation command

use anyhow::{Context, Result};
use cinder_core::{NameHash, Vec3};
use cinder_fx::{
    AnimationData, AnimationResolver, ContextConfig, MaterialHandle, ParticleContext, Playback,
    TextureHandle, TileSourceHandle, UpdateStats, VertexWriter, FLOATS_PER_VERTEX,
    VERTICES_PER_PARTICLE,
};

pub struct SimulateArgs {
    pub effect: String,
    pub ticks: u32,
    pub dt: f32,
    pub seed: u32,
    pub max_particles: u32,
    pub position: Option<[f32; 3]>,
    pub tiles: u32,
    pub stop_at: Option<u32>,
    pub json: bool,
}

/// Serves every animation lookup from one synthetic horizontal strip of
/// equally sized tiles
struct StripResolver {
    texture: TextureHandle,
    tex_coords: Vec<[f32; 4]>,
}

impl StripResolver {
    fn new(tiles: u32) -> Self {
        let tiles = tiles.max(1) as usize;
        let step = 1.0 / tiles as f32;
        let tex_coords = (0..tiles)
            .map(|i| {
                let left = i as f32 * step;
                [left, 0.0, left + step, 1.0]
            })
            .collect();
        Self {
            texture: TextureHandle(1),
            tex_coords,
        }
    }
}

impl AnimationResolver for StripResolver {
    fn fetch(
        &mut self,
        _tile_source: TileSourceHandle,
        _animation: NameHash,
    ) -> Option<AnimationData<'_>> {
        Some(AnimationData {
            texture: self.texture,
            tex_coords: &self.tex_coords,
            playback: Playback::LoopForward,
            start_tile: 1,
            end_tile: self.tex_coords.len() as u32,
            fps: 30.0,
            hflip: false,
            vflip: false,
        })
    }
}

pub fn run(args: SimulateArgs) -> Result<()> {
    let data = std::fs::read(&args.effect).with_context(|| format!("reading {}", args.effect))?;

    let mut ctx = ParticleContext::new(ContextConfig {
        max_instances: 32,
        max_particles: args.max_particles,
        seed: args.seed,
    });
    let proto = ctx
        .new_prototype(&data)
        .with_context(|| format!("parsing {}", args.effect))?;

    // Every emitter gets the same synthetic bindings; the resolver below
    // answers for them all
    let emitter_count = ctx.prototype(proto)?.emitter_count();
    for index in 0..emitter_count {
        ctx.set_material(proto, index, MaterialHandle(1))?;
        ctx.set_tile_source(proto, index, TileSourceHandle(1))?;
    }

    let instance = ctx.create_instance(proto)?;
    if let Some([x, y, z]) = args.position {
        ctx.set_position(instance, Vec3::new(x, y, z))?;
    }
    ctx.start_instance(instance)?;

    let capacity = args.max_particles as usize * VERTICES_PER_PARTICLE * FLOATS_PER_VERTEX;
    let mut floats = vec![0.0f32; capacity];
    let mut resolver = StripResolver::new(args.tiles);

    let mut peak_live = 0u32;
    let mut last = UpdateStats::default();
    for tick in 0..args.ticks {
        if args.stop_at == Some(tick) {
            ctx.stop_instance(instance)?;
        }
        let mut writer = VertexWriter::from_floats(&mut floats);
        last = ctx.update(args.dt, &mut writer, &mut resolver);
        peak_live = peak_live.max(last.live_particles);
    }

    let lifecycle = ctx.instance_lifecycle(instance)?;

    if args.json {
        let output = serde_json::json!({
            "effect": args.effect,
            "ticks": args.ticks,
            "dt": args.dt,
            "seed": args.seed,
            "lifecycle": format!("{:?}", lifecycle).to_lowercase(),
            "peak_live_particles": peak_live,
            "stats": last,
            "batches": ctx.batches(),
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
    } else {
        println!(
            "Simulated '{}' for {} tick(s) at dt {:.5}",
            args.effect, args.ticks, args.dt
        );
        println!("  lifecycle: {}", format!("{:?}", lifecycle).to_lowercase());
        println!("  peak live particles: {}", peak_live);
        println!("  final live particles: {}", last.live_particles);
        println!(
            "  vertices written: {} ({} bytes{})",
            last.vertices_written,
            last.bytes_written,
            if last.truncated { ", truncated" } else { "" }
        );

        let batches = ctx.batches();
        println!("  batches: {}", batches.len());
        for batch in batches {
            println!(
                "    material {} texture {} vertices {}..{}",
                batch.material.raw(),
                batch.texture.raw(),
                batch.vertex_start,
                batch.vertex_start + batch.vertex_count
            );
        }
    }

    Ok(())
}
