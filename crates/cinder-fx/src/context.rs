//! The particle context: owner of prototypes and instances
//!
//! A context holds every loaded prototype and every live instance behind
//! generation-checked ids, advances them all in one `update` call, and
//! fills a caller-provided vertex buffer. Rendering is split off so the
//! caller can replay the batches from the last update against its own
//! draw path.

use crate::animation::{select_tile, tile_uv, AnimationResolver};
use crate::handles::{InstanceId, MaterialHandle, PrototypeId, TextureHandle, TileSourceHandle};
use crate::instance::{EffectInstance, EmitterBinding, Lifecycle};
use crate::prototype::{EmissionSpace, Prototype};
use crate::vertex::{build_quad, VertexWriter};
use cinder_core::handle::Arena;
use cinder_core::{CinderError, Quat, Result, Vec3};
use log::{debug, warn};
use serde::Serialize;

/// Limits and seeding for one context
#[derive(Debug, Clone, Copy)]
pub struct ContextConfig {
    /// Most instances alive at once
    pub max_instances: u32,
    /// Cap applied to every emitter pool, on top of the emitter's own
    /// particle budget
    pub max_particles: u32,
    /// Base seed mixed into every instance's random stream
    pub seed: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_instances: 128,
            max_particles: 1024,
            seed: 0,
        }
    }
}

/// A contiguous run of vertices sharing one material and texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderBatch {
    pub material: MaterialHandle,
    pub texture: TextureHandle,
    /// First vertex of the run in the buffer written by the last update
    pub vertex_start: usize,
    pub vertex_count: usize,
}

/// Receives one `draw` call per batch from [`ParticleContext::render`]
pub trait RenderSink {
    fn draw(&mut self, batch: &RenderBatch);
}

/// Totals from one update tick
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UpdateStats {
    /// Particles alive across all instances after the tick
    pub live_particles: u32,
    pub vertices_written: usize,
    pub bytes_written: usize,
    /// True when the vertex buffer filled before every particle fit
    pub truncated: bool,
}

struct PrototypeEntry {
    proto: Prototype,
    /// Base render bindings, one per emitter
    bindings: Vec<EmitterBinding>,
    /// Live instances created from this prototype
    refs: u32,
}

/// Top-level engine object. See the crate docs for the lifecycle walk.
pub struct ParticleContext {
    config: ContextConfig,
    prototypes: Arena<PrototypeEntry>,
    instances: Arena<EffectInstance>,
    /// Batches produced by the last update, replayed by `render`
    batches: Vec<RenderBatch>,
    /// Counter mixed with the config seed so each instance gets its own
    /// stream
    next_stream: u32,
}

impl ParticleContext {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            prototypes: Arena::new(),
            instances: Arena::new(),
            batches: Vec::new(),
            next_stream: 0,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Parse an effect description and register it as a prototype.
    /// Emitters start with no render bindings; attach them with
    /// [`set_material`](Self::set_material) and
    /// [`set_tile_source`](Self::set_tile_source).
    pub fn new_prototype(&mut self, data: &[u8]) -> Result<PrototypeId> {
        let proto = Prototype::from_bytes(data)?;
        debug!(
            "loaded effect '{}' with {} emitter(s)",
            proto.name,
            proto.emitter_count()
        );
        let bindings = vec![EmitterBinding::default(); proto.emitters.len()];
        let handle = self.prototypes.insert(PrototypeEntry {
            proto,
            bindings,
            refs: 0,
        });
        Ok(PrototypeId(handle))
    }

    /// Unload a prototype. Refused while instances created from it are
    /// still alive.
    pub fn delete_prototype(&mut self, id: PrototypeId) -> Result<()> {
        let entry = self
            .prototypes
            .get(id.0)
            .ok_or(CinderError::StalePrototype)?;
        if entry.refs > 0 {
            return Err(CinderError::PrototypeInUse { count: entry.refs });
        }
        self.prototypes.remove(id.0);
        Ok(())
    }

    pub fn prototype(&self, id: PrototypeId) -> Result<&Prototype> {
        self.prototypes
            .get(id.0)
            .map(|entry| &entry.proto)
            .ok_or(CinderError::StalePrototype)
    }

    pub fn prototype_count(&self) -> usize {
        self.prototypes.len()
    }

    /// Create an instance of `prototype` in the `Created` state. It does
    /// not simulate until started.
    pub fn create_instance(&mut self, prototype: PrototypeId) -> Result<InstanceId> {
        if self.instances.len() as u32 >= self.config.max_instances {
            return Err(CinderError::InstanceLimit {
                max: self.config.max_instances,
            });
        }
        let seed = self.derive_seed();
        let entry = self
            .prototypes
            .get_mut(prototype.0)
            .ok_or(CinderError::StalePrototype)?;
        entry.refs += 1;
        let instance = EffectInstance::new(prototype, &entry.proto, seed, self.config.max_particles);
        let handle = self.instances.insert(instance);
        debug!("created instance {:?} of effect '{}'", handle, entry.proto.name);
        Ok(InstanceId(handle))
    }

    pub fn destroy_instance(&mut self, id: InstanceId) -> Result<()> {
        let instance = self
            .instances
            .remove(id.0)
            .ok_or(CinderError::StaleInstance)?;
        if let Some(entry) = self.prototypes.get_mut(instance.prototype.0) {
            entry.refs = entry.refs.saturating_sub(1);
        }
        debug!("destroyed instance {id:?}");
        Ok(())
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn start_instance(&mut self, id: InstanceId) -> Result<()> {
        self.instance_mut(id)?.start();
        Ok(())
    }

    pub fn stop_instance(&mut self, id: InstanceId) -> Result<()> {
        self.instance_mut(id)?.stop();
        Ok(())
    }

    pub fn restart_instance(&mut self, id: InstanceId) -> Result<()> {
        self.instance_mut(id)?.restart();
        Ok(())
    }

    pub fn set_position(&mut self, id: InstanceId, position: Vec3) -> Result<()> {
        self.instance_mut(id)?.transform.position = position;
        Ok(())
    }

    pub fn set_rotation(&mut self, id: InstanceId, rotation: Quat) -> Result<()> {
        self.instance_mut(id)?.transform.rotation = rotation.normalized();
        Ok(())
    }

    /// Override the seed used by the next start or restart of `id`
    pub fn set_seed(&mut self, id: InstanceId, seed: u32) -> Result<()> {
        self.instance_mut(id)?.seed = seed;
        Ok(())
    }

    pub fn instance_lifecycle(&self, id: InstanceId) -> Result<Lifecycle> {
        Ok(self.instance(id)?.lifecycle)
    }

    pub fn instance_live_particles(&self, id: InstanceId) -> Result<u32> {
        Ok(self.instance(id)?.live_particles())
    }

    pub fn total_live_particles(&self) -> u32 {
        self.instances
            .iter()
            .map(|(_, instance)| instance.live_particles())
            .sum()
    }

    /// Bind the material drawn by one emitter of a prototype. Applies to
    /// every instance that does not override it.
    pub fn set_material(
        &mut self,
        prototype: PrototypeId,
        emitter_index: usize,
        material: MaterialHandle,
    ) -> Result<()> {
        let binding = self.binding_mut(prototype, emitter_index)?;
        binding.material = Some(material);
        Ok(())
    }

    /// Bind the tile source one emitter of a prototype animates from
    pub fn set_tile_source(
        &mut self,
        prototype: PrototypeId,
        emitter_index: usize,
        tile_source: TileSourceHandle,
    ) -> Result<()> {
        let binding = self.binding_mut(prototype, emitter_index)?;
        binding.tile_source = Some(tile_source);
        Ok(())
    }

    /// Override the bound material for one emitter of a single instance
    pub fn set_instance_material(
        &mut self,
        id: InstanceId,
        emitter_index: usize,
        material: MaterialHandle,
    ) -> Result<()> {
        let binding = self.override_mut(id, emitter_index)?;
        binding.material = Some(material);
        Ok(())
    }

    /// Override the bound tile source for one emitter of a single instance
    pub fn set_instance_tile_source(
        &mut self,
        id: InstanceId,
        emitter_index: usize,
        tile_source: TileSourceHandle,
    ) -> Result<()> {
        let binding = self.override_mut(id, emitter_index)?;
        binding.tile_source = Some(tile_source);
        Ok(())
    }

    /// Advance every simulating instance by `dt` seconds and write the
    /// surviving particles into `writer` as textured quads.
    ///
    /// Emitters whose bindings are incomplete, or whose animation the
    /// resolver cannot supply, still simulate but produce no vertices.
    /// Batches are rebuilt from scratch on every call.
    pub fn update(
        &mut self,
        dt: f32,
        writer: &mut VertexWriter<'_>,
        resolver: &mut dyn AnimationResolver,
    ) -> UpdateStats {
        self.batches.clear();
        let mut live = 0u32;

        for handle in self.instances.handles() {
            let Some(instance) = self.instances.get_mut(handle) else {
                continue;
            };
            if !instance.is_simulating() {
                continue;
            }
            let Some(entry) = self.prototypes.get(instance.prototype.0) else {
                // Deletion is refused while instances exist
                continue;
            };

            let allow_spawn = instance.lifecycle == Lifecycle::Running;
            let transform = instance.transform;

            for (index, state) in instance.emitters.iter_mut().enumerate() {
                let ep = &entry.proto.emitters[index];
                state.tick(dt, ep, &transform, &mut instance.rng, allow_spawn);

                let alive = state.pool.alive_count();
                if alive == 0 {
                    continue;
                }
                live += alive as u32;

                let base = entry.bindings[index];
                let over = instance.overrides[index];
                let material = over.material.or(base.material);
                let tile_source = over.tile_source.or(base.tile_source);
                let (Some(material), Some(tile_source)) = (material, tile_source) else {
                    debug!("emitter {index} of {handle:?} is unbound, skipping draw");
                    continue;
                };

                let Some(anim) = resolver.fetch(tile_source, ep.animation_hash) else {
                    debug!(
                        "no animation '{}' in {tile_source:?}, skipping draw",
                        ep.animation
                    );
                    continue;
                };
                let tile = select_tile(
                    anim.playback,
                    anim.start_tile,
                    anim.end_tile,
                    anim.fps,
                    state.elapsed,
                );
                let Some(uv) = tile_uv(&anim, tile) else {
                    warn!("tile {tile} outside {tile_source:?}, skipping draw");
                    continue;
                };
                let texture = anim.texture;

                let start_vertex = writer.vertex_count();
                for particle in state.pool.iter() {
                    let center = match ep.space {
                        EmissionSpace::World => particle.position,
                        EmissionSpace::Emitter => transform.apply_point(particle.position),
                    };
                    let quad = build_quad(
                        center,
                        particle.size,
                        particle.rotation.to_radians(),
                        uv,
                        particle.alpha,
                    );
                    if !writer.push_quad(&quad) {
                        break;
                    }
                }
                let count = writer.vertex_count() - start_vertex;
                if count > 0 {
                    Self::push_batch(&mut self.batches, material, texture, start_vertex, count);
                }
            }

            instance.refresh_lifecycle();
        }

        UpdateStats {
            live_particles: live,
            vertices_written: writer.vertex_count(),
            bytes_written: writer.bytes_written(),
            truncated: writer.is_truncated(),
        }
    }

    /// Replay the batches from the last update against `sink`, in the
    /// order they were written
    pub fn render(&self, sink: &mut dyn RenderSink) {
        for batch in &self.batches {
            sink.draw(batch);
        }
    }

    /// Batches from the last update
    pub fn batches(&self) -> &[RenderBatch] {
        &self.batches
    }

    fn instance(&self, id: InstanceId) -> Result<&EffectInstance> {
        self.instances.get(id.0).ok_or(CinderError::StaleInstance)
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut EffectInstance> {
        self.instances
            .get_mut(id.0)
            .ok_or(CinderError::StaleInstance)
    }

    fn binding_mut(
        &mut self,
        prototype: PrototypeId,
        emitter_index: usize,
    ) -> Result<&mut EmitterBinding> {
        let entry = self
            .prototypes
            .get_mut(prototype.0)
            .ok_or(CinderError::StalePrototype)?;
        let count = entry.bindings.len();
        entry
            .bindings
            .get_mut(emitter_index)
            .ok_or(CinderError::EmitterIndexOutOfRange {
                index: emitter_index,
                count,
            })
    }

    fn override_mut(
        &mut self,
        id: InstanceId,
        emitter_index: usize,
    ) -> Result<&mut EmitterBinding> {
        let instance = self
            .instances
            .get_mut(id.0)
            .ok_or(CinderError::StaleInstance)?;
        let count = instance.overrides.len();
        instance
            .overrides
            .get_mut(emitter_index)
            .ok_or(CinderError::EmitterIndexOutOfRange {
                index: emitter_index,
                count,
            })
    }

    /// Scramble the stream counter into a per-instance seed so instances
    /// created back to back do not share particle layouts
    fn derive_seed(&mut self) -> u32 {
        let n = self.next_stream;
        self.next_stream = self.next_stream.wrapping_add(1);
        let mut z = self.config.seed.wrapping_add(n.wrapping_mul(0x9E37_79B9));
        z = (z ^ (z >> 16)).wrapping_mul(0x85EB_CA6B);
        z = (z ^ (z >> 13)).wrapping_mul(0xC2B2_AE35);
        z ^ (z >> 16)
    }

    fn push_batch(
        batches: &mut Vec<RenderBatch>,
        material: MaterialHandle,
        texture: TextureHandle,
        vertex_start: usize,
        vertex_count: usize,
    ) {
        if let Some(last) = batches.last_mut() {
            if last.material == material
                && last.texture == texture
                && last.vertex_start + last.vertex_count == vertex_start
            {
                last.vertex_count += vertex_count;
                return;
            }
        }
        batches.push(RenderBatch {
            material,
            texture,
            vertex_start,
            vertex_count,
        });
    }
}

impl Default for ParticleContext {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationData, Playback};
    use crate::vertex::{FLOATS_PER_VERTEX, QUAD_UV_SLOTS, VERTICES_PER_PARTICLE};
    use cinder_core::NameHash;

    const SMOKE_EFFECT: &str = r#"
        name = "smoke"

        [[emitters]]
        mode = "once"
        space = "world"
        type = "sphere"
        tile_source = "foo"
        animation = "anim"
        material = "test"
        duration = 1.0
        max_particle_count = 1

        [emitters.properties.particle_life_time]
        points = [
            { x = 0.0, y = 1.0, tx = 1.0, ty = 0.0 },
            { x = 1.0, y = 1.0, tx = 1.0, ty = 0.0 },
        ]
    "#;

    const BURST_EFFECT: &str = r#"
        name = "burst"

        [[emitters]]
        mode = "once"
        space = "world"
        type = "sphere"
        tile_source = "foo"
        animation = "anim"
        material = "test"
        duration = 1.0
        max_particle_count = 100

        [emitters.properties.particle_life_time]
        points = [
            { x = 0.0, y = 1.0, tx = 1.0, ty = 0.0 },
            { x = 1.0, y = 1.0, tx = 1.0, ty = 0.0 },
        ]

        [emitters.properties.size_x]
        points = [{ x = 0.0, y = 2.0 }]

        [emitters.properties.particle_size]
        points = [{ x = 0.0, y = 0.5 }]

        [emitters.properties.particle_speed]
        points = [{ x = 0.0, y = 1.0 }]
    "#;

    const TWO_EMITTER_EFFECT: &str = r#"
        name = "double"

        [[emitters]]
        id = "left"
        mode = "once"
        space = "world"
        type = "sphere"
        tile_source = "foo"
        animation = "anim"
        material = "test"
        duration = 1.0
        max_particle_count = 1

        [emitters.properties.particle_life_time]
        points = [
            { x = 0.0, y = 1.0, tx = 1.0, ty = 0.0 },
            { x = 1.0, y = 1.0, tx = 1.0, ty = 0.0 },
        ]

        [[emitters]]
        id = "right"
        mode = "once"
        space = "world"
        type = "sphere"
        tile_source = "foo"
        animation = "anim"
        material = "test"
        duration = 1.0
        max_particle_count = 1

        [emitters.properties.particle_life_time]
        points = [
            { x = 0.0, y = 1.0, tx = 1.0, ty = 0.0 },
            { x = 1.0, y = 1.0, tx = 1.0, ty = 0.0 },
        ]
    "#;

    /// Resolver backed by a fixed tile quad list, optionally asserting
    /// which lookup it receives
    struct FixedResolver {
        texture: TextureHandle,
        tex_coords: Vec<[f32; 4]>,
        expect: Option<(TileSourceHandle, NameHash)>,
        fetches: u32,
    }

    impl FixedResolver {
        fn new(texture: TextureHandle, tex_coords: Vec<[f32; 4]>) -> Self {
            Self {
                texture,
                tex_coords,
                expect: None,
                fetches: 0,
            }
        }
    }

    impl AnimationResolver for FixedResolver {
        fn fetch(
            &mut self,
            tile_source: TileSourceHandle,
            animation: NameHash,
        ) -> Option<AnimationData<'_>> {
            if let Some((want_source, want_anim)) = self.expect {
                assert_eq!(tile_source, want_source);
                assert_eq!(animation, want_anim);
            }
            self.fetches += 1;
            Some(AnimationData {
                texture: self.texture,
                tex_coords: &self.tex_coords,
                playback: Playback::OnceForward,
                start_tile: 1,
                end_tile: 1,
                fps: 30.0,
                hflip: false,
                vflip: false,
            })
        }
    }

    struct NoneResolver;

    impl AnimationResolver for NoneResolver {
        fn fetch(&mut self, _: TileSourceHandle, _: NameHash) -> Option<AnimationData<'_>> {
            None
        }
    }

    #[derive(Default)]
    struct CollectSink {
        batches: Vec<RenderBatch>,
    }

    impl RenderSink for CollectSink {
        fn draw(&mut self, batch: &RenderBatch) {
            self.batches.push(*batch);
        }
    }

    fn context() -> ParticleContext {
        ParticleContext::new(ContextConfig {
            max_instances: 32,
            max_particles: 1024,
            seed: 0,
        })
    }

    #[test]
    fn test_single_particle_tick_fills_one_quad() {
        let mut ctx = context();
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        ctx.set_position(instance, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        ctx.set_rotation(instance, Quat::IDENTITY).unwrap();
        ctx.set_material(proto, 0, MaterialHandle(1)).unwrap();
        ctx.set_tile_source(proto, 0, TileSourceHandle(2)).unwrap();
        ctx.start_instance(instance).unwrap();

        let mut resolver = FixedResolver::new(TextureHandle(3), vec![[1.0, 2.0, 3.0, 4.0]]);
        resolver.expect = Some((TileSourceHandle(2), NameHash::of("anim")));

        let mut floats = vec![0.0f32; 1024 * VERTICES_PER_PARTICLE * FLOATS_PER_VERTEX];
        let stats = {
            let mut writer = VertexWriter::from_floats(&mut floats);
            ctx.update(1.0 / 60.0, &mut writer, &mut resolver)
        };

        assert_eq!(resolver.fetches, 1);
        assert_eq!(stats.live_particles, 1);
        assert_eq!(stats.vertices_written, 6);
        assert_eq!(stats.bytes_written, 144);
        assert!(!stats.truncated);

        // One tile means the quad [1, 2, 3, 4] feeds every vertex through
        // the corner slot table. Size and alpha both come from unset
        // curves, so the quad collapses onto the instance position with
        // alpha zero.
        let tile = [1.0, 2.0, 3.0, 4.0];
        for i in 0..VERTICES_PER_PARTICLE {
            let v = &floats[i * FLOATS_PER_VERTEX..(i + 1) * FLOATS_PER_VERTEX];
            assert_eq!(v[0], tile[QUAD_UV_SLOTS[i][0]], "u of vertex {i}");
            assert_eq!(v[1], tile[QUAD_UV_SLOTS[i][1]], "v of vertex {i}");
            assert_eq!(&v[2..5], &[1.0, 2.0, 3.0], "position of vertex {i}");
            assert_eq!(v[5], 0.0, "alpha of vertex {i}");
        }

        let mut sink = CollectSink::default();
        ctx.render(&mut sink);
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(sink.batches[0].material, MaterialHandle(1));
        assert_eq!(sink.batches[0].texture, TextureHandle(3));
        assert_eq!(sink.batches[0].vertex_start, 0);
        assert_eq!(sink.batches[0].vertex_count, 6);

        ctx.stop_instance(instance).unwrap();
        assert_eq!(ctx.instance_lifecycle(instance).unwrap(), Lifecycle::Draining);
        ctx.restart_instance(instance).unwrap();
        assert_eq!(ctx.instance_live_particles(instance).unwrap(), 0);
        ctx.destroy_instance(instance).unwrap();
        ctx.delete_prototype(proto).unwrap();
        assert_eq!(ctx.instance_count(), 0);
        assert_eq!(ctx.prototype_count(), 0);
    }

    #[test]
    fn test_unbound_emitter_simulates_without_drawing() {
        let mut ctx = context();
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        ctx.start_instance(instance).unwrap();

        let mut resolver = FixedResolver::new(TextureHandle(3), vec![[0.0, 0.0, 1.0, 1.0]]);
        let mut floats = vec![0.0f32; 256];
        let stats = {
            let mut writer = VertexWriter::from_floats(&mut floats);
            ctx.update(1.0 / 60.0, &mut writer, &mut resolver)
        };

        assert_eq!(stats.live_particles, 1);
        assert_eq!(stats.vertices_written, 0);
        assert_eq!(resolver.fetches, 0);
        assert!(ctx.batches().is_empty());
    }

    #[test]
    fn test_resolver_miss_skips_drawing() {
        let mut ctx = context();
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        ctx.set_material(proto, 0, MaterialHandle(1)).unwrap();
        ctx.set_tile_source(proto, 0, TileSourceHandle(2)).unwrap();
        ctx.start_instance(instance).unwrap();

        let mut floats = vec![0.0f32; 256];
        let stats = {
            let mut writer = VertexWriter::from_floats(&mut floats);
            ctx.update(1.0 / 60.0, &mut writer, &mut NoneResolver)
        };

        assert_eq!(stats.live_particles, 1);
        assert_eq!(stats.vertices_written, 0);
    }

    #[test]
    fn test_instance_overrides_beat_prototype_bindings() {
        let mut ctx = context();
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        ctx.set_material(proto, 0, MaterialHandle(1)).unwrap();
        ctx.set_tile_source(proto, 0, TileSourceHandle(2)).unwrap();
        ctx.set_instance_material(instance, 0, MaterialHandle(7)).unwrap();
        ctx.set_instance_tile_source(instance, 0, TileSourceHandle(8))
            .unwrap();
        ctx.start_instance(instance).unwrap();

        let mut resolver = FixedResolver::new(TextureHandle(9), vec![[0.0, 0.0, 1.0, 1.0]]);
        resolver.expect = Some((TileSourceHandle(8), NameHash::of("anim")));

        let mut floats = vec![0.0f32; 256];
        {
            let mut writer = VertexWriter::from_floats(&mut floats);
            ctx.update(1.0 / 60.0, &mut writer, &mut resolver);
        }

        assert_eq!(resolver.fetches, 1);
        let batches = ctx.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].material, MaterialHandle(7));
        assert_eq!(batches[0].texture, TextureHandle(9));
    }

    #[test]
    fn test_emitters_sharing_bindings_coalesce_into_one_batch() {
        let mut ctx = context();
        let proto = ctx.new_prototype(TWO_EMITTER_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        for index in 0..2 {
            ctx.set_material(proto, index, MaterialHandle(1)).unwrap();
            ctx.set_tile_source(proto, index, TileSourceHandle(2)).unwrap();
        }
        ctx.start_instance(instance).unwrap();

        let mut resolver = FixedResolver::new(TextureHandle(3), vec![[0.0, 0.0, 1.0, 1.0]]);
        let mut floats = vec![0.0f32; 1024];
        let stats = {
            let mut writer = VertexWriter::from_floats(&mut floats);
            ctx.update(1.0 / 60.0, &mut writer, &mut resolver)
        };

        assert_eq!(stats.live_particles, 2);
        assert_eq!(stats.vertices_written, 12);
        let batches = ctx.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].vertex_start, 0);
        assert_eq!(batches[0].vertex_count, 12);
    }

    #[test]
    fn test_differing_materials_split_batches() {
        let mut ctx = context();
        let proto = ctx.new_prototype(TWO_EMITTER_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        ctx.set_material(proto, 0, MaterialHandle(1)).unwrap();
        ctx.set_material(proto, 1, MaterialHandle(5)).unwrap();
        for index in 0..2 {
            ctx.set_tile_source(proto, index, TileSourceHandle(2)).unwrap();
        }
        ctx.start_instance(instance).unwrap();

        let mut resolver = FixedResolver::new(TextureHandle(3), vec![[0.0, 0.0, 1.0, 1.0]]);
        let mut floats = vec![0.0f32; 1024];
        {
            let mut writer = VertexWriter::from_floats(&mut floats);
            ctx.update(1.0 / 60.0, &mut writer, &mut resolver);
        }

        let batches = ctx.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].material, MaterialHandle(1));
        assert_eq!(batches[0].vertex_start, 0);
        assert_eq!(batches[0].vertex_count, 6);
        assert_eq!(batches[1].material, MaterialHandle(5));
        assert_eq!(batches[1].vertex_start, 6);
        assert_eq!(batches[1].vertex_count, 6);
    }

    #[test]
    fn test_full_buffer_truncates_but_keeps_simulating() {
        let mut ctx = context();
        let proto = ctx.new_prototype(BURST_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        ctx.set_material(proto, 0, MaterialHandle(1)).unwrap();
        ctx.set_tile_source(proto, 0, TileSourceHandle(2)).unwrap();
        ctx.start_instance(instance).unwrap();

        // Room for two quads against a burst of eleven spawns
        let mut floats = vec![0.0f32; 2 * VERTICES_PER_PARTICLE * FLOATS_PER_VERTEX];
        let mut resolver = FixedResolver::new(TextureHandle(3), vec![[0.0, 0.0, 1.0, 1.0]]);
        let stats = {
            let mut writer = VertexWriter::from_floats(&mut floats);
            ctx.update(0.1, &mut writer, &mut resolver)
        };

        assert!(stats.truncated);
        assert_eq!(stats.vertices_written, 12);
        assert!(stats.live_particles > 2);
        assert_eq!(
            ctx.instance_live_particles(instance).unwrap(),
            stats.live_particles
        );
    }

    #[test]
    fn test_instance_limit_is_enforced() {
        let mut ctx = ParticleContext::new(ContextConfig {
            max_instances: 2,
            max_particles: 16,
            seed: 0,
        });
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        ctx.create_instance(proto).unwrap();
        ctx.create_instance(proto).unwrap();
        let err = ctx.create_instance(proto).unwrap_err();
        assert!(matches!(err, CinderError::InstanceLimit { max: 2 }));
    }

    #[test]
    fn test_prototype_deletion_refused_while_instances_live() {
        let mut ctx = context();
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();

        let err = ctx.delete_prototype(proto).unwrap_err();
        assert!(matches!(err, CinderError::PrototypeInUse { count: 1 }));

        ctx.destroy_instance(instance).unwrap();
        ctx.delete_prototype(proto).unwrap();
    }

    #[test]
    fn test_stale_ids_are_rejected() {
        let mut ctx = context();
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        ctx.destroy_instance(instance).unwrap();

        assert!(matches!(
            ctx.destroy_instance(instance).unwrap_err(),
            CinderError::StaleInstance
        ));
        assert!(matches!(
            ctx.start_instance(instance).unwrap_err(),
            CinderError::StaleInstance
        ));

        ctx.delete_prototype(proto).unwrap();
        assert!(matches!(
            ctx.create_instance(proto).unwrap_err(),
            CinderError::StalePrototype
        ));
        assert!(matches!(
            ctx.delete_prototype(proto).unwrap_err(),
            CinderError::StalePrototype
        ));
    }

    #[test]
    fn test_binding_rejects_bad_emitter_index() {
        let mut ctx = context();
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        let err = ctx.set_material(proto, 5, MaterialHandle(1)).unwrap_err();
        assert!(matches!(
            err,
            CinderError::EmitterIndexOutOfRange { index: 5, count: 1 }
        ));
    }

    #[test]
    fn test_identical_contexts_produce_identical_vertices() {
        let run = || {
            let mut ctx = ParticleContext::new(ContextConfig {
                max_instances: 8,
                max_particles: 256,
                seed: 1234,
            });
            let proto = ctx.new_prototype(BURST_EFFECT.as_bytes()).unwrap();
            let instance = ctx.create_instance(proto).unwrap();
            ctx.set_position(instance, Vec3::new(1.0, 2.0, 3.0)).unwrap();
            ctx.set_material(proto, 0, MaterialHandle(1)).unwrap();
            ctx.set_tile_source(proto, 0, TileSourceHandle(2)).unwrap();
            ctx.start_instance(instance).unwrap();

            let mut resolver = FixedResolver::new(TextureHandle(3), vec![[0.0, 0.0, 1.0, 1.0]]);
            let mut floats = vec![0.0f32; 256 * VERTICES_PER_PARTICLE * FLOATS_PER_VERTEX];
            for _ in 0..3 {
                let mut writer = VertexWriter::from_floats(&mut floats);
                ctx.update(1.0 / 60.0, &mut writer, &mut resolver);
            }
            floats
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_finished_instance_leaves_the_update_loop() {
        let mut ctx = context();
        let proto = ctx.new_prototype(SMOKE_EFFECT.as_bytes()).unwrap();
        let instance = ctx.create_instance(proto).unwrap();
        ctx.set_material(proto, 0, MaterialHandle(1)).unwrap();
        ctx.set_tile_source(proto, 0, TileSourceHandle(2)).unwrap();
        ctx.start_instance(instance).unwrap();

        let mut resolver = FixedResolver::new(TextureHandle(3), vec![[0.0, 0.0, 1.0, 1.0]]);
        let mut floats = vec![0.0f32; 1024];
        // Duration one second, lifetime one second: well past three
        // seconds everything is gone
        for _ in 0..200 {
            let mut writer = VertexWriter::from_floats(&mut floats);
            ctx.update(1.0 / 60.0, &mut writer, &mut resolver);
        }

        assert_eq!(ctx.instance_lifecycle(instance).unwrap(), Lifecycle::Stopped);
        assert_eq!(ctx.total_live_particles(), 0);
        let fetches_before = resolver.fetches;
        {
            let mut writer = VertexWriter::from_floats(&mut floats);
            let stats = ctx.update(1.0 / 60.0, &mut writer, &mut resolver);
            assert_eq!(stats.live_particles, 0);
            assert_eq!(stats.vertices_written, 0);
        }
        assert_eq!(resolver.fetches, fetches_before);
    }
}
