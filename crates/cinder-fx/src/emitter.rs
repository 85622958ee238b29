//! Emitter runtime: timeline clocks, spawn pacing, and particle aging
//!
//! Each emitter owns one particle pool and a pair of clocks: the
//! unwrapped `elapsed` seconds since the instance started, and a
//! normalized local time derived from it per play mode. Emitter property
//! curves are sampled at the local time when a particle spawns; particle
//! property curves are sampled over each particle's own lifetime every
//! tick.

use crate::particle::{Particle, ParticlePool};
use crate::prototype::{sample_or, EmissionSpace, EmitterGeometry, EmitterPrototype, PlayMode};
use crate::rand::FxRng;
use cinder_core::{Transform, Vec3};
use std::f32::consts::TAU;

/// Runtime state for one emitter of one instance
pub struct EmitterState {
    /// Unwrapped seconds since the instance started
    pub elapsed: f32,
    /// Fractional spawn credit carried across ticks
    accumulator: f32,
    /// Set once a play-once emitter passes its duration
    pub retired: bool,
    pub pool: ParticlePool,
}

impl EmitterState {
    pub fn new(capacity: usize) -> Self {
        let mut state = Self {
            elapsed: 0.0,
            accumulator: 0.0,
            retired: false,
            pool: ParticlePool::new(capacity),
        };
        state.reset();
        state
    }

    /// Rewind to a freshly started emitter, dropping all particles
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        // Primed with one whole particle of credit so a started emitter
        // spawns on its first tick instead of one rate-period later
        self.accumulator = 1.0;
        self.retired = false;
        self.pool.clear();
    }

    /// Normalized [0, 1] position on the emitter timeline
    pub fn local_time(&self, proto: &EmitterPrototype) -> f32 {
        let duration = proto.duration;
        match proto.mode {
            PlayMode::Once => (self.elapsed / duration).min(1.0),
            PlayMode::Loop => (self.elapsed % duration) / duration,
            PlayMode::PingPong => {
                let phase = self.elapsed % (2.0 * duration);
                if phase < duration {
                    phase / duration
                } else {
                    (2.0 * duration - phase) / duration
                }
            }
        }
    }

    /// Advance this emitter by `dt`: spawn, integrate, expire.
    ///
    /// `instance` is the owning instance's transform; `allow_spawn` is
    /// false while the instance is draining after a stop.
    pub fn tick(
        &mut self,
        dt: f32,
        proto: &EmitterPrototype,
        instance: &Transform,
        rng: &mut FxRng,
        allow_spawn: bool,
    ) {
        self.elapsed += dt;
        if proto.mode == PlayMode::Once && self.elapsed >= proto.duration {
            self.retired = true;
        }
        let t = self.local_time(proto);

        if allow_spawn && !self.retired {
            let rate = sample_or(&proto.properties.spawn_rate, t, proto.fallback_spawn_rate());
            if rate > 0.0 {
                self.accumulator += rate * dt;
                let count = self.accumulator as u32;
                self.accumulator -= count as f32;
                for _ in 0..count {
                    self.spawn_particle(proto, instance, rng, t);
                }
            }
        }

        // Integrate positions and refresh lifetime-modulated values
        for p in self.pool.iter_mut() {
            p.position += p.velocity * dt;
            let life_t = p.age_ratio(self.elapsed);
            p.size = p.spawn_size * sample_or(&proto.particle_properties.scale, life_t, 1.0);
            p.alpha = p.spawn_alpha * sample_or(&proto.particle_properties.alpha, life_t, 1.0);
            p.rotation =
                p.spawn_rotation * sample_or(&proto.particle_properties.rotation, life_t, 1.0);
        }

        self.pool.retire_expired(self.elapsed);
    }

    fn spawn_particle(
        &mut self,
        proto: &EmitterPrototype,
        instance: &Transform,
        rng: &mut FxRng,
        t: f32,
    ) {
        if self.pool.is_full() {
            return;
        }
        let ttl = sample_or(&proto.properties.particle_life_time, t, 0.0);
        if ttl <= 0.0 {
            return;
        }

        // One draw from the instance stream per particle; everything else
        // comes from a child stream so the parent advances by exactly one
        // step per spawn regardless of geometry
        let seed = rng.next_u32();
        let mut stream = FxRng::new(seed);

        let size_x = sample_or(&proto.properties.size_x, t, 0.0);
        let size_y = sample_or(&proto.properties.size_y, t, 0.0);
        let size_z = sample_or(&proto.properties.size_z, t, 0.0);
        let (local_pos, local_dir) =
            sample_geometry(proto.geometry, &mut stream, size_x, size_y, size_z);

        let speed = sample_or(&proto.properties.particle_speed, t, 0.0);
        let size = sample_or(&proto.properties.particle_size, t, 0.0);
        let alpha = sample_or(&proto.properties.particle_alpha, t, 0.0);
        let rotation = sample_or(&proto.properties.particle_rotation, t, 0.0);

        // Emitter offset first, then out to world space if requested;
        // emitter-space particles stay in instance-local coordinates
        let mut position = proto.transform.apply_point(local_pos);
        let mut direction = proto.transform.apply_vector(local_dir);
        if proto.space == EmissionSpace::World {
            position = instance.apply_point(position);
            direction = instance.apply_vector(direction);
        }

        self.pool.spawn(Particle {
            position,
            velocity: direction * speed,
            spawn_time: self.elapsed,
            ttl,
            seed,
            spawn_size: size,
            spawn_alpha: alpha,
            spawn_rotation: rotation,
            size,
            alpha,
            rotation,
        });
    }
}

/// Spawn position and velocity direction in emitter-local space.
///
/// Sizes are full extents: circle and sphere diameter, cone top width
/// and height, box edge lengths.
fn sample_geometry(
    geometry: EmitterGeometry,
    rng: &mut FxRng,
    size_x: f32,
    size_y: f32,
    size_z: f32,
) -> (Vec3, Vec3) {
    match geometry {
        EmitterGeometry::Circle => {
            // Uniform over the disc in the XY plane, moving outward
            let theta = rng.range(0.0, TAU);
            let dir = Vec3::new(theta.cos(), theta.sin(), 0.0);
            let radius = size_x * 0.5 * rng.next_f32().sqrt();
            (dir * radius, dir)
        }
        EmitterGeometry::Sphere => {
            let dir = rng.direction();
            let radius = size_x * 0.5 * rng.next_f32().cbrt();
            (dir * radius, dir)
        }
        EmitterGeometry::Cone => {
            // Apex at the origin opening along +Y; size_x is the top
            // diameter at height size_y
            let theta = rng.range(0.0, TAU);
            let spread = size_x * 0.5 * rng.next_f32().sqrt();
            let target = Vec3::new(theta.cos() * spread, size_y, theta.sin() * spread);
            let dir = if target.length() > 1e-6 {
                target.normalized()
            } else {
                Vec3::UP
            };
            (Vec3::ZERO, dir)
        }
        EmitterGeometry::Box => {
            let pos = Vec3::new(
                rng.range(-size_x * 0.5, size_x * 0.5),
                rng.range(-size_y * 0.5, size_y * 0.5),
                rng.range(-size_z * 0.5, size_z * 0.5),
            );
            (pos, Vec3::UP)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prototype::{EmitterCurves, ParticleCurves};
    use cinder_core::{CurvePoint, NameHash, PropertyCurve};

    const DT: f32 = 1.0 / 60.0;

    fn test_proto(mode: PlayMode, max: u32, duration: f32) -> EmitterPrototype {
        EmitterPrototype {
            id: "test".to_string(),
            mode,
            space: EmissionSpace::World,
            geometry: EmitterGeometry::Sphere,
            transform: Transform::IDENTITY,
            tile_source: "tiles".to_string(),
            animation: "anim".to_string(),
            animation_hash: NameHash::of("anim"),
            material: "mat".to_string(),
            duration,
            max_particle_count: max,
            properties: EmitterCurves {
                particle_life_time: Some(PropertyCurve::constant(1.0)),
                ..Default::default()
            },
            particle_properties: ParticleCurves::default(),
        }
    }

    #[test]
    fn first_tick_spawns_under_fallback_rate() {
        // One particle over one second: the primed accumulator spawns it
        // on the very first tick, not a second in
        let proto = test_proto(PlayMode::Once, 1, 1.0);
        let instance = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let mut state = EmitterState::new(1);
        let mut rng = FxRng::new(42);

        state.tick(DT, &proto, &instance, &mut rng, true);
        assert_eq!(state.pool.alive_count(), 1);

        // No size or speed curves: the particle sits at the instance position
        let p = state.pool.as_slice()[0];
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.velocity, Vec3::ZERO);
        assert_eq!(p.alpha, 0.0);
        assert_eq!(p.size, 0.0);
    }

    #[test]
    fn spawn_drops_when_pool_full() {
        let mut proto = test_proto(PlayMode::Once, 3, 1.0);
        proto.properties.spawn_rate = Some(PropertyCurve::constant(600.0));
        let mut state = EmitterState::new(3);
        let mut rng = FxRng::new(42);

        state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        assert_eq!(state.pool.alive_count(), 3);
    }

    #[test]
    fn zero_rate_curve_spawns_nothing() {
        let mut proto = test_proto(PlayMode::Loop, 10, 1.0);
        proto.properties.spawn_rate = Some(PropertyCurve::constant(0.0));
        let mut state = EmitterState::new(10);
        let mut rng = FxRng::new(42);

        for _ in 0..120 {
            state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        }
        assert_eq!(state.pool.alive_count(), 0);
    }

    #[test]
    fn missing_lifetime_spawns_nothing() {
        let mut proto = test_proto(PlayMode::Once, 10, 1.0);
        proto.properties.particle_life_time = None;
        let mut state = EmitterState::new(10);
        let mut rng = FxRng::new(42);

        for _ in 0..30 {
            state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        }
        assert_eq!(state.pool.alive_count(), 0);
    }

    #[test]
    fn once_emitter_retires_but_particles_outlive_it() {
        let proto = test_proto(PlayMode::Once, 100, 0.1);
        let mut state = EmitterState::new(100);
        let mut rng = FxRng::new(42);

        // Past the duration: retired, but particles (ttl 1.0) persist
        for _ in 0..12 {
            state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        }
        assert!(state.retired);
        let after_retire = state.pool.alive_count();
        assert!(after_retire > 0);

        // No new spawns while retired
        state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        assert!(state.pool.alive_count() <= after_retire);

        // Once their lifetime passes, all expire
        for _ in 0..60 {
            state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        }
        assert_eq!(state.pool.alive_count(), 0);
    }

    #[test]
    fn loop_emitter_spawns_past_duration() {
        let mut proto = test_proto(PlayMode::Loop, 1000, 0.25);
        proto.properties.spawn_rate = Some(PropertyCurve::constant(60.0));
        let mut state = EmitterState::new(1000);
        let mut rng = FxRng::new(42);

        for _ in 0..60 {
            state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        }
        assert!(!state.retired);
        // Roughly one per tick for a second, none expired yet (ttl 1.0)
        assert!(state.pool.alive_count() >= 60);
    }

    #[test]
    fn draining_stops_spawns_but_keeps_aging() {
        let proto = test_proto(PlayMode::Loop, 100, 1.0);
        let mut state = EmitterState::new(100);
        let mut rng = FxRng::new(42);

        state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        let alive = state.pool.alive_count();
        assert!(alive > 0);

        // allow_spawn false: counts only ever shrink
        for _ in 0..120 {
            state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, false);
            assert!(state.pool.alive_count() <= alive);
        }
        assert_eq!(state.pool.alive_count(), 0);
    }

    #[test]
    fn local_time_wraps_per_mode() {
        let mut state = EmitterState::new(1);
        state.elapsed = 1.25;

        let once = test_proto(PlayMode::Once, 1, 1.0);
        assert_eq!(state.local_time(&once), 1.0);

        let looped = test_proto(PlayMode::Loop, 1, 1.0);
        assert!((state.local_time(&looped) - 0.25).abs() < 1e-6);

        let pingpong = test_proto(PlayMode::PingPong, 1, 1.0);
        assert!((state.local_time(&pingpong) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn over_life_curves_scale_spawn_values() {
        let mut proto = test_proto(PlayMode::Once, 1, 1.0);
        proto.properties.particle_alpha = Some(PropertyCurve::constant(0.8));
        proto.properties.particle_size = Some(PropertyCurve::constant(2.0));
        // Alpha fades linearly to zero over the particle's life
        proto.particle_properties.alpha = Some(
            PropertyCurve::new(vec![
                CurvePoint::new(0.0, 1.0, 1.0, -1.0),
                CurvePoint::new(1.0, 0.0, 1.0, -1.0),
            ])
            .unwrap(),
        );

        let mut state = EmitterState::new(1);
        let mut rng = FxRng::new(42);
        state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);

        // Half the 1.0s lifetime: 29 more ticks of 1/60
        for _ in 0..29 {
            state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        }
        let p = state.pool.as_slice()[0];
        assert!((p.alpha - 0.4).abs() < 0.02);
        assert_eq!(p.size, 2.0);
    }

    #[test]
    fn emitter_space_ignores_instance_position() {
        let mut proto = test_proto(PlayMode::Once, 1, 1.0);
        proto.space = EmissionSpace::Emitter;
        let instance = Transform::from_position(Vec3::new(50.0, 0.0, 0.0));
        let mut state = EmitterState::new(1);
        let mut rng = FxRng::new(42);

        state.tick(DT, &proto, &instance, &mut rng, true);
        let p = state.pool.as_slice()[0];
        assert_eq!(p.position, Vec3::ZERO);
    }

    #[test]
    fn same_seed_reproduces_particles_exactly() {
        let mut proto = test_proto(PlayMode::Loop, 100, 1.0);
        proto.properties.spawn_rate = Some(PropertyCurve::constant(120.0));
        proto.properties.size_x = Some(PropertyCurve::constant(4.0));
        proto.properties.particle_speed = Some(PropertyCurve::constant(2.0));

        let run = |seed: u32| {
            let mut state = EmitterState::new(100);
            let mut rng = FxRng::new(seed);
            for _ in 0..30 {
                state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
            }
            state
                .pool
                .iter()
                .map(|p| (p.seed, p.position.to_array(), p.velocity.to_array()))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
    }

    #[test]
    fn reset_clears_pool_and_clock() {
        let proto = test_proto(PlayMode::Once, 10, 1.0);
        let mut state = EmitterState::new(10);
        let mut rng = FxRng::new(42);
        for _ in 0..10 {
            state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        }
        assert!(state.pool.alive_count() > 0);

        state.reset();
        assert_eq!(state.pool.alive_count(), 0);
        assert_eq!(state.elapsed, 0.0);
        assert!(!state.retired);

        // Spawns again immediately after the reset
        state.tick(DT, &proto, &Transform::IDENTITY, &mut rng, true);
        assert_eq!(state.pool.alive_count(), 1);
    }
}
