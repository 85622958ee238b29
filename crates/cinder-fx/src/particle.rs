//! Particle state and the fixed-capacity pool

use cinder_core::Vec3;

/// One live particle.
///
/// The `spawn_*` fields hold the values sampled from the emitter timeline
/// at spawn; the unprefixed fields are the current values after the
/// over-lifetime modifier curves are applied each tick.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Emitter clock value when this particle spawned
    pub spawn_time: f32,
    /// Seconds this particle lives
    pub ttl: f32,
    /// Per-particle random seed drawn from the instance stream
    pub seed: u32,
    pub spawn_size: f32,
    pub spawn_alpha: f32,
    /// Degrees
    pub spawn_rotation: f32,
    pub size: f32,
    pub alpha: f32,
    pub rotation: f32,
}

impl Particle {
    /// Seconds lived so far, given the emitter clock
    pub fn age(&self, now: f32) -> f32 {
        now - self.spawn_time
    }

    /// Normalized age in [0, 1]
    pub fn age_ratio(&self, now: f32) -> f32 {
        if self.ttl <= 0.0 {
            1.0
        } else {
            (self.age(now) / self.ttl).clamp(0.0, 1.0)
        }
    }
}

/// Fixed-capacity particle pool.
///
/// Spawning into a full pool drops the new particle; existing particles
/// are never evicted. Kills swap-remove, so iteration order changes at
/// kill time but stays contiguous.
pub struct ParticlePool {
    particles: Vec<Particle>,
    capacity: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn alive_count(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.particles.len() >= self.capacity
    }

    /// Add a particle. Returns false (dropping it) when the pool is full.
    pub fn spawn(&mut self, particle: Particle) -> bool {
        if self.is_full() {
            return false;
        }
        self.particles.push(particle);
        true
    }

    /// Swap-remove every particle whose lifetime has elapsed
    pub fn retire_expired(&mut self, now: f32) {
        let mut i = 0;
        while i < self.particles.len() {
            if self.particles[i].age(now) >= self.particles[i].ttl {
                self.particles.swap_remove(i);
                // The swapped-in particle still needs checking
            } else {
                i += 1;
            }
        }
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Particle> {
        self.particles.iter_mut()
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_particle(spawn_time: f32, ttl: f32) -> Particle {
        Particle {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            spawn_time,
            ttl,
            seed: 0,
            spawn_size: 1.0,
            spawn_alpha: 1.0,
            spawn_rotation: 0.0,
            size: 1.0,
            alpha: 1.0,
            rotation: 0.0,
        }
    }

    #[test]
    fn pool_spawn_up_to_capacity_then_drop() {
        let mut pool = ParticlePool::new(2);
        assert!(pool.spawn(make_particle(0.0, 1.0)));
        assert!(pool.spawn(make_particle(0.0, 1.0)));
        assert!(!pool.spawn(make_particle(0.0, 1.0)));
        assert_eq!(pool.alive_count(), 2);
    }

    #[test]
    fn pool_full_keeps_existing_particles() {
        let mut pool = ParticlePool::new(1);
        let mut original = make_particle(0.0, 10.0);
        original.seed = 77;
        pool.spawn(original);
        pool.spawn(make_particle(5.0, 1.0));
        assert_eq!(pool.alive_count(), 1);
        assert_eq!(pool.as_slice()[0].seed, 77);
    }

    #[test]
    fn retire_expired_removes_only_dead() {
        let mut pool = ParticlePool::new(4);
        pool.spawn(make_particle(0.0, 1.0));
        pool.spawn(make_particle(0.0, 5.0));
        pool.spawn(make_particle(0.0, 0.5));

        pool.retire_expired(2.0);
        assert_eq!(pool.alive_count(), 1);
        assert_eq!(pool.as_slice()[0].ttl, 5.0);
    }

    #[test]
    fn retire_expired_checks_swapped_in_particle() {
        let mut pool = ParticlePool::new(4);
        // Both expired: the swap at index 0 must not skip the swapped-in one
        pool.spawn(make_particle(0.0, 0.1));
        pool.spawn(make_particle(0.0, 0.2));
        pool.retire_expired(1.0);
        assert!(pool.is_empty());
    }

    #[test]
    fn clear_empties_pool_and_keeps_capacity() {
        let mut pool = ParticlePool::new(3);
        pool.spawn(make_particle(0.0, 1.0));
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.capacity(), 3);
        assert!(pool.spawn(make_particle(0.0, 1.0)));
    }

    #[test]
    fn age_ratio_clamps_and_guards_zero_ttl() {
        let p = make_particle(1.0, 2.0);
        assert_eq!(p.age_ratio(1.0), 0.0);
        assert_eq!(p.age_ratio(2.0), 0.5);
        assert_eq!(p.age_ratio(10.0), 1.0);

        let degenerate = make_particle(0.0, 0.0);
        assert_eq!(degenerate.age_ratio(0.0), 1.0);
    }
}
