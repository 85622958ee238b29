//! Effect instances: lifecycle state and per-emitter runtime
//!
//! An instance is one playing copy of a prototype. It owns an emitter
//! state (clock plus pool) per prototype emitter, a transform the caller
//! moves around, and the seeded random stream that makes playback
//! reproducible.

use crate::emitter::EmitterState;
use crate::handles::{MaterialHandle, PrototypeId, TileSourceHandle};
use crate::prototype::Prototype;
use crate::rand::FxRng;
use cinder_core::Transform;

/// Where an instance is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Exists but has never been started
    Created,
    /// Emitters spawn and simulate
    Running,
    /// Stopped spawning; existing particles play out
    Draining,
    /// No emitter will spawn and no particle is left
    Stopped,
}

/// Material and tile source bound to one emitter. A prototype carries the
/// base bindings; an instance's copies override them where set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitterBinding {
    pub material: Option<MaterialHandle>,
    pub tile_source: Option<TileSourceHandle>,
}

/// One playing copy of an effect prototype
pub struct EffectInstance {
    pub prototype: PrototypeId,
    pub transform: Transform,
    /// Seed applied at the next start or restart
    pub seed: u32,
    pub lifecycle: Lifecycle,
    pub emitters: Vec<EmitterState>,
    pub overrides: Vec<EmitterBinding>,
    pub rng: FxRng,
}

impl EffectInstance {
    /// Build an instance for `proto`. Each emitter pool is capped by both
    /// the emitter's own budget and the context-wide particle limit.
    pub fn new(prototype: PrototypeId, proto: &Prototype, seed: u32, particle_cap: u32) -> Self {
        let emitters = proto
            .emitters
            .iter()
            .map(|e| EmitterState::new(e.max_particle_count.min(particle_cap) as usize))
            .collect();
        let overrides = vec![EmitterBinding::default(); proto.emitters.len()];
        Self {
            prototype,
            transform: Transform::IDENTITY,
            seed,
            lifecycle: Lifecycle::Created,
            emitters,
            overrides,
            rng: FxRng::new(seed),
        }
    }

    /// Begin playback from the top. Running instances are left alone;
    /// draining instances resume spawning without a rewind.
    pub fn start(&mut self) {
        match self.lifecycle {
            Lifecycle::Created | Lifecycle::Stopped => {
                self.rng = FxRng::new(self.seed);
                for e in &mut self.emitters {
                    e.reset();
                }
                self.lifecycle = Lifecycle::Running;
            }
            Lifecycle::Draining => {
                self.lifecycle = Lifecycle::Running;
            }
            Lifecycle::Running => {}
        }
    }

    /// Stop spawning. Live particles keep simulating until they expire;
    /// with nothing alive the instance stops outright.
    pub fn stop(&mut self) {
        if self.lifecycle == Lifecycle::Running {
            self.lifecycle = if self.live_particles() > 0 {
                Lifecycle::Draining
            } else {
                Lifecycle::Stopped
            };
        }
    }

    /// Rewind to time zero with cleared pools and a fresh seed stream,
    /// from any state
    pub fn restart(&mut self) {
        self.rng = FxRng::new(self.seed);
        for e in &mut self.emitters {
            e.reset();
        }
        self.lifecycle = Lifecycle::Running;
    }

    /// True while update ticks should simulate this instance
    pub fn is_simulating(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running | Lifecycle::Draining)
    }

    pub fn live_particles(&self) -> u32 {
        self.emitters.iter().map(|e| e.pool.alive_count() as u32).sum()
    }

    /// Settle the lifecycle after a tick: a running instance whose
    /// emitters have all retired and drained is finished, as is a
    /// draining instance with empty pools.
    pub fn refresh_lifecycle(&mut self) {
        match self.lifecycle {
            Lifecycle::Running => {
                if self
                    .emitters
                    .iter()
                    .all(|e| e.retired && e.pool.is_empty())
                {
                    self.lifecycle = Lifecycle::Stopped;
                }
            }
            Lifecycle::Draining => {
                if self.emitters.iter().all(|e| e.pool.is_empty()) {
                    self.lifecycle = Lifecycle::Stopped;
                }
            }
            Lifecycle::Created | Lifecycle::Stopped => {}
        }
    }
}
