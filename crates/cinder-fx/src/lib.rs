//! Particle effect engine
//!
//! The engine is driven through a [`ParticleContext`]. The usual walk:
//!
//! 1. [`ParticleContext::new_prototype`] parses a TOML effect description
//!    into a prototype and hands back a [`PrototypeId`].
//! 2. [`ParticleContext::set_material`] and
//!    [`ParticleContext::set_tile_source`] attach the caller's opaque
//!    render handles to each emitter.
//! 3. [`ParticleContext::create_instance`] makes a playable copy;
//!    position it, start it.
//! 4. [`ParticleContext::update`] once per frame advances every
//!    instance and fills a [`VertexWriter`] with textured quads, pulling
//!    flipbook data through the caller's [`AnimationResolver`].
//! 5. [`ParticleContext::render`] replays the resulting batches against
//!    a [`RenderSink`].
//!
//! Simulation is deterministic: a context configured with the same seed,
//! fed the same calls and the same dt sequence, writes identical
//! vertices.

pub mod animation;
pub mod context;
pub mod emitter;
pub mod handles;
pub mod instance;
pub mod particle;
pub mod prototype;
pub mod rand;
pub mod vertex;

pub use animation::{AnimationData, AnimationResolver, Playback};
pub use context::{ContextConfig, ParticleContext, RenderBatch, RenderSink, UpdateStats};
pub use handles::{InstanceId, MaterialHandle, PrototypeId, TextureHandle, TileSourceHandle};
pub use instance::Lifecycle;
pub use prototype::{EffectDesc, EmissionSpace, EmitterGeometry, PlayMode, Prototype};
pub use vertex::{ParticleVertex, VertexWriter, FLOATS_PER_VERTEX, VERTICES_PER_PARTICLE};
