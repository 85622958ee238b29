//! Effect descriptions and their compiled prototype form
//!
//! Effects are authored as TOML: an effect names its emitters, and each
//! emitter carries curve tables for its spawn-time properties and the
//! over-lifetime modifiers of its particles. `Prototype::from_bytes`
//! parses and validates a description once; instances then share the
//! compiled result immutably.

use cinder_core::spline::{CurvePoint, PropertyCurve};
use cinder_core::{CinderError, NameHash, Quat, Result, Transform, Vec3};
use serde::{Deserialize, Serialize};

/// How an emitter's own timeline advances past its duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    /// Play the duration once, then stop spawning
    #[default]
    Once,
    /// Wrap the timeline back to zero and keep spawning
    Loop,
    /// Bounce the timeline between zero and the duration
    PingPong,
}

/// Space particles live in after spawning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionSpace {
    /// Particles keep their world position; moving the instance leaves
    /// already-spawned particles behind
    #[default]
    World,
    /// Particles follow the instance transform
    Emitter,
}

/// Volume that spawn positions and directions are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitterGeometry {
    Circle,
    Sphere,
    Cone,
    Box,
}

/// Serialized curve: a list of Hermite control points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveDesc {
    pub points: Vec<CurvePoint>,
}

/// Curves sampled on the emitter timeline. A missing curve reads as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterPropertyDesc {
    pub spawn_rate: Option<CurveDesc>,
    pub size_x: Option<CurveDesc>,
    pub size_y: Option<CurveDesc>,
    pub size_z: Option<CurveDesc>,
    pub particle_life_time: Option<CurveDesc>,
    pub particle_speed: Option<CurveDesc>,
    pub particle_size: Option<CurveDesc>,
    pub particle_alpha: Option<CurveDesc>,
    pub particle_rotation: Option<CurveDesc>,
}

/// Curves sampled on each particle's lifetime, multiplied onto the values
/// the particle spawned with. A missing curve reads as one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticlePropertyDesc {
    pub scale: Option<CurveDesc>,
    pub alpha: Option<CurveDesc>,
    pub rotation: Option<CurveDesc>,
}

/// One emitter template in an effect description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterDesc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mode: PlayMode,
    #[serde(default)]
    pub space: EmissionSpace,
    #[serde(rename = "type")]
    pub geometry: EmitterGeometry,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    pub tile_source: String,
    pub animation: String,
    pub material: String,
    pub duration: f32,
    pub max_particle_count: u32,
    #[serde(default)]
    pub properties: EmitterPropertyDesc,
    #[serde(default)]
    pub particle_properties: ParticlePropertyDesc,
}

fn default_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

/// A whole effect description: one or more emitters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDesc {
    #[serde(default)]
    pub name: String,
    pub emitters: Vec<EmitterDesc>,
}

/// Compiled emitter-timeline curves
#[derive(Debug, Clone, Default)]
pub struct EmitterCurves {
    pub spawn_rate: Option<PropertyCurve>,
    pub size_x: Option<PropertyCurve>,
    pub size_y: Option<PropertyCurve>,
    pub size_z: Option<PropertyCurve>,
    pub particle_life_time: Option<PropertyCurve>,
    pub particle_speed: Option<PropertyCurve>,
    pub particle_size: Option<PropertyCurve>,
    pub particle_alpha: Option<PropertyCurve>,
    pub particle_rotation: Option<PropertyCurve>,
}

/// Compiled particle-lifetime curves
#[derive(Debug, Clone, Default)]
pub struct ParticleCurves {
    pub scale: Option<PropertyCurve>,
    pub alpha: Option<PropertyCurve>,
    pub rotation: Option<PropertyCurve>,
}

/// Evaluate an optional curve, reading `default` when the curve is absent
pub fn sample_or(curve: &Option<PropertyCurve>, x: f32, default: f32) -> f32 {
    match curve {
        Some(c) => c.evaluate(x),
        None => default,
    }
}

/// One compiled emitter template
#[derive(Debug, Clone)]
pub struct EmitterPrototype {
    pub id: String,
    pub mode: PlayMode,
    pub space: EmissionSpace,
    pub geometry: EmitterGeometry,
    /// Emitter offset within the instance
    pub transform: Transform,
    pub tile_source: String,
    pub animation: String,
    pub animation_hash: NameHash,
    pub material: String,
    pub duration: f32,
    pub max_particle_count: u32,
    pub properties: EmitterCurves,
    pub particle_properties: ParticleCurves,
}

impl EmitterPrototype {
    /// Spawn rate used when no spawn_rate curve is authored: emit the
    /// whole particle budget over one duration
    pub fn fallback_spawn_rate(&self) -> f32 {
        self.max_particle_count as f32 / self.duration
    }
}

/// A compiled, immutable effect shared by all its instances
#[derive(Debug, Clone)]
pub struct Prototype {
    pub name: String,
    pub emitters: Vec<EmitterPrototype>,
}

impl Prototype {
    /// Parse and compile an effect description from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)?;
        Self::from_toml_str(text)
    }

    /// Parse and compile an effect description from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let desc: EffectDesc = toml::from_str(text)?;
        Self::compile(desc)
    }

    /// Validate a parsed description and compile its curves
    pub fn compile(desc: EffectDesc) -> Result<Self> {
        if desc.emitters.is_empty() {
            return Err(CinderError::InvalidEffect(
                "effect has no emitters".to_string(),
            ));
        }

        let mut emitters = Vec::with_capacity(desc.emitters.len());
        for (index, e) in desc.emitters.into_iter().enumerate() {
            emitters.push(compile_emitter(index, e)?);
        }

        Ok(Self {
            name: desc.name,
            emitters,
        })
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }
}

fn compile_emitter(index: usize, desc: EmitterDesc) -> Result<EmitterPrototype> {
    let label = emitter_label(index, &desc.id);

    if !desc.duration.is_finite() || desc.duration <= 0.0 {
        return Err(CinderError::InvalidEffect(format!(
            "{label}: duration must be positive, got {}",
            desc.duration
        )));
    }
    if desc.max_particle_count == 0 {
        return Err(CinderError::InvalidEffect(format!(
            "{label}: max_particle_count must be at least 1"
        )));
    }

    let p = desc.properties;
    let properties = EmitterCurves {
        spawn_rate: compile_curve(&label, "spawn_rate", p.spawn_rate)?,
        size_x: compile_curve(&label, "size_x", p.size_x)?,
        size_y: compile_curve(&label, "size_y", p.size_y)?,
        size_z: compile_curve(&label, "size_z", p.size_z)?,
        particle_life_time: compile_curve(&label, "particle_life_time", p.particle_life_time)?,
        particle_speed: compile_curve(&label, "particle_speed", p.particle_speed)?,
        particle_size: compile_curve(&label, "particle_size", p.particle_size)?,
        particle_alpha: compile_curve(&label, "particle_alpha", p.particle_alpha)?,
        particle_rotation: compile_curve(&label, "particle_rotation", p.particle_rotation)?,
    };

    let pp = desc.particle_properties;
    let particle_properties = ParticleCurves {
        scale: compile_curve(&label, "scale", pp.scale)?,
        alpha: compile_curve(&label, "alpha", pp.alpha)?,
        rotation: compile_curve(&label, "rotation", pp.rotation)?,
    };

    let animation_hash = NameHash::of(&desc.animation);
    let transform = Transform::new(
        Vec3::from_array(desc.position),
        Quat::from_array(desc.rotation).normalized(),
    );

    Ok(EmitterPrototype {
        id: desc.id,
        mode: desc.mode,
        space: desc.space,
        geometry: desc.geometry,
        transform,
        tile_source: desc.tile_source,
        animation: desc.animation,
        animation_hash,
        material: desc.material,
        duration: desc.duration,
        max_particle_count: desc.max_particle_count,
        properties,
        particle_properties,
    })
}

fn compile_curve(
    label: &str,
    key: &str,
    desc: Option<CurveDesc>,
) -> Result<Option<PropertyCurve>> {
    match desc {
        Some(c) => {
            let curve = PropertyCurve::new(c.points).map_err(|err| {
                CinderError::InvalidEffect(format!("{label}: curve '{key}': {err}"))
            })?;
            Ok(Some(curve))
        }
        None => Ok(None),
    }
}

fn emitter_label(index: usize, id: &str) -> String {
    if id.is_empty() {
        format!("emitter {index}")
    } else {
        format!("emitter {index} '{id}'")
    }
}
