//! Cinder Core - Foundational types for the Cinder particle engine
//!
//! This crate provides the types the simulation crates depend on:
//! - `NameHash` - Stable 64-bit resource name hashes
//! - `Handle`, `Arena` - Generation-checked slot storage
//! - `PropertyCurve` - Hermite property curves
//! - `Transform`, `Vec3`, `Quat` - Spatial types
//! - Error types and Result alias

pub mod handle;
pub mod spline;

mod error;
mod hash;
mod types;

pub use error::{CinderError, Result};
pub use hash::NameHash;
pub use spline::{CurvePoint, PropertyCurve};
pub use types::{Quat, Transform, Vec3};
