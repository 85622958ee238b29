//! Identifier types crossing the engine boundary
//!
//! The engine never interprets materials, tile sources, or textures; it
//! stores the caller's opaque u64 handles and echoes them back through
//! animation fetches and render batches. Prototype and instance ids wrap
//! generation-checked arena handles, so ids for deleted objects go stale
//! instead of aliasing a later occupant.

use cinder_core::handle::Handle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-side material used to group render batches
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialHandle(pub u64);

impl MaterialHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MaterialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaterialHandle({})", self.0)
    }
}

/// Caller-side tile source that animation fetches resolve against
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileSourceHandle(pub u64);

impl TileSourceHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TileSourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileSourceHandle({})", self.0)
    }
}

/// Caller-side texture echoed back in render batches
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureHandle({})", self.0)
    }
}

/// Id of a loaded effect prototype
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct PrototypeId(pub(crate) Handle);

/// Id of a live effect instance
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct InstanceId(pub(crate) Handle);
