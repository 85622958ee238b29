//! Tile animation resolution at the engine boundary
//!
//! The engine does not own textures or tile sets. Each tick it asks the
//! caller's resolver for the frame data of every emitter that has live
//! particles, then picks the current tile from the emitter clock. Tile
//! indices are 1-based throughout, matching how tile sources are authored.

use crate::handles::{TextureHandle, TileSourceHandle};
use cinder_core::NameHash;

/// How a tile animation advances over time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Hold the start tile
    None,
    OnceForward,
    OnceBackward,
    LoopForward,
    LoopBackward,
    LoopPingPong,
}

/// Frame data for one animation, borrowed from the resolver for the
/// duration of a fetch
#[derive(Debug, Clone, Copy)]
pub struct AnimationData<'a> {
    pub texture: TextureHandle,
    /// Per-tile UV quads, indexed by tile number minus one.
    /// Slot layout is `[u0, v0, u1, v1]` for opposite quad corners.
    pub tex_coords: &'a [[f32; 4]],
    pub playback: Playback,
    /// First tile of the animation, 1-based
    pub start_tile: u32,
    /// Last tile of the animation, 1-based inclusive
    pub end_tile: u32,
    pub fps: f32,
    pub hflip: bool,
    pub vflip: bool,
}

/// Maps a tile source and animation name hash to frame data.
///
/// Returning `None` skips vertex generation for that emitter this tick;
/// the simulation itself is unaffected.
pub trait AnimationResolver {
    fn fetch(&mut self, tile_source: TileSourceHandle, animation: NameHash)
        -> Option<AnimationData<'_>>;
}

/// Pick the 1-based tile index for an animation at `elapsed` seconds
pub fn select_tile(playback: Playback, start_tile: u32, end_tile: u32, fps: f32, elapsed: f32) -> u32 {
    if end_tile <= start_tile {
        return start_tile;
    }
    let tile_count = end_tile - start_tile + 1;

    if fps <= 0.0 {
        return match playback {
            Playback::OnceBackward | Playback::LoopBackward => end_tile,
            _ => start_tile,
        };
    }
    let frame = (elapsed.max(0.0) * fps) as u32;

    match playback {
        Playback::None => start_tile,
        Playback::OnceForward => start_tile + frame.min(tile_count - 1),
        Playback::OnceBackward => end_tile - frame.min(tile_count - 1),
        Playback::LoopForward => start_tile + frame % tile_count,
        Playback::LoopBackward => end_tile - frame % tile_count,
        Playback::LoopPingPong => {
            // Forward then backward without repeating the turning tiles
            let period = 2 * tile_count - 2;
            let k = frame % period;
            let offset = if k < tile_count { k } else { period - k };
            start_tile + offset
        }
    }
}

/// UV quad for a 1-based tile, with flips applied.
/// Returns `None` when the tile is outside the tile source.
pub fn tile_uv(data: &AnimationData<'_>, tile: u32) -> Option<[f32; 4]> {
    if tile == 0 {
        return None;
    }
    let mut uv = *data.tex_coords.get(tile as usize - 1)?;
    if data.hflip {
        uv.swap(0, 2);
    }
    if data.vflip {
        uv.swap(1, 3);
    }
    Some(uv)
}
