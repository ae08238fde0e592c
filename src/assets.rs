//! Bundled audio
//!
//! Embeds the startup playback track at compile time using rust_embed.

use crate::audio::{wav, Track};
use anyhow::{anyhow, Context, Result};
use rust_embed::RustEmbed;

/// Track loaded into the player at startup
pub const BUNDLED_TRACK: &str = "piano.wav";

#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

/// Decode the bundled track; missing or corrupt audio is a startup failure
pub fn bundled_track() -> Result<Track> {
    let file = Assets::get(BUNDLED_TRACK)
        .ok_or_else(|| anyhow!("bundled asset {} is missing", BUNDLED_TRACK))?;

    wav::decode_bytes(&file.data).with_context(|| format!("failed to decode {}", BUNDLED_TRACK))
}
