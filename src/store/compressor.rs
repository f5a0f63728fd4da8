//! Optional chunk compression hook.

use serde_json::Value;

/// Encodes chunk bytes after decoding, before they leave the store.
///
/// The configuration returned by [`config`](ChunkCompressor::config) is
/// recorded verbatim as the `compressor` of every array descriptor, so it
/// must be a JSON object with an `"id"` member naming the codec.
pub trait ChunkCompressor: Send + Sync {
    /// Codec configuration for `.zarray`.
    fn config(&self) -> Value;

    /// Compress one raw RGBA chunk.
    fn encode(&self, raw: &[u8]) -> Result<Vec<u8>, String>;
}
