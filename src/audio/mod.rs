//! Decoded audio input.

/// Planar sample storage, slicing and channel interleaving.
pub mod buffer;
/// WAV decoding via `hound`.
pub mod wav;
