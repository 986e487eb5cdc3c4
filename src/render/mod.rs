//! Waveform rasterization.

/// Color parsing and conversion.
pub mod color;
/// CPU waveform renderer powered by `vello_cpu`.
pub mod waveform;
