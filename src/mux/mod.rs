//! Container output.
//!
//! [`matroska::Muxer`] collects encoded units from both pipelines and serializes a single
//! Matroska/WebM file; [`probe::probe`] reads one back.

pub(crate) mod ebml;
pub mod matroska;
pub mod probe;
