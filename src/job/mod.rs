//! Job orchestration: configuration, cancellation, progress and the controller that runs the
//! video and audio passes and finalizes the container.

pub mod cancel;
pub mod config;
pub mod controller;
pub mod progress;
