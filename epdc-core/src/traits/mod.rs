//! Collaborator traits
//!
//! The scheduler talks to the controller, the power rails and the waveform
//! data only through these traits so it can run against real registers or
//! the simulated controller in tests.

pub mod power;
pub mod registers;
pub mod waveform;

pub use power::PowerControl;
pub use registers::{EpdcRegisters, SubmitCommand};
pub use waveform::{GrayProfile, PixelSource, WaveformTable};
