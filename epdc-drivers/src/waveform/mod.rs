//! Waveform data

pub mod trt;

pub use trt::{TableError, TemperatureRangeTable};
