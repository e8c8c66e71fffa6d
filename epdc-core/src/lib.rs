//! Board-agnostic update scheduler for electrophoretic display controllers
//!
//! This crate contains the scheduling logic that does not depend on a
//! specific controller or async runtime:
//!
//! - Update requests, regions and the merge engine
//! - Working-buffer pool with explicit ownership transfer
//! - LUT bit-sets and the LUT allocator
//! - Collision resolution for completed working buffers
//! - Power state machine with debounced power-down
//! - Waveform mode and temperature selection
//! - Collaborator traits (registers, power rails, waveform table, pixels)
//! - Configuration types and a TOML-subset parser

#![no_std]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible in every module
#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod lut;
pub mod power;
pub mod scheduler;
pub mod traits;
pub mod update;
pub mod waveform;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::Error;
