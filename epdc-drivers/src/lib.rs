//! Hardware collaborator implementations
//!
//! Concrete implementations of the collaborator traits defined in
//! epdc-core:
//!
//! - Power rail sequencing over GPIO (PMIC enable, VCOM)
//! - Waveform temperature range table
//! - 8-bit grayscale framebuffer as a pixel source

#![no_std]
#![deny(unsafe_code)]

pub mod framebuffer;
pub mod power;
pub mod waveform;
