//! LUT bookkeeping
//!
//! LUTs are the controller's waveform-processing engines. Each concurrently
//! active update occupies one LUT until the hardware signals completion.

pub mod allocator;
pub mod mask;

pub use allocator::{LutAllocator, LutPolicy, LutStatus};
pub use mask::{Lut, LutMask, LutOrders, MAX_LUTS};
