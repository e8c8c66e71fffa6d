//! Update scheduling
//!
//! [`Scheduler`] owns every piece of mutable scheduling state. The caller
//! wraps it in a single lock; none of the methods block.

pub mod collision;
pub mod context;
pub mod pool;

pub use collision::{resolve, Resolution, WorkingBufferStatus};
pub use context::{Acceptance, InterruptReport, Scheduler, Stats, SubmitOutcome};
pub use pool::{BufferId, BufferPool, Census, Location, UpdateBuffer};
