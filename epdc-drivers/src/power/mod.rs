//! Controller power sequencing

pub mod rails;

pub use rails::{RailError, RailSequencer};
