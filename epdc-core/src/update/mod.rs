//! Update requests and the merge engine

pub mod region;
pub mod request;

pub use region::Region;
pub use request::{UpdateMode, UpdateRequest, WaveformMode};
