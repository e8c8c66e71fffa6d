//! Scheduler error taxonomy
//!
//! Every error is local to the call that produced it. None of them leave the
//! scheduler in an inconsistent state.

use core::fmt;

/// Errors reported by the update scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No free update descriptor or working buffer; retry later
    ResourceExhausted,
    /// Controller not initialized, or updates are paused
    Busy,
    /// Flush or full-refresh polling exceeded its bound
    Timeout,
    /// Regulator or clock sequencing failed; the power transition was aborted
    HardwareFault,
    /// Timing controller underrun reported by older silicon
    Underrun,
    /// Update region is empty or lies outside the panel
    InvalidRegion,
}

impl Error {
    /// Whether the caller may reasonably retry the same request later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ResourceExhausted | Error::Busy | Error::Timeout | Error::Underrun
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::ResourceExhausted => "no free update descriptor or buffer",
            Error::Busy => "controller not ready for updates",
            Error::Timeout => "operation timed out",
            Error::HardwareFault => "power sequencing failed",
            Error::Underrun => "timing controller underrun",
            Error::InvalidRegion => "update region outside panel",
        };
        f.write_str(msg)
    }
}
