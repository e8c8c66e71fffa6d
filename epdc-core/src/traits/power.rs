//! Controller power sequencing

/// Power rails and clocks for the display controller
pub trait PowerControl {
    type Error: core::fmt::Debug;

    /// Enable clocks and regulators
    fn power_up(&mut self) -> Result<(), Self::Error>;

    /// Disable regulators and clocks
    fn power_down(&mut self) -> Result<(), Self::Error>;
}
