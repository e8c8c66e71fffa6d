//! GPIO power rail sequencer
//!
//! Brings up the panel PMIC before VCOM and tears them down in reverse.
//! A failed step rolls back whatever was already enabled.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use epdc_core::traits::PowerControl;

/// Rail that failed to switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RailError {
    /// PMIC enable pin
    Regulator,
    /// VCOM enable pin
    Vcom,
}

/// Power sequencer driving the PMIC and VCOM enable pins
pub struct RailSequencer<EN, VCOM, D> {
    pmic_en: EN,
    vcom_en: VCOM,
    delay: D,
    /// Time for the PMIC rails to settle before VCOM is applied
    settle_us: u32,
    powered: bool,
}

impl<EN, VCOM, D> RailSequencer<EN, VCOM, D>
where
    EN: OutputPin,
    VCOM: OutputPin,
    D: DelayNs,
{
    /// Create a sequencer; pins are assumed low
    pub fn new(pmic_en: EN, vcom_en: VCOM, delay: D, settle_us: u32) -> Self {
        Self {
            pmic_en,
            vcom_en,
            delay,
            settle_us,
            powered: false,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Release the pins
    pub fn release(self) -> (EN, VCOM, D) {
        (self.pmic_en, self.vcom_en, self.delay)
    }
}

impl<EN, VCOM, D> PowerControl for RailSequencer<EN, VCOM, D>
where
    EN: OutputPin,
    VCOM: OutputPin,
    D: DelayNs,
{
    type Error = RailError;

    fn power_up(&mut self) -> Result<(), RailError> {
        self.pmic_en.set_high().map_err(|_| RailError::Regulator)?;
        self.delay.delay_us(self.settle_us);

        if self.vcom_en.set_high().is_err() {
            // Roll back; the regulator error is secondary here
            let _ = self.pmic_en.set_low();
            return Err(RailError::Vcom);
        }
        self.powered = true;
        Ok(())
    }

    fn power_down(&mut self) -> Result<(), RailError> {
        self.vcom_en.set_low().map_err(|_| RailError::Vcom)?;
        self.pmic_en.set_low().map_err(|_| RailError::Regulator)?;
        self.powered = false;
        Ok(())
    }
}
