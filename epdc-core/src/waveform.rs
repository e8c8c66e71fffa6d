//! Waveform mode and temperature selection

use crate::config::WaveformModes;
use crate::traits::{GrayProfile, PixelSource, WaveformTable};
use crate::update::{Region, WaveformMode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Temperature used to pick the waveform range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Temperature {
    /// Follow the last ambient reading
    Ambient,
    /// Forced temperature in °C
    Celsius(i16),
}

/// Maps logical waveform modes and temperatures to hardware values
#[derive(Debug, Clone, Copy)]
pub struct WaveformSelector {
    modes: WaveformModes,
    temperature: Temperature,
    ambient_c: i16,
}

impl WaveformSelector {
    pub fn new(modes: WaveformModes, ambient_c: i16) -> Self {
        Self {
            modes,
            temperature: Temperature::Ambient,
            ambient_c,
        }
    }

    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: Temperature) {
        self.temperature = temperature;
    }

    /// Record a new ambient reading
    pub fn set_ambient(&mut self, celsius: i16) {
        self.ambient_c = celsius;
    }

    /// Temperature currently in effect
    pub fn celsius(&self) -> i16 {
        match self.temperature {
            Temperature::Ambient => self.ambient_c,
            Temperature::Celsius(t) => t,
        }
    }

    /// Hardware id for a concrete mode
    ///
    /// `Auto` is resolved from the gray levels of `region`.
    pub fn mode_id<P: PixelSource>(&self, mode: WaveformMode, pixels: &P, region: &Region) -> u8 {
        match mode {
            WaveformMode::Auto => match pixels.gray_profile(region) {
                GrayProfile::BlackWhite => self.modes.du,
                GrayProfile::FourLevel => self.modes.gc4,
                GrayProfile::Full => self.modes.gc16,
            },
            WaveformMode::Init => self.modes.init,
            WaveformMode::Du => self.modes.du,
            WaveformMode::Gc4 => self.modes.gc4,
            WaveformMode::Gc8 => self.modes.gc8,
            WaveformMode::Gc16 => self.modes.gc16,
            WaveformMode::Gc32 => self.modes.gc32,
            WaveformMode::A2 => self.modes.a2,
        }
    }

    /// Temperature range index, falling back to the first range
    pub fn temperature_index<T: WaveformTable>(&self, table: &T) -> u8 {
        let celsius = self.celsius();
        match table.temperature_index(celsius) {
            Some(index) => index,
            None => {
                warn!("no waveform range for {} C, using range 0", celsius);
                0
            }
        }
    }
}
