//! Temperature range table
//!
//! Waveform data is split into temperature ranges. The table holds the
//! ascending lower bound of each range plus the upper bound of the last
//! one, so `n + 1` bounds describe `n` ranges.

use epdc_core::traits::WaveformTable;
use heapless::Vec;

/// Maximum number of temperature ranges
pub const MAX_RANGES: usize = 32;

/// Invalid range bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    /// Fewer than two bounds
    Empty,
    /// More than `MAX_RANGES` ranges
    TooManyRanges,
    /// Bounds are not strictly ascending
    NotAscending,
}

/// Temperature range table of a waveform
#[derive(Debug, Clone)]
pub struct TemperatureRangeTable {
    bounds: Vec<i16, { MAX_RANGES + 1 }>,
}

impl TemperatureRangeTable {
    /// Build from ascending bounds in °C
    pub fn new(bounds: &[i16]) -> Result<Self, TableError> {
        if bounds.len() < 2 {
            return Err(TableError::Empty);
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TableError::NotAscending);
        }
        let bounds = Vec::from_slice(bounds).map_err(|_| TableError::TooManyRanges)?;
        Ok(Self { bounds })
    }

    /// Build from the raw range bytes stored in waveform data
    ///
    /// Each byte is an unsigned temperature in °C.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, TableError> {
        let mut bounds: Vec<i16, { MAX_RANGES + 1 }> = Vec::new();
        for &b in raw {
            bounds.push(b as i16).map_err(|_| TableError::TooManyRanges)?;
        }
        Self::new(&bounds)
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Temperature span covered by range `index`
    pub fn range(&self, index: u8) -> Option<(i16, i16)> {
        let i = index as usize;
        Some((*self.bounds.get(i)?, *self.bounds.get(i + 1)?))
    }
}

impl WaveformTable for TemperatureRangeTable {
    fn temperature_index(&self, celsius: i16) -> Option<u8> {
        // Bounds are sorted, so the last bound <= celsius marks the range
        let upper = self.bounds.partition_point(|&b| b <= celsius);
        if upper == 0 || upper == self.bounds.len() {
            return None;
        }
        Some((upper - 1) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let table = TemperatureRangeTable::new(&[0, 5, 10, 15, 20, 25, 30, 50]).unwrap();
        assert_eq!(table.len(), 7);
        assert_eq!(table.temperature_index(0), Some(0));
        assert_eq!(table.temperature_index(4), Some(0));
        assert_eq!(table.temperature_index(24), Some(4));
        assert_eq!(table.temperature_index(49), Some(6));
        assert_eq!(table.range(4), Some((20, 25)));
    }

    #[test]
    fn test_out_of_range() {
        let table = TemperatureRangeTable::new(&[0, 25, 50]).unwrap();
        assert_eq!(table.temperature_index(-1), None);
        assert_eq!(table.temperature_index(50), None);
        assert_eq!(table.range(2), None);
    }

    #[test]
    fn test_invalid_bounds() {
        assert_eq!(TemperatureRangeTable::new(&[10]).unwrap_err(), TableError::Empty);
        assert_eq!(
            TemperatureRangeTable::new(&[0, 10, 10]).unwrap_err(),
            TableError::NotAscending
        );
        let many: [u8; 40] = core::array::from_fn(|i| i as u8);
        assert_eq!(
            TemperatureRangeTable::from_bytes(&many).unwrap_err(),
            TableError::TooManyRanges
        );
    }

    #[test]
    fn test_from_bytes() {
        let table = TemperatureRangeTable::from_bytes(&[0, 10, 20, 40]).unwrap();
        assert_eq!(table.temperature_index(35), Some(2));
    }
}
