//! Configuration type definitions

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum working buffers in the pool
pub const MAX_BUFFERS: usize = 8;

/// Maximum queued update descriptors
pub const MAX_PENDING: usize = 20;

/// Controller silicon revision (e.g. 10, 20, 30)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HwRevision(u16);

impl HwRevision {
    pub const fn new(rev: u16) -> Self {
        Self(rev)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Revisions before 2.0 underrun when LUT priority is inverted
    pub const fn has_underrun_erratum(self) -> bool {
        self.0 < 20
    }

    /// Revisions 2.0 and later report the collided sub-rectangle
    pub const fn reports_collision_region(self) -> bool {
        self.0 >= 20
    }

    /// Number of usable LUTs for the given working-buffer pixel format
    pub const fn lut_count(self, format: PixelFormat) -> u8 {
        if self.0 < 20 || format.is_reduced_lut() {
            16
        } else {
            64
        }
    }
}

impl Default for HwRevision {
    fn default() -> Self {
        Self(20)
    }
}

/// Working-buffer pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PixelFormat {
    /// 2-bit
    P2n,
    /// 3-bit
    P3n,
    /// 4-bit
    #[default]
    P4n,
    /// 5-bit; only 16 LUTs are available
    P5n,
}

impl PixelFormat {
    pub const fn is_reduced_lut(self) -> bool {
        matches!(self, PixelFormat::P5n)
    }
}

/// Panel geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PanelConfig {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Controller hardware description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HwConfig {
    pub revision: HwRevision,
    pub pixel_format: PixelFormat,
}

/// Working-buffer pool layout
///
/// Pool buffers sit back to back from `base_addr`. The buffer used by full
/// refreshes follows the last pool buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BufferConfig {
    /// Number of working buffers (1..=MAX_BUFFERS)
    pub count: u8,
    /// Physical address of buffer 0
    pub base_addr: u32,
    /// Size of each buffer in bytes
    pub size: u32,
}

impl BufferConfig {
    /// Physical address of buffer `index`
    pub const fn address(&self, index: u8) -> u32 {
        self.base_addr
            .wrapping_add((index as u32).wrapping_mul(self.size))
    }

    /// Physical address of the full-refresh working buffer
    pub const fn refresh_addr(&self) -> u32 {
        self.address(self.count)
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            count: 2,
            base_addr: 0x8000_0000,
            size: 800 * 600,
        }
    }
}

/// When to cut controller power once all updates are done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PowerDownDelay {
    /// Keep the controller powered
    Never,
    /// Power down as soon as the queues are idle
    Immediate,
    /// Power down after the queues stay idle for this many milliseconds
    After(u32),
}

impl PowerDownDelay {
    /// Debounce in milliseconds, or `None` if power-down is disabled
    pub const fn millis(self) -> Option<u32> {
        match self {
            PowerDownDelay::Never => None,
            PowerDownDelay::Immediate => Some(0),
            PowerDownDelay::After(ms) => Some(ms),
        }
    }
}

impl Default for PowerDownDelay {
    fn default() -> Self {
        PowerDownDelay::After(1000)
    }
}

/// Timeouts and polling bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Upper bound for a flush to reach idle
    pub flush_timeout_ms: u32,
    /// Interval between LUT completion polls during a full refresh
    pub full_refresh_poll_ms: u32,
    /// Number of polls before a full refresh is abandoned
    pub full_refresh_poll_limit: u16,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            flush_timeout_ms: 8000,
            full_refresh_poll_ms: 100,
            full_refresh_poll_limit: 40,
        }
    }
}

/// Hardware waveform ids for each logical waveform mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WaveformModes {
    pub init: u8,
    pub du: u8,
    pub gc4: u8,
    pub gc8: u8,
    pub gc16: u8,
    pub gc32: u8,
    pub a2: u8,
}

impl Default for WaveformModes {
    fn default() -> Self {
        Self {
            init: 0,
            du: 1,
            gc4: 3,
            gc8: 2,
            gc16: 2,
            gc32: 2,
            a2: 4,
        }
    }
}

/// Complete scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulerConfig {
    pub panel: PanelConfig,
    pub hw: HwConfig,
    pub buffers: BufferConfig,
    /// Queued descriptors accepted before `ResourceExhausted` (1..=MAX_PENDING)
    pub max_pending: u8,
    pub power_down: PowerDownDelay,
    pub timing: TimingConfig,
    pub waveforms: WaveformModes,
    /// Ambient temperature assumed until a reading is supplied (°C)
    pub default_temperature_c: i16,
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self {
            panel: PanelConfig::default(),
            hw: HwConfig::default(),
            buffers: BufferConfig::default(),
            max_pending: MAX_PENDING as u8,
            power_down: PowerDownDelay::default(),
            timing: TimingConfig::default(),
            waveforms: WaveformModes::default(),
            default_temperature_c: 24,
        }
    }

    /// Number of LUTs usable with this configuration
    pub fn lut_count(&self) -> u8 {
        self.hw.revision.lut_count(self.hw.pixel_format)
    }

    /// Buffer count clamped to the pool capacity
    pub fn buffer_count(&self) -> usize {
        (self.buffers.count as usize).clamp(1, MAX_BUFFERS)
    }

    /// Queue depth clamped to the descriptor capacity
    pub fn queue_depth(&self) -> usize {
        (self.max_pending as usize).clamp(1, MAX_PENDING)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}
