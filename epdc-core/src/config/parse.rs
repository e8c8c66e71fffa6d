//! TOML-subset configuration parser
//!
//! Handles only what the scheduler configuration needs, without allocation:
//!
//! - `[section]` headers
//! - `key = value` pairs with integer (decimal or `0x` hex), boolean and
//!   quoted string values
//! - `#` comments, full-line or trailing
//!
//! Unknown keys inside a known section are rejected so typos surface early.
//!
//! ```text
//! [panel]
//! width = 1024
//! height = 758
//!
//! [power]
//! down = "after"
//! down_delay_ms = 500
//! ```

use super::types::{
    HwRevision, PixelFormat, PowerDownDelay, SchedulerConfig, MAX_BUFFERS, MAX_PENDING,
};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Line is not a `key = value` pair
    InvalidLine,
    /// Key not recognised in the current section
    UnknownKey,
    /// Value has the wrong type or is out of range
    InvalidValue,
    /// More buffers or queue entries than the pool can hold
    TooManyItems,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Panel,
    Hardware,
    Buffers,
    Power,
    Timing,
    Waveform,
}

enum Value<'a> {
    Int(i64),
    Bool(bool),
    Str(&'a str),
}

/// Parse a configuration document, starting from the defaults
pub fn parse_config(input: &str) -> Result<SchedulerConfig, ParseError> {
    let mut config = SchedulerConfig::new();
    let mut section = Section::Root;
    // Delay is only meaningful with `down = "after"`; remember it separately
    let mut down_mode: Option<&str> = None;
    let mut down_delay_ms: Option<u32> = None;

    for raw in input.lines() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header.strip_suffix(']').ok_or(ParseError::InvalidSection)?;
            section = parse_section(name.trim())?;
            continue;
        }

        let (key, raw_value) = line.split_once('=').ok_or(ParseError::InvalidLine)?;
        let key = key.trim();
        let value = parse_value(raw_value.trim())?;

        match (section, key) {
            (Section::Panel, "width") => config.panel.width = int(&value, 1, 8192)? as u32,
            (Section::Panel, "height") => config.panel.height = int(&value, 1, 8192)? as u32,

            (Section::Hardware, "revision") => {
                config.hw.revision = HwRevision::new(int(&value, 1, u16::MAX as i64)? as u16)
            }
            (Section::Hardware, "pixel_format") => {
                config.hw.pixel_format = match string(&value)? {
                    "p2n" | "P2N" => PixelFormat::P2n,
                    "p3n" | "P3N" => PixelFormat::P3n,
                    "p4n" | "P4N" => PixelFormat::P4n,
                    "p5n" | "P5N" => PixelFormat::P5n,
                    _ => return Err(ParseError::InvalidValue),
                }
            }

            (Section::Buffers, "count") => {
                let count = int(&value, 1, i64::MAX)?;
                if count as usize > MAX_BUFFERS {
                    return Err(ParseError::TooManyItems);
                }
                config.buffers.count = count as u8;
            }
            (Section::Buffers, "base_addr") => {
                config.buffers.base_addr = int(&value, 0, u32::MAX as i64)? as u32
            }
            (Section::Buffers, "size") => config.buffers.size = int(&value, 1, u32::MAX as i64)? as u32,
            (Section::Buffers, "max_pending") => {
                let depth = int(&value, 1, i64::MAX)?;
                if depth as usize > MAX_PENDING {
                    return Err(ParseError::TooManyItems);
                }
                config.max_pending = depth as u8;
            }

            (Section::Power, "down") => down_mode = Some(string(&value)?),
            (Section::Power, "down_delay_ms") => {
                down_delay_ms = Some(int(&value, 0, u32::MAX as i64)? as u32)
            }
            (Section::Power, "enabled") => {
                if !boolean(&value)? {
                    down_mode = Some("never");
                }
            }

            (Section::Timing, "flush_timeout_ms") => {
                config.timing.flush_timeout_ms = int(&value, 1, u32::MAX as i64)? as u32
            }
            (Section::Timing, "full_refresh_poll_ms") => {
                config.timing.full_refresh_poll_ms = int(&value, 1, u32::MAX as i64)? as u32
            }
            (Section::Timing, "full_refresh_poll_limit") => {
                config.timing.full_refresh_poll_limit = int(&value, 1, u16::MAX as i64)? as u16
            }

            (Section::Waveform, "init") => config.waveforms.init = mode_id(&value)?,
            (Section::Waveform, "du") => config.waveforms.du = mode_id(&value)?,
            (Section::Waveform, "gc4") => config.waveforms.gc4 = mode_id(&value)?,
            (Section::Waveform, "gc8") => config.waveforms.gc8 = mode_id(&value)?,
            (Section::Waveform, "gc16") => config.waveforms.gc16 = mode_id(&value)?,
            (Section::Waveform, "gc32") => config.waveforms.gc32 = mode_id(&value)?,
            (Section::Waveform, "a2") => config.waveforms.a2 = mode_id(&value)?,
            (Section::Waveform, "default_temperature_c") => {
                config.default_temperature_c = int(&value, -40, 85)? as i16
            }

            _ => return Err(ParseError::UnknownKey),
        }
    }

    config.power_down = match (down_mode, down_delay_ms) {
        (None, None) => config.power_down,
        (None, Some(ms)) | (Some("after"), Some(ms)) => PowerDownDelay::After(ms),
        (Some("after"), None) => PowerDownDelay::default(),
        (Some("never"), _) => PowerDownDelay::Never,
        (Some("immediate"), _) => PowerDownDelay::Immediate,
        (Some(_), _) => return Err(ParseError::InvalidValue),
    };

    Ok(config)
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_section(name: &str) -> Result<Section, ParseError> {
    match name {
        "panel" => Ok(Section::Panel),
        "hardware" => Ok(Section::Hardware),
        "buffers" => Ok(Section::Buffers),
        "power" => Ok(Section::Power),
        "timing" => Ok(Section::Timing),
        "waveform" => Ok(Section::Waveform),
        _ => Err(ParseError::InvalidSection),
    }
}

fn parse_value(raw: &str) -> Result<Value<'_>, ParseError> {
    if let Some(inner) = raw.strip_prefix('"') {
        return inner
            .strip_suffix('"')
            .map(Value::Str)
            .ok_or(ParseError::InvalidValue);
    }
    match raw {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    let cleaned = strip_separators(raw)?;
    let (negative, digits) = match cleaned.as_str().strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| ParseError::InvalidValue)?;

    Ok(Value::Int(if negative { -magnitude } else { magnitude }))
}

/// Integer literals may use `_` separators (`0x8000_0000`)
fn strip_separators(raw: &str) -> Result<heapless::String<24>, ParseError> {
    let mut out = heapless::String::new();
    for c in raw.chars().filter(|c| *c != '_') {
        out.push(c).map_err(|_| ParseError::InvalidValue)?;
    }
    Ok(out)
}

fn int(value: &Value<'_>, min: i64, max: i64) -> Result<i64, ParseError> {
    match value {
        Value::Int(v) if (min..=max).contains(v) => Ok(*v),
        _ => Err(ParseError::InvalidValue),
    }
}

fn boolean(value: &Value<'_>) -> Result<bool, ParseError> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => Err(ParseError::InvalidValue),
    }
}

fn string<'a>(value: &Value<'a>) -> Result<&'a str, ParseError> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(ParseError::InvalidValue),
    }
}

fn mode_id(value: &Value<'_>) -> Result<u8, ParseError> {
    int(value, 0, u8::MAX as i64).map(|v| v as u8)
}
