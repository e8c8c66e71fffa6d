//! Configuration
//!
//! Board-agnostic scheduler configuration and a small TOML-subset parser
//! for loading it from flash or an embedded default.

pub mod parse;
pub mod types;

pub use parse::{parse_config, ParseError};
pub use types::*;
