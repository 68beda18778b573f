//! Row coloring
//!
//! - `scales.rs`: hue and sequential ramps, hex parsing
//! - `table.rs`: color table builder and its last-input cache

mod scales;
mod table;

pub use scales::{interpolate_cool, interpolate_rainbow, parse_hex_color, to_hex, Rgb};
pub use table::{ColorMode, ColorScale, ColorTable, ColorTableBuilder, ColorTableCache, UserColors};
