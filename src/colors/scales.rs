//! Color ramps and hex parsing
//!
//! Both ramps are cubehelix curves: `rainbow` is the cyclic hue ramp used
//! for categories, `cool` the sequential ramp used for continuous values.

pub type Rgb = [u8; 3];

// Cubehelix basis
const A: f64 = -0.14861;
const B: f64 = 1.78277;
const C: f64 = -0.29227;
const D: f64 = -0.90649;
const E: f64 = 1.97294;

/// Convert a cubehelix color (hue in degrees, saturation, lightness) to RGB
fn cubehelix(h: f64, s: f64, l: f64) -> Rgb {
    let h = (h + 120.0).to_radians();
    let a = s * l * (1.0 - l);
    let (sin_h, cos_h) = h.sin_cos();

    let channel = |v: f64| (255.0 * v).round().clamp(0.0, 255.0) as u8;
    [
        channel(l + a * (A * cos_h + B * sin_h)),
        channel(l + a * (C * cos_h + D * sin_h)),
        channel(l + a * (E * cos_h)),
    ]
}

/// Cyclic rainbow ramp; `t` wraps into `[0, 1)`
pub fn interpolate_rainbow(t: f64) -> Rgb {
    let t = if (0.0..=1.0).contains(&t) {
        t
    } else {
        t - t.floor()
    };
    let ts = (t - 0.5).abs();
    cubehelix(360.0 * t - 100.0, 1.5 - 1.5 * ts, 0.8 - 0.9 * ts)
}

/// Sequential ramp from purple (`t = 0`) to green (`t = 1`)
///
/// Interpolates hue the long way round, from 260° down to 80°.
pub fn interpolate_cool(t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    cubehelix(260.0 - 180.0 * t, 0.75 + 0.75 * t, 0.35 + 0.45 * t)
}

/// Parse a hex color string to RGB array
///
/// Supports formats:
/// - `#RRGGBB` (6 hex digits)
/// - `#RRGGBBAA` (8 hex digits, alpha ignored)
/// - `RRGGBB` (without #)
pub fn parse_hex_color(hex: &str) -> Option<Rgb> {
    let hex = hex.trim().trim_start_matches('#');

    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        log::debug!("Invalid hex color '{}'", hex);
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some([r, g, b])
}

/// Format as lowercase `#rrggbb`
pub fn to_hex(color: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}
