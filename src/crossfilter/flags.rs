//! Per-point render flags
//!
//! The renderer receives one small integer per point, the sum
//! `selected + background * 2 + highlight * 4`, and decodes it by repeated
//! halving. Each contribution owns one bit, so contributions written by
//! different producers can be added without colliding.

use crate::error::{MatrixError, Result};
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFlags: u8 {
        const SELECTED = 1;
        const BACKGROUND = 2;
        const HIGHLIGHT = 4;
    }
}

impl RenderFlags {
    pub fn pack(selected: bool, background: bool, highlight: bool) -> u8 {
        selected as u8 + background as u8 * 2 + highlight as u8 * 4
    }

    /// Decode a packed value; bits above `HIGHLIGHT` are ignored
    pub fn decode(packed: u8) -> Self {
        let mut flags = RenderFlags::empty();
        let mut rest = packed;
        for flag in [Self::SELECTED, Self::BACKGROUND, Self::HIGHLIGHT] {
            if rest % 2 == 1 {
                flags |= flag;
            }
            rest /= 2;
        }
        flags
    }

    pub fn is_selected(self) -> bool {
        self.contains(Self::SELECTED)
    }

    pub fn is_background(self) -> bool {
        self.contains(Self::BACKGROUND)
    }

    pub fn is_highlight(self) -> bool {
        self.contains(Self::HIGHLIGHT)
    }
}

/// Add `flag` to every packed value whose row is set in `mask`
///
/// Rows already carrying the flag are left alone.
pub fn add_flag(buffer: &mut [u8], mask: &[bool], flag: RenderFlags) -> Result<()> {
    if buffer.len() != mask.len() {
        return Err(MatrixError::InvalidSelection(format!(
            "Flag buffer has {} rows, mask has {}",
            buffer.len(),
            mask.len()
        )));
    }
    for (packed, _) in buffer.iter_mut().zip(mask).filter(|(_, set)| **set) {
        if !RenderFlags::decode(*packed).contains(flag) {
            *packed += flag.bits();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_matches_bits() {
        for packed in 0..8u8 {
            let flags = RenderFlags::decode(packed);
            assert_eq!(flags.bits(), packed);
            assert_eq!(
                RenderFlags::pack(
                    flags.is_selected(),
                    flags.is_background(),
                    flags.is_highlight()
                ),
                packed
            );
        }
    }

    #[test]
    fn test_decode_ignores_high_bits() {
        assert_eq!(RenderFlags::decode(8), RenderFlags::empty());
        assert_eq!(
            RenderFlags::decode(13),
            RenderFlags::SELECTED | RenderFlags::HIGHLIGHT
        );
    }

    #[test]
    fn test_add_flag() {
        let mut buffer = vec![0, 1, 1, 0];
        add_flag(&mut buffer, &[true, true, false, false], RenderFlags::HIGHLIGHT).unwrap();
        assert_eq!(buffer, vec![4, 5, 1, 0]);

        // Adding twice is harmless
        add_flag(&mut buffer, &[true, false, false, false], RenderFlags::HIGHLIGHT).unwrap();
        assert_eq!(buffer[0], 4);

        assert!(add_flag(&mut buffer, &[true], RenderFlags::BACKGROUND).is_err());
    }
}
