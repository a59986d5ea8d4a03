//! Graphics RAM and the video surfaces that live in it.
//!
//! The 68000 writes everything the video chips read into a single 192KB block
//! of graphics RAM (`0x90_0000` - `0x92_FFFF`). The CPS-A base registers then
//! point each surface somewhere inside it:
//!
//! | Surface    | Size     | Alignment | Content                                  |
//! |------------|----------|-----------|------------------------------------------|
//! | Objects    | 2KB      | 2KB       | 256 sprites, 8 bytes each                |
//! | Scroll1    | 16KB     | 16KB      | 64x64 8x8 tiles, 4 bytes each            |
//! | Scroll2    | 16KB     | 16KB      | 64x64 16x16 tiles, 4 bytes each          |
//! | Scroll3    | 16KB     | 16KB      | 64x64 32x32 tiles, 4 bytes each          |
//! | Other      | 2KB      | 2KB       | 1024 signed row-scroll line offsets      |
//! | Palette    | 4KB      | 2KB       | 4 zones x 32 palettes x 16 colors        |
//!
//! Words are stored big-endian.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::bitwise::read_word;

/// Size of graphics RAM.
pub const GFXRAM_SIZE: usize = 0x3_0000;

/// Address window the base registers can reach.
pub const GFXRAM_WINDOW_MASK: usize = 0x3_ffff;

/// Size of the object table.
pub const OBJ_SIZE: usize = 0x800;

/// Size of one scroll table.
pub const SCROLL_SIZE: usize = 0x4000;

/// Size of the row-scroll line offset table.
pub const OTHER_SIZE: usize = 0x800;

/// Size of the palette (4 zones x 32 palettes x 16 colors x 2 bytes).
pub const PALETTE_SIZE: usize = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Surface {
    Objects,
    Scroll1,
    Scroll2,
    Scroll3,
    Other,
    Palette,
}

impl Surface {
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Objects => OBJ_SIZE,
            Self::Scroll1 | Self::Scroll2 | Self::Scroll3 => SCROLL_SIZE,
            Self::Other => OTHER_SIZE,
            Self::Palette => PALETTE_SIZE,
        }
    }

    /// The boundary the hardware forces the surface onto. Scroll tables must
    /// start on a 16KB boundary, some titles program unaligned values anyway
    /// and rely on the low bits being ignored.
    #[must_use]
    pub const fn alignment(self) -> usize {
        match self {
            Self::Scroll1 | Self::Scroll2 | Self::Scroll3 => 0x4000,
            Self::Objects | Self::Other | Self::Palette => 0x800,
        }
    }

    /// Converts a base register value to an aligned offset in graphics RAM.
    #[must_use]
    pub const fn locate(self, register: u16) -> usize {
        let address = (register as usize) << 8;
        (address & !(self.alignment() - 1)) & GFXRAM_WINDOW_MASK
    }
}

#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub struct GraphicsRam {
    #[serde_as(as = "Box<[_; 196608]>")]
    data: Box<[u8; GFXRAM_SIZE]>,
}

impl Default for GraphicsRam {
    fn default() -> Self {
        Self {
            data: vec![0; GFXRAM_SIZE]
                .into_boxed_slice()
                .try_into()
                .unwrap_or_else(|_| unreachable!()),
        }
    }
}

impl GraphicsRam {
    /// Builds graphics RAM from a dump, zero padding or truncating it.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut ram = Self::default();
        let len = bytes.len().min(GFXRAM_SIZE);
        ram.data[..len].copy_from_slice(&bytes[..len]);
        ram
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    pub fn write_word(&mut self, offset: usize, value: u16) {
        if let Some(bytes) = self.data.get_mut(offset..offset + 2) {
            bytes.copy_from_slice(&value.to_be_bytes());
        }
    }

    #[must_use]
    pub fn read_word(&self, offset: usize) -> u16 {
        read_word(self.data.as_slice(), offset)
    }

    /// The part of `surface` starting at `base` that lies inside graphics
    /// RAM. Short (or empty) when the base points past the end.
    #[must_use]
    pub fn surface(&self, surface: Surface, base: usize) -> &[u8] {
        let start = base.min(GFXRAM_SIZE);
        let end = (base + surface.size()).min(GFXRAM_SIZE);
        &self.data[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bases_are_masked_to_their_alignment() {
        assert_eq!(Surface::Scroll1.locate(0x9000), 0x0000);
        assert_eq!(Surface::Scroll1.locate(0x9040), 0x4000);
        assert_eq!(Surface::Scroll1.locate(0x9047), 0x4000);
        // Objects only need a 2KB boundary.
        assert_eq!(Surface::Objects.locate(0x9208), 0x2_0800);
        assert_eq!(Surface::Objects.locate(0x920c), 0x2_0800);
        assert_eq!(Surface::Palette.locate(0x9100), 0x1_0000);
    }

    #[test]
    fn words_are_big_endian() {
        let mut ram = GraphicsRam::default();
        ram.write_word(0x10, 0xbeef);
        assert_eq!(ram.as_bytes()[0x10], 0xbe);
        assert_eq!(ram.as_bytes()[0x11], 0xef);
        assert_eq!(ram.read_word(0x10), 0xbeef);
    }

    #[test]
    fn surfaces_past_the_end_are_clipped() {
        let ram = GraphicsRam::default();
        assert_eq!(ram.surface(Surface::Scroll1, 0x2_c000).len(), 0x4000);
        assert_eq!(ram.surface(Surface::Scroll1, 0x2_e000).len(), 0x2000);
        assert!(ram.surface(Surface::Scroll1, 0x3_c000).is_empty());
    }

    #[test]
    fn dumps_are_padded() {
        let ram = GraphicsRam::from_bytes(&[1, 2, 3]);
        assert_eq!(ram.read_word(0), 0x0102);
        assert_eq!(ram.read_word(2), 0x0300);
    }
}
