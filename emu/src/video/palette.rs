//! Palette decoding and pen allocation.
//!
//! The palette surface holds 2048 colors in four zones, one per layer:
//!
//! | Zone | Layer   | Logical colors  |
//! |------|---------|-----------------|
//! | 0    | Sprites | `0x000 - 0x1FF` |
//! | 1    | Scroll1 | `0x200 - 0x3FF` |
//! | 2    | Scroll2 | `0x400 - 0x5FF` |
//! | 3    | Scroll3 | `0x600 - 0x7FF` |
//!
//! Every zone has 32 palettes of 16 colors. A color word is
//!
//! ```text
//!   15   12 11    8 7     4 3     0
//!   ┌──────┬───────┬───────┬───────┐
//!   │ BRI  │  RED  │ GREEN │ BLUE  │
//!   └──────┴───────┴───────┴───────┘
//! ```
//!
//! and each displayed component is `nibble * (BRI + 2)`, or 0 when `BRI` is 0.
//!
//! 8-bit frames cannot hold 2048 colors, so every frame the colors the layers
//! are going to use are packed onto the 255 available pens (pen 0 is the
//! background). 16-bit frames store the logical color index directly.

use serde::{Deserialize, Serialize};

use crate::bitwise::{Bits, read_word};

use super::frame::PixelDepth;

/// Logical colors in the palette surface.
pub const PALETTE_COLORS: usize = 2048;

/// Colors in one layer zone.
pub const ZONE_COLORS: usize = 512;

/// Palettes in the whole surface (4 zones x 32).
pub const PALETTE_COUNT: usize = 128;

/// Pens available to 8-bit frames, background included.
const INDEXED8_PENS: usize = 256;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Decodes a raw palette word.
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        let brightness = raw.get_bits(12..=15);
        let scale = if brightness == 0 { 0 } else { brightness + 2 };
        let component = |nibble: u16| (nibble * scale) as u8;

        Self {
            red: component(raw.get_bits(8..=11)),
            green: component(raw.get_bits(4..=7)),
            blue: component(raw.get_bits(0..=3)),
        }
    }
}

/// Logical color index of `pen` in `palette` of `zone`.
#[inline]
#[must_use]
pub const fn color_index(zone: usize, palette: usize, pen: usize) -> usize {
    zone * ZONE_COLORS + (palette & 0x1f) * 16 + pen
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PaletteTable {
    /// Raw words seen by the last rebuild, `None` until first decoded.
    shadow: Vec<Option<u16>>,
    colors: Vec<Rgb>,
}

impl Default for PaletteTable {
    fn default() -> Self {
        Self {
            shadow: vec![None; PALETTE_COLORS],
            colors: vec![Rgb::BLACK; PALETTE_COLORS],
        }
    }
}

impl PaletteTable {
    /// Decodes every entry whose raw word changed since the last call.
    /// Returns how many entries were decoded.
    pub fn rebuild_palette(&mut self, surface: &[u8]) -> usize {
        let mut changed = 0;

        for (idx, (shadow, color)) in self.shadow.iter_mut().zip(&mut self.colors).enumerate() {
            let raw = read_word(surface, idx * 2);
            if *shadow == Some(raw) {
                continue;
            }

            *shadow = Some(raw);
            *color = Rgb::from_raw(raw);
            changed += 1;
        }

        changed
    }

    #[must_use]
    pub fn color(&self, index: usize) -> Rgb {
        self.colors.get(index).copied().unwrap_or_default()
    }

    /// The 512 decoded colors of one zone (0 sprites, 1-3 scroll layers).
    #[must_use]
    pub fn zone_colors(&self, zone: usize) -> &[Rgb] {
        let start = (zone * ZONE_COLORS).min(PALETTE_COLORS);
        let end = (start + ZONE_COLORS).min(PALETTE_COLORS);
        &self.colors[start..end]
    }
}

/// Pens the layers will draw this frame, one mask per palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorUsage {
    masks: Vec<u16>,
}

impl Default for ColorUsage {
    fn default() -> Self {
        Self {
            masks: vec![0; PALETTE_COUNT],
        }
    }
}

impl ColorUsage {
    pub fn clear(&mut self) {
        self.masks.fill(0);
    }

    pub fn mark(&mut self, zone: usize, palette: usize, pens: u16) {
        self.masks[zone * 32 + (palette & 0x1f)] |= pens;
    }

    #[must_use]
    pub fn is_used(&self, index: usize) -> bool {
        self.masks[index / 16].get_bit((index % 16) as u8)
    }

    #[must_use]
    pub fn used_count(&self) -> usize {
        self.masks.iter().map(|mask| mask.count_ones() as usize).sum()
    }
}

/// Logical color to frame pen translation.
#[derive(Clone, Serialize, Deserialize)]
pub struct PenMap {
    depth: PixelDepth,
    pens: Vec<u16>,
    /// Inverse of `pens` for 8-bit frames.
    logical: Vec<Option<u16>>,
}

impl PenMap {
    #[must_use]
    pub fn new(depth: PixelDepth) -> Self {
        let pens = match depth {
            PixelDepth::Indexed8 => vec![0; PALETTE_COLORS],
            PixelDepth::Indexed16 => (0..PALETTE_COLORS as u16).collect(),
        };

        Self {
            depth,
            pens,
            logical: vec![None; INDEXED8_PENS],
        }
    }

    /// Pen every frame is cleared to.
    #[must_use]
    pub const fn background(&self) -> u16 {
        match self.depth {
            PixelDepth::Indexed8 => 0,
            PixelDepth::Indexed16 => PALETTE_COLORS as u16,
        }
    }

    #[inline]
    #[must_use]
    pub fn pen(&self, index: usize) -> u16 {
        self.pens[index]
    }

    /// Logical color shown by `pen`, `None` for the background.
    #[must_use]
    pub fn logical(&self, pen: u16) -> Option<usize> {
        match self.depth {
            PixelDepth::Indexed8 => self
                .logical
                .get(usize::from(pen))
                .copied()
                .flatten()
                .map(usize::from),
            PixelDepth::Indexed16 => Some(usize::from(pen)).filter(|&idx| idx < PALETTE_COLORS),
        }
    }

    /// Packs the used colors onto the 8-bit pens in ascending logical order.
    /// Colors that do not fit show the background. 16-bit maps never change.
    pub fn remap(&mut self, usage: &ColorUsage) {
        if self.depth == PixelDepth::Indexed16 {
            return;
        }

        self.logical.fill(None);
        let mut next = 1;

        for (index, pen) in self.pens.iter_mut().enumerate() {
            *pen = 0;
            if !usage.is_used(index) {
                continue;
            }

            if next < INDEXED8_PENS {
                *pen = next as u16;
                self.logical[next] = Some(index as u16);
                next += 1;
            }
        }

        let used = usage.used_count();
        if used >= INDEXED8_PENS {
            tracing::debug!(
                "{used} colors in use, {} shown as background",
                used - (INDEXED8_PENS - 1)
            );
        }
    }
}
