//! Graphics ROM decoding.
//!
//! Tile graphics are stored as four bit-planes, one after the other, each a
//! quarter of the ROM region. An 8x8 base tile takes 8 bytes in every plane:
//!
//! ```text
//!   plane 0   [ tile 0 | tile 1 | ... ]   bit 0 of every pen
//!   plane 1   [ tile 0 | tile 1 | ... ]   bit 1
//!   plane 2   [ tile 0 | tile 1 | ... ]   bit 2
//!   plane 3   [ tile 0 | tile 1 | ... ]   bit 3
//!
//!   byte = plane * len/4 + tile * 8 + row,  msb = leftmost pixel
//! ```
//!
//! Larger tiles are groups of base tiles in Z order, so 16x16 tile `t` is base
//! tiles `4t..4t+4` and 32x32 tile `t` is base tiles `16t..16t+16`:
//!
//! ```text
//!   16x16      32x32
//!   ┌──┬──┐    ┌──┬──┬──┬──┐
//!   │ 0│ 1│    │ 0│ 1│ 4│ 5│
//!   ├──┼──┤    ├──┼──┼──┼──┤
//!   │ 2│ 3│    │ 2│ 3│ 6│ 7│
//!   └──┴──┘    ├──┼──┼──┼──┤
//!              │ 8│ 9│12│13│
//!              ├──┼──┼──┼──┤
//!              │10│11│14│15│
//!              └──┴──┴──┴──┘
//! ```
//!
//! Decoding happens once. Every row becomes a `u32` holding eight 4-bit pens
//! (leftmost pixel in the top nibble) and every tile gets a pen usage mask,
//! bit `n` set when pen `n` appears in it. The masks of the 16x16 and 32x32
//! tiles are the OR of their base tiles.

use crate::error::{VideoError, try_alloc};

/// Bytes of one 8x8 base tile across all four planes.
const BASE_TILE_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSize {
    Size8,
    Size16,
    Size32,
}

impl TileSize {
    /// Width (and height) in pixels.
    #[must_use]
    pub const fn pixels(self) -> usize {
        match self {
            Self::Size8 => 8,
            Self::Size16 => 16,
            Self::Size32 => 32,
        }
    }

    /// How many base tiles make up one tile.
    #[must_use]
    pub const fn base_tiles(self) -> usize {
        match self {
            Self::Size8 => 1,
            Self::Size16 => 4,
            Self::Size32 => 16,
        }
    }
}

/// Position of the base tile holding column `cx`, row `cy` (in 8 pixel
/// steps) of a larger tile.
#[inline]
const fn z_order(cx: usize, cy: usize) -> usize {
    (cx & 1) | ((cy & 1) << 1) | ((cx & 2) << 1) | ((cy & 2) << 2)
}

pub struct DecodedTiles {
    rows: Vec<u32>,
    usage8: Vec<u16>,
    usage16: Vec<u16>,
    usage32: Vec<u16>,
}

impl DecodedTiles {
    /// Decodes a whole graphics ROM region.
    pub fn decode(rom: &[u8]) -> Result<Self, VideoError> {
        if rom.is_empty() {
            return Err(VideoError::EmptyGfxRom);
        }
        if rom.len() % BASE_TILE_BYTES != 0 {
            return Err(VideoError::UndersizedGfxRom { len: rom.len() });
        }

        let count = rom.len() / BASE_TILE_BYTES;
        let plane_len = rom.len() / 4;

        let mut rows = try_alloc::<u32>(count * 8, "decoded tile rows")?;
        let mut usage8 = try_alloc::<u16>(count, "8x8 pen usage")?;

        for tile in 0..count {
            let mut usage = 0_u16;

            for row in 0..8 {
                let offset = tile * 8 + row;
                let planes: [u8; 4] = std::array::from_fn(|p| rom[p * plane_len + offset]);

                let mut packed = 0_u32;
                for x in 0..8 {
                    let bit = 7 - x;
                    let pen = planes
                        .iter()
                        .copied()
                        .enumerate()
                        .fold(0_u32, |pen, (p, byte)| pen | (u32::from((byte >> bit) & 1) << p));

                    packed |= pen << (28 - 4 * x);
                    usage |= 1 << pen;
                }

                rows[offset] = packed;
            }

            usage8[tile] = usage;
        }

        let usage16 = reduce_usage(&usage8, TileSize::Size16)?;
        let usage32 = reduce_usage(&usage8, TileSize::Size32)?;

        tracing::info!(
            "decoded {count} 8x8 tiles ({} 16x16, {} 32x32)",
            usage16.len(),
            usage32.len()
        );

        Ok(Self {
            rows,
            usage8,
            usage16,
            usage32,
        })
    }

    /// Number of addressable tiles of `size`.
    #[must_use]
    pub fn count(&self, size: TileSize) -> usize {
        match size {
            TileSize::Size8 => self.usage8.len(),
            TileSize::Size16 => self.usage16.len(),
            TileSize::Size32 => self.usage32.len(),
        }
    }

    /// Pen usage mask of a tile. Codes past the end use no pens.
    #[must_use]
    pub fn usage(&self, size: TileSize, code: u32) -> u16 {
        let masks = match size {
            TileSize::Size8 => &self.usage8,
            TileSize::Size16 => &self.usage16,
            TileSize::Size32 => &self.usage32,
        };

        usize::try_from(code)
            .ok()
            .and_then(|code| masks.get(code))
            .copied()
            .unwrap_or_default()
    }

    /// Pen at (`x`, `y`) of tile `code`. The caller checks `code` against
    /// [`Self::count`].
    #[inline]
    #[must_use]
    pub fn pen(&self, size: TileSize, code: usize, x: usize, y: usize) -> u8 {
        let base = code * size.base_tiles() + z_order(x / 8, y / 8);
        let row = self.rows[base * 8 + (y & 7)];

        ((row >> (28 - 4 * (x & 7))) & 0xf) as u8
    }
}

fn reduce_usage(usage8: &[u16], size: TileSize) -> Result<Vec<u16>, VideoError> {
    let group = size.base_tiles();
    let mut reduced = try_alloc::<u16>(usage8.len() / group, "pen usage")?;

    for (mask, chunk) in reduced.iter_mut().zip(usage8.chunks_exact(group)) {
        *mask = chunk.iter().fold(0, |acc, usage| acc | usage);
    }

    Ok(reduced)
}
