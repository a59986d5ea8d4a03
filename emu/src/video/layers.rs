#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

//! Scroll layer and sprite rendering.
//!
//! The CPS-A draws four layers: three scrolling tilemaps of different tile
//! sizes and the sprite (OBJ) layer.
//!
//! | Layer   | Tile  | Plane       | Palette zone | Bank unit |
//! |---------|-------|-------------|--------------|-----------|
//! | Sprites | 16x16 | 512x256     | 0            | -         |
//! | Scroll1 | 8x8   | 512x512     | 1            | `0x8000`  |
//! | Scroll2 | 16x16 | 1024x1024   | 2            | `0x4000`  |
//! | Scroll3 | 32x32 | 2048x2048   | 3            | `0x1000`  |
//!
//! # Tilemap entries
//!
//! Every scroll table holds 64x64 entries of two words:
//!
//! ```text
//!   word 0   tile code
//!   word 1   attribute
//!            ┌───────┬────────┬───┬───┬─────────┐
//!            │ 15..9 │  8..7  │ 6 │ 5 │  4..0   │
//!            │   -   │ class  │ Y │ X │ palette │
//!            └───────┴────────┴───┴───┴─────────┘
//! ```
//!
//! The *class* picks one of the four transparency selectors: pens whose bit is
//! set in the selector are drawn above the sprites even when the layer itself
//! is below them.
//!
//! # Drawing
//!
//! Everything goes through [`draw_tile`], which walks the pixels of one tile
//! and hands them to a [`PixelSink`]. The sink decides what a pixel means:
//!
//! | Sink               | Target           | Pen 0       | Other pens             |
//! |--------------------|------------------|-------------|------------------------|
//! | [`TransparentSink`]| frame            | skipped     | plotted                |
//! | [`SpriteSink`]     | frame            | skipped     | plotted unless marked  |
//! | [`PrioritySink`]   | priority buffer  | per mask    | marked if in the mask  |
//! | [`OpaqueSink`]     | offscreen bitmap | plotted     | plotted                |

use serde::{Deserialize, Serialize};

use crate::bitwise::{Bits, read_word};
use crate::config::{CodeRange, ConfigurationRecord};

use super::frame::{
    Frame, PriorityBuffer, SCREEN_HEIGHT, SCREEN_WIDTH, SCREEN_X_OFFSET, SCREEN_Y_OFFSET,
};
use super::gfx::{DecodedTiles, TileSize};
use super::memory::{GraphicsRam, SCROLL_SIZE, Surface};
use super::palette::{ColorUsage, PenMap, color_index};
use super::registers::FrameRegisters;

pub mod scroll1;
pub mod scroll2;
pub mod scroll3;
pub mod sprites;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerId {
    Sprites,
    Scroll1,
    Scroll2,
    Scroll3,
}

impl LayerId {
    /// Layer named by a 2-bit draw order field of the layer-control register.
    pub const SLOT_TABLE: [Self; 4] = [Self::Sprites, Self::Scroll1, Self::Scroll2, Self::Scroll3];

    /// Index of a scroll layer into the per-layer register arrays.
    #[must_use]
    pub const fn scroll_index(self) -> Option<usize> {
        match self {
            Self::Sprites => None,
            Self::Scroll1 => Some(0),
            Self::Scroll2 => Some(1),
            Self::Scroll3 => Some(2),
        }
    }
}

/// What the layer renderers read for one frame.
pub struct RenderContext<'a> {
    pub config: &'a ConfigurationRecord,
    pub tiles: &'a DecodedTiles,
    pub gram: &'a GraphicsRam,
    pub regs: &'a FrameRegisters,
    pub pens: &'a PenMap,
}

impl<'a> RenderContext<'a> {
    #[must_use]
    pub fn surface(&self, surface: Surface) -> &'a [u8] {
        self.gram.surface(surface, self.regs.bases.get(surface))
    }

    #[must_use]
    pub fn row_scroll(&self) -> bool {
        self.regs.row_scroll(self.config)
    }
}

/// A (code, attribute) word pair read from a scroll or object table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TileDescriptor {
    pub code: u16,
    pub attribute: u16,
}

impl TileDescriptor {
    #[must_use]
    pub fn read(surface: &[u8], offset: usize) -> Self {
        Self {
            code: read_word(surface, offset),
            attribute: read_word(surface, offset + 2),
        }
    }

    #[must_use]
    pub fn palette(&self) -> usize {
        usize::from(self.attribute.get_bits(0..=4))
    }

    #[must_use]
    pub fn flip_x(&self) -> bool {
        self.attribute.get_bit(5)
    }

    #[must_use]
    pub fn flip_y(&self) -> bool {
        self.attribute.get_bit(6)
    }

    /// Transparency selector used by the high pass.
    #[must_use]
    pub fn priority_class(&self) -> usize {
        usize::from(self.attribute.get_bits(7..=8))
    }

    /// Both words, the way the distortion cache remembers them.
    #[must_use]
    pub fn raw(&self) -> u32 {
        (u32::from(self.code) << 16) | u32::from(self.attribute)
    }

    #[must_use]
    pub fn placement(&self, x: i32, y: i32) -> Placement {
        Placement {
            x,
            y,
            flip_x: self.flip_x(),
            flip_y: self.flip_y(),
        }
    }
}

/// Where (and how) a tile lands on its target. Coordinates may be negative or
/// past the target, pixels outside are clipped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub flip_x: bool,
    pub flip_y: bool,
}

pub trait PixelSink {
    /// Target (width, height).
    fn bounds(&self) -> (usize, usize);

    fn put(&mut self, x: usize, y: usize, pen: u8);
}

/// Frame target, pen 0 is transparent.
pub struct TransparentSink<'a> {
    pub frame: &'a mut Frame,
    pub pens: &'a PenMap,
    pub color_base: usize,
}

impl PixelSink for TransparentSink<'_> {
    fn bounds(&self) -> (usize, usize) {
        (SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    #[inline]
    fn put(&mut self, x: usize, y: usize, pen: u8) {
        if pen != 0 {
            let pen = self.pens.pen(self.color_base + usize::from(pen));
            self.frame.plot(x, y, pen);
        }
    }
}

/// Frame target that leaves pixels marked in the priority buffer alone.
pub struct SpriteSink<'a> {
    pub frame: &'a mut Frame,
    pub priority: &'a PriorityBuffer,
    pub pens: &'a PenMap,
    pub color_base: usize,
}

impl PixelSink for SpriteSink<'_> {
    fn bounds(&self) -> (usize, usize) {
        (SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    #[inline]
    fn put(&mut self, x: usize, y: usize, pen: u8) {
        if pen != 0 && !self.priority.is_marked(x, y) {
            let pen = self.pens.pen(self.color_base + usize::from(pen));
            self.frame.plot(x, y, pen);
        }
    }
}

/// Marks the pixels whose pen is in `mask`.
pub struct PrioritySink<'a> {
    pub priority: &'a mut PriorityBuffer,
    pub mask: u16,
}

impl PixelSink for PrioritySink<'_> {
    fn bounds(&self) -> (usize, usize) {
        (SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    #[inline]
    fn put(&mut self, x: usize, y: usize, pen: u8) {
        if self.mask.get_bit(pen) {
            self.priority.mark(x, y);
        }
    }
}

/// Row-major pen bitmap, every pixel is written.
pub struct OpaqueSink<'a> {
    pub bitmap: &'a mut [u16],
    pub width: usize,
    pub height: usize,
    pub pens: &'a PenMap,
    pub color_base: usize,
}

impl PixelSink for OpaqueSink<'_> {
    fn bounds(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    fn put(&mut self, x: usize, y: usize, pen: u8) {
        self.bitmap[y * self.width + x] = self.pens.pen(self.color_base + usize::from(pen));
    }
}

/// Draws tile `code` of `size` into `sink`, applying the flips and clipping
/// to the sink bounds. `code` must be below `tiles.count(size)`.
pub fn draw_tile<S: PixelSink>(
    sink: &mut S,
    tiles: &DecodedTiles,
    size: TileSize,
    code: usize,
    at: Placement,
) {
    let n = size.pixels();
    let (width, height) = sink.bounds();

    for ty in 0..n {
        let Ok(dy) = usize::try_from(at.y + ty as i32) else {
            continue;
        };
        if dy >= height {
            break;
        }
        let src_y = if at.flip_y { n - 1 - ty } else { ty };

        for tx in 0..n {
            let Ok(dx) = usize::try_from(at.x + tx as i32) else {
                continue;
            };
            if dx >= width {
                break;
            }
            let src_x = if at.flip_x { n - 1 - tx } else { tx };

            sink.put(dx, dy, tiles.pen(size, code, src_x, src_y));
        }
    }
}

/// Checks a code against the title range, applies the tile bank and checks
/// the result against the decoded tiles.
#[must_use]
pub fn checked_code(
    tiles: &DecodedTiles,
    size: TileSize,
    range: CodeRange,
    bank_offset: u32,
    code: u32,
) -> Option<usize> {
    if !range.contains(code) {
        return None;
    }

    let code = usize::try_from(code.checked_add(bank_offset)?).ok()?;
    (code < tiles.count(size)).then_some(code)
}

/// Geometry of one scroll layer.
#[derive(Clone, Copy)]
pub struct Tilemap {
    /// 0 for scroll1, 1 for scroll2, 2 for scroll3.
    pub layer: usize,
    pub size: TileSize,
    pub surface: Surface,
    pub bank_unit: u32,
    /// Table entry of (row, column), both already wrapped to 0..64.
    pub index: fn(usize, usize) -> usize,
}

impl Tilemap {
    pub const COLUMNS: usize = 64;
    pub const ROWS: usize = 64;

    #[must_use]
    pub const fn zone(&self) -> usize {
        self.layer + 1
    }

    /// Size of the whole plane in pixels.
    #[must_use]
    pub const fn wrap(&self) -> usize {
        Self::COLUMNS * self.size.pixels()
    }

    #[must_use]
    pub fn entry(&self, surface: &[u8], row: usize, col: usize) -> TileDescriptor {
        let offset = ((self.index)(row % Self::ROWS, col % Self::COLUMNS) * 4) & (SCROLL_SIZE - 1);
        TileDescriptor::read(surface, offset)
    }

    /// Calls `f` with every entry that can reach the screen and its screen
    /// position, one tile of slack on each side.
    pub fn for_each_visible<F: FnMut(TileDescriptor, i32, i32)>(
        &self,
        surface: &[u8],
        scroll: (u16, u16),
        mut f: F,
    ) {
        let n = self.size.pixels() as i32;
        let wrap = self.wrap() as i32;
        let world_x = (i32::from(scroll.0) + SCREEN_X_OFFSET) & (wrap - 1);
        let world_y = (i32::from(scroll.1) + SCREEN_Y_OFFSET) & (wrap - 1);

        let first_col = world_x / n - 1;
        let first_row = world_y / n - 1;
        let cols = SCREEN_WIDTH as i32 / n + 3;
        let rows = SCREEN_HEIGHT as i32 / n + 3;

        for r in 0..rows {
            let row = first_row + r;
            let sy = row * n - world_y;
            let map_row = row.rem_euclid(Self::ROWS as i32) as usize;

            for c in 0..cols {
                let col = first_col + c;
                let sx = col * n - world_x;
                let map_col = col.rem_euclid(Self::COLUMNS as i32) as usize;

                f(self.entry(surface, map_row, map_col), sx, sy);
            }
        }
    }
}

/// Per-layer behaviour of a scroll layer. The shared drawing code lives in
/// [`mark_usage`], [`render_low`] and [`render_high`].
pub trait TileLayer {
    fn tilemap(&self) -> Tilemap;

    /// Final tile code of a table entry, `None` when nothing is drawn.
    fn resolve_code(&self, ctx: &RenderContext, code: u16) -> Option<usize>;
}

/// Range and bank check shared by the scroll layers.
pub(crate) fn bank_checked<L: TileLayer + ?Sized>(
    layer: &L,
    ctx: &RenderContext,
    range: CodeRange,
    code: u32,
) -> Option<usize> {
    let map = layer.tilemap();
    let bank = ctx.config.tile_banks[map.layer].wrapping_mul(map.bank_unit);
    checked_code(ctx.tiles, map.size, range, bank, code)
}

fn scroll_of(ctx: &RenderContext, map: &Tilemap) -> (u16, u16) {
    ctx.regs.scroll[map.layer]
}

/// Records the non-transparent pens of every visible tile.
pub fn mark_usage<L: TileLayer>(layer: &L, ctx: &RenderContext, usage: &mut ColorUsage) {
    let map = layer.tilemap();
    let surface = ctx.surface(map.surface);

    map.for_each_visible(surface, scroll_of(ctx, &map), |tile, _, _| {
        if let Some(code) = layer.resolve_code(ctx, tile.code) {
            let pens = ctx.tiles.usage(map.size, code as u32) & !1;
            usage.mark(map.zone(), tile.palette(), pens);
        }
    });
}

/// Draws every valid tile into the frame, pen 0 transparent. Returns the
/// number of tiles drawn.
pub fn render_low<L: TileLayer>(layer: &L, ctx: &RenderContext, frame: &mut Frame) -> usize {
    let map = layer.tilemap();
    let surface = ctx.surface(map.surface);
    let mut drawn = 0;

    map.for_each_visible(surface, scroll_of(ctx, &map), |tile, x, y| {
        let Some(code) = layer.resolve_code(ctx, tile.code) else {
            return;
        };
        if ctx.tiles.usage(map.size, code as u32) & !1 == 0 {
            return;
        }

        let mut sink = TransparentSink {
            frame: &mut *frame,
            pens: ctx.pens,
            color_base: color_index(map.zone(), tile.palette(), 0),
        };
        draw_tile(&mut sink, ctx.tiles, map.size, code, tile.placement(x, y));
        drawn += 1;
    });

    drawn
}

/// Marks into the priority buffer the pixels of every tile whose pen is in
/// the transparency selector of the tile's class. Returns the number of
/// tiles that marked anything.
pub fn render_high<L: TileLayer>(
    layer: &L,
    ctx: &RenderContext,
    priority: &mut PriorityBuffer,
) -> usize {
    let map = layer.tilemap();
    let surface = ctx.surface(map.surface);
    let mut drawn = 0;

    map.for_each_visible(surface, scroll_of(ctx, &map), |tile, x, y| {
        let Some(code) = layer.resolve_code(ctx, tile.code) else {
            return;
        };
        let mask = ctx.regs.transparency[tile.priority_class()];
        if ctx.tiles.usage(map.size, code as u32) & mask == 0 {
            return;
        }

        let mut sink = PrioritySink {
            priority: &mut *priority,
            mask,
        };
        draw_tile(&mut sink, ctx.tiles, map.size, code, tile.placement(x, y));
        drawn += 1;
    });

    drawn
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::video::frame::PixelDepth;

    pub const TILE_ROWS: usize = 8;

    /// A graphics ROM of `count` base tiles, tile `t` filled with `pens[t]`.
    pub fn solid_rom(pens: &[u8]) -> Vec<u8> {
        let count = pens.len();
        let plane_len = count * TILE_ROWS;
        let mut rom = vec![0; count * 32];
        for (tile, &pen) in pens.iter().enumerate() {
            for plane in 0..4 {
                if pen & (1 << plane) != 0 {
                    let start = plane * plane_len + tile * TILE_ROWS;
                    rom[start..start + TILE_ROWS].fill(0xff);
                }
            }
        }
        rom
    }

    pub fn frame() -> Frame {
        Frame::new(
            PixelDepth::Indexed16,
            crate::video::frame::Rotation::Rot0,
            vec![PenMap::new(PixelDepth::Indexed16).background(); SCREEN_WIDTH * SCREEN_HEIGHT],
        )
    }

    pub fn priority() -> PriorityBuffer {
        PriorityBuffer::new(vec![0; SCREEN_WIDTH * SCREEN_HEIGHT])
    }

    pub fn write_entry(gram: &mut GraphicsRam, base: usize, index: usize, code: u16, attribute: u16) {
        gram.write_word(base + index * 4, code);
        gram.write_word(base + index * 4 + 2, attribute);
    }
}
