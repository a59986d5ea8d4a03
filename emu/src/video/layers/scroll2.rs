//! Scroll2, the 16x16 layer.
//!
//! Scroll2 is the only layer that can run in *row scroll* mode, where every
//! raster line gets its own horizontal offset from the line offset table of
//! the "other" surface:
//!
//! ```text
//!   line offset table (1024 signed words)
//!   ┌─────┬─────┬─────┬─────┬───
//!   │ +0  │ +2  │ +5  │ +2  │ ...   indexed by (line + ROW SCROLL) & 0x3FF
//!   └─────┴─────┴─────┴─────┴───
//!
//!   plane x = (screen x + 64 + SCROLL2 X + offset[line]) & 0x3FF
//!   plane y = (screen y + 16 + SCROLL2 Y)                & 0x3FF
//! ```
//!
//! Row scroll mode renders the whole 1024x1024 plane into a [`DistortionCache`]
//! and samples it line by line. Games scroll this layer a lot and rarely change
//! it, so only the cells whose table entry changed since the last frame are
//! drawn again. Cells are drawn opaque, pen 0 included.

use serde::{Deserialize, Serialize};

use crate::bitwise::{Bits, read_word};
use crate::error::{VideoError, try_alloc};
use crate::video::frame::{
    Frame, PriorityBuffer, SCREEN_HEIGHT, SCREEN_WIDTH, SCREEN_X_OFFSET, SCREEN_Y_OFFSET,
};
use crate::video::gfx::TileSize;
use crate::video::memory::Surface;
use crate::video::palette::{ColorUsage, color_index};

use super::{
    OpaqueSink, RenderContext, TileDescriptor, TileLayer, Tilemap, checked_code, draw_tile,
};

/// Width and height of the scroll2 plane.
const PLANE: usize = 1024;

/// Entries in the line offset table.
const LINE_OFFSETS: usize = 0x400;

const CELL: usize = 16;

/// Cache value of the pixels of cells with an invalid code. Never a pen.
pub const TRANSPARENT: u16 = u16::MAX;

/// Scroll2 table entry, 16 rows per column block.
#[must_use]
pub const fn tilemap_index(row: usize, col: usize) -> usize {
    (row & 0x0f) | ((col & 0x3f) << 4) | ((row & 0x30) << 6)
}

const TILEMAP: Tilemap = Tilemap {
    layer: 1,
    size: TileSize::Size16,
    surface: Surface::Scroll2,
    bank_unit: 0x4000,
    index: tilemap_index,
};

fn resolve(ctx: &RenderContext, code: u16) -> Option<usize> {
    let bank = ctx.config.tile_banks[TILEMAP.layer].wrapping_mul(TILEMAP.bank_unit);
    checked_code(
        ctx.tiles,
        TILEMAP.size,
        ctx.config.code_ranges.scroll2,
        bank,
        u32::from(code),
    )
}

/// Signed horizontal offset of logical screen line `y`.
fn line_offset(ctx: &RenderContext, other: &[u8], y: usize) -> i32 {
    let line = (y + SCREEN_Y_OFFSET as usize + usize::from(ctx.regs.row_scroll_offset))
        & (LINE_OFFSETS - 1);
    read_word(other, line * 2).sign_extended(16)
}

/// Plane coordinates of the first pixel of line `y`, x not yet wrapped.
fn line_origin(ctx: &RenderContext, other: &[u8], y: usize) -> (i32, usize) {
    let (scroll_x, scroll_y) = ctx.regs.scroll[TILEMAP.layer];
    let map_y = (y + SCREEN_Y_OFFSET as usize + usize::from(scroll_y)) & (PLANE - 1);
    let map_x = SCREEN_X_OFFSET + i32::from(scroll_x) + line_offset(ctx, other, y);
    (map_x, map_y)
}

/// The whole scroll2 plane as pens, plus the table entries it was drawn from.
#[derive(Clone, Serialize, Deserialize)]
pub struct DistortionCache {
    bitmap: Vec<u16>,
    /// Raw (code, attribute) of each cell when it was drawn, by table index.
    shadow: Vec<Option<u32>>,
    redecodes: u64,
}

impl DistortionCache {
    pub fn new() -> Result<Self, VideoError> {
        let bitmap = try_alloc(PLANE * PLANE, "scroll2 distortion bitmap")?;
        let shadow = try_alloc(Tilemap::ROWS * Tilemap::COLUMNS, "scroll2 shadow")?;

        Ok(Self {
            bitmap,
            shadow,
            redecodes: 0,
        })
    }

    /// Forces every cell to be drawn again on the next update.
    pub fn invalidate(&mut self) {
        self.shadow.fill(None);
    }

    /// Cells drawn since the cache was created.
    #[must_use]
    pub const fn redecodes(&self) -> u64 {
        self.redecodes
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u16 {
        self.bitmap[(y & (PLANE - 1)) * PLANE + (x & (PLANE - 1))]
    }

    /// Draws the cells whose table entry changed. Returns how many were drawn.
    pub fn update(&mut self, ctx: &RenderContext) -> usize {
        let surface = ctx.surface(TILEMAP.surface);
        let mut redrawn = 0;

        for row in 0..Tilemap::ROWS {
            for col in 0..Tilemap::COLUMNS {
                let idx = tilemap_index(row, col);
                let tile = TILEMAP.entry(surface, row, col);
                if self.shadow[idx] == Some(tile.raw()) {
                    continue;
                }

                self.shadow[idx] = Some(tile.raw());
                self.draw_cell(ctx, row, col, resolve(ctx, tile.code).map(|code| (code, tile)));
                redrawn += 1;
            }
        }

        self.redecodes += redrawn as u64;
        redrawn
    }

    fn draw_cell(
        &mut self,
        ctx: &RenderContext,
        row: usize,
        col: usize,
        tile: Option<(usize, TileDescriptor)>,
    ) {
        let (x, y) = (col * CELL, row * CELL);

        let Some((code, tile)) = tile else {
            for line in y..y + CELL {
                self.bitmap[line * PLANE + x..line * PLANE + x + CELL].fill(TRANSPARENT);
            }
            return;
        };

        let mut sink = OpaqueSink {
            bitmap: &mut self.bitmap,
            width: PLANE,
            height: PLANE,
            pens: ctx.pens,
            color_base: color_index(TILEMAP.zone(), tile.palette(), 0),
        };
        draw_tile(
            &mut sink,
            ctx.tiles,
            TILEMAP.size,
            code,
            tile.placement(x as i32, y as i32),
        );
    }

    /// Copies the plane to the frame through the line offset table. Cells
    /// with an invalid code leave the frame as it is.
    pub fn blit(&self, ctx: &RenderContext, frame: &mut Frame) {
        let other = ctx.surface(Surface::Other);

        for y in 0..SCREEN_HEIGHT {
            let (map_x, map_y) = line_origin(ctx, other, y);
            let line = &self.bitmap[map_y * PLANE..(map_y + 1) * PLANE];

            for x in 0..SCREEN_WIDTH {
                let src = (map_x + x as i32).rem_euclid(PLANE as i32) as usize;
                if line[src] != TRANSPARENT {
                    frame.plot(x, y, line[src]);
                }
            }
        }
    }
}

/// The 16x16 layer and its row scroll cache.
#[derive(Clone, Serialize, Deserialize)]
pub struct Scroll2 {
    cache: DistortionCache,
    last_redecodes: usize,
}

impl TileLayer for Scroll2 {
    fn tilemap(&self) -> Tilemap {
        TILEMAP
    }

    fn resolve_code(&self, ctx: &RenderContext, code: u16) -> Option<usize> {
        resolve(ctx, code)
    }
}

impl Scroll2 {
    pub fn new() -> Result<Self, VideoError> {
        Ok(Self {
            cache: DistortionCache::new()?,
            last_redecodes: 0,
        })
    }

    #[must_use]
    pub const fn cache(&self) -> &DistortionCache {
        &self.cache
    }

    /// Cells the last low pass had to draw into the cache.
    #[must_use]
    pub const fn last_redecodes(&self) -> usize {
        self.last_redecodes
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    /// In row scroll mode every cell of the plane can reach the screen and is
    /// drawn opaque, so every pen of every valid cell counts.
    pub fn mark_usage(&self, ctx: &RenderContext, usage: &mut ColorUsage) {
        if !ctx.row_scroll() {
            super::mark_usage(self, ctx, usage);
            return;
        }

        let surface = ctx.surface(TILEMAP.surface);
        for row in 0..Tilemap::ROWS {
            for col in 0..Tilemap::COLUMNS {
                let tile = TILEMAP.entry(surface, row, col);
                if let Some(code) = resolve(ctx, tile.code) {
                    let pens = ctx.tiles.usage(TILEMAP.size, code as u32);
                    usage.mark(TILEMAP.zone(), tile.palette(), pens);
                }
            }
        }
    }

    /// Returns the number of tiles drawn by the flat path, 0 in row scroll
    /// mode.
    pub fn render_low(&mut self, ctx: &RenderContext, frame: &mut Frame) -> usize {
        if ctx.row_scroll() {
            self.last_redecodes = self.cache.update(ctx);
            self.cache.blit(ctx, frame);
            return 0;
        }

        self.last_redecodes = 0;
        super::render_low(&*self, ctx, frame)
    }

    pub fn render_high(&self, ctx: &RenderContext, priority: &mut PriorityBuffer) -> usize {
        if ctx.row_scroll() {
            render_high_row_scroll(ctx, priority)
        } else {
            super::render_high(self, ctx, priority)
        }
    }
}

/// High pass in row scroll mode: the table is sampled directly along the
/// same offset lines the blit uses.
fn render_high_row_scroll(ctx: &RenderContext, priority: &mut PriorityBuffer) -> usize {
    let surface = ctx.surface(TILEMAP.surface);
    let other = ctx.surface(Surface::Other);
    let mut touched = vec![false; Tilemap::ROWS * Tilemap::COLUMNS];

    for y in 0..SCREEN_HEIGHT {
        let (map_x, map_y) = line_origin(ctx, other, y);
        let row = map_y / CELL;

        for x in 0..SCREEN_WIDTH {
            let src_x = (map_x + x as i32).rem_euclid(PLANE as i32) as usize;
            let col = src_x / CELL;

            let tile = TILEMAP.entry(surface, row, col);
            let mask = ctx.regs.transparency[tile.priority_class()];
            if mask == 0 {
                continue;
            }
            let Some(code) = resolve(ctx, tile.code) else {
                continue;
            };

            let tx = if tile.flip_x() { CELL - 1 - src_x % CELL } else { src_x % CELL };
            let ty = if tile.flip_y() { CELL - 1 - map_y % CELL } else { map_y % CELL };
            if mask.get_bit(ctx.tiles.pen(TILEMAP.size, code, tx, ty)) {
                priority.mark(x, y);
                touched[tilemap_index(row, col)] = true;
            }
        }
    }

    touched.into_iter().filter(|&t| t).count()
}
