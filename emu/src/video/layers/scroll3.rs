use crate::video::gfx::TileSize;
use crate::video::memory::Surface;

use super::{RenderContext, TileLayer, Tilemap, bank_checked};

/// Scroll3 table entry, 8 rows per column block.
#[must_use]
pub const fn tilemap_index(row: usize, col: usize) -> usize {
    (row & 0x07) | ((col & 0x3f) << 3) | ((row & 0x38) << 6)
}

/// The 32x32 background layer.
#[derive(Debug, Default)]
pub struct Scroll3;

impl TileLayer for Scroll3 {
    fn tilemap(&self) -> Tilemap {
        Tilemap {
            layer: 2,
            size: TileSize::Size32,
            surface: Surface::Scroll3,
            bank_unit: 0x1000,
            index: tilemap_index,
        }
    }

    fn resolve_code(&self, ctx: &RenderContext, code: u16) -> Option<usize> {
        let mut code = u32::from(code);
        if let Some(fixup) = ctx.config.scroll3_fixup {
            code = fixup.apply(code);
        }

        bank_checked(self, ctx, ctx.config.code_ranges.scroll3, code)
    }
}
