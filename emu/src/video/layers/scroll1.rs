use crate::video::gfx::TileSize;
use crate::video::memory::Surface;

use super::{RenderContext, TileLayer, Tilemap, bank_checked};

/// Code the text layer uses for an empty cell on every board.
const SPACE: u16 = 0x20;

/// Scroll1 table entry. The plane is two columns of 32x64 tile blocks.
#[must_use]
pub const fn tilemap_index(row: usize, col: usize) -> usize {
    (row & 0x1f) | ((col & 0x3f) << 5) | ((row & 0x20) << 6)
}

/// The 8x8 text layer.
#[derive(Debug, Default)]
pub struct Scroll1;

impl TileLayer for Scroll1 {
    fn tilemap(&self) -> Tilemap {
        Tilemap {
            layer: 0,
            size: TileSize::Size8,
            surface: Surface::Scroll1,
            bank_unit: 0x8000,
            index: tilemap_index,
        }
    }

    fn resolve_code(&self, ctx: &RenderContext, code: u16) -> Option<usize> {
        if code == SPACE || code == ctx.config.scroll1_blank {
            return None;
        }

        bank_checked(self, ctx, ctx.config.code_ranges.scroll1, u32::from(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationRecord;
    use crate::video::frame::PixelDepth;
    use crate::video::gfx::DecodedTiles;
    use crate::video::layers::test_support::*;
    use crate::video::layers::{mark_usage, render_high, render_low};
    use crate::video::memory::GraphicsRam;
    use crate::video::palette::{ColorUsage, PenMap};
    use crate::video::registers::FrameRegisters;
    use pretty_assertions::assert_eq;

    static CONFIG: ConfigurationRecord = ConfigurationRecord {
        name: "scroll1-test",
        scroll1_blank: 0x07,
        ..ConfigurationRecord::BASE
    };

    struct Fixture {
        tiles: DecodedTiles,
        gram: GraphicsRam,
        regs: FrameRegisters,
        pens: PenMap,
    }

    impl Fixture {
        fn new() -> Self {
            let mut pens = vec![0; 0x30];
            pens[1] = 5;
            pens[7] = 5;
            pens[SPACE as usize] = 5;
            Self {
                tiles: DecodedTiles::decode(&solid_rom(&pens)).unwrap(),
                gram: GraphicsRam::default(),
                regs: FrameRegisters::default(),
                pens: PenMap::new(PixelDepth::Indexed16),
            }
        }

        fn ctx(&self) -> RenderContext<'_> {
            RenderContext {
                config: &CONFIG,
                tiles: &self.tiles,
                gram: &self.gram,
                regs: &self.regs,
                pens: &self.pens,
            }
        }
    }

    #[test]
    fn index_splits_the_plane_in_two() {
        assert_eq!(tilemap_index(0, 0), 0);
        assert_eq!(tilemap_index(31, 0), 31);
        assert_eq!(tilemap_index(0, 1), 32);
        assert_eq!(tilemap_index(32, 0), 0x800);
        assert_eq!(tilemap_index(63, 63), 0xfff);
    }

    #[test]
    fn first_visible_cell_is_column_8_row_2() {
        let mut fx = Fixture::new();
        write_entry(&mut fx.gram, 0, tilemap_index(2, 8), 1, 0x03);

        let mut frame = frame();
        assert_eq!(render_low(&Scroll1, &fx.ctx(), &mut frame), 1);
        let pen = 0x200 + 3 * 16 + 5;
        assert_eq!(frame.pixel(0, 0), pen);
        assert_eq!(frame.pixel(7, 7), pen);
        assert_eq!(frame.pixel(8, 0), fx.pens.background());

        // Scrolling right by 4 moves the cell left and wrapping at 512 is
        // the same as not scrolling at all.
        fx.regs.scroll[0] = (4, 0);
        let mut frame = crate::video::layers::test_support::frame();
        render_low(&Scroll1, &fx.ctx(), &mut frame);
        assert_eq!(frame.pixel(3, 0), pen);
        assert_eq!(frame.pixel(4, 0), fx.pens.background());

        fx.regs.scroll[0] = (512, 512);
        let mut frame = crate::video::layers::test_support::frame();
        render_low(&Scroll1, &fx.ctx(), &mut frame);
        assert_eq!(frame.pixel(0, 0), pen);
    }

    #[test]
    fn blank_codes_are_skipped() {
        let mut fx = Fixture::new();
        write_entry(&mut fx.gram, 0, tilemap_index(2, 8), SPACE, 0);
        write_entry(&mut fx.gram, 0, tilemap_index(2, 9), 0x07, 0);
        write_entry(&mut fx.gram, 0, tilemap_index(2, 10), 0x1000, 0);

        let mut frame = frame();
        assert_eq!(render_low(&Scroll1, &fx.ctx(), &mut frame), 0);
    }

    #[test]
    fn high_pass_uses_the_class_selector() {
        let mut fx = Fixture::new();
        write_entry(&mut fx.gram, 0, tilemap_index(2, 8), 1, 0x080);
        write_entry(&mut fx.gram, 0, tilemap_index(2, 9), 1, 0x100);
        fx.regs.transparency = [0, 1 << 5, 0, 0];

        let mut priority = priority();
        assert_eq!(render_high(&Scroll1, &fx.ctx(), &mut priority), 1);
        assert_eq!(priority.marked_count(), 64);
        assert!(priority.is_marked(0, 0));
        assert!(!priority.is_marked(8, 0));
    }

    #[test]
    fn usage_skips_pen_zero() {
        let mut fx = Fixture::new();
        write_entry(&mut fx.gram, 0, tilemap_index(2, 8), 1, 0x02);
        write_entry(&mut fx.gram, 0, tilemap_index(2, 9), 0, 0x04);

        let mut usage = ColorUsage::default();
        mark_usage(&Scroll1, &fx.ctx(), &mut usage);
        assert!(usage.is_used(0x200 + 2 * 16 + 5));
        assert_eq!(usage.used_count(), 1);
    }
}
