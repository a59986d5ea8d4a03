use crate::video::frame::{Frame, PriorityBuffer};
use crate::video::gfx::TileSize;
use crate::video::object_table::{SpriteEntry, SpriteShadowBuffer};
use crate::video::palette::{ColorUsage, color_index};

use super::{RenderContext, SpriteSink, checked_code, draw_tile};

const ZONE: usize = 0;

/// The sprite layer. Draws the latched object table, never the live one.
#[derive(Debug, Default)]
pub struct Sprites;

impl Sprites {
    /// Base code of an entry after the title fixups, `None` when out of range.
    /// Only the first matching fixup applies.
    fn resolve(ctx: &RenderContext, entry: &SpriteEntry) -> Option<u32> {
        let code = u32::from(entry.code);
        let code = ctx
            .config
            .sprite_fixups
            .iter()
            .flatten()
            .find(|fixup| fixup.range.contains(code))
            .map_or(code, |fixup| fixup.apply(code));

        ctx.config.code_ranges.sprites.contains(code).then_some(code)
    }

    /// Code of one tile of a block. Every tile is range checked on its own,
    /// a block starting in range can run past the end of it.
    fn sub_tile_code(ctx: &RenderContext, base: u32, offset: u32) -> Option<usize> {
        checked_code(
            ctx.tiles,
            TileSize::Size16,
            ctx.config.code_ranges.sprites,
            0,
            base.checked_add(offset)?,
        )
    }

    /// Active entries of the list with their base code.
    fn live<'s>(
        ctx: &'s RenderContext,
        shadow: &'s SpriteShadowBuffer,
    ) -> impl DoubleEndedIterator<Item = (SpriteEntry, u32)> + 's {
        (0..shadow.effective_length()).filter_map(move |idx| {
            let entry = shadow.entry(idx);
            entry.position()?;
            Some((entry, Self::resolve(ctx, &entry)?))
        })
    }

    pub fn mark_usage(ctx: &RenderContext, shadow: &SpriteShadowBuffer, usage: &mut ColorUsage) {
        for (entry, base) in Self::live(ctx, shadow) {
            let palette = entry.descriptor().palette();
            for sub in entry.blocks() {
                if let Some(code) = Self::sub_tile_code(ctx, base, sub.code_offset) {
                    let pens = ctx.tiles.usage(TileSize::Size16, code as u32) & !1;
                    usage.mark(ZONE, palette, pens);
                }
            }
        }
    }

    /// Draws the list back to front so lower entries end up on top. Pixels
    /// marked in `priority` belong to tiles above the sprites and are left
    /// alone. Returns the number of sprites drawn.
    pub fn render(
        ctx: &RenderContext,
        shadow: &SpriteShadowBuffer,
        frame: &mut Frame,
        priority: &PriorityBuffer,
    ) -> usize {
        let mut drawn = 0;

        for (entry, base) in Self::live(ctx, shadow).rev() {
            let Some(origin) = entry.position() else {
                continue;
            };
            let tile = entry.descriptor();
            let mut sink = SpriteSink {
                frame: &mut *frame,
                priority,
                pens: ctx.pens,
                color_base: color_index(ZONE, tile.palette(), 0),
            };

            for sub in entry.blocks() {
                let Some(code) = Self::sub_tile_code(ctx, base, sub.code_offset) else {
                    continue;
                };

                let at = origin + sub.offset;
                draw_tile(
                    &mut sink,
                    ctx.tiles,
                    TileSize::Size16,
                    code,
                    tile.placement(at.x, at.y),
                );
            }
            drawn += 1;
        }

        drawn
    }
}
