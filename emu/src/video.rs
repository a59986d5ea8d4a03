//! CPS-A/CPS-B video: the frame compositor.
//!
//! A [`Video`] owns everything that survives between frames (decoded tiles,
//! palette, pen map, scroll2 row scroll cache, latched sprite table) and turns
//! one snapshot of the output registers plus graphics RAM into a [`Frame`].
//!
//! # Frame pipeline
//!
//! ```text
//!   RegisterBank ──► resolve_bases ──► FrameRegisters
//!                                          │
//!   GraphicsRam ──► palette rebuild        │
//!                 ──► color usage ──► pen remap (+ scroll2 invalidate)
//!                                          │
//!                     plan_frame ◄─────────┘
//!                         │
//!           clear priority, clear frame to background
//!                         │
//!           Low / High passes in plan order ──► Frame
//! ```
//!
//! # Draw order
//!
//! The layer-control register holds four 2-bit slot fields, drawn in order.
//! Each value names a layer through a fixed table:
//!
//! | Bits   | Slot | Value | Layer   |
//! |--------|------|-------|---------|
//! | 6-7    | 0    | 0     | Sprites |
//! | 8-9    | 1    | 1     | Scroll1 |
//! | 10-11  | 2    | 2     | Scroll2 |
//! | 12-13  | 3    | 3     | Scroll3 |
//!
//! Every enabled layer gets a [`Pass::Low`]. The tile layer right before the
//! sprite slot also gets a [`Pass::High`]: it marks the pixels whose pens are
//! selected by the transparency registers, and the sprites drawn next leave
//! those pixels alone. That is how a layer below the sprites can still cover
//! them tile by tile.
//!
//! The sprite table is not read live: [`Video::end_of_frame`] latches it and
//! the next [`Video::render_frame`] draws the latched copy.

use serde::{Deserialize, Serialize};

use crate::config::ConfigurationRecord;
use crate::error::{VideoError, try_alloc};

use self::frame::{Frame, PixelDepth, PriorityBuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
use self::gfx::DecodedTiles;
use self::layers::scroll1::Scroll1;
use self::layers::scroll2::Scroll2;
use self::layers::scroll3::Scroll3;
use self::layers::sprites::Sprites;
use self::layers::{RenderContext, mark_usage, render_high, render_low};
use self::memory::{GraphicsRam, Surface};
use self::object_table::SpriteShadowBuffer;
use self::palette::{ColorUsage, PaletteTable, PenMap, Rgb};
use self::registers::{FrameRegisters, RegisterBank, resolve_bases};

pub mod frame;
pub mod gfx;
pub mod layers;
pub mod memory;
pub mod object_table;
pub mod palette;
pub mod point;
pub mod registers;

pub use self::layers::LayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pass {
    /// Draw into the frame, pen 0 transparent.
    Low,
    /// Mark the priority buffer.
    High,
}

/// One step of a frame's draw plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrawCall {
    pub layer: LayerId,
    pub pass: Pass,
}

impl DrawCall {
    const fn low(layer: LayerId) -> Self {
        Self {
            layer,
            pass: Pass::Low,
        }
    }

    const fn high(layer: LayerId) -> Self {
        Self {
            layer,
            pass: Pass::High,
        }
    }
}

/// Draw calls of a frame, in order. Depends on the layer-control register and
/// the layer enables only.
#[must_use]
pub fn plan_frame(regs: &FrameRegisters) -> Vec<DrawCall> {
    let slots = regs.slots().map(|value| LayerId::SLOT_TABLE[usize::from(value)]);
    let enabled = |layer: LayerId| layer.scroll_index().is_none_or(|idx| regs.enabled[idx]);

    let mut plan = Vec::with_capacity(slots.len() + 1);
    for (slot, &layer) in slots.iter().enumerate() {
        if !enabled(layer) {
            continue;
        }

        plan.push(DrawCall::low(layer));
        if layer != LayerId::Sprites && slots.get(slot + 1) == Some(&LayerId::Sprites) {
            plan.push(DrawCall::high(layer));
        }
    }

    plan
}

/// What the last frame did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    /// Frames rendered so far, this one included.
    pub frame: u64,
    pub sprites_drawn: usize,
    /// Scroll1, scroll2, scroll3. Scroll2 counts 0 in row scroll mode.
    pub tiles_drawn: [usize; 3],
    /// Tiles that marked the priority buffer.
    pub priority_tiles: usize,
    /// Scroll2 cells drawn again into the row scroll cache.
    pub distortion_redecodes: usize,
    /// Palette entries whose raw word changed.
    pub palette_changes: usize,
    pub colors_used: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOptions {
    /// Overrides the title's pixel depth.
    pub depth: Option<PixelDepth>,
    /// Shown where no layer draws.
    pub background: Rgb,
}

pub struct Video {
    config: &'static ConfigurationRecord,
    options: VideoOptions,
    tiles: DecodedTiles,
    palette: PaletteTable,
    usage: ColorUsage,
    next_usage: ColorUsage,
    pens: PenMap,
    frame: Frame,
    priority: PriorityBuffer,
    scroll1: Scroll1,
    scroll2: Scroll2,
    scroll3: Scroll3,
    shadow: SpriteShadowBuffer,
    plan: Vec<DrawCall>,
    sprite_count: usize,
    stats: FrameStats,
}

impl Video {
    /// Decodes the graphics ROM region and allocates the frame buffers.
    pub fn new(
        config: &'static ConfigurationRecord,
        gfx_rom: &[u8],
        options: VideoOptions,
    ) -> Result<Self, VideoError> {
        let depth = options.depth.unwrap_or(config.depth);
        let tiles = DecodedTiles::decode(gfx_rom)?;
        let pens = PenMap::new(depth);

        let mut pixels = try_alloc(SCREEN_WIDTH * SCREEN_HEIGHT, "frame buffer")?;
        pixels.fill(pens.background());
        let frame = Frame::new(depth, config.rotation, pixels);
        let priority = PriorityBuffer::new(try_alloc(SCREEN_WIDTH * SCREEN_HEIGHT, "priority buffer")?);

        tracing::info!(
            title = config.name,
            ?depth,
            rotation = ?config.rotation,
            "video initialised"
        );

        Ok(Self {
            config,
            options,
            tiles,
            palette: PaletteTable::default(),
            usage: ColorUsage::default(),
            next_usage: ColorUsage::default(),
            pens,
            frame,
            priority,
            scroll1: Scroll1,
            scroll2: Scroll2::new()?,
            scroll3: Scroll3,
            shadow: SpriteShadowBuffer::default(),
            plan: Vec::new(),
            sprite_count: 0,
            stats: FrameStats::default(),
        })
    }

    /// [`Video::new`] with the configuration row of `title` or one of its
    /// clones.
    pub fn from_title(title: &str, gfx_rom: &[u8], options: VideoOptions) -> Result<Self, VideoError> {
        Self::new(ConfigurationRecord::for_title(title)?, gfx_rom, options)
    }

    /// Composes one frame from the registers and graphics RAM as they are now.
    pub fn render_frame(&mut self, bank: &RegisterBank, gram: &GraphicsRam) -> &Frame {
        let regs = resolve_bases(bank, self.config);
        let palette_changes = self
            .palette
            .rebuild_palette(gram.surface(Surface::Palette, regs.bases.palette));

        let plan = plan_frame(&regs);
        if plan != self.plan {
            tracing::debug!(?plan, "layer order changed");
            self.plan = plan;
        }

        let sprite_count = self.shadow.effective_length();
        if sprite_count != self.sprite_count {
            tracing::debug!(from = self.sprite_count, to = sprite_count, "sprite list length changed");
            self.sprite_count = sprite_count;
        }

        self.update_pens(&regs, gram);

        let mut stats = FrameStats {
            frame: self.stats.frame + 1,
            palette_changes,
            colors_used: self.usage.used_count(),
            ..FrameStats::default()
        };

        self.frame.begin(regs.flip_screen(), self.pens.background());
        self.priority.clear();

        let ctx = RenderContext {
            config: self.config,
            tiles: &self.tiles,
            gram,
            regs: &regs,
            pens: &self.pens,
        };

        for call in &self.plan {
            match (call.layer, call.pass) {
                (LayerId::Sprites, _) => {
                    stats.sprites_drawn +=
                        Sprites::render(&ctx, &self.shadow, &mut self.frame, &self.priority);
                }
                (LayerId::Scroll1, Pass::Low) => {
                    stats.tiles_drawn[0] += render_low(&self.scroll1, &ctx, &mut self.frame);
                }
                (LayerId::Scroll2, Pass::Low) => {
                    stats.tiles_drawn[1] += self.scroll2.render_low(&ctx, &mut self.frame);
                    stats.distortion_redecodes += self.scroll2.last_redecodes();
                }
                (LayerId::Scroll3, Pass::Low) => {
                    stats.tiles_drawn[2] += render_low(&self.scroll3, &ctx, &mut self.frame);
                }
                (LayerId::Scroll1, Pass::High) => {
                    stats.priority_tiles += render_high(&self.scroll1, &ctx, &mut self.priority);
                }
                (LayerId::Scroll2, Pass::High) => {
                    stats.priority_tiles += self.scroll2.render_high(&ctx, &mut self.priority);
                }
                (LayerId::Scroll3, Pass::High) => {
                    stats.priority_tiles += render_high(&self.scroll3, &ctx, &mut self.priority);
                }
            }
        }

        tracing::trace!(plan = ?self.plan, ?stats, "frame rendered");
        self.stats = stats;

        &self.frame
    }

    /// Collects the colors the planned layers will draw and, when the set
    /// changed, remaps the pens. The row scroll cache holds pens, so it is
    /// dropped as well.
    fn update_pens(&mut self, regs: &FrameRegisters, gram: &GraphicsRam) {
        self.next_usage.clear();

        let ctx = RenderContext {
            config: self.config,
            tiles: &self.tiles,
            gram,
            regs,
            pens: &self.pens,
        };

        for call in self.plan.iter().filter(|call| call.pass == Pass::Low) {
            match call.layer {
                LayerId::Sprites => Sprites::mark_usage(&ctx, &self.shadow, &mut self.next_usage),
                LayerId::Scroll1 => mark_usage(&self.scroll1, &ctx, &mut self.next_usage),
                LayerId::Scroll2 => self.scroll2.mark_usage(&ctx, &mut self.next_usage),
                LayerId::Scroll3 => mark_usage(&self.scroll3, &ctx, &mut self.next_usage),
            }
        }

        if self.next_usage == self.usage {
            return;
        }

        std::mem::swap(&mut self.usage, &mut self.next_usage);
        self.pens.remap(&self.usage);
        self.scroll2.invalidate();
        tracing::debug!(colors = self.usage.used_count(), "color usage changed");
    }

    /// Latches the live object table for the next frame. Call once per frame,
    /// after [`Video::render_frame`].
    pub fn end_of_frame(&mut self, bank: &RegisterBank, gram: &GraphicsRam) {
        let regs = resolve_bases(bank, self.config);
        self.shadow
            .capture(gram.surface(Surface::Objects, regs.bases.objects));
    }

    /// The frame as RGB triplets, row-major in physical orientation.
    #[must_use]
    pub fn to_rgb(&self) -> Vec<u8> {
        self.frame
            .pixels()
            .iter()
            .flat_map(|&pen| {
                let color = self
                    .pens
                    .logical(pen)
                    .map_or(self.options.background, |idx| self.palette.color(idx));
                [color.red, color.green, color.blue]
            })
            .collect()
    }

    #[must_use]
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Draw calls of the last frame.
    #[must_use]
    pub fn plan(&self) -> &[DrawCall] {
        &self.plan
    }

    #[must_use]
    pub const fn stats(&self) -> &FrameStats {
        &self.stats
    }

    #[must_use]
    pub const fn palette(&self) -> &PaletteTable {
        &self.palette
    }

    #[must_use]
    pub const fn pens(&self) -> &PenMap {
        &self.pens
    }

    #[must_use]
    pub const fn config(&self) -> &'static ConfigurationRecord {
        self.config
    }

    #[must_use]
    pub const fn shadow(&self) -> &SpriteShadowBuffer {
        &self.shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::layers::scroll1;
    use crate::video::layers::test_support::{solid_rom, write_entry};
    use crate::video::object_table::END_OF_LIST;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const LAYER_CONTROL: usize = 0x26;
    const SCROLL1_ENABLE: u16 = 0x02;
    const SCROLL2_ENABLE: u16 = 0x04;
    const PALETTE_BASE: usize = 0x14000;
    const OBJ_BASE: usize = 0x20000;

    static TEST_BOARD: ConfigurationRecord = ConfigurationRecord {
        name: "test-board",
        ..ConfigurationRecord::BASE
    };

    fn layer_control(slots: [u16; 4], enables: u16) -> u16 {
        (slots[0] << 6) | (slots[1] << 8) | (slots[2] << 10) | (slots[3] << 12) | enables
    }

    fn regs(slots: [u16; 4], enabled: [bool; 3]) -> FrameRegisters {
        FrameRegisters {
            layer_control: layer_control(slots, 0),
            enabled,
            ..FrameRegisters::default()
        }
    }

    fn calls(plan: &[DrawCall]) -> Vec<(LayerId, Pass)> {
        plan.iter().map(|call| (call.layer, call.pass)).collect()
    }

    fn put_sprite(gram: &mut GraphicsRam, idx: usize, words: [u16; 4]) {
        for (w, word) in words.iter().enumerate() {
            gram.write_word(OBJ_BASE + idx * 8 + w * 2, *word);
        }
    }

    fn set_color(gram: &mut GraphicsRam, index: usize, raw: u16) {
        gram.write_word(PALETTE_BASE + index * 2, raw);
    }

    #[test]
    fn sprites_first_draws_every_layer_low() {
        let plan = plan_frame(&regs([0, 1, 2, 3], [true; 3]));
        assert_eq!(
            calls(&plan),
            vec![
                (LayerId::Sprites, Pass::Low),
                (LayerId::Scroll1, Pass::Low),
                (LayerId::Scroll2, Pass::Low),
                (LayerId::Scroll3, Pass::Low),
            ]
        );
    }

    #[test]
    fn layer_before_the_sprites_gets_a_high_pass() {
        let plan = plan_frame(&regs([3, 2, 0, 1], [true; 3]));
        assert_eq!(
            calls(&plan),
            vec![
                (LayerId::Scroll3, Pass::Low),
                (LayerId::Scroll2, Pass::Low),
                (LayerId::Scroll2, Pass::High),
                (LayerId::Sprites, Pass::Low),
                (LayerId::Scroll1, Pass::Low),
            ]
        );

        // A disabled layer loses both passes.
        let plan = plan_frame(&regs([3, 2, 0, 1], [true, false, true]));
        assert_eq!(
            calls(&plan),
            vec![
                (LayerId::Scroll3, Pass::Low),
                (LayerId::Sprites, Pass::Low),
                (LayerId::Scroll1, Pass::Low),
            ]
        );
    }

    #[test]
    fn plan_is_reproducible() {
        let mut rng = StdRng::seed_from_u64(0x2626);

        for _ in 0..256 {
            let regs = FrameRegisters {
                layer_control: rng.r#gen(),
                enabled: [rng.r#gen(), rng.r#gen(), rng.r#gen()],
                ..FrameRegisters::default()
            };
            let first = plan_frame(&regs);
            assert_eq!(first, plan_frame(&regs));

            let highs = first.iter().filter(|call| call.pass == Pass::High).count();
            assert!(highs <= 2);
            assert!(first.iter().all(|call| call.pass == Pass::Low || call.layer != LayerId::Sprites));
        }
    }

    #[test]
    fn unknown_titles_and_empty_roms_are_refused() {
        assert!(matches!(
            Video::from_title("nosuchgame", &[0; 32], VideoOptions::default()),
            Err(VideoError::UnknownTitle(_))
        ));
        assert!(matches!(
            Video::new(&TEST_BOARD, &[], VideoOptions::default()),
            Err(VideoError::EmptyGfxRom)
        ));
    }

    /// Two 8x8 tiles: 0 is empty, 1 a checkerboard of pens 1 (even squares)
    /// and 2.
    fn checkerboard_rom() -> Vec<u8> {
        let mut rom = vec![0; 64];
        let plane_len = 16;
        for row in 0..8 {
            let (even, odd) = if row % 2 == 0 { (0xaa, 0x55) } else { (0x55, 0xaa) };
            rom[8 + row] = even;
            rom[plane_len + 8 + row] = odd;
        }
        rom
    }

    #[test]
    fn scroll1_only_board_shows_one_tile() {
        let background = Rgb::new(0, 0x40, 0);
        let options = VideoOptions {
            depth: None,
            background,
        };
        let mut video = Video::new(&TEST_BOARD, &checkerboard_rom(), options).unwrap();

        let mut bank = RegisterBank::with_defaults(&TEST_BOARD);
        bank.write(LAYER_CONTROL, layer_control([0, 1, 2, 3], SCROLL1_ENABLE));

        let mut gram = GraphicsRam::default();
        set_color(&mut gram, 512 + 1, 0xffff);
        set_color(&mut gram, 512 + 2, 0xf000);
        write_entry(&mut gram, 0, scroll1::tilemap_index(2, 8), 1, 0);

        video.render_frame(&bank, &gram);
        assert_eq!(
            calls(video.plan()),
            vec![(LayerId::Sprites, Pass::Low), (LayerId::Scroll1, Pass::Low)]
        );
        assert_eq!(video.stats().tiles_drawn, [1, 0, 0]);
        assert_eq!(video.stats().sprites_drawn, 0);
        assert_eq!(video.stats().colors_used, 2);

        // 8-bit pens are packed in logical order.
        assert_eq!(video.frame().pixel(0, 0), 1);
        assert_eq!(video.frame().pixel(1, 0), 2);

        let rgb = video.to_rgb();
        assert_eq!(rgb.len(), SCREEN_WIDTH * SCREEN_HEIGHT * 3);
        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                let idx = (y * SCREEN_WIDTH + x) * 3;
                let expected = if x >= 8 || y >= 8 {
                    background
                } else if (x + y) % 2 == 0 {
                    Rgb::new(255, 255, 255)
                } else {
                    Rgb::new(0, 0, 0)
                };
                assert_eq!(
                    Rgb::new(rgb[idx], rgb[idx + 1], rgb[idx + 2]),
                    expected,
                    "pixel ({x}, {y})"
                );
            }
        }
    }

    /// Scroll1 tile 1 is solid pen 5; sprite tile 1 is solid pen 3.
    fn occlusion_setup(class: u16) -> (Video, RegisterBank, GraphicsRam) {
        let options = VideoOptions {
            depth: Some(PixelDepth::Indexed16),
            ..VideoOptions::default()
        };
        let video = Video::new(&TEST_BOARD, &solid_rom(&[0, 5, 0, 0, 3, 3, 3, 3]), options).unwrap();

        let mut bank = RegisterBank::with_defaults(&TEST_BOARD);
        bank.write(LAYER_CONTROL, layer_control([1, 0, 2, 3], SCROLL1_ENABLE));
        // Class 1 puts pen 5 above the sprites.
        bank.write(0x2a, 1 << 5);

        let mut gram = GraphicsRam::default();
        write_entry(&mut gram, 0, scroll1::tilemap_index(2, 8), 1, class << 7);
        put_sprite(&mut gram, 0, [64, 16, 1, 0]);
        put_sprite(&mut gram, 1, [0, 0, 0, END_OF_LIST]);

        (video, bank, gram)
    }

    #[test]
    fn high_pass_keeps_marked_tiles_above_sprites() {
        let (mut video, bank, gram) = occlusion_setup(1);
        video.end_of_frame(&bank, &gram);
        let frame = video.render_frame(&bank, &gram);

        assert_eq!(frame.pixel(0, 0), 512 + 5);
        assert_eq!(frame.pixel(7, 7), 512 + 5);
        assert_eq!(frame.pixel(8, 0), 3);
        assert_eq!(frame.pixel(15, 15), 3);
        assert_eq!(video.stats().priority_tiles, 1);
        assert_eq!(video.stats().sprites_drawn, 1);
    }

    #[test]
    fn unmarked_tiles_stay_under_sprites() {
        let (mut video, bank, gram) = occlusion_setup(0);
        video.end_of_frame(&bank, &gram);
        let frame = video.render_frame(&bank, &gram);

        assert_eq!(frame.pixel(0, 0), 3);
        assert_eq!(video.stats().priority_tiles, 0);
    }

    #[test]
    fn sprites_come_from_the_latched_table() {
        let (mut video, bank, mut gram) = occlusion_setup(0);

        // Nothing latched yet.
        video.render_frame(&bank, &gram);
        assert_eq!(video.stats().sprites_drawn, 0);
        assert_eq!(video.frame().pixel(0, 0), 512 + 5);

        video.end_of_frame(&bank, &gram);
        // Moving the live sprite does not touch the latched copy.
        put_sprite(&mut gram, 0, [64 + 100, 16, 1, 0]);
        video.render_frame(&bank, &gram);
        assert_eq!(video.frame().pixel(0, 0), 3);
        assert_eq!(video.frame().pixel(100, 0), 2048);

        video.end_of_frame(&bank, &gram);
        video.render_frame(&bank, &gram);
        assert_eq!(video.frame().pixel(0, 0), 512 + 5);
        assert_eq!(video.frame().pixel(100, 0), 3);
        assert_eq!(video.stats().frame, 3);
    }

    #[test]
    fn flip_screen_turns_the_frame() {
        let (mut video, mut bank, gram) = occlusion_setup(0);
        bank.write(TEST_BOARD.registers.video_control, 1 << 15);
        video.render_frame(&bank, &gram);

        let pixels = video.frame().pixels();
        assert_eq!(pixels[SCREEN_WIDTH * SCREEN_HEIGHT - 1], 512 + 5);
        assert_eq!(pixels[0], 2048);
    }

    #[test]
    fn color_usage_change_redraws_the_row_scroll_cache() {
        let options = VideoOptions {
            depth: Some(PixelDepth::Indexed16),
            ..VideoOptions::default()
        };
        let mut video =
            Video::new(&TEST_BOARD, &solid_rom(&[0, 5, 0, 0, 3, 3, 3, 3]), options).unwrap();

        let mut bank = RegisterBank::with_defaults(&TEST_BOARD);
        bank.write(LAYER_CONTROL, layer_control([0, 1, 2, 3], SCROLL2_ENABLE));
        bank.write(TEST_BOARD.registers.video_control, 1);

        // Every scroll2 cell is code 0; the sprite adds pen 3 once latched.
        let mut gram = GraphicsRam::default();
        put_sprite(&mut gram, 0, [64, 16, 1, 0]);
        put_sprite(&mut gram, 1, [0, 0, 0, END_OF_LIST]);

        video.render_frame(&bank, &gram);
        assert_eq!(video.stats().distortion_redecodes, 4096);
        assert_eq!(video.stats().colors_used, 2);

        video.render_frame(&bank, &gram);
        assert_eq!(video.stats().distortion_redecodes, 0);

        video.end_of_frame(&bank, &gram);
        video.render_frame(&bank, &gram);
        assert_eq!(video.stats().colors_used, 3);
        assert_eq!(video.stats().distortion_redecodes, 4096);

        video.render_frame(&bank, &gram);
        assert_eq!(video.stats().distortion_redecodes, 0);
    }
}
