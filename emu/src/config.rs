//! Per-title video configuration.
//!
//! Every CPS1 title wires the same video chips slightly differently: the CPS-B
//! custom moves the layer-control and priority-mask registers around, each
//! board decodes a different set of layer enable bits, and a few titles ship
//! graphics ROMs whose tile codes need to be shifted before they can be
//! looked up. None of this can be inferred at runtime, so every supported
//! title has one row in [`TITLES`].
//!
//! | Field                   | Meaning                                             |
//! |-------------------------|-----------------------------------------------------|
//! | `registers`             | Offsets (bytes) of the fixed CPS-A registers        |
//! | `layer_control`         | Offset of the CPS-B layer-control register          |
//! | `priority_masks`        | Offsets of the four transparency selectors, if any  |
//! | `layer_enable_masks`    | Layer-control bits enabling scroll1/2/3             |
//! | `tile_banks`            | Tile bank multiplier of scroll1/2/3                 |
//! | `code_ranges`           | Tile codes that are actually wired to graphics ROM  |
//! | `scroll1_blank`         | Title-specific "space" character of scroll1         |
//! | `scroll3_fixup`         | Scroll3 code range moved down by one bank           |
//! | `sprite_fixups`         | Sprite code ranges moved to a doubled ROM bank      |
//!
//! Rows are data: when two layers share a priority slot on some board, the
//! row is what the hardware does, there is no rule behind it.

use serde::Serialize;

use crate::error::VideoError;
use crate::video::frame::{PixelDepth, Rotation};

/// Inclusive range of tile codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeRange {
    pub lo: u32,
    pub hi: u32,
}

impl CodeRange {
    pub const FULL: Self = Self::new(0, u32::MAX);

    #[must_use]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    #[must_use]
    pub const fn contains(&self, code: u32) -> bool {
        code >= self.lo && code <= self.hi
    }
}

/// Moves every code inside `range` by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeFixup {
    pub range: CodeRange,
    pub delta: i32,
}

impl CodeFixup {
    #[must_use]
    pub const fn new(lo: u32, hi: u32, delta: i32) -> Self {
        Self {
            range: CodeRange::new(lo, hi),
            delta,
        }
    }

    #[must_use]
    pub const fn apply(&self, code: u32) -> u32 {
        if self.range.contains(code) {
            code.wrapping_add_signed(self.delta)
        } else {
            code
        }
    }
}

/// Valid tile codes per layer. Codes outside these ranges are never sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeRanges {
    pub scroll1: CodeRange,
    pub scroll2: CodeRange,
    pub scroll3: CodeRange,
    pub sprites: CodeRange,
}

/// Byte offsets of the CPS-A registers inside the output register bank.
/// These are the same on every board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterMap {
    pub obj_base: usize,
    pub scroll1_base: usize,
    pub scroll2_base: usize,
    pub scroll3_base: usize,
    pub other_base: usize,
    pub palette_base: usize,
    pub scroll1_x: usize,
    pub scroll1_y: usize,
    pub scroll2_x: usize,
    pub scroll2_y: usize,
    pub scroll3_x: usize,
    pub scroll3_y: usize,
    /// Rotation applied to the line-offset table of row-scroll mode.
    pub row_scroll_offset: usize,
    /// Bit 0 enables row scroll, bit 15 flips the screen.
    pub video_control: usize,
}

impl RegisterMap {
    pub const CPS_A: Self = Self {
        obj_base: 0x00,
        scroll1_base: 0x02,
        scroll2_base: 0x04,
        scroll3_base: 0x06,
        other_base: 0x08,
        palette_base: 0x0a,
        scroll1_x: 0x0c,
        scroll1_y: 0x0e,
        scroll2_x: 0x10,
        scroll2_y: 0x12,
        scroll3_x: 0x14,
        scroll3_y: 0x16,
        row_scroll_offset: 0x20,
        video_control: 0x22,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigurationRecord {
    pub name: &'static str,
    /// Clones sharing this row.
    pub aliases: &'static [&'static str],
    /// CPS-B self-test register and the value the title expects to read back.
    pub cpsb_id: Option<(usize, u16)>,
    pub registers: RegisterMap,
    pub layer_control: usize,
    pub priority_masks: Option<[usize; 4]>,
    pub layer_enable_masks: [u16; 3],
    pub tile_banks: [u32; 3],
    pub code_ranges: CodeRanges,
    pub scroll1_blank: u16,
    pub scroll3_fixup: Option<CodeFixup>,
    pub sprite_fixups: [Option<CodeFixup>; 2],
    /// The board can run scroll2 in row-scroll mode.
    pub row_scroll: bool,
    pub rotation: Rotation,
    pub depth: PixelDepth,
}

impl ConfigurationRecord {
    /// The layout most boards share. Rows override what differs.
    pub const BASE: Self = Self {
        name: "",
        aliases: &[],
        cpsb_id: None,
        registers: RegisterMap::CPS_A,
        layer_control: 0x26,
        priority_masks: Some([0x28, 0x2a, 0x2c, 0x2e]),
        layer_enable_masks: [0x02, 0x04, 0x08],
        tile_banks: [0, 0, 0],
        code_ranges: CodeRanges {
            scroll1: CodeRange::FULL,
            scroll2: CodeRange::FULL,
            scroll3: CodeRange::FULL,
            sprites: CodeRange::FULL,
        },
        scroll1_blank: 0x20,
        scroll3_fixup: None,
        sprite_fixups: [None, None],
        row_scroll: true,
        rotation: Rotation::Rot0,
        depth: PixelDepth::Indexed8,
    };

    /// Looks up the row of `title`, matching clones through their parent row.
    pub fn for_title(title: &str) -> Result<&'static Self, VideoError> {
        TITLES
            .iter()
            .find(|row| row.name == title || row.aliases.contains(&title))
            .ok_or_else(|| VideoError::UnknownTitle(title.to_owned()))
    }
}

pub static TITLES: &[ConfigurationRecord] = &[
    ConfigurationRecord {
        name: "forgottn",
        aliases: &["lostwrld"],
        priority_masks: None,
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "ghouls",
        aliases: &["ghoulsu", "daimakai"],
        code_ranges: CodeRanges {
            scroll2: CodeRange::new(0x0000, 0x2fff),
            scroll3: CodeRange::new(0x0000, 0x07ff),
            ..ConfigurationRecord::BASE.code_ranges
        },
        sprite_fixups: [
            Some(CodeFixup::new(0x1000, 0x3fff, 0x4000)),
            Some(CodeFixup::new(0x4000, 0x4fff, 0x4000)),
        ],
        row_scroll: false,
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "strider",
        aliases: &["striderj", "stridrja"],
        tile_banks: [1, 0, 1],
        sprite_fixups: [Some(CodeFixup::new(0x2a00, 0x3fff, 0x4000)), None],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "dwj",
        tile_banks: [0, 1, 1],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "willow",
        aliases: &["willowj"],
        layer_control: 0x30,
        priority_masks: Some([0x2e, 0x2c, 0x2a, 0x28]),
        layer_enable_masks: [0x20, 0x10, 0x08],
        tile_banks: [0, 1, 1],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "unsquad",
        aliases: &["area88"],
        cpsb_id: Some((0x32, 0x0401)),
        layer_enable_masks: [0x08, 0x30, 0x30],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "ffight",
        aliases: &["ffightu", "ffightj"],
        cpsb_id: Some((0x60, 0x0004)),
        layer_control: 0x2e,
        priority_masks: Some([0x26, 0x30, 0x28, 0x32]),
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "1941",
        aliases: &["1941j"],
        cpsb_id: Some((0x60, 0x0005)),
        layer_control: 0x28,
        priority_masks: Some([0x2a, 0x2c, 0x2e, 0x30]),
        layer_enable_masks: [0x02, 0x08, 0x20],
        rotation: Rotation::Rot270,
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "mercs",
        aliases: &["mercsu", "mercsj"],
        cpsb_id: Some((0x60, 0x0402)),
        layer_control: 0x2c,
        priority_masks: Some([0x2a, 0x28, 0x26, 0x24]),
        rotation: Rotation::Rot270,
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "mtwins",
        aliases: &["chikij"],
        cpsb_id: Some((0x5e, 0x0404)),
        layer_control: 0x12,
        priority_masks: Some([0x14, 0x16, 0x18, 0x1a]),
        layer_enable_masks: [0x08, 0x20, 0x10],
        scroll3_fixup: Some(CodeFixup::new(0x1000, 0x1fff, -0x1000)),
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "msword",
        aliases: &["mswordu", "mswordj"],
        layer_control: 0x62,
        priority_masks: Some([0x64, 0x66, 0x68, 0x6a]),
        layer_enable_masks: [0x20, 0x06, 0x06],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "cawing",
        aliases: &["cawingj"],
        cpsb_id: Some((0x40, 0x0406)),
        layer_control: 0x4c,
        priority_masks: Some([0x4a, 0x48, 0x46, 0x44]),
        layer_enable_masks: [0x10, 0x0a, 0x0a],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "nemo",
        aliases: &["nemoj"],
        cpsb_id: Some((0x4e, 0x0405)),
        layer_control: 0x42,
        priority_masks: Some([0x44, 0x46, 0x48, 0x4a]),
        layer_enable_masks: [0x04, 0x22, 0x22],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "sf2",
        aliases: &["sf2ua", "sf2j"],
        cpsb_id: Some((0x48, 0x0407)),
        layer_control: 0x54,
        priority_masks: Some([0x52, 0x50, 0x4e, 0x4c]),
        layer_enable_masks: [0x08, 0x12, 0x12],
        tile_banks: [2, 2, 2],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "3wonders",
        aliases: &["wonder3"],
        cpsb_id: Some((0x72, 0x0800)),
        layer_control: 0x68,
        priority_masks: Some([0x66, 0x64, 0x62, 0x60]),
        layer_enable_masks: [0x20, 0x04, 0x08],
        tile_banks: [0, 1, 1],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "kod",
        aliases: &["kodj"],
        layer_control: 0x60,
        priority_masks: Some([0x6e, 0x6c, 0x6a, 0x68]),
        layer_enable_masks: [0x30, 0x08, 0x30],
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "captcomm",
        aliases: &["captcomu", "captcomj"],
        layer_control: 0x60,
        priority_masks: Some([0x6e, 0x6c, 0x6a, 0x68]),
        layer_enable_masks: [0x20, 0x12, 0x12],
        depth: PixelDepth::Indexed16,
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "knights",
        aliases: &["knightsj"],
        layer_control: 0x68,
        priority_masks: Some([0x66, 0x64, 0x62, 0x60]),
        layer_enable_masks: [0x20, 0x10, 0x02],
        depth: PixelDepth::Indexed16,
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "varth",
        aliases: &["varthu", "varthj"],
        layer_control: 0x6e,
        priority_masks: Some([0x66, 0x70, 0x68, 0x72]),
        layer_enable_masks: [0x02, 0x0c, 0x0c],
        rotation: Rotation::Rot270,
        ..ConfigurationRecord::BASE
    },
    ConfigurationRecord {
        name: "megaman",
        aliases: &["rockmanj"],
        layer_control: 0x66,
        priority_masks: Some([0x68, 0x6a, 0x6c, 0x6e]),
        depth: PixelDepth::Indexed16,
        ..ConfigurationRecord::BASE
    },
];
