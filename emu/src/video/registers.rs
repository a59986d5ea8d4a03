//! CPS-A / CPS-B output registers.
//!
//! The 68000 programs the video hardware through a bank of 16-bit output
//! registers. The CPS-A half is the same on every board; the CPS-B half moves
//! around from title to title, which is why its offsets come from the
//! [`ConfigurationRecord`].
//!
//! # Register Map (CPS-A)
//!
//! | Offset | Register         | Description                                |
//! |--------|------------------|--------------------------------------------|
//! | `0x00` | OBJ base         | Object table base (x 0x100)                |
//! | `0x02` | SCROLL1 base     | Scroll1 table base (x 0x100)               |
//! | `0x04` | SCROLL2 base     | Scroll2 table base (x 0x100)               |
//! | `0x06` | SCROLL3 base     | Scroll3 table base (x 0x100)               |
//! | `0x08` | OTHER base       | Row-scroll line offset table (x 0x100)     |
//! | `0x0A` | PALETTE base     | Palette (x 0x100)                          |
//! | `0x0C` | SCROLL1 X        |                                            |
//! | `0x0E` | SCROLL1 Y        |                                            |
//! | `0x10` | SCROLL2 X        |                                            |
//! | `0x12` | SCROLL2 Y        |                                            |
//! | `0x14` | SCROLL3 X        |                                            |
//! | `0x16` | SCROLL3 Y        |                                            |
//! | `0x20` | ROW SCROLL       | First line of the line offset table        |
//! | `0x22` | VIDEO CONTROL    | Bit 0 row scroll enable, bit 15 flip       |
//!
//! # CPS-B
//!
//! The layer-control register holds the layer enable bits and four 2-bit
//! draw order slots (bits 6-7, 8-9, 10-11, 12-13). The four priority-mask
//! registers select, per tile priority class, which pens of a scroll tile
//! are drawn above the sprites.
//!
//! Registers are sampled once per frame by [`resolve_bases`]. Writes made
//! afterwards are only seen by the next frame.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::bitwise::{Bits, read_word};
use crate::config::ConfigurationRecord;

use super::memory::Surface;

/// Number of 16-bit registers in the bank.
pub const REGISTER_COUNT: usize = 0x80;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    #[serde_as(as = "[_; 128]")]
    words: [u16; REGISTER_COUNT],
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self {
            words: [0; REGISTER_COUNT],
        }
    }
}

impl RegisterBank {
    /// A bank as the board leaves it after reset: surfaces in separate
    /// parts of graphics RAM and the CPS-B self-test answer in place.
    #[must_use]
    pub fn with_defaults(config: &ConfigurationRecord) -> Self {
        let mut bank = Self::default();
        let map = &config.registers;

        bank.write(map.obj_base, 0x9200);
        bank.write(map.scroll1_base, 0x9000);
        bank.write(map.scroll2_base, 0x9040);
        bank.write(map.scroll3_base, 0x9080);
        bank.write(map.other_base, 0x9100);
        bank.write(map.palette_base, 0x9140);

        if let Some((offset, id)) = config.cpsb_id {
            bank.write(offset, id);
        }

        bank
    }

    /// Builds a bank from a big-endian dump. Missing words stay zero.
    #[must_use]
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let mut bank = Self::default();
        for (idx, word) in bank.words.iter_mut().enumerate() {
            *word = read_word(bytes, idx * 2);
        }

        bank
    }

    /// Reads the register at byte `offset`. Unmapped offsets read as zero.
    #[must_use]
    pub fn read(&self, offset: usize) -> u16 {
        self.words.get(offset / 2).copied().unwrap_or_default()
    }

    /// Writes the register at byte `offset`. Unmapped offsets are ignored.
    pub fn write(&mut self, offset: usize, value: u16) {
        if let Some(word) = self.words.get_mut(offset / 2) {
            *word = value;
        }
    }
}

/// Aligned offsets of every surface inside graphics RAM.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceBases {
    pub objects: usize,
    pub scroll1: usize,
    pub scroll2: usize,
    pub scroll3: usize,
    pub other: usize,
    pub palette: usize,
}

impl SurfaceBases {
    #[must_use]
    pub const fn get(&self, surface: Surface) -> usize {
        match surface {
            Surface::Objects => self.objects,
            Surface::Scroll1 => self.scroll1,
            Surface::Scroll2 => self.scroll2,
            Surface::Scroll3 => self.scroll3,
            Surface::Other => self.other,
            Surface::Palette => self.palette,
        }
    }
}

/// Everything the renderers need from the register bank for one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRegisters {
    pub bases: SurfaceBases,
    /// (X, Y) scroll of scroll1, scroll2, scroll3.
    pub scroll: [(u16, u16); 3],
    /// Pens drawn above the sprites, one selector per tile priority class.
    pub transparency: [u16; 4],
    pub layer_control: u16,
    /// Scroll1, scroll2, scroll3. Sprites cannot be disabled.
    pub enabled: [bool; 3],
    pub row_scroll_offset: u16,
    pub video_control: u16,
}

impl FrameRegisters {
    #[must_use]
    pub fn flip_screen(&self) -> bool {
        self.video_control.get_bit(15)
    }

    /// Scroll2 is drawn through the line offset table this frame.
    #[must_use]
    pub fn row_scroll(&self, config: &ConfigurationRecord) -> bool {
        config.row_scroll && self.video_control.get_bit(0)
    }

    /// The four 2-bit draw order fields of the layer-control register.
    #[must_use]
    pub fn slots(&self) -> [u16; 4] {
        [
            self.layer_control.get_bits(6..=7),
            self.layer_control.get_bits(8..=9),
            self.layer_control.get_bits(10..=11),
            self.layer_control.get_bits(12..=13),
        ]
    }
}

/// Samples the register bank for one frame: aligned surface bases, scroll
/// positions, transparency selectors and layer enables.
#[must_use]
pub fn resolve_bases(bank: &RegisterBank, config: &ConfigurationRecord) -> FrameRegisters {
    let map = &config.registers;

    let bases = SurfaceBases {
        objects: Surface::Objects.locate(bank.read(map.obj_base)),
        scroll1: Surface::Scroll1.locate(bank.read(map.scroll1_base)),
        scroll2: Surface::Scroll2.locate(bank.read(map.scroll2_base)),
        scroll3: Surface::Scroll3.locate(bank.read(map.scroll3_base)),
        other: Surface::Other.locate(bank.read(map.other_base)),
        palette: Surface::Palette.locate(bank.read(map.palette_base)),
    };

    let transparency = config
        .priority_masks
        .map_or([0; 4], |offsets| offsets.map(|offset| bank.read(offset)));

    let layer_control = bank.read(config.layer_control);
    let enabled = config
        .layer_enable_masks
        .map(|mask| layer_control & mask != 0);

    FrameRegisters {
        bases,
        scroll: [
            (bank.read(map.scroll1_x), bank.read(map.scroll1_y)),
            (bank.read(map.scroll2_x), bank.read(map.scroll2_y)),
            (bank.read(map.scroll3_x), bank.read(map.scroll3_y)),
        ],
        transparency,
        layer_control,
        enabled,
        row_scroll_offset: bank.read(map.row_scroll_offset),
        video_control: bank.read(map.video_control),
    }
}
