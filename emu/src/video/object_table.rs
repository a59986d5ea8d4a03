//! Object (sprite) table.
//!
//! 256 entries of four words:
//!
//! | Word | Content                                                    |
//! |------|------------------------------------------------------------|
//! | 0    | X (9 bits)                                                 |
//! | 1    | Y (9 bits)                                                 |
//! | 2    | Tile code of the top-left 16x16 tile                       |
//! | 3    | Attribute                                                  |
//!
//! ```text
//!   attribute
//!   ┌────────┬────────┬───┬───┬───┬─────────┐
//!   │ 15..12 │ 11..8  │ 7 │ 6 │ 5 │  4..0   │
//!   │ height │ width  │ - │ Y │ X │ palette │
//!   └────────┴────────┴───┴───┴───┴─────────┘
//! ```
//!
//! Width and height are stored minus one, so a sprite is a block of up to
//! 16x16 tiles. Tile (col, row) of the block has code `code + col + 16 * row`.
//!
//! The list ends at the first entry whose attribute is `0xFF00`. An entry
//! with X or Y equal to 0 is not drawn.
//!
//! The hardware draws from a copy of the table latched at the end of the
//! previous frame, kept here in a [`SpriteShadowBuffer`].

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::bitwise::{Bits, read_word};

use super::frame::{SCREEN_X_OFFSET, SCREEN_Y_OFFSET};
use super::layers::TileDescriptor;
use super::memory::OBJ_SIZE;
use super::point::Point;

/// Entries in the object table.
pub const OBJ_ENTRIES: usize = 256;

const ENTRY_BYTES: usize = 8;

/// Attribute that terminates the list.
pub const END_OF_LIST: u16 = 0xff00;

/// Coordinates from here up are negative.
const WRAP_THRESHOLD: i32 = 0x1c0;

/// Side of one sprite tile.
const SPRITE_TILE: i32 = 16;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpriteEntry {
    pub x: u16,
    pub y: u16,
    pub code: u16,
    pub attribute: u16,
}

/// One 16x16 tile of a sprite block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubTile {
    /// Added to the sprite code.
    pub code_offset: u32,
    /// Pixel offset from the sprite origin, flips applied.
    pub offset: Point<i32>,
}

fn unwrap_coordinate(raw: u16) -> i32 {
    let value = i32::from(raw.get_bits(0..=8));
    if value >= WRAP_THRESHOLD {
        value - 0x200
    } else {
        value
    }
}

impl SpriteEntry {
    #[must_use]
    pub fn read(table: &[u8], index: usize) -> Self {
        let offset = index * ENTRY_BYTES;
        Self {
            x: read_word(table, offset),
            y: read_word(table, offset + 2),
            code: read_word(table, offset + 4),
            attribute: read_word(table, offset + 6),
        }
    }

    /// Screen position of the top-left corner, `None` for inactive entries.
    #[must_use]
    pub fn position(&self) -> Option<Point<i32>> {
        if self.x == 0 || self.y == 0 {
            return None;
        }

        let world = Point::new(unwrap_coordinate(self.x), unwrap_coordinate(self.y));
        Some(world - Point::new(SCREEN_X_OFFSET, SCREEN_Y_OFFSET))
    }

    /// (columns, rows) of 16x16 tiles.
    #[must_use]
    pub fn block_size(&self) -> (usize, usize) {
        (
            usize::from(self.attribute.get_bits(8..=11)) + 1,
            usize::from(self.attribute.get_bits(12..=15)) + 1,
        )
    }

    #[must_use]
    pub const fn descriptor(&self) -> TileDescriptor {
        TileDescriptor {
            code: self.code,
            attribute: self.attribute,
        }
    }

    /// The tiles of the block in drawing order. Flipping mirrors the block
    /// as a whole: under X flip the first tile drawn is the rightmost one.
    pub fn blocks(&self) -> impl Iterator<Item = SubTile> {
        let (cols, rows) = self.block_size();
        let tile = self.descriptor();
        let (flip_x, flip_y) = (tile.flip_x(), tile.flip_y());

        (0..rows).flat_map(move |row| {
            (0..cols).map(move |col| {
                let dx = if flip_x { cols - 1 - col } else { col };
                let dy = if flip_y { rows - 1 - row } else { row };

                SubTile {
                    code_offset: (col + 16 * row) as u32,
                    offset: Point::new(dx as i32, dy as i32) * SPRITE_TILE,
                }
            })
        })
    }
}

/// Copy of the object table latched once per frame.
#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub struct SpriteShadowBuffer {
    #[serde_as(as = "Box<[_; 2048]>")]
    data: Box<[u8; OBJ_SIZE]>,
}

impl Default for SpriteShadowBuffer {
    fn default() -> Self {
        Self {
            data: Box::new([0; OBJ_SIZE]),
        }
    }
}

impl SpriteShadowBuffer {
    /// Latches the live table. A table cut short by the end of graphics RAM
    /// is zero padded.
    pub fn capture(&mut self, live: &[u8]) {
        let len = live.len().min(OBJ_SIZE);
        self.data[..len].copy_from_slice(&live[..len]);
        self.data[len..].fill(0);
    }

    #[must_use]
    pub fn entry(&self, index: usize) -> SpriteEntry {
        SpriteEntry::read(self.data.as_slice(), index)
    }

    /// Number of entries before the end-of-list marker, the whole table when
    /// there is none.
    #[must_use]
    pub fn effective_length(&self) -> usize {
        (0..OBJ_ENTRIES)
            .find(|&idx| self.entry(idx).attribute == END_OF_LIST)
            .unwrap_or(OBJ_ENTRIES)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn table(entries: &[SpriteEntry]) -> Vec<u8> {
        let mut bytes = vec![0; OBJ_SIZE];
        for (idx, entry) in entries.iter().enumerate() {
            let words = [entry.x, entry.y, entry.code, entry.attribute];
            for (w, word) in words.iter().enumerate() {
                let offset = idx * ENTRY_BYTES + w * 2;
                bytes[offset..offset + 2].copy_from_slice(&word.to_be_bytes());
            }
        }
        bytes
    }

    #[test]
    fn list_ends_at_the_marker() {
        let mut rng = StdRng::seed_from_u64(9);

        for k in [0, 1, 17, 255] {
            let mut bytes: Vec<u8> = (0..OBJ_SIZE).map(|_| rng.r#gen()).collect();
            // Clear any marker that came up by chance before k.
            for idx in 0..k {
                bytes[idx * ENTRY_BYTES + 6] = 0;
            }
            bytes[k * ENTRY_BYTES + 6..k * ENTRY_BYTES + 8].copy_from_slice(&END_OF_LIST.to_be_bytes());

            let mut shadow = SpriteShadowBuffer::default();
            shadow.capture(&bytes);
            assert_eq!(shadow.effective_length(), k);
        }
    }

    #[test]
    fn without_marker_the_whole_table_is_live() {
        let mut shadow = SpriteShadowBuffer::default();
        shadow.capture(&table(&[SpriteEntry {
            attribute: 0xff01,
            ..SpriteEntry::default()
        }]));
        assert_eq!(shadow.effective_length(), OBJ_ENTRIES);
    }

    #[test]
    fn capture_latches_and_pads() {
        let mut shadow = SpriteShadowBuffer::default();
        shadow.capture(&[0xff; OBJ_SIZE]);
        shadow.capture(&[0x12, 0x34, 0x56]);
        assert_eq!(shadow.entry(0).x, 0x1234);
        assert_eq!(shadow.entry(0).y, 0x5600);
        assert!(shadow.as_bytes()[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn coordinates_wrap_to_negative() {
        let entry = |x, y| SpriteEntry {
            x,
            y,
            ..SpriteEntry::default()
        };
        assert_eq!(entry(64, 16).position(), Some(Point::new(0, 0)));
        assert_eq!(entry(0x1bf, 0x100).position(), Some(Point::new(0x17f, 0xf0)));
        assert_eq!(entry(0x1c0, 0x1f0).position(), Some(Point::new(-128, -32)));
        // Only the low 9 bits count.
        assert_eq!(entry(0xfe40, 0x0210).position(), Some(Point::new(0, 0)));
        assert_eq!(entry(0, 16).position(), None);
        assert_eq!(entry(64, 0).position(), None);
    }

    #[test]
    fn block_draw_count() {
        for (nx, ny) in [(0, 0), (1, 0), (0, 3), (15, 15)] {
            let entry = SpriteEntry {
                attribute: (ny << 12) | (nx << 8),
                ..SpriteEntry::default()
            };
            assert_eq!(
                entry.blocks().count(),
                usize::from(nx + 1) * usize::from(ny + 1)
            );
        }
    }

    #[test]
    fn x_flip_starts_from_the_rightmost_column() {
        let entry = SpriteEntry {
            attribute: (1 << 12) | (2 << 8) | (1 << 5),
            ..SpriteEntry::default()
        };
        let tiles: Vec<SubTile> = entry.blocks().collect();

        assert_eq!(tiles[0].code_offset, 0);
        assert_eq!(tiles[0].offset, Point::new(32, 0));
        assert_eq!(tiles[2].offset, Point::new(0, 0));
        assert_eq!(tiles[3].code_offset, 16);
        assert_eq!(tiles[3].offset, Point::new(32, 16));
    }

    #[test]
    fn y_flip_starts_from_the_bottom_row() {
        let entry = SpriteEntry {
            attribute: (1 << 12) | (1 << 6),
            ..SpriteEntry::default()
        };
        let tiles: Vec<SubTile> = entry.blocks().collect();
        assert_eq!(tiles[0].offset, Point::new(0, 16));
        assert_eq!(tiles[1].code_offset, 16);
        assert_eq!(tiles[1].offset, Point::new(0, 0));
    }
}
