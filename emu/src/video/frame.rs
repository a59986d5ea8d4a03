//! Output frame, screen orientation and the priority buffer.
//!
//! Renderers always work in *logical* screen coordinates: a 384x224 raster
//! with (0,0) in the top-left corner of an unrotated monitor. The [`Frame`]
//! maps every plotted pixel through the title's [`Rotation`] and the
//! flip-screen bit when it is written, so rotated titles never need a
//! separate pass.
//!
//! ```text
//!   world (layer / sprite space)
//!   0          64                      448       512
//!   ┌──────────┬───────────────────────┬─────────┐ 0
//!   │          │                       │         │
//!   │          ├───────────────────────┤         │ 16
//!   │          │  visible 384 x 224    │         │
//!   │          ├───────────────────────┤         │ 240
//!   └──────────┴───────────────────────┴─────────┘ 256
//! ```

use serde::{Deserialize, Serialize};

/// Logical screen width.
pub const SCREEN_WIDTH: usize = 384;

/// Logical screen height.
pub const SCREEN_HEIGHT: usize = 224;

/// World X of the first visible column.
pub const SCREEN_X_OFFSET: i32 = 64;

/// World Y of the first visible line.
pub const SCREEN_Y_OFFSET: i32 = 16;

/// Pixel depth of the output frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelDepth {
    /// Physical pens, at most 256 distinct colors per frame.
    #[default]
    Indexed8,
    /// Logical color indices, every palette entry has its own pen.
    Indexed16,
}

/// Monitor orientation of a title.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}

/// Destination transform applied to every plotted pixel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    pub swap_xy: bool,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Orientation {
    /// Combines a title rotation with the flip-screen bit (a 180° turn).
    #[must_use]
    pub const fn new(rotation: Rotation, flip_screen: bool) -> Self {
        let (swap_xy, flip_x, flip_y) = match rotation {
            Rotation::Rot0 => (false, false, false),
            Rotation::Rot90 => (true, false, true),
            Rotation::Rot180 => (false, true, true),
            Rotation::Rot270 => (true, true, false),
        };

        Self {
            swap_xy,
            flip_x: flip_x ^ flip_screen,
            flip_y: flip_y ^ flip_screen,
        }
    }

    /// Physical size of a logical `width` x `height` raster.
    #[must_use]
    pub const fn physical_size(&self, width: usize, height: usize) -> (usize, usize) {
        if self.swap_xy {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Maps logical coordinates to the physical raster.
    #[must_use]
    pub const fn map(&self, x: usize, y: usize, width: usize, height: usize) -> (usize, usize) {
        let x = if self.flip_x { width - 1 - x } else { x };
        let y = if self.flip_y { height - 1 - y } else { y };

        if self.swap_xy { (y, x) } else { (x, y) }
    }
}

/// The composited picture. Pixels are pens: logical color indices for
/// [`PixelDepth::Indexed16`], physical pens for [`PixelDepth::Indexed8`].
#[derive(Clone, Serialize, Deserialize)]
pub struct Frame {
    depth: PixelDepth,
    rotation: Rotation,
    orientation: Orientation,
    pixels: Vec<u16>,
}

impl Frame {
    pub(crate) fn new(depth: PixelDepth, rotation: Rotation, pixels: Vec<u16>) -> Self {
        debug_assert_eq!(pixels.len(), SCREEN_WIDTH * SCREEN_HEIGHT);

        Self {
            depth,
            rotation,
            orientation: Orientation::new(rotation, false),
            pixels,
        }
    }

    #[must_use]
    pub const fn depth(&self) -> PixelDepth {
        self.depth
    }

    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Physical (width, height), after rotation.
    #[must_use]
    pub const fn size(&self) -> (usize, usize) {
        self.orientation.physical_size(SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    /// Physical pixels, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Physical pixels narrowed to bytes. `None` for 16-bit frames.
    #[must_use]
    pub fn pixels_8bit(&self) -> Option<Vec<u8>> {
        match self.depth {
            PixelDepth::Indexed8 => Some(
                self.pixels
                    .iter()
                    .map(|&pen| u8::try_from(pen).unwrap_or_default())
                    .collect(),
            ),
            PixelDepth::Indexed16 => None,
        }
    }

    pub(crate) fn begin(&mut self, flip_screen: bool, background: u16) {
        self.orientation = Orientation::new(self.rotation, flip_screen);
        self.pixels.fill(background);
    }

    fn index(&self, x: usize, y: usize) -> usize {
        let (px, py) = self.orientation.map(x, y, SCREEN_WIDTH, SCREEN_HEIGHT);
        let (width, _) = self.size();
        py * width + px
    }

    /// Writes a pen at logical coordinates.
    #[inline]
    pub(crate) fn plot(&mut self, x: usize, y: usize, pen: u16) {
        let idx = self.index(x, y);
        self.pixels[idx] = pen;
    }

    /// Reads the pen at logical coordinates.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u16 {
        self.pixels[self.index(x, y)]
    }
}

/// One byte per logical pixel. Non-zero marks a pixel owned by a tile that
/// sits above the sprites.
#[derive(Clone, Serialize, Deserialize)]
pub struct PriorityBuffer {
    data: Vec<u8>,
}

impl PriorityBuffer {
    pub(crate) const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    pub fn mark(&mut self, x: usize, y: usize) {
        self.data[y * SCREEN_WIDTH + x] = 1;
    }

    #[inline]
    #[must_use]
    pub fn is_marked(&self, x: usize, y: usize) -> bool {
        self.data[y * SCREEN_WIDTH + x] != 0
    }

    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.data.iter().filter(|&&p| p != 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(rotation: Rotation) -> Frame {
        Frame::new(
            PixelDepth::Indexed16,
            rotation,
            vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
        )
    }

    #[test]
    fn unrotated_frame_is_row_major() {
        let mut f = frame(Rotation::Rot0);
        f.plot(3, 2, 7);
        assert_eq!(f.size(), (SCREEN_WIDTH, SCREEN_HEIGHT));
        assert_eq!(f.pixels()[2 * SCREEN_WIDTH + 3], 7);
        assert_eq!(f.pixel(3, 2), 7);
    }

    #[test]
    fn rot270_swaps_axes() {
        let mut f = frame(Rotation::Rot270);
        f.plot(0, 0, 9);
        assert_eq!(f.size(), (SCREEN_HEIGHT, SCREEN_WIDTH));
        // Logical top-left lands in the physical bottom-left corner.
        let (width, height) = f.size();
        assert_eq!(f.pixels()[(height - 1) * width], 9);
        assert_eq!(f.pixel(0, 0), 9);
    }

    #[test]
    fn rot90_swaps_axes_and_mirrors_vertically() {
        let orientation = Orientation::new(Rotation::Rot90, false);
        assert_eq!(orientation.map(0, 0, SCREEN_WIDTH, SCREEN_HEIGHT), (223, 0));
        assert_eq!(orientation.map(0, 223, SCREEN_WIDTH, SCREEN_HEIGHT), (0, 0));
        assert_eq!(orientation.map(383, 0, SCREEN_WIDTH, SCREEN_HEIGHT), (223, 383));

        let mut f = frame(Rotation::Rot90);
        f.plot(0, 0, 4);
        f.plot(0, 223, 6);
        assert_eq!(f.size(), (SCREEN_HEIGHT, SCREEN_WIDTH));
        // Logical top-left lands in the physical top-right corner.
        let (width, _) = f.size();
        assert_eq!(f.pixels()[width - 1], 4);
        assert_eq!(f.pixels()[0], 6);
        assert_eq!(f.pixel(0, 0), 4);
        assert_eq!(f.pixel(0, 223), 6);
    }

    #[test]
    fn rot180_mirrors_both_axes() {
        let orientation = Orientation::new(Rotation::Rot180, false);
        assert_eq!(orientation.map(0, 0, SCREEN_WIDTH, SCREEN_HEIGHT), (383, 223));
        assert_eq!(orientation.map(383, 223, SCREEN_WIDTH, SCREEN_HEIGHT), (0, 0));

        let mut f = frame(Rotation::Rot180);
        f.plot(0, 0, 8);
        f.plot(10, 1, 2);
        assert_eq!(f.size(), (SCREEN_WIDTH, SCREEN_HEIGHT));
        assert_eq!(*f.pixels().last().unwrap(), 8);
        assert_eq!(f.pixels()[(SCREEN_HEIGHT - 2) * SCREEN_WIDTH + 373], 2);
        assert_eq!(f.pixel(10, 1), 2);
    }

    #[test]
    fn flip_screen_turns_the_picture() {
        let mut f = frame(Rotation::Rot0);
        f.begin(true, 0);
        f.plot(0, 0, 5);
        assert_eq!(*f.pixels().last().unwrap(), 5);

        f.begin(false, 0);
        f.plot(0, 0, 5);
        assert_eq!(f.pixels()[0], 5);
    }

    #[test]
    fn eight_bit_view_only_for_indexed8() {
        let f = frame(Rotation::Rot0);
        assert!(f.pixels_8bit().is_none());

        let f8 = Frame::new(
            PixelDepth::Indexed8,
            Rotation::Rot0,
            vec![3; SCREEN_WIDTH * SCREEN_HEIGHT],
        );
        assert_eq!(f8.pixels_8bit().unwrap()[0], 3);
    }

    #[test]
    fn priority_buffer_marks_and_clears() {
        let mut p = PriorityBuffer::new(vec![0; SCREEN_WIDTH * SCREEN_HEIGHT]);
        p.mark(10, 20);
        assert!(p.is_marked(10, 20));
        assert!(!p.is_marked(11, 20));
        assert_eq!(p.marked_count(), 1);
        p.clear();
        assert_eq!(p.marked_count(), 0);
    }
}
