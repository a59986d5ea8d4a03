use std::ops::RangeInclusive;

/// Bit helpers for the 16-bit words the video hardware is programmed with.
/// Bit indexes go from lsb to msb (right to left).
pub trait Bits: Copy {
    fn get_bit(self, bit_idx: u8) -> bool;

    /// Extracts `bits_range` and moves it down to bit 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    /// Reinterprets the low `number_of_bits` bits as a two's complement value.
    fn sign_extended(self, number_of_bits: u8) -> i32;
}

macro_rules! impl_bits {
    ($ty:ty) => {
        impl Bits for $ty {
            fn get_bit(self, bit_idx: u8) -> bool {
                debug_assert!(u32::from(bit_idx) < <$ty>::BITS);
                (self >> bit_idx) & 1 == 1
            }

            fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                let start = *bits_range.start();
                let end = *bits_range.end();
                debug_assert!(start <= end && u32::from(end) < <$ty>::BITS);

                let length = u32::from(end - start) + 1;
                let mask = if length == <$ty>::BITS {
                    <$ty>::MAX
                } else {
                    (1 << length) - 1
                };

                (self >> start) & mask
            }

            #[allow(clippy::cast_possible_wrap)]
            fn sign_extended(self, number_of_bits: u8) -> i32 {
                debug_assert!(number_of_bits > 0 && u32::from(number_of_bits) <= <$ty>::BITS);
                let shift = 32 - u32::from(number_of_bits);
                ((u32::from(self) << shift) as i32) >> shift
            }
        }
    };
}

impl_bits!(u8);
impl_bits!(u16);
impl_bits!(u32);

/// Reads a big-endian word, the 68000 byte order of every video surface.
/// Reads past the end of `data` return 0.
#[must_use]
pub fn read_word(data: &[u8], offset: usize) -> u16 {
    match data.get(offset..offset + 2) {
        Some(&[hi, lo]) => u16::from_be_bytes([hi, lo]),
        _ => 0,
    }
}
