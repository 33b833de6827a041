/// MSB-first bit cursor over a byte slice, for sample depths that are not a whole number of
/// bytes
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Reads the next `count` bits (at most 32) as a big-endian value
    ///
    /// Returns [`None`] if fewer than `count` bits remain.
    pub fn read_bits(&mut self, count: u8) -> Option<u32> {
        debug_assert!(count <= 32);
        let count = usize::from(count);
        if self.position + count > self.data.len() * 8 {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self.data[self.position >> 3];
            let bit = (byte >> (7 - (self.position & 0x7))) & 1;
            value = (value << 1) | u32::from(bit);
            self.position += 1;
        }
        Some(value)
    }

    /// Skips to the start of the next byte, if not already aligned
    pub fn align(&mut self) {
        self.position = (self.position + 7) & !0x7;
    }

    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.position
    }
}
