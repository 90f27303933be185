//! Reading and writing numbers of arbitrary bit width.

/// A big-endian bit reader.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    cur_pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cur_pos: 0 }
    }

    /// Align the reader to the next byte boundary.
    #[inline]
    pub fn align(&mut self) {
        let bit_pos = self.bit_pos();

        if !bit_pos.is_multiple_of(8) {
            self.cur_pos += 8 - bit_pos;
        }
    }

    /// Read the given number of bits from the byte stream.
    ///
    /// Returns `None` if `bit_size` > 32 or if not enough data is left.
    #[inline]
    pub fn read(&mut self, bit_size: u8) -> Option<u32> {
        if bit_size == 0 {
            return Some(0);
        }

        if bit_size > 32 {
            return None;
        }

        let byte_pos = self.byte_pos();
        let bit_pos = self.bit_pos();
        let end_byte_pos = (bit_pos + bit_size as usize - 1) / 8;
        let mut window = [0_u8; 8];

        for (i, w) in window.iter_mut().enumerate().take(end_byte_pos + 1) {
            *w = *self.data.get(byte_pos + i)?;
        }

        let item = (u64::from_be_bytes(window) >> (64 - bit_pos - bit_size as usize)) as u32
            & bit_mask(bit_size);
        self.cur_pos += bit_size as usize;

        Some(item)
    }

    /// Read a number and map it linearly from `[0, 2^bit_size - 1]` into `[min, max]`.
    #[inline]
    pub fn read_scaled(&mut self, bit_size: u8, min: f32, max: f32) -> Option<f32> {
        let raw = self.read(bit_size)?;
        let max_raw = bit_mask(bit_size) as f64;

        if max_raw == 0.0 {
            return Some(min);
        }

        Some((min as f64 + raw as f64 * (max as f64 - min as f64) / max_raw) as f32)
    }

    /// Whether the bit reader has read all bytes.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.byte_pos() >= self.data.len()
    }

    /// Get the current byte position.
    #[inline]
    pub fn byte_pos(&self) -> usize {
        self.cur_pos / 8
    }

    fn bit_pos(&self) -> usize {
        self.cur_pos % 8
    }
}

/// A big-endian bit writer backed by a growable buffer.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    data: Vec<u8>,
    cur_pos: usize,
}

impl BitWriter {
    /// Create a new, empty bit writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the lowest `bit_size` bits of `val`.
    ///
    /// Returns `None` if `bit_size` > 32.
    pub fn write(&mut self, val: u32, bit_size: u8) -> Option<()> {
        if bit_size > 32 {
            return None;
        }

        let value = val & bit_mask(bit_size);
        let mut bits_left = bit_size as usize;

        while bits_left > 0 {
            let byte_pos = self.cur_pos / 8;
            let bit_pos = self.cur_pos % 8;

            if byte_pos == self.data.len() {
                self.data.push(0);
            }

            let bits_in_byte = (8 - bit_pos).min(bits_left);
            let chunk = ((value >> (bits_left - bits_in_byte)) & bit_mask(bits_in_byte as u8)) as u8;
            self.data[byte_pos] |= chunk << (8 - bits_in_byte - bit_pos);

            self.cur_pos += bits_in_byte;
            bits_left -= bits_in_byte;
        }

        Some(())
    }

    /// Map `val` from `[min, max]` into `[0, 2^bit_size - 1]` and write it.
    pub fn write_scaled(&mut self, val: f32, bit_size: u8, min: f32, max: f32) -> Option<()> {
        let max_raw = bit_mask(bit_size) as f64;
        let range = max as f64 - min as f64;
        let normalized = if range == 0.0 {
            0.0
        } else {
            ((val as f64 - min as f64) / range).clamp(0.0, 1.0)
        };

        self.write((normalized * max_raw).round() as u32, bit_size)
    }

    /// Pad the written data with zero bits up to the next byte boundary.
    pub fn align(&mut self) {
        if !self.cur_pos.is_multiple_of(8) {
            self.cur_pos += 8 - self.cur_pos % 8;
        }
    }

    /// Return the written bytes.
    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

/// Get the mask for the given bit size.
#[inline]
pub fn bit_mask(bit_size: u8) -> u32 {
    ((1_u64 << bit_size as u64) - 1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_reader_16() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(16).unwrap(), 0x0102);
        assert_eq!(reader.read(16).unwrap(), 0x0304);
        assert!(reader.read(16).is_none());
    }

    #[test]
    fn bit_reader_12() {
        let data = [0b10011000, 0b00011111, 0b10101001, 0b11101001, 0b00011010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(12).unwrap(), 0b100110000001);
        assert_eq!(reader.read(12).unwrap(), 0b111110101001);
        assert_eq!(reader.read(12).unwrap(), 0b111010010001);
    }

    #[test]
    fn bit_reader_32_unaligned() {
        let data = [0xF0, 0x00, 0x00, 0x00, 0x0F];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(4).unwrap(), 0xF);
        assert_eq!(reader.read(32).unwrap(), 0);
        assert_eq!(reader.read(4).unwrap(), 0xF);
        assert!(reader.at_end());
    }

    #[test]
    fn bit_reader_align() {
        let data = [0b1010_0000, 0xFF];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(3).unwrap(), 0b101);
        reader.align();
        assert_eq!(reader.read(8).unwrap(), 0xFF);
    }

    #[test]
    fn bit_writer_mixed_sizes() {
        let mut writer = BitWriter::new();
        writer.write(0b1001, 4).unwrap();
        writer.write(0b1000, 4).unwrap();
        writer.write(0x0102, 16).unwrap();
        writer.write(0b1, 1).unwrap();
        writer.align();
        writer.write(0xAB, 8).unwrap();

        assert_eq!(writer.finish(), [0b10011000, 0x01, 0x02, 0b1000_0000, 0xAB]);
    }

    #[test]
    fn scaled_values_survive_writing() {
        let mut writer = BitWriter::new();
        writer.write_scaled(25.0, 16, 0.0, 100.0).unwrap();
        writer.write_scaled(-3.0, 32, -10.0, 10.0).unwrap();
        let data = writer.finish();

        let mut reader = BitReader::new(&data);
        assert!((reader.read_scaled(16, 0.0, 100.0).unwrap() - 25.0).abs() < 0.01);
        assert!((reader.read_scaled(32, -10.0, 10.0).unwrap() + 3.0).abs() < 0.0001);
    }
}
