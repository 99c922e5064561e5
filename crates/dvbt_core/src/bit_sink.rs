/// Accumulates single bits into bytes, most significant bit first.
///
/// The first bit pushed becomes bit 7 of byte 0, matching the bit-serial
/// ordering of the demultiplexed and decoded output streams.
#[derive(Debug, Default, Clone)]
pub struct BitSink {
    bytes: Vec<u8>,
    bit_length: usize,
}

impl BitSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.bit_length = 0;
    }

    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn push(&mut self, bit: u8) {
        let index = self.bit_length / 8;
        if index == self.bytes.len() {
            self.bytes.push(0);
        }
        self.bytes[index] |= (bit & 1) << (7 - (self.bit_length % 8));
        self.bit_length += 1;
    }

    pub fn bit(&self, index: usize) -> u8 {
        assert!(index < self.bit_length, "Bit {} is past the end of the sink", index);
        (self.bytes[index / 8] >> (7 - (index % 8))) & 1
    }

    /// Removes and returns every complete byte, leaving a partial trailing
    /// byte (if any) in place.
    pub fn drain_bytes(&mut self) -> Vec<u8> {
        let whole = self.bit_length / 8;
        let drained: Vec<u8> = self.bytes.drain(..whole).collect();
        self.bit_length -= whole * 8;
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_msb_first() {
        let mut sink = BitSink::new();
        for bit in [1, 0, 1, 1, 0, 0, 1, 0, 1] {
            sink.push(bit);
        }
        assert_eq!(sink.bit_length(), 9);
        assert_eq!(sink.as_bytes(), &[0b1011_0010, 0b1000_0000]);
        assert_eq!(sink.bit(0), 1);
        assert_eq!(sink.bit(8), 1);
    }

    #[test]
    fn drain_keeps_partial_byte() {
        let mut sink = BitSink::new();
        for index in 0..10 {
            sink.push((index % 2) as u8);
        }
        let drained = sink.drain_bytes();
        assert_eq!(drained, vec![0b0101_0101]);
        assert_eq!(sink.bit_length(), 2);
        assert_eq!(sink.as_bytes(), &[0b0100_0000]);

        sink.push(1);
        assert_eq!(sink.as_bytes(), &[0b0110_0000]);
    }
}
