use dvbt_core::bit_sink::BitSink;

/// Trellis steps held back before a traceback decision is forced.
const DECISION_LEN: usize = 32;
/// Bits emitted per traceback pass.
const OUTPUT_BITS: usize = 32;
/// Extra slack so the write pointer never laps the read pointer.
const TRELLIS_GUARD: usize = 8;
const TRELLIS_DEPTH: usize = DECISION_LEN + OUTPUT_BITS + TRELLIS_GUARD;

const CONSTRAINT_LEN: usize = 5;
const STATE_COUNT: usize = 1 << (CONSTRAINT_LEN + 1);

// Tap masks over {input, state} for the two generator polynomials. Bit 0 of
// the state is the oldest input still in the shift register.
const GENERATOR_X_TAPS: usize = 0b11_1001;
const GENERATOR_Y_TAPS: usize = 0b01_1011;

#[derive(Debug, Clone, Copy, Default)]
struct PathRecord {
    metric: u32,
    predecessor: u8,
    input: u8,
}

/// Rate 1/2, 64-state Viterbi decoder with a bounded traceback window.
///
/// Each call to [`consume`](Self::consume) advances the trellis by one step.
/// Once `DECISION_LEN + OUTPUT_BITS` steps are outstanding, the decoder
/// tracebacks from the best path at the newest step and commits the oldest
/// `OUTPUT_BITS` decisions. The fixed window bounds both memory and latency
/// at the cost of slight suboptimality versus full-sequence decoding.
pub struct ViterbiDecoder {
    trellis: Vec<[PathRecord; STATE_COUNT]>,
    /// Oldest trellis step that has not been committed yet.
    head: usize,
    /// Next trellis step to be written.
    tail: usize,
    x_table: [[u8; 2]; STATE_COUNT],
    y_table: [[u8; 2]; STATE_COUNT],
    bits: BitSink,
}

impl Default for ViterbiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ViterbiDecoder {
    pub fn new() -> Self {
        let mut x_table = [[0u8; 2]; STATE_COUNT];
        let mut y_table = [[0u8; 2]; STATE_COUNT];
        for state in 0..STATE_COUNT {
            for input in 0..2usize {
                x_table[state][input] =
                    (((state & GENERATOR_X_TAPS).count_ones() as usize + input) & 1) as u8;
                y_table[state][input] =
                    (((state & GENERATOR_Y_TAPS).count_ones() as usize + input) & 1) as u8;
            }
        }
        Self {
            trellis: vec![[PathRecord::default(); STATE_COUNT]; TRELLIS_DEPTH],
            head: 0,
            tail: 0,
            x_table,
            y_table,
            bits: BitSink::new(),
        }
    }

    fn outstanding(&self) -> usize {
        (self.tail + TRELLIS_DEPTH - self.head) % TRELLIS_DEPTH
    }

    /// Advances the trellis by one step. `has_x` is false for a punctured
    /// step where only the `y` code bit was transmitted.
    pub fn consume(&mut self, has_x: bool, x: u8, y: u8) {
        let previous = self.trellis[(self.tail + TRELLIS_DEPTH - 1) % TRELLIS_DEPTH];
        let current = &mut self.trellis[self.tail];
        for record in current.iter_mut() {
            record.metric = u32::MAX;
        }

        for state in 0..STATE_COUNT {
            for input in 0..2usize {
                let mut metric = previous[state].metric;
                if has_x && x != self.x_table[state][input] {
                    metric += 1;
                }
                if y != self.y_table[state][input] {
                    metric += 1;
                }
                let next = (state >> 1) | (input << CONSTRAINT_LEN);
                if current[next].metric > metric {
                    current[next] = PathRecord {
                        metric,
                        predecessor: state as u8,
                        input: input as u8,
                    };
                }
            }
        }

        self.tail = (self.tail + 1) % TRELLIS_DEPTH;
        if self.outstanding() == DECISION_LEN + OUTPUT_BITS {
            self.traceback(false);
        }
    }

    /// Commits every outstanding trellis step and returns the best path
    /// metric, lower meaning a more confident decode.
    pub fn finish(&mut self) -> u32 {
        let metric = self.traceback(true);
        log::debug!("final traceback, best path metric {}", metric);
        metric
    }

    /// Removes the decoded bits committed so far, packed MSB first. A final
    /// partial byte is retained until enough bits arrive to complete it.
    pub fn drain_bytes(&mut self) -> Vec<u8> {
        self.bits.drain_bytes()
    }

    pub fn decoded_bit_length(&self) -> usize {
        self.bits.bit_length()
    }

    /// A single committed bit that has not been drained yet.
    pub fn decoded_bit(&self, index: usize) -> u8 {
        self.bits.bit(index)
    }

    fn traceback(&mut self, finished: bool) -> u32 {
        let outstanding = self.outstanding();
        if outstanding == 0 {
            return 0;
        }

        let newest = (self.tail + TRELLIS_DEPTH - 1) % TRELLIS_DEPTH;
        let mut state = 0usize;
        for candidate in 0..STATE_COUNT {
            if self.trellis[newest][candidate].metric < self.trellis[newest][state].metric {
                state = candidate;
            }
        }
        let best_metric = self.trellis[newest][state].metric;

        let mut decoded = vec![0u8; outstanding];
        let mut position = newest;
        for slot in (0..outstanding).rev() {
            let record = self.trellis[position][state];
            decoded[slot] = record.input;
            state = record.predecessor as usize;
            position = (position + TRELLIS_DEPTH - 1) % TRELLIS_DEPTH;
        }

        let emit = if finished { outstanding } else { OUTPUT_BITS };
        for &bit in &decoded[..emit] {
            self.bits.push(bit);
        }
        self.head = (self.head + emit) % TRELLIS_DEPTH;
        best_metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Convolutional encoder mirroring the decoder's trellis transitions.
    struct Encoder {
        state: usize,
    }

    impl Encoder {
        fn new() -> Self {
            Self { state: 0 }
        }

        fn push(&mut self, input: u8) -> (u8, u8) {
            let input = (input & 1) as usize;
            let x = ((self.state & GENERATOR_X_TAPS).count_ones() as usize + input) & 1;
            let y = ((self.state & GENERATOR_Y_TAPS).count_ones() as usize + input) & 1;
            self.state = (self.state >> 1) | (input << CONSTRAINT_LEN);
            (x as u8, y as u8)
        }
    }

    fn pseudo_random_bits(length: usize, mut seed: u64) -> Vec<u8> {
        let mut bits = Vec::with_capacity(length);
        for _ in 0..length {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            bits.push((seed >> 63) as u8);
        }
        bits
    }

    fn decode_all(code: &[(bool, u8, u8)]) -> (Vec<u8>, u32) {
        let mut decoder = ViterbiDecoder::new();
        for &(has_x, x, y) in code {
            decoder.consume(has_x, x, y);
        }
        let metric = decoder.finish();
        let bits = (0..decoder.decoded_bit_length())
            .map(|index| decoder.decoded_bit(index))
            .collect();
        (bits, metric)
    }

    // The decoder starts with every state equally likely, so the first few
    // decisions can legitimately differ from the transmitted bits. Skip the
    // register length when comparing.
    const SETTLE_BITS: usize = 8;

    #[test]
    fn clean_stream_decodes_exactly() {
        let input = pseudo_random_bits(200, 0x2d99787926d46932);
        let mut encoder = Encoder::new();
        let code: Vec<_> = input.iter().map(|&bit| {
            let (x, y) = encoder.push(bit);
            (true, x, y)
        }).collect();

        let (decoded, metric) = decode_all(&code);
        assert_eq!(decoded.len(), input.len());
        assert_eq!(decoded[SETTLE_BITS..], input[SETTLE_BITS..]);
        assert_eq!(metric, 0);
    }

    #[test]
    fn sparse_bit_errors_are_corrected() {
        let input = pseudo_random_bits(300, 0x9e3779b97f4a7c15);
        let mut encoder = Encoder::new();
        let mut code: Vec<_> = input.iter().map(|&bit| {
            let (x, y) = encoder.push(bit);
            (true, x, y)
        }).collect();
        // Flip one code bit every hundred steps, far apart relative to the
        // decision window
        code[50].1 ^= 1;
        code[150].2 ^= 1;
        code[250].1 ^= 1;

        let (decoded, metric) = decode_all(&code);
        assert_eq!(decoded[SETTLE_BITS..], input[SETTLE_BITS..]);
        assert_eq!(metric, 3);
    }

    #[test]
    fn punctured_stream_decodes_from_y_alone() {
        let input = pseudo_random_bits(240, 0xdeadbeefcafe1234);
        let mut encoder = Encoder::new();
        let code: Vec<_> = input.iter().enumerate().map(|(step, &bit)| {
            let (x, y) = encoder.push(bit);
            if step % 2 == 0 {
                (true, x, y)
            } else {
                (false, 0, y)
            }
        }).collect();

        let (decoded, metric) = decode_all(&code);
        assert_eq!(decoded.len(), input.len());
        assert_eq!(decoded[2 * SETTLE_BITS..], input[2 * SETTLE_BITS..]);
        assert_eq!(metric, 0);
    }

    #[test]
    fn short_streams_flush_every_outstanding_bit() {
        let input = pseudo_random_bits(20, 0x1234567812345678);
        let mut encoder = Encoder::new();
        let mut decoder = ViterbiDecoder::new();
        for &bit in &input {
            let (x, y) = encoder.push(bit);
            decoder.consume(true, x, y);
        }
        assert_eq!(decoder.decoded_bit_length(), 0);
        assert_eq!(decoder.finish(), 0);
        assert_eq!(decoder.decoded_bit_length(), input.len());
    }
}
