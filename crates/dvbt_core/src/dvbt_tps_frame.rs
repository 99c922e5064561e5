use std::fmt;

/// Number of bits in one TPS frame, one bit per OFDM symbol.
pub const TPS_FRAME_BITS: usize = 68;
/// The 16-bit synchronisation word (or its complement on odd frames).
pub const TPS_SYNC_WORD: u16 = 0x35EE;
/// Bit position to carry on from after observing the synchronisation word.
pub const TPS_RESYNC_BIT: usize = 17;
/// Frames per superframe.
pub const TPS_FRAMES_PER_SUPERFRAME: usize = 4;

// Fixed (offset, width) pairs of the decoded fields inside the 68-bit frame.
// DOC: ETSI EN 300 744, clause 4.6.2.
const TPS_FIELD_FRAME: (usize, usize) = (23, 2);
const TPS_FIELD_CONSTELLATION: (usize, usize) = (25, 2);
const TPS_FIELD_HIERARCHY: (usize, usize) = (27, 3);
const TPS_FIELD_CODE_RATE_HP: (usize, usize) = (30, 3);
const TPS_FIELD_CODE_RATE_LP: (usize, usize) = (33, 3);
const TPS_FIELD_GUARD: (usize, usize) = (36, 2);
const TPS_FIELD_FFT_MODE: (usize, usize) = (38, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpsConstellation {
    Qpsk,
    Qam16,
    Qam64,
    Reserved,
}

impl TpsConstellation {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Qpsk,
            1 => Self::Qam16,
            2 => Self::Qam64,
            _ => Self::Reserved,
        }
    }

    /// Bits carried by one data cell, if the constellation is decodable.
    pub fn bits_per_cell(&self) -> Option<usize> {
        match self {
            Self::Qpsk => Some(2),
            Self::Qam16 => Some(4),
            Self::Qam64 => Some(6),
            Self::Reserved => None,
        }
    }
}

impl fmt::Display for TpsConstellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Qpsk => write!(f, "QPSK"),
            Self::Qam16 => write!(f, "QAM16"),
            Self::Qam64 => write!(f, "QAM64"),
            Self::Reserved => write!(f, "invalid constellation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpsCodeRate {
    Rate1_2,
    Rate2_3,
    Rate3_4,
    Rate5_6,
    Rate7_8,
    Reserved,
}

impl TpsCodeRate {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Rate1_2,
            1 => Self::Rate2_3,
            2 => Self::Rate3_4,
            3 => Self::Rate5_6,
            4 => Self::Rate7_8,
            _ => Self::Reserved,
        }
    }
}

impl fmt::Display for TpsCodeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rate1_2 => write!(f, "code rate 1/2"),
            Self::Rate2_3 => write!(f, "code rate 2/3"),
            Self::Rate3_4 => write!(f, "code rate 3/4"),
            Self::Rate5_6 => write!(f, "code rate 5/6"),
            Self::Rate7_8 => write!(f, "code rate 7/8"),
            Self::Reserved => write!(f, "illegal code rate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpsGuardInterval {
    Guard1_32,
    Guard1_16,
    Guard1_8,
    Guard1_4,
}

impl TpsGuardInterval {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Guard1_32,
            1 => Self::Guard1_16,
            2 => Self::Guard1_8,
            _ => Self::Guard1_4,
        }
    }

    /// The FFT size divided by this gives the guard length in samples.
    pub fn divisor(&self) -> usize {
        match self {
            Self::Guard1_32 => 32,
            Self::Guard1_16 => 16,
            Self::Guard1_8 => 8,
            Self::Guard1_4 => 4,
        }
    }
}

impl fmt::Display for TpsGuardInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guard1_32 => write!(f, "1/32"),
            Self::Guard1_16 => write!(f, "1/16"),
            Self::Guard1_8 => write!(f, "1/8"),
            Self::Guard1_4 => write!(f, "1/4"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpsFftMode {
    Fft2k,
    Fft8k,
    Reserved,
}

impl TpsFftMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Fft2k,
            1 => Self::Fft8k,
            _ => Self::Reserved,
        }
    }
}

impl fmt::Display for TpsFftMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fft2k => write!(f, "2K FFT"),
            Self::Fft8k => write!(f, "8K FFT"),
            Self::Reserved => write!(f, "invalid FFT"),
        }
    }
}

/// The transmission parameters signalled by one 68-bit TPS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TpsFrame {
    /// Frame number in the superframe, 0..4.
    pub frame: u8,
    pub constellation: TpsConstellation,
    /// Hierarchy information, 0 meaning non-hierarchical.
    pub hierarchy: u8,
    pub code_rate_hp: TpsCodeRate,
    pub code_rate_lp: TpsCodeRate,
    pub guard_interval: TpsGuardInterval,
    pub fft_mode: TpsFftMode,
}

impl fmt::Display for TpsFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {}, {}, {}, HP {}, LP {}, guard interval {}, {}",
            self.frame,
            self.constellation,
            match self.hierarchy {
                0 => "non-hierarchical",
                1 => "hierarchical (a = 1)",
                2 => "hierarchical (a = 2)",
                3 => "hierarchical (a = 4)",
                _ => "hierarchical (reserved)",
            },
            self.code_rate_hp,
            self.code_rate_lp,
            self.guard_interval,
            self.fft_mode,
        )
    }
}

/// Extracts a field of up to 8 bits from the accumulated TPS payload, which
/// stores bit s_0 as the most significant bit of byte 0.
pub fn tps_bit_field(payload: &[u8; 9], offset: usize, width: usize) -> u8 {
    debug_assert!(width <= 8 && offset + width <= TPS_FRAME_BITS);
    let mut value = 0u8;
    for bit in offset..offset + width {
        value = (value << 1) | ((payload[bit / 8] >> (7 - (bit % 8))) & 1);
    }
    value
}

/// Decodes the transmission parameters from a fully accumulated frame.
pub fn decode_tps_frame(payload: &[u8; 9]) -> TpsFrame {
    let field = |(offset, width): (usize, usize)| tps_bit_field(payload, offset, width);
    TpsFrame {
        frame: field(TPS_FIELD_FRAME),
        constellation: TpsConstellation::from_bits(field(TPS_FIELD_CONSTELLATION)),
        hierarchy: field(TPS_FIELD_HIERARCHY),
        code_rate_hp: TpsCodeRate::from_bits(field(TPS_FIELD_CODE_RATE_HP)),
        code_rate_lp: TpsCodeRate::from_bits(field(TPS_FIELD_CODE_RATE_LP)),
        guard_interval: TpsGuardInterval::from_bits(field(TPS_FIELD_GUARD)),
        fft_mode: TpsFftMode::from_bits(field(TPS_FIELD_FFT_MODE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with_fields(bits: &[(usize, usize, u8)]) -> [u8; 9] {
        let mut payload = [0u8; 9];
        for &(offset, width, value) in bits {
            for position in 0..width {
                let bit = (value >> (width - position - 1)) & 1;
                let index = offset + position;
                payload[index / 8] |= bit << (7 - (index % 8));
            }
        }
        payload
    }

    #[test]
    fn decodes_fields_at_fixed_offsets() {
        let payload = payload_with_fields(&[
            (23, 2, 2),
            (25, 2, 1),
            (27, 3, 0),
            (30, 3, 1),
            (33, 3, 4),
            (36, 2, 0),
            (38, 2, 0),
        ]);
        let frame = decode_tps_frame(&payload);
        assert_eq!(frame.frame, 2);
        assert_eq!(frame.constellation, TpsConstellation::Qam16);
        assert_eq!(frame.hierarchy, 0);
        assert_eq!(frame.code_rate_hp, TpsCodeRate::Rate2_3);
        assert_eq!(frame.code_rate_lp, TpsCodeRate::Rate7_8);
        assert_eq!(frame.guard_interval, TpsGuardInterval::Guard1_32);
        assert_eq!(frame.fft_mode, TpsFftMode::Fft2k);
    }

    #[test]
    fn reserved_values_decode_without_panicking() {
        let payload = payload_with_fields(&[(25, 2, 3), (30, 3, 7), (38, 2, 3)]);
        let frame = decode_tps_frame(&payload);
        assert_eq!(frame.constellation, TpsConstellation::Reserved);
        assert_eq!(frame.code_rate_hp, TpsCodeRate::Reserved);
        assert_eq!(frame.fft_mode, TpsFftMode::Reserved);
        assert_eq!(frame.constellation.bits_per_cell(), None);
    }
}
