use num::complex::Complex64;

use dvbt_core::dvbt_parameters::DvbtParameters;
use dvbt_core::dvbt_tps_frame::{
    decode_tps_frame, TpsFrame, TPS_FRAMES_PER_SUPERFRAME, TPS_FRAME_BITS, TPS_RESYNC_BIT,
    TPS_SYNC_WORD,
};

/// Decodes the transmission parameter signalling carried by the TPS carriers.
///
/// Every OFDM symbol carries one bit of a 68-bit TPS frame, repeated on all
/// TPS carriers with DBPSK modulation. Comparing each carrier against its
/// value from the previous symbol recovers the bit by majority vote. The
/// synchronisation word at bits 1..=16 (sent alternately as 0x35EE and its
/// complement) pins down the bit position inside the frame.
pub struct DvbtTpsDecoder {
    previous_cells: Vec<Complex64>,
    sync_register: u16,
    payload: [u8; 9],
    bit_position: usize,
    symbol: usize,
    frame: u8,
    synchronized: bool,
    pub total_split_votes: u64,
    pub total_resyncs: u64,
}

impl DvbtTpsDecoder {
    pub fn new(params: &DvbtParameters) -> Self {
        Self {
            previous_cells: vec![Complex64::new(0.0, 0.0); params.tps_carriers.len()],
            sync_register: 0,
            payload: [0u8; 9],
            bit_position: 0,
            symbol: 0,
            frame: 0,
            synchronized: false,
            total_split_votes: 0,
            total_resyncs: 0,
        }
    }

    /// Index of the most recent symbol inside its 68-symbol TPS frame.
    pub fn symbol_index(&self) -> usize {
        self.symbol
    }

    /// Index of the current frame inside its superframe, 0..4.
    pub fn frame_index(&self) -> u8 {
        self.frame
    }

    /// True once a synchronisation word has been observed.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Consumes one symbol of active carriers, indexed by carrier number.
    /// Returns the decoded transmission parameters when a frame completes.
    pub fn process_symbol(
        &mut self,
        params: &DvbtParameters,
        carriers: &[Complex64],
    ) -> Option<TpsFrame> {
        if self.bit_position == 0 {
            self.frame = (self.frame + 1) % TPS_FRAMES_PER_SUPERFRAME as u8;
        }

        let mut votes_one = 0usize;
        let mut votes_zero = 0usize;
        for (i, &carrier) in params.tps_carriers.iter().enumerate() {
            let cell = carriers[carrier];
            let previous = self.previous_cells[i];
            // A phase flip between symbols encodes a one
            let dot = cell.re * previous.re + cell.im * previous.im;
            if dot < 0.0 {
                votes_one += 1;
            } else {
                votes_zero += 1;
            }
            self.previous_cells[i] = cell;
        }
        let total_votes = params.tps_carriers.len();
        if votes_one.min(votes_zero) * 3 > total_votes {
            self.total_split_votes += 1;
            log::warn!("split TPS vote: {votes_one} ones against {votes_zero} zeros");
        }
        let bit = (votes_one > votes_zero) as u8;

        let index = self.bit_position;
        let mask = 1u8 << (7 - (index % 8));
        self.payload[index / 8] = (self.payload[index / 8] & !mask) | (bit * mask);
        self.symbol = index;
        self.bit_position += 1;

        self.sync_register = (self.sync_register << 1) | bit as u16;
        if self.sync_register == TPS_SYNC_WORD || self.sync_register == !TPS_SYNC_WORD {
            if self.bit_position != TPS_RESYNC_BIT {
                self.total_resyncs += 1;
                log::info!(
                    "TPS resynchronised from bit position {} to {}",
                    self.bit_position,
                    TPS_RESYNC_BIT
                );
                self.bit_position = TPS_RESYNC_BIT;
            }
            self.symbol = TPS_RESYNC_BIT - 1;
            self.synchronized = true;
        }

        if self.bit_position == TPS_FRAME_BITS {
            self.bit_position = 0;
            let frame = decode_tps_frame(&self.payload);
            self.frame = frame.frame;
            return Some(frame);
        }
        None
    }
}
