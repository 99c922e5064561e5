use std::sync::Arc;

use num::complex::Complex64;
use rustfft::{Fft, FftPlanner};

use ofdm::sample_source::SampleSource;
use ofdm::symbol_sync::{SymbolSync, SymbolSyncSettings, SyncError};

use crate::dvbt_constellation_demux::DvbtConstellationDemux;
use crate::dvbt_equalizer::DvbtEqualizer;
use crate::dvbt_tps_decoder::DvbtTpsDecoder;
use dvbt_core::dvbt_parameters::DvbtParameters;
use dvbt_core::dvbt_tps_frame::{TpsConstellation, TpsFrame};

/// The result of feeding one OFDM symbol through the receiver.
pub struct SymbolOutput<'a> {
    /// Demultiplexed bits of the symbol, present once the receiver has seen
    /// a clean superframe boundary.
    pub bits: Option<&'a [u8]>,
    /// Transmission parameters, present on the symbol that completes a TPS
    /// frame.
    pub tps: Option<TpsFrame>,
    /// Symbol index within the TPS frame, 0..68.
    pub symbol: usize,
    /// Frame index within the superframe, 0..4.
    pub frame: u8,
}

/// One complete receiver channel from baseband samples to demultiplexed
/// bits. Owns every stage exclusively.
pub struct DvbtReceiver {
    params: DvbtParameters,
    pub sync: SymbolSync,
    pub equalizer: DvbtEqualizer,
    pub tps: DvbtTpsDecoder,
    pub demux: DvbtConstellationDemux,
    fft: Arc<dyn Fft<f64>>,
    time_block: Vec<Complex64>,
    carriers: Vec<Complex64>,
    constellation: TpsConstellation,
    superframe_aligned: bool,
    carrier_listeners: Vec<Box<dyn FnMut(&[Complex64])>>,
    pub total_demux_errors: u64,
}

impl DvbtReceiver {
    pub fn new(params: DvbtParameters, settings: SymbolSyncSettings) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(params.fft_size);
        Self {
            sync: SymbolSync::new(params.fft_size, params.guard_length, settings),
            equalizer: DvbtEqualizer::new(&params),
            tps: DvbtTpsDecoder::new(&params),
            demux: DvbtConstellationDemux::new(&params),
            fft,
            time_block: vec![Complex64::new(0.0, 0.0); params.fft_size],
            carriers: vec![Complex64::new(0.0, 0.0); params.carrier_total],
            constellation: TpsConstellation::Reserved,
            superframe_aligned: false,
            carrier_listeners: Vec::new(),
            total_demux_errors: 0,
            params,
        }
    }

    pub fn parameters(&self) -> &DvbtParameters {
        &self.params
    }

    /// Registers a tap that observes the equalised carriers of every symbol,
    /// for constellation plotting and the like.
    pub fn subscribe_carriers_out(&mut self, callback: impl FnMut(&[Complex64]) + 'static) {
        self.carrier_listeners.push(Box::new(callback));
    }

    /// Receives and processes one OFDM symbol. Returns `Ok(None)` when the
    /// sample stream ends cleanly between symbols.
    pub fn process_symbol(
        &mut self,
        source: &mut dyn SampleSource,
    ) -> Result<Option<SymbolOutput<'_>>, SyncError> {
        if !self.sync.receive_symbol(source, &mut self.time_block)? {
            return Ok(None);
        }
        self.fft.process(&mut self.time_block);
        for carrier in 0..self.params.carrier_total {
            self.carriers[carrier] = self.time_block[self.params.fft_index(carrier)];
        }

        // TPS cells are differentially modulated across symbols, so they are
        // decoded on the raw carriers where an equalizer upset cannot rotate
        // them
        let tps = self.tps.process_symbol(&self.params, &self.carriers);
        self.equalizer.equalize_symbol(&self.params, &mut self.carriers);
        for listener in self.carrier_listeners.iter_mut() {
            listener(&self.carriers);
        }
        let symbol = self.tps.symbol_index();
        let frame = self.tps.frame_index();
        if let Some(event) = &tps {
            self.constellation = event.constellation;
        }

        // Demultiplexing only starts on a clean superframe boundary, once
        // the TPS stream has locked and signalled the constellation
        if !self.superframe_aligned {
            self.superframe_aligned =
                self.tps.is_synchronized() && symbol == 0 && frame == 0;
        }
        let mut bits = None;
        if self.superframe_aligned && self.constellation != TpsConstellation::Reserved {
            match self
                .demux
                .demux_symbol(&self.params, &self.carriers, symbol, self.constellation)
            {
                Ok(()) => bits = Some(self.demux.bits()),
                Err(error) => {
                    self.total_demux_errors += 1;
                    log::error!("demux failed on symbol {symbol}: {error}");
                }
            }
        }

        Ok(Some(SymbolOutput {
            bits,
            tps,
            symbol,
            frame,
        }))
    }
}
