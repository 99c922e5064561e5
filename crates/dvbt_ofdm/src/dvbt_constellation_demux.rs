use num::complex::Complex64;
use thiserror::Error;

use crate::dvbt_symbol_interleaver::get_dvbt_symbol_interleaver_map;
use dvbt_core::bit_sink::BitSink;
use dvbt_core::dvbt_parameters::DvbtParameters;
use dvbt_core::dvbt_tps_frame::TpsConstellation;

#[derive(Debug, Error)]
pub enum DemuxError {
    #[error("cannot demap {0}")]
    UnsupportedConstellation(TpsConstellation),
}

// DOC: ETSI EN 300 744
// Referring to clause 4.3.4.1 - Bit interleaver offsets per bit stream
const BIT_INTERLEAVER_OFFSETS: [usize; 6] = [0, 63, 105, 42, 21, 84];
// Order in which the interleaved bit streams are read back out per cell
const QAM16_EMISSION_ORDER: [usize; 4] = [0, 2, 1, 3];

/// Demaps equalised data cells and undoes the two interleaving stages,
/// producing the packed bit stream of one symbol.
pub struct DvbtConstellationDemux {
    permutation: Vec<usize>,
    cells: Vec<u8>,
    deinterleaved_cells: Vec<u8>,
    bits: BitSink,
    pub total_odd_pilots: u64,
    pub total_cell_mismatches: u64,
}

impl DvbtConstellationDemux {
    pub fn new(params: &DvbtParameters) -> Self {
        let mut permutation = vec![0usize; params.data_carriers];
        get_dvbt_symbol_interleaver_map(&mut permutation, params.fft_size);
        Self {
            permutation,
            cells: Vec::with_capacity(params.data_carriers),
            deinterleaved_cells: vec![0u8; params.data_carriers],
            bits: BitSink::new(),
            total_odd_pilots: 0,
            total_cell_mismatches: 0,
        }
    }

    /// Packed bits of the most recently demultiplexed symbol, MSB first.
    pub fn bits(&self) -> &[u8] {
        self.bits.as_bytes()
    }

    pub fn bit_length(&self) -> usize {
        self.bits.bit_length()
    }

    /// Demaps one symbol of equalised active carriers, indexed by carrier
    /// number, into `bits()`. `symbol` is the index within the TPS frame.
    pub fn demux_symbol(
        &mut self,
        params: &DvbtParameters,
        carriers: &[Complex64],
        symbol: usize,
        constellation: TpsConstellation,
    ) -> Result<(), DemuxError> {
        if constellation != TpsConstellation::Qam16 {
            return Err(DemuxError::UnsupportedConstellation(constellation));
        }

        let mut pilot_index = 0usize;
        let mut tps_index = 0usize;
        let mut odd_pilots = 0usize;
        self.cells.clear();

        for carrier in 0..params.carrier_total {
            let cell = carriers[carrier];
            let (re, im) = (cell.re, cell.im);
            let prbs = params.pilot_prbs[carrier] as u8 as f64;

            if params.continual_pilots.get(pilot_index) == Some(&carrier) {
                pilot_index += 1;
                if im.abs() > 0.3 || re * 2.0 * (0.5 - prbs) < 1.0 {
                    log::debug!("continual pilot {carrier} seems odd (re {re}, im {im})");
                    odd_pilots += 1;
                }
                continue;
            }

            if params.tps_carriers.get(tps_index) == Some(&carrier) {
                tps_index += 1;
                if im.abs() > 0.3 || re.abs() < 0.7 {
                    log::debug!("TPS carrier {carrier} seems odd (re {re}, im {im})");
                    odd_pilots += 1;
                }
                continue;
            }

            if (carrier + 12 - 3 * (symbol % 4)) % 12 == 0 {
                if im.abs() > 0.3 || re * 2.0 * (0.5 - prbs) < 1.0 {
                    log::debug!("scattered pilot {carrier} seems odd (re {re}, im {im})");
                    odd_pilots += 1;
                }
                continue;
            }

            self.cells.push(demap_qam16(re, im));
        }

        if odd_pilots > 10 {
            self.total_odd_pilots += odd_pilots as u64;
            log::warn!("symbol {symbol} had {odd_pilots} pilots that seemed suspicious");
        }
        if pilot_index != params.continual_pilots.len() {
            log::error!("missed a continual pilot carrier");
        }
        if tps_index != params.tps_carriers.len() {
            log::error!("missed a TPS carrier");
        }
        if self.cells.len() != params.data_carriers {
            self.total_cell_mismatches += 1;
            log::error!(
                "unpacked {} cells in symbol {symbol}, expected {}",
                self.cells.len(),
                params.data_carriers
            );
            self.cells.resize(params.data_carriers, 0);
        }

        // DOC: ETSI EN 300 744
        // Referring to clause 4.3.4.2 - Symbol interleaver
        // The permutation direction alternates with symbol parity
        for index in 0..params.data_carriers {
            if symbol % 2 == 0 {
                self.deinterleaved_cells[index] = self.cells[self.permutation[index]];
            } else {
                self.deinterleaved_cells[self.permutation[index]] = self.cells[index];
            }
        }

        self.bits.clear();
        for cell in 0..params.data_carriers {
            for &stream in QAM16_EMISSION_ORDER.iter() {
                self.bits
                    .push(interleaved_bit(&self.deinterleaved_cells, stream, cell));
            }
        }
        Ok(())
    }
}

/// Reads bit stream `stream` at position `w`, undoing the cyclic rotation the
/// bit interleaver applies inside each 126-cell block.
fn interleaved_bit(cells: &[u8], stream: usize, w: usize) -> u8 {
    let offset = BIT_INTERLEAVER_OFFSETS[stream];
    let source = (w + 126 - offset) % 126 + (w / 126) * 126;
    (cells[source] >> (3 - stream)) & 1
}

/// Gray demapping with decision levels between the nominal points at
/// 1.0, 0.33, -0.33 and -1.0 per axis.
fn demap_qam16(re: f64, im: f64) -> u8 {
    let quantize = |value: f64| -> u8 {
        if value > 0.66 {
            0b00
        } else if value > 0.0 {
            0b01
        } else if value > -0.66 {
            0b11
        } else {
            0b10
        }
    };
    let ire = quantize(re);
    let iim = quantize(im);
    (ire & 0b10) << 2 | (ire & 0b01) << 1 | (iim & 0b10) << 1 | (iim & 0b01)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvbt_core::dvbt_parameters::{get_dvbt_parameters, DvbtTransmissionMode};
    use dvbt_core::dvbt_tps_frame::TpsGuardInterval;

    fn reference_symbol(params: &DvbtParameters, symbol: usize) -> Vec<Complex64> {
        // Pilots at their boosted reference value, TPS carriers at nominal
        // amplitude, every data cell at the point demapping to 0b1111
        let mut carriers = vec![Complex64::new(-0.333, -0.333); params.carrier_total];
        for carrier in 0..params.carrier_total {
            let w = params.pilot_prbs[carrier] as u8 as f64;
            let reference = Complex64::new(4.0 / 3.0 * (1.0 - 2.0 * w), 0.0);
            if params.continual_pilots.binary_search(&carrier).is_ok() {
                carriers[carrier] = reference;
            } else if params.tps_carriers.binary_search(&carrier).is_ok() {
                carriers[carrier] = Complex64::new(1.0, 0.0);
            } else if (carrier + 12 - 3 * (symbol % 4)) % 12 == 0 {
                carriers[carrier] = reference;
            }
        }
        carriers
    }

    #[test]
    fn uniform_cells_demux_to_all_ones() {
        let params = get_dvbt_parameters(DvbtTransmissionMode::Mode2k, TpsGuardInterval::Guard1_32).unwrap();
        let mut demux = DvbtConstellationDemux::new(&params);
        for symbol in 0..4usize {
            let carriers = reference_symbol(&params, symbol);
            demux
                .demux_symbol(&params, &carriers, symbol, TpsConstellation::Qam16)
                .unwrap();
            assert_eq!(demux.bit_length(), params.data_carriers * 4);
            assert!(demux.bits().iter().all(|&byte| byte == 0xFF));
            assert_eq!(demux.total_cell_mismatches, 0);
        }
        assert_eq!(demux.total_odd_pilots, 0);
    }

    #[test]
    fn rejects_constellations_it_cannot_demap() {
        let params = get_dvbt_parameters(DvbtTransmissionMode::Mode2k, TpsGuardInterval::Guard1_32).unwrap();
        let mut demux = DvbtConstellationDemux::new(&params);
        let carriers = reference_symbol(&params, 0);
        let result = demux.demux_symbol(&params, &carriers, 0, TpsConstellation::Qam64);
        assert!(matches!(
            result,
            Err(DemuxError::UnsupportedConstellation(TpsConstellation::Qam64))
        ));
    }

    #[test]
    fn gray_demap_covers_every_decision_region() {
        let levels = [(1.0, 0b00u8), (0.333, 0b01), (-0.333, 0b11), (-1.0, 0b10)];
        for &(re, ire) in &levels {
            for &(im, iim) in &levels {
                let expected =
                    (ire & 0b10) << 2 | (ire & 0b01) << 1 | (iim & 0b10) << 1 | (iim & 0b01);
                assert_eq!(demap_qam16(re, im), expected, "re {re} im {im}");
            }
        }
    }
}
