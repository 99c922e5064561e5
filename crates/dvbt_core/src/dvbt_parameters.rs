use crate::dvbt_pilot_prbs::get_dvbt_pilot_prbs;
use crate::dvbt_tps_frame::TpsGuardInterval;

/// Transmission modes defined by the standard. Only the 2K mode carries
/// carrier tables here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvbtTransmissionMode {
    Mode2k,
    Mode8k,
}

// DOC: ETSI EN 300 744, table 7. Continual pilot carrier indices for 2K mode.
const CONTINUAL_PILOT_CARRIERS_2K: [usize; 45] = [
    0, 48, 54, 87, 141, 156, 192, 201, 255, 279, 282, 333, 432, 450, 483, 525, 531, 618, 636, 714,
    759, 765, 780, 804, 873, 888, 918, 939, 942, 969, 984, 1050, 1101, 1107, 1110, 1137, 1140,
    1146, 1206, 1269, 1323, 1377, 1491, 1683, 1704,
];

// DOC: ETSI EN 300 744, table 8. TPS carrier indices for 2K mode.
const TPS_CARRIERS_2K: [usize; 17] = [
    34, 50, 209, 346, 413, 569, 595, 688, 790, 901, 1073, 1219, 1262, 1286, 1469, 1594, 1687,
];

/// Derived constants for one transmission mode and guard interval.
#[derive(Debug, Clone)]
pub struct DvbtParameters {
    pub fft_size: usize,
    pub guard_length: usize,
    /// Signed carrier index of the lowest active carrier relative to DC.
    pub carrier_offset: i32,
    /// Total number of active carriers, k = 0..=carrier_total-1.
    pub carrier_total: usize,
    /// Number of data cells carried by every symbol.
    pub data_carriers: usize,
    pub continual_pilots: &'static [usize],
    pub tps_carriers: &'static [usize],
    /// One reference sequence bit per active carrier, w_0..w_{kmax}.
    pub pilot_prbs: Vec<bool>,
}

impl DvbtParameters {
    /// Maps an active carrier index to its FFT output bin. Negative
    /// frequencies wrap to the top half of the spectrum.
    pub fn fft_index(&self, carrier: usize) -> usize {
        let shifted = carrier as i32 + self.carrier_offset;
        if shifted < 0 {
            (shifted + self.fft_size as i32) as usize
        } else {
            shifted as usize
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParametersError {
    #[error("no carrier tables for the {0:?} transmission mode")]
    UnsupportedMode(DvbtTransmissionMode),
}

pub fn get_dvbt_parameters(
    mode: DvbtTransmissionMode,
    guard: TpsGuardInterval,
) -> Result<DvbtParameters, ParametersError> {
    if mode != DvbtTransmissionMode::Mode2k {
        return Err(ParametersError::UnsupportedMode(mode));
    }
    let fft_size = 2048;
    let carrier_total = 1705;
    Ok(DvbtParameters {
        fft_size,
        guard_length: fft_size / guard.divisor(),
        carrier_offset: -((carrier_total as i32 - 1) / 2),
        carrier_total,
        data_carriers: 1512,
        continual_pilots: &CONTINUAL_PILOT_CARRIERS_2K,
        tps_carriers: &TPS_CARRIERS_2K,
        pilot_prbs: get_dvbt_pilot_prbs(carrier_total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_index_wraps_negative_carriers() {
        let params = get_dvbt_parameters(DvbtTransmissionMode::Mode2k, TpsGuardInterval::Guard1_32).unwrap();
        assert_eq!(params.fft_index(0), 2048 - 852);
        assert_eq!(params.fft_index(851), 2047);
        assert_eq!(params.fft_index(852), 0);
        assert_eq!(params.fft_index(1704), 852);
    }

    #[test]
    fn guard_length_follows_divisor() {
        let params = get_dvbt_parameters(DvbtTransmissionMode::Mode2k, TpsGuardInterval::Guard1_4).unwrap();
        assert_eq!(params.guard_length, 512);
    }

    #[test]
    fn carrier_tables_are_inside_the_active_band() {
        let params = get_dvbt_parameters(DvbtTransmissionMode::Mode2k, TpsGuardInterval::Guard1_32).unwrap();
        assert!(params.continual_pilots.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*params.continual_pilots.first().unwrap(), 0);
        assert_eq!(*params.continual_pilots.last().unwrap(), 1704);
        assert!(params.tps_carriers.iter().all(|&c| c < 1705));
        assert_eq!(params.pilot_prbs.len(), 1705);
    }

    #[test]
    fn eight_k_mode_is_rejected() {
        let result = get_dvbt_parameters(DvbtTransmissionMode::Mode8k, TpsGuardInterval::Guard1_32);
        assert!(matches!(
            result,
            Err(ParametersError::UnsupportedMode(DvbtTransmissionMode::Mode8k))
        ));
    }

    #[test]
    fn every_scattered_phase_leaves_1512_data_carriers() {
        let params = get_dvbt_parameters(DvbtTransmissionMode::Mode2k, TpsGuardInterval::Guard1_32).unwrap();
        for phase in 0..4usize {
            let mut data = 0usize;
            for carrier in 0..params.carrier_total {
                if params.continual_pilots.binary_search(&carrier).is_ok() {
                    continue;
                }
                if params.tps_carriers.binary_search(&carrier).is_ok() {
                    continue;
                }
                if (carrier + 12 - 3 * phase) % 12 == 0 {
                    continue;
                }
                data += 1;
            }
            assert_eq!(data, params.data_carriers);
        }
    }
}
