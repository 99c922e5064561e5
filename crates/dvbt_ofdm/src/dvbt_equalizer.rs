use std::f64::consts::PI;

use itertools::Itertools;
use num::complex::Complex64;

use dvbt_core::dvbt_parameters::DvbtParameters;

/// Channel equaliser driven by the continual pilot carriers.
///
/// Pilots are sent at boosted power with a phase of 0 or pi chosen by the
/// reference sequence. The phase and amplitude measured at each pilot are
/// interpolated linearly across the data carriers in between, then every
/// carrier is corrected by the interpolated channel estimate. No state is
/// kept between symbols, each symbol is equalised from its own pilots.
pub struct DvbtEqualizer {
    pilot_phase: Vec<f64>,
    pilot_amplitude: Vec<f64>,
}

impl DvbtEqualizer {
    pub fn new(params: &DvbtParameters) -> Self {
        Self {
            pilot_phase: vec![0.0; params.continual_pilots.len()],
            pilot_amplitude: vec![0.0; params.continual_pilots.len()],
        }
    }

    /// Equalises one symbol of active carriers in place. The slice is indexed
    /// by carrier number, not FFT bin.
    pub fn equalize_symbol(&mut self, params: &DvbtParameters, carriers: &mut [Complex64]) {
        assert!(carriers.len() == params.carrier_total);
        for (i, &pilot) in params.continual_pilots.iter().enumerate() {
            let cell = carriers[pilot];
            let mut phase = -cell.arg();
            // The reference sequence flips the pilot by pi when w_k = 1
            if params.pilot_prbs[pilot] {
                phase += PI;
                if phase > PI {
                    phase -= 2.0 * PI;
                }
            }
            self.pilot_phase[i] = phase;
            // Pilots are boosted to 4/3 of the nominal cell power
            self.pilot_amplitude[i] = cell.norm() * 0.75;
        }

        for ((i0, &k0), (i1, &k1)) in params.continual_pilots.iter().enumerate().tuple_windows() {
            let phase0 = self.pilot_phase[i0];
            let mut phase1 = self.pilot_phase[i1];
            // Unwrap the pair so interpolation takes the short way around
            if (phase1 - phase0) > PI {
                phase1 -= 2.0 * PI;
            } else if (phase0 - phase1) > PI {
                phase1 += 2.0 * PI;
            }
            let amplitude0 = self.pilot_amplitude[i0];
            let amplitude1 = self.pilot_amplitude[i1];
            let span = (k1 - k0) as f64;
            // Half open range so the shared pilot isn't corrected twice
            for k in k0..k1 {
                let t = (k - k0) as f64 / span;
                let phase = phase0 + (phase1 - phase0) * t;
                let amplitude = amplitude0 + (amplitude1 - amplitude0) * t;
                if amplitude > 0.0 {
                    carriers[k] = carriers[k] * Complex64::from_polar(1.0 / amplitude, phase);
                }
            }
        }

        if let (Some(&last), Some(&phase), Some(&amplitude)) = (
            params.continual_pilots.last(),
            self.pilot_phase.last(),
            self.pilot_amplitude.last(),
        ) {
            if amplitude > 0.0 {
                carriers[last] = carriers[last] * Complex64::from_polar(1.0 / amplitude, phase);
            }
        }
    }
}
