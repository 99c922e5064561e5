use crate::sample_source::SampleSource;
use crate::sample_window::SampleWindow;
use itertools::izip;
use num::complex::Complex64;
use std::f64::consts::PI;

/// Joint maximum-likelihood symbol timing and fractional frequency offset
/// estimation, exploiting the cyclic prefix redundancy of each OFDM symbol.
///
/// SOURCE: "ML Estimation of Time and Frequency Offset in OFDM Systems",
///         van de Beek, Sandell, Börjesson (1997).
///
/// The buffer is kept looking like this between calls:
///
/// ```text
/// +-------+-----------------------+-------+----------X
/// | G_n-1 |   S Y M B O L   n+0   | G_n+0 |   S Y M B O L  n+1
/// +-------+-----------------------+-------+----------X
/// ```
///
/// The correlation peak is sharpest when the symbol sits in the middle of the
/// 2N+L block, so after consuming one symbol the unconsumed tail slides back
/// to the buffer head and the nominal peak position is the guard length L.
#[derive(Debug, Clone, Copy)]
pub struct SymbolSyncSettings {
    /// Expected linear signal-to-noise ratio. Sets rho = SNR/(SNR+1), the
    /// weight of the energy term in the timing metric.
    pub snr: f64,
    /// Extra fractional frequency offset added to the estimate, normalised to
    /// the carrier spacing. A calibration artifact of some captures; 0 by
    /// default.
    pub phase_bias: f64,
    /// Half width of the window around the nominal offset L that counts as a
    /// plausible peak while tracking.
    pub track_width: isize,
    /// Peak deviations of at most this many samples are quantised to L while
    /// tracking, to avoid excessive phase jitter.
    pub track_snap: isize,
    /// Update rate of the smoothed confidence score. 1 is the fastest.
    pub confidence_update_beta: f64,
    /// Confidence level above which the estimator switches from acquisition
    /// to tracking.
    pub confidence_threshold: f64,
}

impl Default for SymbolSyncSettings {
    fn default() -> Self {
        Self {
            snr: 100.0,
            phase_bias: 0.0,
            track_width: 15,
            track_snap: 2,
            confidence_update_beta: 0.25,
            confidence_threshold: 0.9,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The sample stream ended while a receive window was partially filled.
    /// Both counts are fresh samples for the current window, not the total
    /// buffer capacity: 2N+L on the first window, N once in steady state.
    #[error("sample stream ended mid-symbol ({got} of {needed} fresh samples)")]
    ShortRead { needed: usize, got: usize },
    #[error("sample source failed: {0}")]
    Source(#[from] std::io::Error),
}

pub struct SymbolSync {
    fft_size: usize,
    guard_len: usize,
    pub settings: SymbolSyncSettings,
    window: SampleWindow<Complex64>,
    /// NCO phase of the frequency corrector. Never reset between symbols so
    /// the correction stays continuous across the whole stream.
    phase: f64,
    /// Smoothed confidence that the peak sits at the nominal offset, in [0,1].
    pub confidence: f64,
    /// Window offset selected for the last symbol, relative to the buffer
    /// head and normalised into [-L, N-L).
    pub last_offset: isize,
    /// Fractional frequency offset estimated for the last symbol.
    pub last_epsilon: f64,
    pub total_symbols: u64,
    /// Number of symbols accepted with a peak far from the nominal offset.
    pub total_nervous: u64,
}

impl SymbolSync {
    pub fn new(fft_size: usize, guard_len: usize, settings: SymbolSyncSettings) -> Self {
        assert!(guard_len > 0, "Guard interval cannot be empty");
        assert!(
            2 * guard_len <= fft_size,
            "Guard length {} is too long for FFT size {}",
            guard_len,
            fft_size
        );
        Self {
            fft_size,
            guard_len,
            settings,
            window: SampleWindow::new(2 * fft_size + guard_len),
            phase: 0.0,
            confidence: 0.0,
            last_offset: 0,
            last_epsilon: 0.0,
            total_symbols: 0,
            total_nervous: 0,
        }
    }

    /// Produces one time-aligned, frequency-corrected block of N samples.
    ///
    /// Returns `Ok(false)` when the stream ends cleanly before any fresh
    /// sample arrives for this window. A stream that ends after delivering
    /// part of the window is reported as a `ShortRead`.
    pub fn receive_symbol(
        &mut self,
        source: &mut dyn SampleSource,
        out: &mut [Complex64],
    ) -> Result<bool, SyncError> {
        let n = self.fft_size;
        let l = self.guard_len;
        assert!(
            out.len() == n,
            "Output block must hold {} samples but holds {}",
            n,
            out.len()
        );

        let mut fresh = 0;
        while !self.window.is_full() {
            let total_read = source.read_samples(self.window.vacant_mut())?;
            if total_read == 0 {
                break;
            }
            self.window.commit(total_read);
            fresh += total_read;
        }
        if !self.window.is_full() {
            if fresh == 0 {
                return Ok(false);
            }
            return Err(SyncError::ShortRead {
                needed: self.window.capacity() - self.window.length() + fresh,
                got: fresh,
            });
        }

        let buffer = self.window.filled();
        let rho = self.settings.snr / (self.settings.snr + 1.0);

        // Prime the running sums over the first window position.
        let mut gamma = Complex64::new(0.0, 0.0);
        let mut energy = 0.0;
        for (head, tail) in izip!(&buffer[..l], &buffer[n..n + l]) {
            gamma += head * tail.conj();
            energy += 0.5 * (head.norm_sqr() + tail.norm_sqr());
        }

        // argmax over m in [0, N+L) of |gamma(m)| - rho*Phi(m), updated in
        // O(1) per position. The shift-in term is skipped once it would run
        // past the buffer tail, leaving the last few windows with a
        // truncated correlation rather than reading out of bounds.
        let mut best_score = f64::NEG_INFINITY;
        let mut best_gamma = Complex64::new(1.0, 0.0);
        let mut argmax = 0usize;
        for m in 0..(n + l) {
            let score = gamma.norm() - rho * energy;
            if score > best_score {
                best_score = score;
                best_gamma = gamma;
                argmax = m;
            }
            gamma -= buffer[m] * buffer[m + n].conj();
            energy -= 0.5 * (buffer[m].norm_sqr() + buffer[m + n].norm_sqr());
            if m + l + n < buffer.len() {
                gamma += buffer[m + l] * buffer[m + l + n].conj();
                energy += 0.5 * (buffer[m + l].norm_sqr() + buffer[m + l + n].norm_sqr());
            }
        }

        let mut offset = argmax as isize;
        let nominal = l as isize;
        let deviation = offset - nominal;
        let plausible = deviation.abs() <= self.settings.track_width;
        let beta = self.settings.confidence_update_beta;
        self.confidence = beta * if plausible { 1.0 } else { 0.0 } + (1.0 - beta) * self.confidence;

        if self.confidence >= self.settings.confidence_threshold {
            // Tracking: quantise small deviations away and never follow the
            // peak outside the plausible window.
            offset = if deviation.abs() <= self.settings.track_snap {
                nominal
            } else {
                offset.clamp(nominal - self.settings.track_width, nominal + self.settings.track_width)
            };
        } else {
            // Acquisition: accept the raw peak, normalised into [-L, N-L).
            if offset > (n - l) as isize {
                offset -= n as isize;
            }
            log::warn!(
                "symbol sync is feeling a little nervous about offset {} (confidence {:.2})",
                offset,
                self.confidence
            );
            self.total_nervous += 1;
        }

        let epsilon = -best_gamma.arg() / (2.0 * PI);
        self.last_offset = offset;
        self.last_epsilon = epsilon;

        let rate = 2.0 * PI * (epsilon + self.settings.phase_bias) / n as f64;
        let start = (nominal + offset) as usize;
        for (sample, corrected) in izip!(&buffer[start..start + n], out.iter_mut()) {
            self.phase = (self.phase + rate) % (2.0 * PI);
            *corrected = sample * Complex64::from_polar(1.0, self.phase);
        }

        // Keep everything from the consumed symbol's guard onward for the
        // next call.
        let keep_from = (offset + n as isize) as usize;
        self.window.slide_to(keep_from);
        self.total_symbols += 1;
        Ok(true)
    }
}
