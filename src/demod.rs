//! Symbol demodulation and the preamble/sync correlators.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::chirp::Chirps;
use crate::config::{DemodMethod, Params};
use crate::constants::CORR_DECIM_FACTOR;
use crate::dsp::{instantaneous_frequency, normalized_correlation};

/// Converts one symbol window of samples into a raw bin index.
pub struct Demodulator {
    fft: Arc<dyn Fft<f32>>,
    dechirped: Vec<Complex<f32>>,
    folded: Vec<Complex<f32>>,
    ifreq: Vec<f32>,
    method: DemodMethod,
    edge_threshold: f32,
}

impl Demodulator {
    pub fn new(params: &Params, method: DemodMethod, edge_threshold: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(params.samples_per_symbol);
        Self {
            fft,
            dechirped: Vec::with_capacity(params.samples_per_symbol),
            folded: Vec::with_capacity(params.bins),
            ifreq: vec![0.0; params.samples_per_symbol],
            method,
            edge_threshold,
        }
    }

    /// Raw bin index of one symbol window.
    ///
    /// The time-domain result lives in [1, bins]: the wrap-around chirp
    /// reports the bin count itself, one past the natural range, and the
    /// near-zero chirp reports 1. Header symbols skip the +1 adjustment;
    /// the caller divides by 4 for their reduced resolution.
    pub fn bin_index(
        &mut self,
        params: &Params,
        chirps: &Chirps,
        samples: &[Complex<f32>],
        is_header: bool,
    ) -> usize {
        match self.method {
            DemodMethod::TimeDomain => self.gradient_bin(params, samples, is_header),
            DemodMethod::FrequencyDomain => self.fft_bin(params, chirps, samples),
        }
    }

    /// Locate the first sharp falling edge of the instantaneous
    /// frequency on the decimation grid.
    fn gradient_bin(&mut self, params: &Params, samples: &[Complex<f32>], is_header: bool) -> usize {
        let n = params.samples_per_symbol;
        let decim = params.decimation;
        instantaneous_frequency(&samples[..n], &mut self.ifreq);

        for i in 1..params.bins - 2 {
            if self.ifreq[decim * i] - self.ifreq[decim * (i + 1)] > self.edge_threshold {
                return i + usize::from(!is_header);
            }
        }

        // No edge inside the scan: the wrap sits either at the very start
        // (near-zero bin) or past the end of the grid (wrap-around bin).
        let zero_bin = self.ifreq[0] - self.ifreq[decim * 2];
        let high_bin = self.ifreq[(params.bins - 2) * decim] - self.ifreq[params.bins * decim - 1];

        if zero_bin > self.edge_threshold || zero_bin > high_bin {
            1
        } else {
            params.bins
        }
    }

    /// Dechirp, FFT, fold the spectrum to the bin count and return the
    /// argmax.
    fn fft_bin(&mut self, params: &Params, chirps: &Chirps, samples: &[Complex<f32>]) -> usize {
        let n = params.samples_per_symbol;
        let bins = params.bins;

        self.dechirped.clear();
        self.dechirped.extend(
            samples[..n]
                .iter()
                .zip(chirps.downchirp.iter())
                .map(|(&s, &d)| (s * d).conj()),
        );

        self.fft.process(&mut self.dechirped);

        // Fold: the bottom half of the target bins comes straight from
        // the spectrum head, the top half from its tail, with the
        // Nyquist bin summing both aliases.
        self.folded.clear();
        self.folded.extend_from_slice(&self.dechirped[..bins.div_ceil(2)]);
        self.folded.extend_from_slice(&self.dechirped[n - bins / 2..]);
        self.folded[bins / 2] += self.dechirped[bins / 2];

        let mut best = 0usize;
        let mut best_mag = 0.0f32;
        for (i, c) in self.folded.iter().enumerate() {
            let mag = c.norm();
            if mag > best_mag {
                best_mag = mag;
                best = i;
            }
        }
        best
    }
}

/// Fast preamble scan: stride the input on a coarse grid and look for a
/// magnitude above the energy threshold that forms a strict local
/// minimum followed by a strict rise.
pub fn find_preamble_start(
    params: &Params,
    samples: &[Complex<f32>],
    energy_threshold: f32,
) -> Option<usize> {
    let grid = (CORR_DECIM_FACTOR * 4) as usize;
    let step = params.samples_per_symbol / grid;

    for i in 1..grid - 1 {
        let cur = samples[i * step].norm();
        if cur > energy_threshold
            && samples[(i - 1) * step].norm() < cur
            && samples[(i + 1) * step].norm() > cur
        {
            return Some(i * step);
        }
    }
    None
}

/// Correlate one symbol window against the reference down-chirp.
pub fn detect_downchirp(params: &Params, chirps: &Chirps, window: &[Complex<f32>]) -> f32 {
    let n = params.samples_per_symbol;
    let mut ifreq = vec![0.0f32; n];
    instantaneous_frequency(&window[..n], &mut ifreq);
    normalized_correlation(&ifreq[..n - 1], &chirps.downchirp_ifreq[..n - 1])
}

/// Slide a one-symbol window over two symbols of candidate input and
/// return the best up-chirp correlation with its offset.
///
/// The search skips ahead to the first falling edge (a symbol boundary),
/// brackets it between the local instantaneous-frequency extrema and
/// correlates only inside that bracket.
pub fn detect_upchirp(
    params: &Params,
    chirps: &Chirps,
    window: &[Complex<f32>],
    edge_threshold: f32,
) -> (f32, usize) {
    let mut ifreq = vec![0.0f32; window.len()];
    instantaneous_frequency(window, &mut ifreq);

    let len = ifreq.len();
    let sf = params.spreading_factor as usize;
    let coeff = sf + sf + sf / 2;
    let corr_len = params.samples_per_symbol - 1;

    let mut edge = None;
    let mut i = 0;
    while i + coeff + 1 < len {
        if ifreq[i] - ifreq[i + coeff] > edge_threshold {
            edge = Some(i);
            break;
        }
        i += coeff / 2;
    }
    let Some(edge) = edge else {
        return (0.0, 0);
    };

    // Top and bottom of the falling edge
    let lo = edge.saturating_sub(2 * coeff);
    let hi = (edge + coeff).min(len);
    let local_max = lo + argmax(&ifreq[lo..hi]);
    let lo = (local_max + 1).min(len);
    let hi = (local_max + 3 * coeff).min(len);
    if lo >= hi {
        return (0.0, 0);
    }
    let local_min = lo + argmin(&ifreq[lo..hi]);

    let mut best = 0.0f32;
    let mut best_idx = 0usize;
    for i in local_max..local_min {
        if i + corr_len >= len {
            break;
        }
        let corr = normalized_correlation(&ifreq[i..i + corr_len], &chirps.upchirp_ifreq[..corr_len]);
        if corr > best {
            best = corr;
            best_idx = i;
        }
    }
    (best, best_idx)
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

fn argmin(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecoderConfig;
    use crate::constants::{DEFAULT_EDGE_THRESHOLD, DEFAULT_ENERGY_THRESHOLD};

    fn setup(method: DemodMethod) -> (Params, Chirps, Demodulator) {
        let params = Params::derive(&DecoderConfig::new(1e6, 7)).unwrap();
        let chirps = Chirps::new(&params);
        let demod = Demodulator::new(&params, method, DEFAULT_EDGE_THRESHOLD);
        (params, chirps, demod)
    }

    /// Up-chirp cyclically rotated by `shift` bins plus a quarter bin, the
    /// timing a real transmitter's symbol boundary lands on after sync.
    fn shifted_symbol(params: &Params, chirps: &Chirps, shift: usize) -> Vec<Complex<f32>> {
        let roll = (shift * params.decimation + params.decimation / 4) % params.samples_per_symbol;
        let mut symbol = chirps.upchirp[roll..].to_vec();
        symbol.extend_from_slice(&chirps.upchirp[..roll]);
        symbol
    }

    #[test]
    fn gradient_locates_payload_bins() {
        let (params, chirps, mut demod) = setup(DemodMethod::TimeDomain);
        for (shift, expected) in [(0, 128), (1, 128), (2, 126), (5, 123), (64, 64), (126, 2), (127, 1)]
        {
            let symbol = shifted_symbol(&params, &chirps, shift);
            assert_eq!(
                demod.bin_index(&params, &chirps, &symbol, false),
                expected,
                "shift {}",
                shift
            );
        }
    }

    #[test]
    fn gradient_sweeps_every_bin() {
        let (params, chirps, mut demod) = setup(DemodMethod::TimeDomain);
        for shift in 2..params.bins {
            let symbol = shifted_symbol(&params, &chirps, shift);
            assert_eq!(
                demod.bin_index(&params, &chirps, &symbol, false),
                params.bins - shift,
                "shift {}",
                shift
            );
        }
    }

    #[test]
    fn header_bins_skip_the_adjustment() {
        let (params, chirps, mut demod) = setup(DemodMethod::TimeDomain);
        for shift in [5usize, 21, 105] {
            let symbol = shifted_symbol(&params, &chirps, shift);
            assert_eq!(
                demod.bin_index(&params, &chirps, &symbol, true),
                params.bins - shift - 1,
                "shift {}",
                shift
            );
        }
    }

    #[test]
    fn fft_agrees_away_from_the_wrap_edge() {
        let (params, chirps, mut demod) = setup(DemodMethod::FrequencyDomain);
        for (shift, expected) in [(0, 0), (1, 127), (2, 126), (5, 123), (64, 64), (127, 1)] {
            let symbol = shifted_symbol(&params, &chirps, shift);
            assert_eq!(
                demod.bin_index(&params, &chirps, &symbol, false),
                expected,
                "shift {}",
                shift
            );
        }
    }

    #[test]
    fn downchirp_correlates_against_itself() {
        let (params, chirps, _) = setup(DemodMethod::TimeDomain);
        let corr = detect_downchirp(&params, &chirps, &chirps.downchirp);
        assert!(corr > 0.99, "got {}", corr);
        // An up-chirp anticorrelates and must not pass the sync gate.
        let corr = detect_downchirp(&params, &chirps, &chirps.upchirp);
        assert!(corr < -0.9, "got {}", corr);
    }

    #[test]
    fn upchirp_found_across_a_symbol_boundary() {
        let (params, chirps, _) = setup(DemodMethod::TimeDomain);
        let n = params.samples_per_symbol;

        // Ramped first up-chirp, clean second one, then the sync chirp:
        // the envelope a receiver sees at the start of a preamble.
        let mut signal: Vec<Complex<f32>> = chirps
            .upchirp
            .iter()
            .enumerate()
            .map(|(i, &s)| s * (i as f32 / n as f32))
            .collect();
        signal.extend_from_slice(&chirps.upchirp);
        signal.extend_from_slice(&chirps.downchirp);

        let start = 32;
        let (corr, index) = detect_upchirp(
            &params,
            &chirps,
            &signal[start..start + 2 * n],
            DEFAULT_EDGE_THRESHOLD,
        );
        assert!(corr > 0.9, "correlation {}", corr);
        let aligned = start + index;
        assert!(
            (n as i64 - aligned as i64).abs() <= 2,
            "aligned at {} instead of {}",
            aligned,
            n
        );
    }

    #[test]
    fn no_upchirp_in_noise_free_silence() {
        let (params, chirps, _) = setup(DemodMethod::TimeDomain);
        let silence = vec![Complex::new(0.0f32, 0.0); 2 * params.samples_per_symbol];
        let (corr, _) = detect_upchirp(&params, &chirps, &silence, DEFAULT_EDGE_THRESHOLD);
        assert!(corr < 0.9);
    }

    #[test]
    fn preamble_scan_needs_a_rising_envelope() {
        let (params, chirps, _) = setup(DemodMethod::TimeDomain);
        let n = params.samples_per_symbol;

        let mut signal = vec![Complex::new(0.0f32, 0.0); 2 * n];
        for (i, &s) in chirps.upchirp.iter().enumerate() {
            signal.push(s * (i as f32 / n as f32));
        }
        signal.extend_from_slice(&chirps.upchirp);

        // All-silence window: nothing to find.
        assert_eq!(find_preamble_start(&params, &signal[..2 * n], DEFAULT_ENERGY_THRESHOLD), None);
        // Window starting at the ramp: found on the coarse grid.
        let found = find_preamble_start(&params, &signal[2 * n..], DEFAULT_ENERGY_THRESHOLD);
        assert_eq!(found, Some(params.samples_per_symbol / 32));
    }
}
