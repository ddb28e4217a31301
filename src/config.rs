//! Receiver configuration and the quantities derived from it.

use crate::constants::*;
use crate::error::LoraError;

/// Which symbol demodulator drives the bit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemodMethod {
    /// Locate the chirp wrap by the first sharp drop of instantaneous
    /// frequency. Faster, and the method the pipeline is tuned for.
    #[default]
    TimeDomain,
    /// Dechirp, FFT, fold the spectrum to the bin count and take the
    /// argmax. Agrees with the time-domain method away from the
    /// wrap-around edge.
    FrequencyDomain,
}

/// Construction parameters for [`crate::Decoder`].
///
/// The thresholds default to the empirically derived values; tests may
/// treat them as tunables.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Input sample rate in Hz.
    pub sample_rate: f32,
    /// Spreading factor, 6..=12. A value of 6 wraps to 12 at
    /// construction (hardware limitation of the captures this receiver
    /// was tuned against).
    pub spreading_factor: u8,
    /// Magnitude above which a sample counts as signal.
    pub energy_threshold: f32,
    /// Sliding up-chirp correlation acceptance level.
    pub detect_threshold: f32,
    /// Down-chirp correlation acceptance level.
    pub sync_threshold: f32,
    /// Instantaneous-frequency drop marking a falling chirp edge.
    pub edge_threshold: f32,
    /// Failed sync correlations tolerated before re-detecting.
    pub max_sync_failures: u32,
    /// Demodulation method.
    pub demod: DemodMethod,
}

impl DecoderConfig {
    pub fn new(sample_rate: f32, spreading_factor: u8) -> Self {
        Self {
            sample_rate,
            spreading_factor,
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            detect_threshold: DEFAULT_DETECT_THRESHOLD,
            sync_threshold: DEFAULT_SYNC_THRESHOLD,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            max_sync_failures: DEFAULT_MAX_SYNC_FAILURES,
            demod: DemodMethod::default(),
        }
    }
}

/// Quantities derived from the configuration, fixed for the lifetime of
/// a decoder.
#[derive(Debug, Clone)]
pub struct Params {
    pub sample_rate: f32,
    pub spreading_factor: u8,
    pub bandwidth: u32,
    pub symbols_per_second: f64,
    /// Symbol length in samples; always a multiple of `bins`.
    pub samples_per_symbol: usize,
    /// Number of frequency bins, `2^sf`.
    pub bins: usize,
    /// Bins available to header symbols, `bins / 4`.
    pub header_bins: usize,
    /// `samples_per_symbol / bins`.
    pub decimation: usize,
    /// Quarter-symbol skip that re-aligns after the sync down-chirps.
    pub delay_after_sync: usize,
}

impl Params {
    pub fn derive(config: &DecoderConfig) -> Result<Self, LoraError> {
        let mut sf = config.spreading_factor;
        if !(6..=12).contains(&sf) {
            return Err(LoraError::InvalidSpreadingFactor(sf));
        }
        if sf == 6 {
            log::warn!("spreading factor 6 wraps around to 12 (hardware incompatibility)");
            sf = 12;
        }

        let symbols_per_second = BANDWIDTH as f64 / (1u32 << sf) as f64;
        let samples_per_symbol = (config.sample_rate as f64 / symbols_per_second) as u32;
        let bins = 1u32 << sf;

        if samples_per_symbol == 0 || samples_per_symbol % bins != 0 {
            return Err(LoraError::InvalidSampleRate {
                sample_rate: config.sample_rate,
                samples_per_symbol,
            });
        }

        Ok(Self {
            sample_rate: config.sample_rate,
            spreading_factor: sf,
            bandwidth: BANDWIDTH,
            symbols_per_second,
            samples_per_symbol: samples_per_symbol as usize,
            bins: bins as usize,
            header_bins: (bins / 4) as usize,
            decimation: (samples_per_symbol / bins) as usize,
            delay_after_sync: (samples_per_symbol / 4) as usize,
        })
    }

    /// Bits carried per deinterleaved word: sf, or sf − 2 for the
    /// reduced-resolution header.
    pub fn ppm(&self, is_header: bool) -> u32 {
        if is_header {
            self.spreading_factor as u32 - 2
        } else {
            self.spreading_factor as u32
        }
    }
}
