//! Receiver tunables with their empirically derived defaults.

// ── Modulation ──

/// LoRa channel bandwidth in Hz. Fixed; other bandwidths are untested.
pub const BANDWIDTH: u32 = 125_000;

/// Coding rate used for the frame header (Hamming(8,4)).
pub const HEADER_CODING_RATE: u8 = 4;

// ── Detection thresholds ──

/// Sample magnitude above which the fast preamble scan considers the
/// channel occupied.
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.01;

/// Upper clamp for `set_abs_threshold`.
pub const MAX_ENERGY_THRESHOLD: f32 = 20.0;

/// Minimum sliding up-chirp correlation that confirms a preamble.
pub const DEFAULT_DETECT_THRESHOLD: f32 = 0.9;

/// Minimum down-chirp correlation that confirms the frame sync word.
pub const DEFAULT_SYNC_THRESHOLD: f32 = 0.99;

/// Instantaneous-frequency drop (radians per sample) that marks a
/// falling chirp edge, for both the correlator and the time-domain
/// demodulator.
pub const DEFAULT_EDGE_THRESHOLD: f32 = 0.2;

/// Consecutive failed sync correlations before giving up and returning
/// to preamble detection.
pub const DEFAULT_MAX_SYNC_FAILURES: u32 = 32;

// ── Preamble scan ──

/// Correlation decimation factor; the fast preamble scan strides
/// `samples_per_symbol / (4 * CORR_DECIM_FACTOR)` samples.
pub const CORR_DECIM_FACTOR: u32 = 8;

// ── Front-end decimation filter ──

/// Root-raised-cosine filter delay in symbols.
pub const RRC_DELAY: usize = 2;

/// Root-raised-cosine rolloff factor.
pub const RRC_ROLLOFF: f32 = 0.3;

/// Fractional sample offset of the filter design.
pub const RRC_SAMPLE_OFFSET: f32 = 0.5;
