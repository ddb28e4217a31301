//! Software receiver for the LoRa chirp-spread-spectrum physical layer.
//!
//! Feed it complex baseband samples from an SDR front end; it detects
//! preambles, locks onto the sync down-chirp, demodulates symbols and
//! runs the full bit pipeline (Gray decode, diagonal deinterleave,
//! deshuffle, dewhiten, Hamming FEC) to publish decoded frames.

pub mod chirp;
pub mod config;
pub mod constants;
pub mod decode;
pub mod decoder;
pub mod demod;
pub mod dsp;
pub mod error;
pub mod fec;
pub mod frame;
pub mod stream;
pub mod tables;

#[cfg(feature = "capture")]
pub mod io;

// Re-exports for convenience
pub use config::{DecoderConfig, DemodMethod, Params};
pub use decoder::Decoder;
pub use error::LoraError;
pub use frame::{Frame, FrameSink};
pub use stream::{run, run_with_raw, SampleSink};

#[cfg(feature = "capture")]
pub use io::{read_capture, read_cf32, read_iq_wav, write_cf32, write_iq_wav};
