//! The receiver state machine.
//!
//! One `work` call advances the machine by at most one step and reports
//! how many input samples it consumed; the host stream drives it with
//! successive slices. States follow the life of a frame: DETECT hunts
//! for preamble energy, SYNC waits for the down-chirp that ends the
//! preamble, PAUSE skips the remaining sync chirps, then header and
//! payload symbols are demodulated until the frame is published and the
//! machine returns to DETECT.

use rustfft::num_complex::Complex;

use crate::chirp::Chirps;
use crate::config::{DecoderConfig, Params};
use crate::constants::{HEADER_CODING_RATE, MAX_ENERGY_THRESHOLD};
use crate::decode::{gray_decode, header_payload_length, lookup_coding_rate, BlockDecoder};
use crate::demod::{detect_downchirp, detect_upchirp, find_preamble_start, Demodulator};
use crate::error::LoraError;
use crate::frame::{Frame, FrameSink};
use crate::stream::SampleSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Detect,
    Sync,
    Pause,
    DecodeHeader,
    DecodePayload,
    Stop,
}

/// LoRa receiver: consumes complex baseband samples, publishes frames.
pub struct Decoder {
    params: Params,
    chirps: Chirps,
    demod: Demodulator,
    block: BlockDecoder,
    state: DecoderState,

    energy_threshold: f32,
    detect_threshold: f32,
    sync_threshold: f32,
    edge_threshold: f32,
    max_sync_failures: u32,

    corr_fails: u32,
    coding_rate: u8,
    payload_length: usize,
    payload_symbols_left: i32,
    /// 3 header bytes followed by payload bytes; cleared on emit.
    accumulator: Vec<u8>,

    sink: Box<dyn FrameSink>,
}

impl Decoder {
    pub fn new(config: DecoderConfig, sink: Box<dyn FrameSink>) -> Result<Self, LoraError> {
        let params = Params::derive(&config)?;
        log::info!(
            "lora decoder: sf {}, {} bins, {} samples/symbol, decimation {}",
            params.spreading_factor,
            params.bins,
            params.samples_per_symbol,
            params.decimation
        );

        let chirps = Chirps::new(&params);
        let demod = Demodulator::new(&params, config.demod, config.edge_threshold);

        Ok(Self {
            params,
            chirps,
            demod,
            block: BlockDecoder::new(),
            state: DecoderState::Detect,
            energy_threshold: config.energy_threshold,
            detect_threshold: config.detect_threshold,
            sync_threshold: config.sync_threshold,
            edge_threshold: config.edge_threshold,
            max_sync_failures: config.max_sync_failures,
            corr_fails: 0,
            coding_rate: HEADER_CODING_RATE,
            payload_length: 0,
            payload_symbols_left: 0,
            accumulator: Vec::new(),
            sink,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Not supported once running; logs a warning and keeps the current
    /// spreading factor.
    pub fn set_spreading_factor(&mut self, sf: u8) {
        log::warn!(
            "setting the spreading factor during execution is not supported; keeping sf {} (requested {})",
            self.params.spreading_factor,
            sf
        );
    }

    /// Not supported once running; logs a warning and keeps the current
    /// sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        log::warn!(
            "setting the sample rate during execution is not supported; keeping {} Hz (requested {})",
            self.params.sample_rate,
            sample_rate
        );
    }

    /// Replace the energy threshold, clamped to [0, 20].
    pub fn set_abs_threshold(&mut self, threshold: f32) {
        self.energy_threshold = threshold.clamp(0.0, MAX_ENERGY_THRESHOLD);
    }

    /// Park the decoder: every further call drains one symbol and does
    /// nothing else.
    pub fn stop(&mut self) {
        self.state = DecoderState::Stop;
    }

    /// Demodulate one symbol into the word buffer; true when a block
    /// completed and was deinterleaved.
    fn demodulate(&mut self, input: &[Complex<f32>], is_header: bool) -> bool {
        let mut bin = self
            .demod
            .bin_index(&self.params, &self.chirps, input, is_header);
        // The header trades resolution for redundancy
        if is_header {
            bin /= 4;
        }

        let word = gray_decode(bin as u16);
        log::trace!("symbol bin {} -> word {:#x}", bin, word);

        self.block.push_word(
            word,
            4 + self.coding_rate as usize,
            self.params.ppm(is_header),
        )
    }

    fn decode_header_block(&mut self) {
        let header = self.block.decode_header();

        self.payload_length = header_payload_length(header[0]) as usize;
        self.coding_rate = lookup_coding_rate(header[1]);

        self.accumulator.clear();
        self.accumulator.push(self.payload_length as u8);
        self.accumulator.push(header[1]);
        self.accumulator.push(header[2]);

        let symbols_per_block = (self.coding_rate + 4) as i32;
        let bits_needed = self.payload_length as f32 * 8.0 + 16.0;
        let symbols_needed =
            bits_needed * (symbols_per_block as f32 / 4.0) / self.params.spreading_factor as f32;
        let blocks_needed = (symbols_needed / symbols_per_block as f32).ceil() as i32;
        self.payload_symbols_left = blocks_needed * symbols_per_block;

        log::debug!(
            "header: {} payload bytes, coding rate {}, {} payload symbols",
            self.payload_length,
            self.coding_rate,
            self.payload_symbols_left
        );
    }

    fn emit_frame(&mut self) {
        let mut payload = vec![0u8; self.payload_length];
        self.block
            .decode_payload(self.params.spreading_factor, self.coding_rate, &mut payload);

        self.accumulator.extend_from_slice(&payload);
        let frame = Frame {
            header: [
                self.accumulator[0],
                self.accumulator[1],
                self.accumulator[2],
            ],
            payload: self.accumulator[3..].to_vec(),
        };
        log::debug!("frame: {} payload bytes", frame.payload_length());
        self.sink.frame(frame);
        self.accumulator.clear();
    }

    fn forward_raw(&mut self, raw: Option<&[Complex<f32>]>) {
        if let Some(raw) = raw {
            let n = self.params.samples_per_symbol.min(raw.len());
            self.sink.raw_chirp(&raw[..n]);
        }
    }
}

impl SampleSink for Decoder {
    fn min_samples(&self) -> usize {
        // Detection correlates two symbols starting anywhere inside the
        // first; every other state reads at most 1.25 symbols.
        match self.state {
            DecoderState::Detect => 3 * self.params.samples_per_symbol,
            _ => 2 * self.params.samples_per_symbol,
        }
    }

    fn work(&mut self, input: &[Complex<f32>], raw: Option<&[Complex<f32>]>) -> usize {
        if input.len() < self.min_samples() {
            return 0;
        }
        let sps = self.params.samples_per_symbol;

        match self.state {
            DecoderState::Detect => {
                let Some(start) = find_preamble_start(&self.params, input, self.energy_threshold)
                else {
                    // Nothing but noise: skip two symbols at a time
                    return 2 * sps;
                };

                let (corr, correction) = detect_upchirp(
                    &self.params,
                    &self.chirps,
                    &input[start..start + 2 * sps],
                    self.edge_threshold,
                );

                if corr > self.detect_threshold {
                    log::debug!("preamble up-chirp correlation {:.3}", corr);
                    self.corr_fails = 0;
                    self.state = DecoderState::Sync;
                    return start + correction;
                }

                // One extra symbol past the candidate leaves more chances
                // to sync on the next preamble chirp
                start + sps
            }

            DecoderState::Sync => {
                let corr = detect_downchirp(&self.params, &self.chirps, input);

                if corr > self.sync_threshold {
                    log::debug!("sync down-chirp correlation {:.3}", corr);
                    self.state = DecoderState::Pause;
                } else {
                    self.corr_fails += 1;
                    if self.corr_fails >= self.max_sync_failures {
                        log::debug!("lost sync after {} failed correlations", self.corr_fails);
                        self.state = DecoderState::Detect;
                        self.block.reset();
                        self.accumulator.clear();
                    }
                }
                sps
            }

            DecoderState::Pause => {
                // The quarter-symbol delay compensates the alignment the
                // sync chirps introduce
                self.state = DecoderState::DecodeHeader;
                sps + self.params.delay_after_sync
            }

            DecoderState::DecodeHeader => {
                self.coding_rate = HEADER_CODING_RATE;
                if self.demodulate(input, true) {
                    self.decode_header_block();
                    self.state = DecoderState::DecodePayload;
                }
                self.forward_raw(raw);
                sps
            }

            DecoderState::DecodePayload => {
                // Noise where payload symbols should be means the header
                // overstated the length; decode what we have
                if input[0].norm() < self.energy_threshold {
                    self.payload_symbols_left = 0;
                }

                if self.demodulate(input, false) {
                    self.payload_symbols_left -= (4 + self.coding_rate) as i32;
                    if self.payload_symbols_left <= 0 {
                        self.emit_frame();
                        self.state = DecoderState::Detect;
                    }
                }
                self.forward_raw(raw);
                sps
            }

            DecoderState::Stop => sps,
        }
    }
}
