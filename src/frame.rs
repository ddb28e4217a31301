//! Decoded frames and the ports they leave through.

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

/// One decoded LoRa frame: the 3 header bytes followed by the payload.
///
/// Header byte 0 is the payload length, byte 1 carries the coding-rate
/// code in its low nibble, byte 2 passes through undecoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub header: [u8; 3],
    pub payload: Vec<u8>,
}

impl Frame {
    /// The frame as one blob, the shape it is published in.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(3 + self.payload.len());
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn payload_length(&self) -> usize {
        self.payload.len()
    }
}

/// Where the decoder publishes its output.
///
/// `frame` is the "frames" port: called once per decoded frame, in frame
/// order. `raw_chirp` is the optional "debug" port, handed one symbol of
/// the raw mirror stream per decoded symbol; the default drops it so
/// production sinks pay nothing.
pub trait FrameSink {
    fn frame(&mut self, frame: Frame);

    fn raw_chirp(&mut self, _samples: &[Complex<f32>]) {}
}

/// An mpsc sender is a frame port: decoded frames queue on the channel.
impl FrameSink for std::sync::mpsc::Sender<Frame> {
    fn frame(&mut self, frame: Frame) {
        if self.send(frame).is_err() {
            log::warn!("frame receiver dropped; frame lost");
        }
    }
}
