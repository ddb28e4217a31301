//! Synthesizes baseband frames the receiver should decode: the inverse
//! of the whole pipeline, from payload bytes down to I/Q samples.

use rustfft::num_complex::Complex;

use lorarx::chirp::Chirps;
use lorarx::config::{DecoderConfig, Params};
use lorarx::decode::{gray_encode, SHUFFLE_PATTERN};
use lorarx::dsp::{nibble_reverse, rotl};
use lorarx::fec::encode_nibble;
use lorarx::tables::{payload_sequence, PRNG_HEADER};

pub struct FrameSynthesizer {
    params: Params,
    chirps: Chirps,
}

/// Inverse of the receiver's column deshuffle.
fn shuffle(byte: u8) -> u8 {
    let mut out = 0u8;
    for (j, &dst) in SHUFFLE_PATTERN.iter().enumerate() {
        if (byte >> j) & 1 != 0 {
            out |= 1 << dst;
        }
    }
    out
}

/// Inverse of the receiver's diagonal deinterleave: spread `bytes` (one
/// per ppm column) across `bits_per_word` codewords.
fn interleave(bytes: &[u8], ppm: u32, bits_per_word: usize) -> Vec<u16> {
    (0..bits_per_word)
        .map(|i| {
            let mut column = 0u16;
            for (x, &byte) in bytes.iter().enumerate() {
                if (byte >> i) & 1 != 0 {
                    column |= 1 << x;
                }
            }
            rotl(column, ppm - (i as u32 % ppm), ppm)
        })
        .collect()
}

impl FrameSynthesizer {
    pub fn new(sample_rate: f32, sf: u8) -> Self {
        let params = Params::derive(&DecoderConfig::new(sample_rate, sf)).unwrap();
        let chirps = Chirps::new(&params);
        Self { params, chirps }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// An up-chirp cyclically rotated to `shift` bins, plus a quarter
    /// bin so small sync misalignment stays inside the bin.
    fn symbol(&self, shift: usize) -> Vec<Complex<f32>> {
        let roll = ((shift % self.params.bins) * self.params.decimation
            + self.params.decimation / 4)
            % self.params.samples_per_symbol;
        let mut symbol = self.chirps.upchirp[roll..].to_vec();
        symbol.extend_from_slice(&self.chirps.upchirp[..roll]);
        symbol
    }

    fn payload_symbol(&self, word: u16) -> Vec<Complex<f32>> {
        let bin = gray_encode(word) as usize;
        assert!(bin != 0, "codeword 0 cannot ride a payload symbol");
        self.symbol((self.params.bins - bin) % self.params.bins)
    }

    /// Header symbols aim for the middle of their 4-bin group.
    fn header_symbol(&self, word: u16) -> Vec<Complex<f32>> {
        let reduced = gray_encode(word) as usize;
        let mut raw = 4 * reduced + 2;
        if raw > self.params.bins - 3 {
            raw = 4 * reduced;
        }
        self.symbol(self.params.bins - 1 - raw)
    }

    /// Whiten and shuffle a codeword stream into demodulated-byte form.
    fn conceal(codewords: &[u8], sequence: &[u8]) -> Vec<u8> {
        codewords
            .iter()
            .enumerate()
            .map(|(i, &c)| shuffle(c.reverse_bits() ^ sequence[i % sequence.len()]))
            .collect()
    }

    /// A complete frame: two symbols of silence, a ramped and a clean
    /// preamble up-chirp, 2.25 sync down-chirps, header and payload
    /// symbols, four symbols of trailing silence.
    pub fn frame(&self, payload: &[u8], coding_rate: u8) -> Vec<Complex<f32>> {
        let p = &self.params;
        let sps = p.samples_per_symbol;
        let sf = p.spreading_factor as usize;
        let leftover = (sf - 2) - 5;

        let cr_code: u8 = match coding_rate {
            4 => 0x01,
            3 => 0x0f,
            2 => 0x0d,
            _ => 0x0b,
        };
        let length_byte = nibble_reverse(payload.len() as u8);
        let header_nibbles = [
            length_byte >> 4,
            length_byte & 0x0f,
            cr_code >> 4,
            cr_code & 0x0f,
            0,
        ];
        let header_codewords: Vec<u8> = header_nibbles.iter().map(|&n| encode_nibble(n)).collect();

        let symbols_per_block = (coding_rate + 4) as usize;
        let bits_needed = payload.len() as f32 * 8.0 + 16.0;
        let symbols_needed = bits_needed * (symbols_per_block as f32 / 4.0) / sf as f32;
        let blocks = (symbols_needed / symbols_per_block as f32).ceil() as usize;
        let codeword_count = leftover + blocks * sf;

        let mut nibbles = Vec::new();
        for &byte in payload {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        nibbles.resize(codeword_count, 0);
        let payload_codewords: Vec<u8> = nibbles.iter().map(|&n| encode_nibble(n)).collect();

        let header_stream = Self::conceal(&header_codewords, &PRNG_HEADER);
        let payload_stream = Self::conceal(&payload_codewords, payload_sequence(p.spreading_factor));

        // Above sf 7 the header block has more columns than header
        // codewords; the first payload codewords fill them.
        let mut header_block = header_stream;
        header_block.extend_from_slice(&payload_stream[..leftover]);

        let mut samples = vec![Complex::new(0.0f32, 0.0); 2 * sps];
        for (i, &s) in self.chirps.upchirp.iter().enumerate() {
            samples.push(s * (i as f32 / sps as f32));
        }
        samples.extend_from_slice(&self.chirps.upchirp);
        samples.extend_from_slice(&self.chirps.downchirp);
        samples.extend_from_slice(&self.chirps.downchirp);
        samples.extend_from_slice(&self.chirps.downchirp[..sps / 4]);

        for word in interleave(&header_block, p.ppm(true), 8) {
            samples.extend(self.header_symbol(word));
        }
        for chunk in payload_stream[leftover..].chunks(sf) {
            for word in interleave(chunk, p.ppm(false), symbols_per_block) {
                samples.extend(self.payload_symbol(word));
            }
        }

        let tail = samples.len() + 4 * sps;
        samples.resize(tail, Complex::new(0.0, 0.0));
        samples
    }
}
