//! The bit-domain half of the receiver: Gray mapping, diagonal
//! deinterleaving, column deshuffling, dewhitening and FEC, feeding
//! per-frame byte streams.

use crate::dsp::{nibble_reverse, rotl};
use crate::fec::hamming_decode;
use crate::tables::{payload_sequence, PRNG_HEADER};

/// Column permutation undone by [`deshuffle`]: output bit j is input bit
/// `SHUFFLE_PATTERN[j]`.
pub const SHUFFLE_PATTERN: [u8; 8] = [7, 6, 3, 4, 2, 1, 0, 5];

/// Map a demodulated bin index to its codeword (xor with its own right
/// shift). The LoRa symbol mapping runs this direction on receive.
pub fn gray_decode(bin: u16) -> u16 {
    bin ^ (bin >> 1)
}

/// Inverse of [`gray_decode`]: recover the bin a codeword came from.
pub fn gray_encode(word: u16) -> u16 {
    let mut bin = word;
    let mut shifted = word >> 1;
    while shifted != 0 {
        bin ^= shifted;
        shifted >>= 1;
    }
    bin
}

/// Undo the diagonal interleaving of one block.
///
/// Each word is rotated left by its index within a ppm-bit field, after
/// which the original columns line up: bit x of the rotated word i lands
/// in output byte x at bit i. Yields ppm bytes, each carrying
/// `words.len()` bits.
pub fn deinterleave(words: &[u16], ppm: u32) -> Vec<u8> {
    let bits_per_word = words.len();
    if bits_per_word > 8 {
        log::warn!(
            "deinterleaver: {} bits per word will not fit an output byte",
            bits_per_word
        );
    }

    let mut out = vec![0u8; ppm as usize];
    for (i, &word) in words.iter().enumerate() {
        let rotated = rotl(word, i as u32, ppm);
        for (x, slot) in out.iter_mut().enumerate() {
            if rotated & (1 << x) != 0 {
                *slot |= 1 << i;
            }
        }
    }
    out
}

/// Undo the column shuffle of one byte.
pub fn deshuffle(byte: u8) -> u8 {
    let mut result = 0u8;
    for (j, &src) in SHUFFLE_PATTERN.iter().enumerate() {
        if byte & (1 << src) != 0 {
            result |= 1 << j;
        }
    }
    result
}

/// XOR with the whitening sequence, then reverse the bit order of each
/// byte. The trailing bit reversal compensates a bit-order mismatch
/// further up the chain and is load-bearing: without it no table
/// matches.
pub fn dewhiten(bytes: &mut [u8], sequence: &[u8]) {
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = (*byte ^ sequence[i % sequence.len()]).reverse_bits();
    }
}

/// Accumulates demodulated words and turns completed blocks into frame
/// bytes.
///
/// Owns the word buffer and the demodulated byte stream; both live for
/// one frame at most.
#[derive(Default)]
pub struct BlockDecoder {
    words: Vec<u16>,
    demodulated: Vec<u8>,
}

impl BlockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one codeword. When the buffer reaches `block_size` words the
    /// block is deinterleaved into the demodulated stream; returns true
    /// in that case.
    pub fn push_word(&mut self, word: u16, block_size: usize, ppm: u32) -> bool {
        self.words.push(word);
        if self.words.len() == block_size {
            let block = deinterleave(&self.words, ppm);
            self.demodulated.extend_from_slice(&block);
            self.words.clear();
            return true;
        }
        false
    }

    /// Decode the 3 header bytes from the first 5 demodulated codewords.
    ///
    /// At spreading factors above 7 the header block deinterleaves to
    /// more than 5 bytes; the excess stays queued and becomes the head
    /// of the payload stream.
    pub fn decode_header(&mut self) -> [u8; 3] {
        let take = 5.min(self.demodulated.len());
        let mut codewords: Vec<u8> = self.demodulated.drain(..take).collect();
        for byte in codewords.iter_mut() {
            *byte = deshuffle(*byte);
        }
        dewhiten(&mut codewords, &PRNG_HEADER);

        let mut header = [0u8; 3];
        hamming_decode(&codewords, 4, &mut header);
        header
    }

    /// Decode the entire queued payload stream into `out`.
    pub fn decode_payload(&mut self, spreading_factor: u8, coding_rate: u8, out: &mut [u8]) {
        let mut codewords = std::mem::take(&mut self.demodulated);
        for byte in codewords.iter_mut() {
            *byte = deshuffle(*byte);
        }
        dewhiten(&mut codewords, payload_sequence(spreading_factor));
        hamming_decode(&codewords, coding_rate, out);
    }

    /// Drop all per-frame state.
    pub fn reset(&mut self) {
        self.words.clear();
        self.demodulated.clear();
    }

    #[cfg(test)]
    fn demodulated(&self) -> &[u8] {
        &self.demodulated
    }
}

/// Header byte 1 carries the coding-rate code in its low nibble.
pub fn lookup_coding_rate(byte: u8) -> u8 {
    match byte & 0x0f {
        0x01 => 4,
        0x0f => 3,
        0x0d => 2,
        0x0b => 1,
        _ => 4,
    }
}

/// Payload length is header byte 0 with its nibbles swapped.
pub fn header_payload_length(byte: u8) -> u8 {
    nibble_reverse(byte)
}
