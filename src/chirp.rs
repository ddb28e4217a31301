//! Ideal reference chirps, built once at construction.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use crate::config::Params;
use crate::dsp::instantaneous_frequency;

/// One symbol each of the ideal down-chirp and up-chirp, with their
/// instantaneous-frequency vectors.
///
/// The down-chirp sweeps from +bw/2 to −bw/2 over the symbol; the
/// up-chirp is its frequency-mirrored twin. Both carry the fixed
/// (1 + 1j) prefactor of the analytic form, so `up[i] * down[i]` is the
/// constant 2j and the two instantaneous-frequency vectors are exact
/// negations of each other.
pub struct Chirps {
    pub downchirp: Vec<Complex<f32>>,
    pub upchirp: Vec<Complex<f32>>,
    pub downchirp_ifreq: Vec<f32>,
    pub upchirp_ifreq: Vec<f32>,
}

impl Chirps {
    pub fn new(params: &Params) -> Self {
        let n = params.samples_per_symbol;
        let mut downchirp = Vec::with_capacity(n);
        let mut upchirp = Vec::with_capacity(n);

        // Linear chirp s(t) = exp(j·2π·t·(f0 + T·t)) with f0 = bw/2 and
        // T = −bw·symbols_per_second/2, so the sweep spans one symbol.
        let sweep = -0.5 * params.bandwidth as f64 * params.symbols_per_second;
        let f0 = params.bandwidth as f64 / 2.0;
        let dt = 1.0 / params.sample_rate as f64;
        let cmx = Complex::new(1.0f32, 1.0);

        for i in 0..n {
            let t = dt * i as f64;
            let phase = 2.0 * PI * t * (f0 + sweep * t);
            let rotation = Complex::new(phase.cos() as f32, phase.sin() as f32);
            downchirp.push(cmx * rotation);
            upchirp.push(cmx * rotation.conj());
        }

        let mut downchirp_ifreq = vec![0.0f32; n];
        let mut upchirp_ifreq = vec![0.0f32; n];
        instantaneous_frequency(&downchirp, &mut downchirp_ifreq);
        instantaneous_frequency(&upchirp, &mut upchirp_ifreq);

        Self {
            downchirp,
            upchirp,
            downchirp_ifreq,
            upchirp_ifreq,
        }
    }
}
