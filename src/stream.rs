//! The streaming contract between the receiver and its host.
//!
//! The host owns the sample transport and back-pressure; the block only
//! reports how much of each offered slice it consumed. `run` is the
//! in-memory host used by the CLI and the tests.

use rustfft::num_complex::Complex;

/// A stream-processing block fed by slices of baseband samples.
pub trait SampleSink {
    /// Smallest slice `work` is prepared to act on. Offering less makes
    /// `work` a no-op.
    fn min_samples(&self) -> usize;

    /// Process the head of `input`, returning how many samples were
    /// consumed (0 when starved). `raw` optionally mirrors the
    /// pre-filtered source stream for diagnostics; it is aligned with
    /// `input`.
    fn work(&mut self, input: &[Complex<f32>], raw: Option<&[Complex<f32>]>) -> usize;
}

/// Drive a block over an in-memory capture until it is exhausted or the
/// block stops consuming. Returns the total number of samples consumed.
pub fn run(sink: &mut dyn SampleSink, samples: &[Complex<f32>]) -> usize {
    run_with_raw(sink, samples, None)
}

/// [`run`], with the raw mirror stream attached.
pub fn run_with_raw(
    sink: &mut dyn SampleSink,
    samples: &[Complex<f32>],
    raw: Option<&[Complex<f32>]>,
) -> usize {
    let mut position = 0;
    while samples.len() - position >= sink.min_samples() {
        let raw_slice = raw.map(|r| &r[position.min(r.len())..]);
        let consumed = sink.work(&samples[position..], raw_slice);
        if consumed == 0 {
            break;
        }
        position += consumed;
    }
    position
}
