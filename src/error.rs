use std::fmt;

/// Errors that can occur while configuring or running the receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum LoraError {
    /// Spreading factor outside the supported 6..=12 range.
    InvalidSpreadingFactor(u8),
    /// Sample rate from which no whole, bin-aligned symbol length derives.
    InvalidSampleRate {
        sample_rate: f32,
        samples_per_symbol: u32,
    },
    /// Capture file could not be read or written.
    Capture(String),
}

impl fmt::Display for LoraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoraError::InvalidSpreadingFactor(sf) => {
                write!(f, "Spreading factor {} not supported (expected 6..=12)", sf)
            }
            LoraError::InvalidSampleRate {
                sample_rate,
                samples_per_symbol,
            } => {
                write!(
                    f,
                    "Sample rate {} Hz yields {} samples per symbol, not a multiple of the bin count",
                    sample_rate, samples_per_symbol
                )
            }
            LoraError::Capture(msg) => write!(f, "Capture error: {}", msg),
        }
    }
}

impl std::error::Error for LoraError {}
