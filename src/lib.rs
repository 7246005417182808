#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![doc = include_str!("../README.md")]

pub mod convolve;
pub mod engine;
pub mod spectrum;
pub mod tail;
pub mod utils;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use convolve::{time_convolve, Strategy};
pub use engine::{EngineConfig, FastConv, Lifecycle, DEFAULT_BLOCK_LENGTH, MAX_BLOCK_LENGTH};
pub use tail::TailBuffer;
pub use utils::next_power_of_two;

/// Audio sample type (32-bit float).
pub type Sample = f32;

/// Buffer of audio samples.
pub type AudioBuffer = Vec<Sample>;

/// Convolution engine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    /// The engine was used before a successful `init`.
    NotInitialized,
    /// An argument was out of range (empty IR, zero block length, buffer length mismatch).
    InvalidArgument,
    /// A required buffer could not be allocated.
    AllocationFailure,
    /// The transform primitive rejected its buffers.
    FftError,
}

impl core::fmt::Display for AudioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AudioError::NotInitialized => write!(f, "Engine not initialized"),
            AudioError::InvalidArgument => write!(f, "Invalid argument"),
            AudioError::AllocationFailure => write!(f, "Allocation failure"),
            AudioError::FftError => write!(f, "FFT processing error"),
        }
    }
}

impl std::error::Error for AudioError {}

/// Result type for convolution operations
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_display() {
        assert_eq!(
            AudioError::NotInitialized.to_string(),
            "Engine not initialized"
        );
        assert_eq!(AudioError::InvalidArgument.to_string(), "Invalid argument");
        assert_eq!(
            AudioError::AllocationFailure.to_string(),
            "Allocation failure"
        );
        assert_eq!(AudioError::FftError.to_string(), "FFT processing error");
    }

    #[test]
    fn test_audio_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(AudioError::NotInitialized);
        assert_eq!(err.to_string(), "Engine not initialized");
    }
}
