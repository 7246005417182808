//! Streaming convolution engine
//!
//! [`FastConv`] convolves an arbitrarily long input stream with a fixed
//! impulse response, one caller-sized block at a time. Concatenating every
//! `process` output followed by one final [`FastConv::flush`] yields exactly
//! the linear convolution of the whole stream (`input_len + L - 1` samples).
//!
//! # Example
//!
//! ```rust
//! use fastconv::{EngineConfig, FastConv, Strategy};
//!
//! let mut engine = FastConv::new();
//! let config = EngineConfig {
//!     block_length: 4,
//!     strategy: Strategy::PartitionedFft,
//! };
//! engine.init_with_config(&[1.0, 2.0, 3.0], &config).unwrap();
//!
//! let mut first = vec![0.0; 2];
//! let mut second = vec![0.0; 3];
//! engine.process(&[1.0, 0.0], &mut first).unwrap();
//! engine.process(&[0.0, 0.0, 0.0], &mut second).unwrap();
//! let tail = engine.flush().unwrap();
//!
//! let mut full = first;
//! full.extend(second);
//! full.extend(tail);
//! let expected: [f32; 7] = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0];
//! for (x, e) in full.iter().zip(expected.iter()) {
//!     assert!((x - e).abs() < 1e-5);
//! }
//! ```

use crate::{
    convolve::{Kernel, Strategy},
    tail::TailBuffer,
    utils::zeroed_buffer,
    AudioBuffer, AudioError, AudioResult, Sample,
};
use log::{debug, trace, warn};

/// Processing block length used when none is given.
pub const DEFAULT_BLOCK_LENGTH: usize = 8192;

/// Largest accepted processing block length.
///
/// The FFT strategy plans a `2 * B` transform, which must stay within
/// [`MAX_TRANSFORM_SIZE`](crate::spectrum::MAX_TRANSFORM_SIZE).
pub const MAX_BLOCK_LENGTH: usize = 1 << 24;

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Partition and transform block length.
    ///
    /// The FFT strategy rounds this up to a power of two.
    pub block_length: usize,
    /// Convolution algorithm
    pub strategy: Strategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_length: DEFAULT_BLOCK_LENGTH,
            strategy: Strategy::default(),
        }
    }
}

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No impulse response loaded.
    Uninitialized,
    /// Initialized; `blocks_processed` counts `process` calls since `init`.
    Streaming {
        /// Number of non-empty `process` calls so far
        blocks_processed: u64,
    },
    /// The tail was drained by `flush_buffer`. Processing may resume.
    Flushed,
}

#[derive(Debug, Clone)]
struct EngineState {
    impulse_response: AudioBuffer,
    block_length: usize,
    strategy: Strategy,
    kernel: Kernel,
    tail: TailBuffer,
    blocks_processed: u64,
    flushed: bool,
}

/// Partitioned streaming convolution engine
///
/// Single-threaded: every call runs to completion and the engine holds no
/// lock. `&mut self` on every mutating call makes concurrent use impossible
/// without external synchronization.
#[derive(Debug, Clone, Default)]
pub struct FastConv {
    state: Option<EngineState>,
}

impl FastConv {
    /// Create an uninitialized engine
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Load `impulse_response` with the default strategy
    ///
    /// Equivalent to [`init_with_config`](Self::init_with_config) with
    /// `block_length` and [`Strategy::PartitionedFft`].
    pub fn init(&mut self, impulse_response: &[Sample], block_length: usize) -> AudioResult<()> {
        let config = EngineConfig {
            block_length,
            ..EngineConfig::default()
        };
        self.init_with_config(impulse_response, &config)
    }

    /// Load `impulse_response` and prepare `config.strategy`
    ///
    /// Previous state is discarded first, so a failed call leaves the engine
    /// uninitialized.
    ///
    /// # Errors
    /// - `InvalidArgument` for an empty IR, a zero block length or one above
    ///   [`MAX_BLOCK_LENGTH`]
    /// - `AllocationFailure` if the IR copy, tail or precomputed spectra cannot be allocated
    pub fn init_with_config(
        &mut self,
        impulse_response: &[Sample],
        config: &EngineConfig,
    ) -> AudioResult<()> {
        self.reset();

        if impulse_response.is_empty()
            || config.block_length == 0
            || config.block_length > MAX_BLOCK_LENGTH
        {
            return Err(AudioError::InvalidArgument);
        }

        let block_length = config.strategy.resolve_block_length(config.block_length);
        if block_length != config.block_length {
            warn!(
                "block length {} is not a power of two, using {}",
                config.block_length, block_length
            );
        }

        let mut ir = zeroed_buffer(impulse_response.len())?;
        ir.copy_from_slice(impulse_response);

        let kernel = Kernel::prepare(config.strategy, &ir, block_length)?;
        let tail = TailBuffer::new(ir.len() - 1)?;

        debug!(
            "init: ir length {}, block length {}, {:?} with {} partition(s)",
            ir.len(),
            block_length,
            config.strategy,
            kernel.num_partitions(ir.len())
        );

        self.state = Some(EngineState {
            impulse_response: ir,
            block_length,
            strategy: config.strategy,
            kernel,
            tail,
            blocks_processed: 0,
            flushed: false,
        });
        Ok(())
    }

    /// Release the impulse response and tail
    ///
    /// Safe to call any number of times.
    pub fn reset(&mut self) {
        if self.state.take().is_some() {
            debug!("reset");
        }
    }

    /// Convolve one block of any length
    ///
    /// `output` must be as long as `input`. The first `min(L - 1, n)` output
    /// samples are overwritten with the pending tail; the remaining samples
    /// keep what the caller put there. New contributions are then added to
    /// every output sample, so a zeroed `output` receives pure convolution.
    ///
    /// Either the whole call takes effect or, on error, neither the engine
    /// nor `output` changes.
    ///
    /// # Errors
    /// - `NotInitialized` before `init`
    /// - `InvalidArgument` if `output.len() != input.len()`
    /// - `AllocationFailure` if call-local scratch cannot be allocated
    pub fn process(&mut self, input: &[Sample], output: &mut [Sample]) -> AudioResult<()> {
        let state = self.state.as_mut().ok_or(AudioError::NotInitialized)?;
        if output.len() != input.len() {
            return Err(AudioError::InvalidArgument);
        }

        let n = input.len();
        if n == 0 {
            return Ok(());
        }
        trace!("process: {} samples", n);

        let mut wet = zeroed_buffer(n)?;
        let mut spill = zeroed_buffer(state.tail.len())?;
        state
            .kernel
            .convolve_block(&state.impulse_response, input, &mut wet, &mut spill)?;

        // nothing below can fail
        let emitted = n.min(state.tail.len());
        for out in output[..emitted].iter_mut() {
            *out = state.tail.pop_front();
        }
        state.tail.advance(n - emitted);

        for (out, &value) in output.iter_mut().zip(&wet) {
            *out += value;
        }
        for (offset, &value) in spill.iter().enumerate() {
            state.tail.accumulate(offset, value);
        }

        state.blocks_processed += 1;
        state.flushed = false;
        Ok(())
    }

    /// Copy the pending tail into `tail_out[..L - 1]` and clear it
    ///
    /// Call once after the last `process`. Calling it mid-stream drops the
    /// tail from the following output.
    ///
    /// # Errors
    /// - `NotInitialized` before `init`
    /// - `InvalidArgument` if `tail_out` is shorter than `L - 1`
    pub fn flush_buffer(&mut self, tail_out: &mut [Sample]) -> AudioResult<()> {
        let state = self.state.as_mut().ok_or(AudioError::NotInitialized)?;
        state.tail.copy_to(tail_out)?;
        state.tail.reset();
        state.flushed = true;
        debug!("flushed {} tail samples", state.tail.len());
        Ok(())
    }

    /// Drain the pending tail into a new buffer of `L - 1` samples
    pub fn flush(&mut self) -> AudioResult<AudioBuffer> {
        let mut tail = zeroed_buffer(self.size_of_tail()?)?;
        self.flush_buffer(&mut tail)?;
        Ok(tail)
    }

    /// Length of the tail returned by a flush, `L - 1`
    pub fn size_of_tail(&self) -> AudioResult<usize> {
        self.state
            .as_ref()
            .map(|state| state.tail.len())
            .ok_or(AudioError::NotInitialized)
    }

    /// Whether an impulse response is loaded
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        match &self.state {
            None => Lifecycle::Uninitialized,
            Some(state) if state.flushed => Lifecycle::Flushed,
            Some(state) => Lifecycle::Streaming {
                blocks_processed: state.blocks_processed,
            },
        }
    }

    /// Resolved processing block length
    pub fn block_length(&self) -> Option<usize> {
        self.state.as_ref().map(|state| state.block_length)
    }

    /// Impulse response length `L`
    pub fn ir_len(&self) -> Option<usize> {
        self.state
            .as_ref()
            .map(|state| state.impulse_response.len())
    }

    /// Strategy chosen at `init`
    pub fn strategy(&self) -> Option<Strategy> {
        self.state.as_ref().map(|state| state.strategy)
    }
}
