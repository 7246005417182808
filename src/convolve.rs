//! Block convolution strategies
//!
//! Every strategy computes the linear convolution of one input block with the
//! whole impulse response and splits it at the block boundary:
//!
//! - `wet` (length `n`) receives the samples at offsets `[0, n)`
//! - `spill` (length `L - 1`) receives the samples at offsets `[n, n + L - 1)`
//!
//! Both are accumulated into, never overwritten. The engine owns the tail and
//! decides what to do with `spill`; strategies are stateless across calls.

use crate::{
    spectrum::{multiply_accumulate, Bin, SpectralTransform},
    utils::{next_power_of_two, zeroed_buffer},
    AudioBuffer, AudioError, AudioResult, Sample,
};

/// Convolution algorithm used by [`FastConv`](crate::FastConv)
///
/// All strategies produce the same output up to floating-point rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Sample-domain double loop, `O(n·L)` per call. Reference strategy.
    Direct,
    /// IR split into partitions of the block length, each convolved directly
    /// and overlap-added at its partition offset.
    PartitionedDirect,
    /// Uniformly partitioned FFT convolution. Block length rounded up to a
    /// power of two, transform size twice that.
    #[default]
    PartitionedFft,
}

impl Strategy {
    /// Every strategy, for cross-checking
    pub const ALL: [Strategy; 3] = [
        Strategy::Direct,
        Strategy::PartitionedDirect,
        Strategy::PartitionedFft,
    ];

    /// Block length this strategy actually processes with
    pub fn resolve_block_length(self, requested: usize) -> usize {
        match self {
            Strategy::Direct | Strategy::PartitionedDirect => requested,
            Strategy::PartitionedFft => next_power_of_two(requested),
        }
    }

    /// Name accepted by [`FromStr`](core::str::FromStr)
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::PartitionedDirect => "partitioned-direct",
            Strategy::PartitionedFft => "partitioned-fft",
        }
    }
}

impl core::str::FromStr for Strategy {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s))
            .ok_or(AudioError::InvalidArgument)
    }
}

/// Strategy with everything it precomputes from the impulse response.
#[derive(Debug, Clone)]
pub(crate) enum Kernel {
    Direct,
    PartitionedDirect { block_length: usize },
    PartitionedFft(PartitionedFft),
}

impl Kernel {
    /// Prepare `strategy` for `impulse_response` at an already resolved block length
    pub(crate) fn prepare(
        strategy: Strategy,
        impulse_response: &[Sample],
        block_length: usize,
    ) -> AudioResult<Self> {
        Ok(match strategy {
            Strategy::Direct => Kernel::Direct,
            Strategy::PartitionedDirect => Kernel::PartitionedDirect { block_length },
            Strategy::PartitionedFft => {
                Kernel::PartitionedFft(PartitionedFft::new(impulse_response, block_length)?)
            }
        })
    }

    pub(crate) fn num_partitions(&self, ir_len: usize) -> usize {
        match self {
            Kernel::Direct => 1,
            Kernel::PartitionedDirect { block_length } => ir_len.div_ceil(*block_length),
            Kernel::PartitionedFft(fft) => fft.num_partitions(),
        }
    }

    /// Convolve one input block, accumulating into `wet` and `spill`
    pub(crate) fn convolve_block(
        &self,
        impulse_response: &[Sample],
        input: &[Sample],
        wet: &mut [Sample],
        spill: &mut [Sample],
    ) -> AudioResult<()> {
        match self {
            Kernel::Direct => direct_block(impulse_response, input, wet, spill),
            Kernel::PartitionedDirect { block_length } => {
                partitioned_direct_block(impulse_response, *block_length, input, wet, spill)
            }
            Kernel::PartitionedFft(fft) => fft.convolve_block(input, wet, spill),
        }
    }
}

fn check_block_buffers(
    impulse_response: &[Sample],
    input: &[Sample],
    wet: &[Sample],
    spill: &[Sample],
) -> AudioResult<()> {
    if impulse_response.is_empty()
        || wet.len() != input.len()
        || spill.len() != impulse_response.len() - 1
    {
        return Err(AudioError::InvalidArgument);
    }
    Ok(())
}

/// Add `segment`, positioned at `offset` samples from the block start, into
/// `wet` and `spill`
///
/// Samples past `wet.len() + spill.len()` are dropped.
fn overlap_add(segment: &[Sample], offset: usize, wet: &mut [Sample], spill: &mut [Sample]) {
    let n = wet.len();

    if offset < n {
        let count = (n - offset).min(segment.len());
        for (out, &value) in wet[offset..offset + count].iter_mut().zip(&segment[..count]) {
            *out += value;
        }
    }

    // first absolute position that lands in the spill
    let start = offset.max(n);
    let skip = start - offset;
    let spill_start = start - n;
    if skip < segment.len() && spill_start < spill.len() {
        for (out, &value) in spill[spill_start..].iter_mut().zip(&segment[skip..]) {
            *out += value;
        }
    }
}

/// Sample-domain convolution of one block
///
/// `wet[i] += Σ input[i - j] · ir[j]` for `j ≤ min(i, L - 1)`; the part of the
/// convolution running past the block goes to `spill`.
pub fn direct_block(
    impulse_response: &[Sample],
    input: &[Sample],
    wet: &mut [Sample],
    spill: &mut [Sample],
) -> AudioResult<()> {
    check_block_buffers(impulse_response, input, wet, spill)?;

    let ir_len = impulse_response.len();
    let n = input.len();

    for (i, out) in wet.iter_mut().enumerate() {
        let mut acc = 0.0;
        for j in 0..=i.min(ir_len - 1) {
            acc += input[i - j] * impulse_response[j];
        }
        *out += acc;
    }

    // spill[k] is output offset n + k: input[n - 1 - m] meets ir[k + 1 + m]
    for (k, out) in spill.iter_mut().enumerate() {
        let mut acc = 0.0;
        for m in 0..(ir_len - 1 - k).min(n) {
            acc += input[n - 1 - m] * impulse_response[k + 1 + m];
        }
        *out += acc;
    }

    Ok(())
}

/// Partitioned sample-domain convolution of one block
///
/// Partition `p` covers `ir[p·B .. (p+1)·B]`. Its direct convolution with the
/// block is `n + B - 1` samples long and is overlap-added at offset `p·B`.
pub fn partitioned_direct_block(
    impulse_response: &[Sample],
    block_length: usize,
    input: &[Sample],
    wet: &mut [Sample],
    spill: &mut [Sample],
) -> AudioResult<()> {
    check_block_buffers(impulse_response, input, wet, spill)?;
    if block_length == 0 {
        return Err(AudioError::InvalidArgument);
    }
    if input.is_empty() {
        return Ok(());
    }

    let n = input.len();
    // no partition is longer than the IR itself
    let mut partial = zeroed_buffer(n + block_length.min(impulse_response.len()) - 1)?;

    for (p, partition) in impulse_response.chunks(block_length).enumerate() {
        let partial_len = n + partition.len() - 1;
        partial[..partial_len].fill(0.0);

        for (i, &x) in input.iter().enumerate() {
            for (acc, &h) in partial[i..i + partition.len()].iter_mut().zip(partition) {
                *acc += x * h;
            }
        }

        overlap_add(&partial[..partial_len], p * block_length, wet, spill);
    }

    Ok(())
}

/// Uniformly partitioned FFT convolution
///
/// The impulse response is cut into partitions of `B` samples (the last one
/// zero-padded) whose spectra are computed once. Each call cuts the input the
/// same way, transforms every block at size `2B` so that the `2B - 1` samples
/// of a block-by-partition product never wrap, and sums all products that
/// land at the same output offset `(b + p)·B` before one inverse transform.
///
/// # Example
///
/// ```rust
/// use fastconv::convolve::PartitionedFft;
///
/// let ir = vec![1.0, 0.5, 0.25];
/// let fft = PartitionedFft::new(&ir, 2).unwrap();
/// assert_eq!(fft.num_partitions(), 2);
///
/// let input = vec![1.0, 0.0, 0.0];
/// let mut wet = vec![0.0; 3];
/// let mut spill = vec![0.0; 2];
/// fft.convolve_block(&input, &mut wet, &mut spill).unwrap();
/// assert!((wet[1] - 0.5).abs() < 1e-5);
/// ```
#[derive(Debug, Clone)]
pub struct PartitionedFft {
    /// Partition and input block length (power of two)
    block_length: usize,
    /// IR length
    ir_len: usize,
    /// Transform of size `2 * block_length`
    transform: SpectralTransform,
    /// Spectra of the zero-padded IR partitions (hermitian-packed)
    ir_spectra: Vec<Vec<Bin>>,
}

impl PartitionedFft {
    /// Partition and transform `impulse_response`
    ///
    /// # Errors
    /// `InvalidArgument` for an empty IR or a block length that is not a power of two.
    pub fn new(impulse_response: &[Sample], block_length: usize) -> AudioResult<Self> {
        if impulse_response.is_empty()
            || block_length == 0
            || next_power_of_two(block_length) != block_length
        {
            return Err(AudioError::InvalidArgument);
        }

        let transform = SpectralTransform::new(block_length * 2)?;
        let num_partitions = impulse_response.len().div_ceil(block_length);

        let mut ir_spectra = Vec::new();
        ir_spectra
            .try_reserve_exact(num_partitions)
            .map_err(|_| AudioError::AllocationFailure)?;

        let mut scratch = zeroed_buffer(transform.size())?;
        for partition in impulse_response.chunks(block_length) {
            let mut spectrum = transform.zero_spectrum()?;
            transform.forward(partition, &mut scratch, &mut spectrum)?;
            ir_spectra.push(spectrum);
        }

        Ok(Self {
            block_length,
            ir_len: impulse_response.len(),
            transform,
            ir_spectra,
        })
    }

    /// Number of IR partitions
    pub fn num_partitions(&self) -> usize {
        self.ir_spectra.len()
    }

    /// Partition length
    pub fn block_length(&self) -> usize {
        self.block_length
    }

    /// Convolve one input block of any length, accumulating into `wet` and `spill`
    pub fn convolve_block(
        &self,
        input: &[Sample],
        wet: &mut [Sample],
        spill: &mut [Sample],
    ) -> AudioResult<()> {
        if wet.len() != input.len() || spill.len() != self.ir_len - 1 {
            return Err(AudioError::InvalidArgument);
        }

        let b = self.block_length;
        let num_blocks = input.len().div_ceil(b);
        if num_blocks == 0 {
            return Ok(());
        }

        let mut scratch: AudioBuffer = zeroed_buffer(self.transform.size())?;

        let mut input_spectra = Vec::new();
        input_spectra
            .try_reserve_exact(num_blocks)
            .map_err(|_| AudioError::AllocationFailure)?;
        for block in input.chunks(b) {
            let mut spectrum = self.transform.zero_spectrum()?;
            self.transform.forward(block, &mut scratch, &mut spectrum)?;
            input_spectra.push(spectrum);
        }

        let num_partitions = self.ir_spectra.len();
        let mut acc = self.transform.zero_spectrum()?;

        // output block k collects every (block, partition) pair with block + partition == k
        for k in 0..num_blocks + num_partitions - 1 {
            acc.fill(Bin::new(0.0, 0.0));

            let first = k.saturating_sub(num_partitions - 1);
            let last = k.min(num_blocks - 1);
            for block in first..=last {
                multiply_accumulate(&mut acc, &input_spectra[block], &self.ir_spectra[k - block]);
            }

            self.transform.inverse(&mut acc, &mut scratch)?;
            overlap_add(&scratch[..2 * b - 1], k * b, wet, spill);
        }

        Ok(())
    }
}

/// Perform time-domain convolution of a whole signal
///
/// `O(n·L)` batch convolution, output length `signal.len() + kernel.len() - 1`.
/// Used as ground truth for the streaming strategies.
///
/// # Example
///
/// ```rust
/// use fastconv::convolve;
///
/// let signal = vec![1.0, 2.0, 3.0, 4.0];
/// let kernel = vec![0.5, 0.3, 0.1];
/// let result = convolve::time_convolve(&signal, &kernel).unwrap();
/// assert_eq!(result.len(), 6);
/// ```
pub fn time_convolve(signal: &[Sample], kernel: &[Sample]) -> AudioResult<AudioBuffer> {
    if signal.is_empty() || kernel.is_empty() {
        return Err(AudioError::InvalidArgument);
    }

    let output_length = signal.len() + kernel.len() - 1;
    let mut output = zeroed_buffer(output_length)?;

    for (i, &sig_sample) in signal.iter().enumerate() {
        for (j, &kernel_sample) in kernel.iter().enumerate() {
            output[i + j] += sig_sample * kernel_sample;
        }
    }

    Ok(output)
}
