//! Real-input transform primitive used by the partitioned FFT strategy
//!
//! Wraps a pair of `realfft` plans of one power-of-two size. Spectra are kept
//! in the hermitian-packed form (`size / 2 + 1` bins). The inverse transform
//! applies the `1 / size` scaling that the real FFT leaves out.

use crate::{utils::next_power_of_two, AudioError, AudioResult, Sample};
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

/// Largest transform size that will be planned.
///
/// The planner allocates its twiddle tables infallibly.
pub const MAX_TRANSFORM_SIZE: usize = 1 << 25;

/// Spectrum bin type.
pub type Bin = Complex<Sample>;

/// Forward and inverse real FFT of a fixed power-of-two size.
#[derive(Clone)]
pub struct SpectralTransform {
    /// Transform size in samples
    size: usize,
    /// Real FFT planner (real to complex)
    r2c: Arc<dyn RealToComplex<Sample>>,
    /// Real FFT planner (complex to real)
    c2r: Arc<dyn ComplexToReal<Sample>>,
}

impl core::fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("size", &self.size)
            .finish()
    }
}

impl SpectralTransform {
    /// Plan forward and inverse transforms of `size` samples
    ///
    /// # Errors
    /// Returns `InvalidArgument` unless `size` is a power of two between 2
    /// and [`MAX_TRANSFORM_SIZE`].
    pub fn new(size: usize) -> AudioResult<Self> {
        if size < 2 || size > MAX_TRANSFORM_SIZE || next_power_of_two(size) != size {
            return Err(AudioError::InvalidArgument);
        }

        let mut planner = RealFftPlanner::<Sample>::new();
        let r2c = planner.plan_fft_forward(size);
        let c2r = planner.plan_fft_inverse(size);

        Ok(Self { size, r2c, c2r })
    }

    /// Transform size in samples
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bins in a packed spectrum
    pub fn spectrum_len(&self) -> usize {
        self.size / 2 + 1
    }

    /// Allocate a zeroed spectrum
    pub fn zero_spectrum(&self) -> AudioResult<Vec<Bin>> {
        let mut spectrum = Vec::new();
        spectrum
            .try_reserve_exact(self.spectrum_len())
            .map_err(|_| AudioError::AllocationFailure)?;
        spectrum.resize(self.spectrum_len(), Complex::new(0.0, 0.0));
        Ok(spectrum)
    }

    /// Zero-pad `segment` to the transform size and transform it into `spectrum`
    ///
    /// `scratch` must hold exactly `size()` samples; its contents are clobbered.
    pub fn forward(
        &self,
        segment: &[Sample],
        scratch: &mut [Sample],
        spectrum: &mut [Bin],
    ) -> AudioResult<()> {
        if segment.len() > self.size || scratch.len() != self.size {
            return Err(AudioError::InvalidArgument);
        }

        scratch.fill(0.0);
        scratch[..segment.len()].copy_from_slice(segment);

        self.r2c
            .process(scratch, spectrum)
            .map_err(|_| AudioError::FftError)
    }

    /// Inverse-transform `spectrum` into `out` with `1 / size` scaling
    ///
    /// `spectrum` is used as scratch and holds garbage afterwards.
    pub fn inverse(&self, spectrum: &mut [Bin], out: &mut [Sample]) -> AudioResult<()> {
        if spectrum.is_empty() {
            return Err(AudioError::InvalidArgument);
        }

        // DC and Nyquist bins of a real signal have no imaginary part
        let last = spectrum.len() - 1;
        spectrum[0].im = 0.0;
        spectrum[last].im = 0.0;

        self.c2r
            .process(spectrum, out)
            .map_err(|_| AudioError::FftError)?;

        let scale = 1.0 / (self.size as Sample);
        for sample in out.iter_mut() {
            *sample *= scale;
        }
        Ok(())
    }
}

/// Pointwise complex multiply of `a` and `b`, added into `acc`
pub fn multiply_accumulate(acc: &mut [Bin], a: &[Bin], b: &[Bin]) {
    for ((out, &x), &h) in acc.iter_mut().zip(a).zip(b) {
        *out += x * h;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolve::time_convolve;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rejects_bad_sizes() {
        assert_eq!(
            SpectralTransform::new(0).unwrap_err(),
            AudioError::InvalidArgument
        );
        assert_eq!(
            SpectralTransform::new(1).unwrap_err(),
            AudioError::InvalidArgument
        );
        assert_eq!(
            SpectralTransform::new(12).unwrap_err(),
            AudioError::InvalidArgument
        );
        assert_eq!(SpectralTransform::new(16).unwrap().spectrum_len(), 9);
    }

    #[test]
    fn test_rejects_sizes_above_cap() {
        assert_eq!(
            SpectralTransform::new(MAX_TRANSFORM_SIZE * 2).unwrap_err(),
            AudioError::InvalidArgument
        );
        assert_eq!(
            SpectralTransform::new(1 << 41).unwrap_err(),
            AudioError::InvalidArgument
        );
    }

    #[test]
    fn test_forward_inverse_identity() {
        let transform = SpectralTransform::new(8).unwrap();
        let signal = vec![0.5, -1.0, 0.25, 2.0, 0.0, 1.5];

        let mut scratch = vec![0.0; 8];
        let mut spectrum = transform.zero_spectrum().unwrap();
        transform
            .forward(&signal, &mut scratch, &mut spectrum)
            .unwrap();

        let mut out = vec![0.0; 8];
        transform.inverse(&mut spectrum, &mut out).unwrap();

        for (i, &x) in out.iter().enumerate() {
            let expected = signal.get(i).copied().unwrap_or(0.0);
            assert_abs_diff_eq!(x, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_spectral_product_is_linear_convolution() {
        let transform = SpectralTransform::new(16).unwrap();
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let b = vec![0.5, -0.25, 0.125, 1.0, 0.0, 0.0, 0.0, 2.0];

        let mut scratch = vec![0.0; 16];
        let mut spec_a = transform.zero_spectrum().unwrap();
        let mut spec_b = transform.zero_spectrum().unwrap();
        transform.forward(&a, &mut scratch, &mut spec_a).unwrap();
        transform.forward(&b, &mut scratch, &mut spec_b).unwrap();

        let mut acc = transform.zero_spectrum().unwrap();
        multiply_accumulate(&mut acc, &spec_a, &spec_b);

        let mut out = vec![0.0; 16];
        transform.inverse(&mut acc, &mut out).unwrap();

        let expected = time_convolve(&a, &b).unwrap();
        for (x, e) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(x, e, epsilon = 1e-4);
        }
        // 8 + 8 - 1 samples: the last bin of the padded block stays empty
        assert_abs_diff_eq!(out[15], 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_forward_rejects_oversized_segment() {
        let transform = SpectralTransform::new(4).unwrap();
        let mut scratch = vec![0.0; 4];
        let mut spectrum = transform.zero_spectrum().unwrap();
        assert_eq!(
            transform.forward(&[1.0; 5], &mut scratch, &mut spectrum),
            Err(AudioError::InvalidArgument)
        );
    }
}
