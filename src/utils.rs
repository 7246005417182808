//! Small buffer helpers shared by the engine and its strategies

use crate::{AudioBuffer, AudioError, AudioResult, Sample};

/// Find the next power of two greater than or equal to n
pub fn next_power_of_two(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    let mut power = 1;
    while power < n {
        power *= 2;
    }
    power
}

/// Allocate a zero-filled buffer, reporting allocation failure instead of aborting
pub fn zeroed_buffer(len: usize) -> AudioResult<AudioBuffer> {
    let mut buffer = AudioBuffer::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| AudioError::AllocationFailure)?;
    buffer.resize(len, 0.0);
    Ok(buffer)
}

/// Calculate peak amplitude of a buffer
pub fn calculate_peak(buffer: &[Sample]) -> Sample {
    buffer.iter().map(|&x| x.abs()).fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(2), 2);
        assert_eq!(next_power_of_two(3), 4);
        assert_eq!(next_power_of_two(100), 128);
        assert_eq!(next_power_of_two(1024), 1024);
    }

    #[test]
    fn test_next_power_of_two_edge_cases() {
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(1025), 2048);
        assert_eq!(next_power_of_two(8192), 8192);
    }

    #[test]
    fn test_zeroed_buffer() {
        let buffer = zeroed_buffer(7).unwrap();
        assert_eq!(buffer, vec![0.0; 7]);
        assert!(zeroed_buffer(0).unwrap().is_empty());
    }

    #[test]
    fn test_zeroed_buffer_overflow() {
        assert_eq!(
            zeroed_buffer(usize::MAX),
            Err(AudioError::AllocationFailure)
        );
    }

    #[test]
    fn test_calculate_peak() {
        let buffer = vec![0.5, -1.5, 0.25, 0.75];
        assert_abs_diff_eq!(calculate_peak(&buffer), 1.5, epsilon = 1e-6);
        assert_eq!(calculate_peak(&[]), 0.0);
    }
}
