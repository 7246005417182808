//! Circular accumulator holding the not-yet-emitted convolution tail.
//!
//! Slot `i` (counted from the head) holds the pending contribution to the
//! output sample `i` positions after the current output cursor. The head is
//! an explicit index modulo the capacity, so every read and write is plain
//! indexed arithmetic.
//!
//! # Example
//!
//! ```rust
//! use fastconv::TailBuffer;
//!
//! let mut tail = TailBuffer::new(3).unwrap();
//! tail.accumulate(0, 1.0);
//! tail.accumulate(2, 0.5);
//! assert_eq!(tail.pop_front(), 1.0);
//! // the old slot 2 is now slot 1
//! assert_eq!(tail.get(1), 0.5);
//! ```

use crate::{utils::zeroed_buffer, AudioBuffer, AudioError, AudioResult, Sample};

/// Fixed-capacity circular accumulator with an explicit head index.
#[derive(Debug, Clone, PartialEq)]
pub struct TailBuffer {
    /// Storage; its length is the capacity and never changes.
    buffer: AudioBuffer,
    /// Physical index of logical slot 0.
    head: usize,
}

impl TailBuffer {
    /// Create a zero-filled tail of exactly `capacity` slots
    ///
    /// A capacity of zero is valid (single-tap impulse responses have no tail).
    pub fn new(capacity: usize) -> AudioResult<Self> {
        Ok(Self {
            buffer: zeroed_buffer(capacity)?,
            head: 0,
        })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the tail has no slots at all
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    fn index(&self, offset: usize) -> Option<usize> {
        if self.buffer.is_empty() {
            return None;
        }
        debug_assert!(offset < self.buffer.len());
        Some((self.head + offset) % self.buffer.len())
    }

    /// Read slot `offset` relative to the head
    ///
    /// A zero-capacity tail reads as silence.
    pub fn get(&self, offset: usize) -> Sample {
        self.index(offset).map_or(0.0, |idx| self.buffer[idx])
    }

    /// Overwrite slot `offset` relative to the head
    ///
    /// No-op on a zero-capacity tail.
    pub fn put(&mut self, offset: usize, value: Sample) {
        if let Some(idx) = self.index(offset) {
            self.buffer[idx] = value;
        }
    }

    /// Add `value` into slot `offset` relative to the head
    ///
    /// No-op on a zero-capacity tail.
    pub fn accumulate(&mut self, offset: usize, value: Sample) {
        if let Some(idx) = self.index(offset) {
            self.buffer[idx] += value;
        }
    }

    /// Read the head slot, clear it and advance the head by one
    pub fn pop_front(&mut self) -> Sample {
        if self.buffer.is_empty() {
            return 0.0;
        }
        let value = core::mem::replace(&mut self.buffer[self.head], 0.0);
        self.head = (self.head + 1) % self.buffer.len();
        value
    }

    /// Move the head forward by `count` slots without touching contents
    pub fn advance(&mut self, count: usize) {
        if self.buffer.is_empty() {
            return;
        }
        self.head = (self.head + count) % self.buffer.len();
    }

    /// Add `values[j]` into slot `j` for every `j`
    ///
    /// `values` may not be longer than the tail.
    pub fn accumulate_from(&mut self, values: &[Sample]) -> AudioResult<()> {
        if values.len() > self.buffer.len() {
            return Err(AudioError::InvalidArgument);
        }
        for (offset, &value) in values.iter().enumerate() {
            self.accumulate(offset, value);
        }
        Ok(())
    }

    /// Copy all slots, head first, into `out[..len]`
    pub fn copy_to(&self, out: &mut [Sample]) -> AudioResult<()> {
        if out.len() < self.buffer.len() {
            return Err(AudioError::InvalidArgument);
        }
        let (front, back) = self.buffer.split_at(self.head);
        out[..back.len()].copy_from_slice(back);
        out[back.len()..self.buffer.len()].copy_from_slice(front);
        Ok(())
    }

    /// Zero every slot and rewind the head
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.head = 0;
    }
}
