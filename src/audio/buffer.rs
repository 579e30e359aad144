//! Append/consume buffer for raw PCM audio.
//!
//! The only producer-facing boundary of the decoder: callers push raw bytes
//! in arrival order, the feature extractor pulls whole samples from the
//! front. Consumption is forward-only; nothing is ever rolled back.

use crate::defaults::BYTES_PER_SAMPLE;
use std::collections::VecDeque;

/// Growable FIFO of 16-bit little-endian PCM samples.
#[derive(Debug, Default)]
pub struct AudioBuffer {
    samples: VecDeque<i16>,
    /// Low byte of a sample whose high byte has not arrived yet.
    pending_byte: Option<u8>,
    total_written: u64,
    total_consumed: u64,
    finished: bool,
}

impl AudioBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw little-endian PCM bytes.
    ///
    /// Never rejects input. An odd trailing byte is held until the next write
    /// completes the sample.
    pub fn write(&mut self, bytes: &[u8]) {
        let mut bytes = bytes;
        if let Some(low) = self.pending_byte
            && let Some((&high, rest)) = bytes.split_first()
        {
            self.push_sample(i16::from_le_bytes([low, high]));
            self.pending_byte = None;
            bytes = rest;
        }

        let mut pairs = bytes.chunks_exact(BYTES_PER_SAMPLE);
        for pair in pairs.by_ref() {
            self.push_sample(i16::from_le_bytes([pair[0], pair[1]]));
        }
        if let [odd] = pairs.remainder() {
            self.pending_byte = Some(*odd);
        }
    }

    /// Appends already decoded samples.
    pub fn write_samples(&mut self, samples: &[i16]) {
        self.samples.extend(samples.iter().copied());
        self.total_written += samples.len() as u64;
    }

    fn push_sample(&mut self, sample: i16) {
        self.samples.push_back(sample);
        self.total_written += 1;
    }

    /// Removes up to `max` samples from the front and appends them to `out`
    /// as floats. Returns how many were moved.
    pub fn read_into(&mut self, out: &mut Vec<f32>, max: usize) -> usize {
        let n = max.min(self.samples.len());
        out.extend(self.samples.drain(..n).map(f32::from));
        self.total_consumed += n as u64;
        n
    }

    /// Marks that no more audio will be written until the next reset.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// True once [`finish`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of samples written but not yet consumed.
    pub fn available(&self) -> usize {
        self.samples.len()
    }

    /// Total samples written since the last reset.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Total samples consumed since the last reset.
    pub fn total_consumed(&self) -> u64 {
        self.total_consumed
    }

    /// Discards all unconsumed audio and clears the end-of-input mark.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.pending_byte = None;
        self.total_written = 0;
        self.total_consumed = 0;
        self.finished = false;
    }
}
