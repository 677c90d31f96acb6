//! Fixed-capacity window of raw readings.
//!
//! Readings accumulate until the window holds `capacity` values, at which
//! point the owner reduces it to a single mean and starts over. The buffer
//! never holds more than `capacity` values as long as the owner checks
//! [`ReadingBuffer::is_full`] after each append.

use crate::error::{ConfigError, EmptyWindowError};

/// Accumulates readings for one averaging window.
#[derive(Debug, Clone)]
pub struct ReadingBuffer {
    values: Vec<f64>,
    capacity: usize,
}

impl ReadingBuffer {
    /// Create an empty window holding `capacity` readings.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::invalid(
                "window_capacity",
                "must be at least 1",
            ));
        }
        Ok(Self {
            values: Vec::with_capacity(capacity),
            capacity,
        })
    }

    /// Add a reading to the window.
    pub fn append(&mut self, value: f64) {
        debug_assert!(self.values.len() < self.capacity, "window overfilled");
        self.values.push(value);
    }

    /// Whether the window has reached its capacity.
    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    /// Mean of the buffered readings. Empties the window.
    pub fn reduce_and_clear(&mut self) -> Result<f64, EmptyWindowError> {
        if self.values.is_empty() {
            return Err(EmptyWindowError);
        }
        let mean = self.values.iter().sum::<f64>() / self.values.len() as f64;
        self.values.clear();
        Ok(mean)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
