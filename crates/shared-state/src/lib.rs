//! Shared State
//!
//! Reader/writer-locked cells for values that cross thread boundaries, and the
//! bounded IQ sample buffer that sample sources fill and the feature engine reads.

mod buffer;
mod cell;

pub use buffer::{SampleBuffer, DEFAULT_CAPACITY};
pub use cell::{Shared, SharedCell};

pub use num_complex::Complex64;

/// Sample buffer shared between a sample source and its readers
pub type SharedBuffer = Shared<SampleBuffer>;

/// Create a shared sample buffer with the given capacity
pub fn shared_buffer(capacity: usize) -> SharedBuffer {
    SharedCell::shared(SampleBuffer::new(capacity))
}
