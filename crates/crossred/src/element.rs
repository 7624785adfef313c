//! Scalar element abstraction shared by formulas, reductions and drivers.

use num_traits::Float;

/// Scalar type the engine computes over.
///
/// Selection reductions store inner indices inside the accumulator buffer
/// itself, in the same element type as the values; `encode_index` and
/// `decode_index` are the two ends of that convention.
pub trait Element: Float + Send + Sync + 'static {
    fn from_int(value: i32) -> Self;

    /// Encodes an inner index for storage in a value buffer.
    fn encode_index(index: usize) -> Self;

    /// Reads back an index previously written by [`Element::encode_index`].
    fn decode_index(self) -> usize;
}

impl Element for f32 {
    fn from_int(value: i32) -> Self {
        value as f32
    }

    fn encode_index(index: usize) -> Self {
        index as f32
    }

    fn decode_index(self) -> usize {
        self as usize
    }
}

impl Element for f64 {
    fn from_int(value: i32) -> Self {
        value as f64
    }

    fn encode_index(index: usize) -> Self {
        index as f64
    }

    fn decode_index(self) -> usize {
        self as usize
    }
}
