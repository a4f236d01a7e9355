//! Hash algorithm implementations.

mod average;
mod difference;
mod wavelet;

pub use average::AverageHasher;
pub use difference::DifferenceHasher;
pub use wavelet::WaveletHasher;
