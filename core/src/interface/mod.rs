//! Bit-exact boundary formats and physical unit conversions.

pub mod detection;
pub mod sample;
pub mod track;
pub mod units;

pub use detection::Detection;
pub use sample::{pack_sample, unpack_sample, Sample};
pub use track::{TrackReport, TrackStatus};
pub use units::RadarUnits;
