//! Fixed-point streaming core of a pulse-Doppler radar receiver.
//!
//! Range-FFT output is corner-turned, clutter-cancelled, Doppler-processed,
//! detected with an adaptive 2-D OS-CFAR and tracked by a track-while-scan
//! filter. Every stage is a [`prelude::ClockedStage`] stepped once per
//! logical cycle by [`pipeline::RadarCorePipeline`].

pub mod interface;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod stream;
pub mod telemetry;
pub mod tracking;

pub use pipeline::{CoreStatus, RadarCorePipeline};
pub use prelude::{ClockedStage, CoreConfig, CoreError, CoreResult};
pub use stream::{Beat, StreamChannel};
