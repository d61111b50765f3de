pub mod track;
pub mod tws;

pub use track::{DetectionBuffer, Track, TrackFile};
pub use tws::{ScanSummary, TrackWhileScanTracker, TwsState};
