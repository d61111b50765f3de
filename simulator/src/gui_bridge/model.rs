use crate::workflow::runner::WorkflowResult;
use radar_core::interface::{Detection, RadarUnits, TrackStatus};
use radar_core::math::fixed::q2_to_bin;
use radar_core::pipeline::CoreStatus;
use radar_core::prelude::FrameGeometry;
use radar_core::telemetry::MetricsSnapshot;
use serde::{Deserialize, Serialize};

/// A reported track in physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackView {
    pub id: u8,
    pub status: TrackStatus,
    pub range_bin: i32,
    pub doppler_bin: i32,
    pub range_km: f64,
    pub velocity_mps: f64,
    pub range_rate: i16,
    pub quality: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualizationModel {
    pub scan: u64,
    pub detection_count: usize,
    pub detections: Vec<Detection>,
    pub active_tracks: usize,
    pub tracks: Vec<TrackView>,
    pub status: CoreStatus,
    pub metrics: MetricsSnapshot,
    pub notes: Vec<String>,
}

impl VisualizationModel {
    /// Latest scan of `result`, with bins converted through `units`.
    pub fn from_result(result: &WorkflowResult, geometry: FrameGeometry, units: &RadarUnits) -> Self {
        let latest = result.latest_scan();
        let tracks = latest
            .map(|scan| {
                scan.tracks
                    .iter()
                    .map(|report| TrackView {
                        id: report.id,
                        status: report.status,
                        range_bin: q2_to_bin(i32::from(report.range_q2)),
                        doppler_bin: q2_to_bin(i32::from(report.doppler_q2)),
                        range_km: units.range_km(f64::from(report.range_q2) / 4.0, geometry.n_range),
                        velocity_mps: units
                            .velocity_mps(f64::from(report.doppler_q2) / 4.0, geometry.n_doppler),
                        range_rate: report.range_rate,
                        quality: report.quality,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut notes = Vec::new();
        if result.status.corner_overflow {
            notes.push("corner turner overflow".to_string());
        }
        if result.status.detections_dropped > 0 {
            notes.push(format!(
                "{} detections dropped at the tracker",
                result.status.detections_dropped
            ));
        }
        if result.status.track_file_full {
            notes.push("track file exhausted".to_string());
        }

        Self {
            scan: latest.map(|scan| scan.scan).unwrap_or_default(),
            detection_count: result.detection_count(),
            detections: result.detections.clone(),
            active_tracks: latest.map(|scan| scan.active_tracks).unwrap_or_default(),
            tracks,
            status: result.status,
            metrics: result.metrics,
            notes,
        }
    }
}
