use crate::generator::profile::{ScenarioConfig, ScenarioGenerator};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use radar_core::interface::Detection;
use radar_core::pipeline::{CoreStatus, RadarCorePipeline};
use radar_core::stream::{drive, Beat};
use radar_core::telemetry::MetricsSnapshot;
use radar_core::tracking::ScanSummary;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct WorkflowResult {
    pub frames: usize,
    pub detections: Vec<Detection>,
    pub scans: Vec<ScanSummary>,
    pub track_reports: usize,
    pub status: CoreStatus,
    pub metrics: MetricsSnapshot,
}

impl WorkflowResult {
    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }

    pub fn latest_scan(&self) -> Option<&ScanSummary> {
        self.scans.last()
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        self.execute_scenario(&self.config.scenario)
    }

    /// Streams `frames` generated CPIs through a fresh core, then idles
    /// long enough for the last completed frame to drain.
    pub fn execute_scenario(&self, scenario: &ScenarioConfig) -> anyhow::Result<WorkflowResult> {
        let core = &self.config.core;
        let geometry = core.geometry;
        let mut pipeline = RadarCorePipeline::new(core).context("building radar core")?;
        let mut generator = ScenarioGenerator::new(scenario.clone(), geometry)
            .context("building scenario generator")?;

        log::info!(
            "running {} frames of {} ({} x {})",
            self.config.frames,
            scenario.scenario.as_deref().unwrap_or("unnamed scenario"),
            geometry.n_range,
            geometry.n_doppler
        );

        let mut detections = Vec::new();
        let mut scans = Vec::new();
        let mut track_reports = 0usize;

        for _ in 0..self.config.frames {
            let frame = generator.next_frame();
            let beats = frame.rows().into_iter().flat_map(|chirp| {
                let len = chirp.len();
                chirp
                    .into_iter()
                    .enumerate()
                    .map(move |(idx, &sample)| Beat::new(sample, idx + 1 == len))
                    .collect::<Vec<_>>()
            });
            track_reports += drive(&mut pipeline, beats, |_| true, 0).len();
            detections.extend(pipeline.drain_detections());
            scans.extend(pipeline.take_scan_summaries());
        }

        let flush = 2 * geometry.cells() + 64;
        track_reports += drive(&mut pipeline, std::iter::empty(), |_| true, flush).len();
        detections.extend(pipeline.drain_detections());
        scans.extend(pipeline.take_scan_summaries());

        let status = pipeline.status();
        if status.corner_overflow || status.corner_framing_error {
            log::warn!("corner turner anomalies during run: {:?}", status);
        }
        log::info!(
            "{} detections, {} scans, {} track reports, {} active tracks",
            detections.len(),
            scans.len(),
            track_reports,
            status.active_tracks
        );

        Ok(WorkflowResult {
            frames: self.config.frames,
            detections,
            scans,
            track_reports,
            status,
            metrics: pipeline.metrics(),
        })
    }

    /// Writes the detection log (`range doppler magnitude`) and the track
    /// log (`TRK ...` lines, `SCAN_END ACTIVE=n` per scan).
    pub fn write_logs(&self, result: &WorkflowResult) -> anyhow::Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!("creating output dir {}", self.config.output_dir.display())
        })?;

        let det_path = self.config.detection_log_path();
        let mut det_file = BufWriter::new(
            File::create(&det_path)
                .with_context(|| format!("creating {}", det_path.display()))?,
        );
        for detection in &result.detections {
            writeln!(det_file, "{}", detection.log_line())?;
        }
        det_file
            .flush()
            .with_context(|| format!("writing {}", det_path.display()))?;

        let trk_path = self.config.track_log_path();
        let mut trk_file = BufWriter::new(
            File::create(&trk_path)
                .with_context(|| format!("creating {}", trk_path.display()))?,
        );
        for line in result.scans.iter().flat_map(ScanSummary::log_lines) {
            writeln!(trk_file, "{}", line)?;
        }
        trk_file
            .flush()
            .with_context(|| format!("writing {}", trk_path.display()))?;

        Ok((det_path, trk_path))
    }
}
