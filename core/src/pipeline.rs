//! Orchestrates the full receive chain as one synchronous dataflow network.
//!
//! raw I/Q -> range window -> range FFT -> corner turner -> Doppler notch
//! -> Doppler window -> Doppler FFT -> magnitude -> CFAR -> tracker
//! -> report link
//!
//! Every stage's `out_beat` and `in_ready` are sampled before any stage
//! ticks, so a tick never observes a neighbour's uncommitted state.

use serde::{Deserialize, Serialize};

use crate::interface::{Detection, Sample, TrackReport};
use crate::prelude::{ClockedStage, CoreConfig, CoreResult, FrameGeometry};
use crate::processing::cfar::AdaptiveCfar;
use crate::processing::corner_turner::CornerTurner;
use crate::processing::doppler_notch::DopplerNotch;
use crate::processing::fft_engine::{FftDirection, FftEngine, FftSetup, StreamingFft};
use crate::processing::magnitude::MagnitudeEstimator;
use crate::processing::window::{CoefficientWindow, WindowMultiplier};
use crate::stream::{Beat, StreamChannel};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::tracking::tws::{ScanSummary, TrackWhileScanTracker};

/// Reports buffered between the tracker and the consumer.
const REPORT_LINK_DEPTH: usize = 2;

/// Running raster index that labels each classified cell with its
/// (range, Doppler) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellIndexer {
    geometry: FrameGeometry,
    origin: usize,
    index: usize,
}

impl CellIndexer {
    /// `origin` is the raster index of the first classified cell.
    pub fn new(geometry: FrameGeometry, origin: usize) -> Self {
        Self {
            geometry,
            origin,
            index: origin % geometry.cells(),
        }
    }

    /// Detection for the cell the next classified value belongs to.
    pub fn peek(&self, magnitude: u32) -> Detection {
        let n_doppler = self.geometry.n_doppler;
        Detection::new(
            (self.index / n_doppler) as u16,
            (self.index % n_doppler) as u16,
            magnitude,
        )
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.geometry.cells();
    }

    pub fn reset(&mut self) {
        self.index = self.origin % self.geometry.cells();
    }
}

/// Sticky anomaly flags and counters for an external supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreStatus {
    pub window_saturation: bool,
    pub fft_overflow: bool,
    pub notch_saturation: bool,
    pub corner_overflow: bool,
    pub corner_framing_error: bool,
    pub detections_dropped: u64,
    pub track_file_full: bool,
    pub scans_completed: u64,
    pub active_tracks: usize,
}

pub struct RadarCorePipeline {
    config: CoreConfig,
    range_window: Box<dyn WindowMultiplier>,
    range_fft: Box<dyn FftEngine>,
    corner_turner: CornerTurner,
    notch: DopplerNotch,
    doppler_window: Box<dyn WindowMultiplier>,
    doppler_fft: Box<dyn FftEngine>,
    magnitude: MagnitudeEstimator,
    cfar: AdaptiveCfar,
    indexer: CellIndexer,
    tracker: TrackWhileScanTracker,
    /// Registered boundary between the tracker and the pipeline output.
    reports: StreamChannel<TrackReport>,
    detections: Vec<Detection>,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl RadarCorePipeline {
    /// Builds the chain with the reference window and FFT collaborators.
    pub fn new(config: &CoreConfig) -> CoreResult<Self> {
        config.validate()?;
        let FrameGeometry { n_range, n_doppler } = config.geometry;
        Self::with_collaborators(
            config,
            Box::new(CoefficientWindow::new(config.window.range, n_range, "range_window")),
            Box::new(StreamingFft::new(n_range, "range_fft")),
            Box::new(CoefficientWindow::new(
                config.window.doppler,
                n_doppler,
                "doppler_window",
            )),
            Box::new(StreamingFft::new(n_doppler, "doppler_fft")),
        )
    }

    /// Builds the chain around caller-supplied collaborators and performs
    /// the one-time FFT configuration handshake.
    pub fn with_collaborators(
        config: &CoreConfig,
        range_window: Box<dyn WindowMultiplier>,
        mut range_fft: Box<dyn FftEngine>,
        doppler_window: Box<dyn WindowMultiplier>,
        mut doppler_fft: Box<dyn FftEngine>,
    ) -> CoreResult<Self> {
        config.validate()?;
        range_fft.configure(FftSetup {
            direction: FftDirection::Forward,
            scaling_shift: config.fft.range_shift,
        })?;
        doppler_fft.configure(FftSetup {
            direction: FftDirection::Forward,
            scaling_shift: config.fft.doppler_shift,
        })?;

        let cfar = AdaptiveCfar::new(config.geometry, &config.cfar);
        let indexer = CellIndexer::new(config.geometry, cfar.origin());
        let logger = LogManager::new("pipeline");
        logger.record(&format!(
            "{} range bins x {} Doppler bins, FFT latency {}/{}, CFAR origin {}",
            config.geometry.n_range,
            config.geometry.n_doppler,
            range_fft.latency(),
            doppler_fft.latency(),
            cfar.origin()
        ));

        Ok(Self {
            config: config.clone(),
            range_window,
            range_fft,
            corner_turner: CornerTurner::new(config.geometry, &config.corner_turner),
            notch: DopplerNotch::new(&config.notch),
            doppler_window,
            doppler_fft,
            magnitude: MagnitudeEstimator::new(),
            cfar,
            indexer,
            tracker: TrackWhileScanTracker::new(&config.tracker),
            reports: StreamChannel::with_capacity(REPORT_LINK_DEPTH),
            detections: Vec::new(),
            metrics: MetricsRecorder::new(),
            logger,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.notch.set_bypass(bypass);
    }

    /// Zero restores adaptive CFAR scaling.
    pub fn set_scale_override(&mut self, scale: u32) {
        self.cfar.set_scale_override(scale);
    }

    pub fn status(&self) -> CoreStatus {
        CoreStatus {
            window_saturation: self.range_window.saturated() || self.doppler_window.saturated(),
            fft_overflow: self.range_fft.overflowed() || self.doppler_fft.overflowed(),
            notch_saturation: self.notch.saturated(),
            corner_overflow: self.corner_turner.overflow(),
            corner_framing_error: self.corner_turner.framing_error(),
            detections_dropped: self.tracker.detections_dropped(),
            track_file_full: self.tracker.track_file_full(),
            scans_completed: self.tracker.scans_completed(),
            active_tracks: self.tracker.active_count(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Detections seen since the last drain, in raster order.
    pub fn drain_detections(&mut self) -> Vec<Detection> {
        std::mem::take(&mut self.detections)
    }

    pub fn take_scan_summaries(&mut self) -> Vec<ScanSummary> {
        self.tracker.take_scan_summaries()
    }

    pub fn tracker(&self) -> &TrackWhileScanTracker {
        &self.tracker
    }
}

impl ClockedStage for RadarCorePipeline {
    type Input = Sample;
    type Output = TrackReport;

    fn in_ready(&self) -> bool {
        self.range_window.in_ready()
    }

    fn out_beat(&self) -> Option<Beat<TrackReport>> {
        self.reports.out_beat()
    }

    fn tick(&mut self, input: Option<Beat<Sample>>, out_ready: bool) {
        // Committed state of every link, sampled before anything moves.
        let range_window_out = self.range_window.out_beat();
        let range_fft_out = self.range_fft.out_beat();
        let corner_out = self.corner_turner.out_beat();
        let notch_out = self.notch.out_beat();
        let doppler_window_out = self.doppler_window.out_beat();
        let doppler_fft_out = self.doppler_fft.out_beat();
        let magnitude_out = self.magnitude.out_beat();
        let cfar_out = self.cfar.out_beat();
        let tracker_out = self.tracker.out_beat();

        let input_ready = self.range_window.in_ready();
        let range_fft_ready = self.range_fft.in_ready();
        let corner_ready = self.corner_turner.in_ready();
        let notch_ready = self.notch.in_ready();
        let doppler_window_ready = self.doppler_window.in_ready();
        let doppler_fft_ready = self.doppler_fft.in_ready();
        let magnitude_ready = self.magnitude.in_ready();
        let cfar_ready = self.cfar.in_ready();
        let tracker_ready = self.tracker.in_ready();
        let reports_ready = self.reports.in_ready();

        let classified = cfar_out.map(|beat| beat.map(|magnitude| self.indexer.peek(magnitude)));
        let scans_before = self.tracker.scans_completed();

        self.range_window.tick(input, range_fft_ready);
        self.range_fft.tick(range_window_out, corner_ready);
        self.corner_turner.tick(range_fft_out, notch_ready);
        self.notch.tick(corner_out, doppler_window_ready);
        self.doppler_window.tick(notch_out, doppler_fft_ready);
        self.doppler_fft.tick(doppler_window_out, magnitude_ready);
        self.magnitude.tick(doppler_fft_out, cfar_ready);
        self.cfar.tick(magnitude_out, tracker_ready);
        self.tracker.tick(classified, reports_ready);
        self.reports.tick(tracker_out, out_ready);

        if input.is_some() {
            if input_ready {
                self.metrics.record_sample();
            } else {
                self.metrics.record_input_stall();
            }
        }
        if let Some(beat) = classified.filter(|_| tracker_ready) {
            self.indexer.advance();
            self.metrics.record_cell(beat.data.is_hit());
            if beat.data.is_hit() {
                self.detections.push(beat.data);
            }
        }
        if self.tracker.scans_completed() > scans_before {
            let status = self.status();
            self.metrics.record_scan(status.active_tracks);
            self.logger.trace(&format!(
                "scan {} closed, {} active tracks",
                status.scans_completed, status.active_tracks
            ));
        }
    }

    fn reset(&mut self) {
        self.range_window.reset();
        self.range_fft.reset();
        self.corner_turner.reset();
        self.notch.reset();
        self.doppler_window.reset();
        self.doppler_fft.reset();
        self.magnitude.reset();
        self.cfar.reset();
        self.indexer.reset();
        self.tracker.reset();
        self.reports.reset();
        self.detections.clear();
        self.metrics.clear();
        self.logger.record("reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::TrackStatus;
    use crate::prelude::{FftScaling, WindowConfig, WindowKind};
    use crate::stream::{drive, rows_to_beats};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const N_RANGE: usize = 32;
    const N_DOPPLER: usize = 16;
    const TARGET_RANGE: usize = 10;
    const TARGET_DOPPLER: usize = 4;

    fn config() -> CoreConfig {
        CoreConfig {
            geometry: FrameGeometry {
                n_range: N_RANGE,
                n_doppler: N_DOPPLER,
            },
            window: WindowConfig {
                range: WindowKind::Rectangular,
                doppler: WindowKind::Hann,
            },
            fft: FftScaling {
                range_shift: 5,
                doppler_shift: 4,
            },
            ..CoreConfig::default()
        }
    }

    /// Raw chirps carrying one point target plus uniform noise, row-major.
    fn raw_frames(frames: usize, seed: u64) -> Vec<Sample> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut samples = Vec::with_capacity(frames * N_RANGE * N_DOPPLER);
        for _ in 0..frames {
            for chirp in 0..N_DOPPLER {
                for r in 0..N_RANGE {
                    let cycles = (TARGET_RANGE * r) as f64 / N_RANGE as f64
                        + (TARGET_DOPPLER * chirp) as f64 / N_DOPPLER as f64;
                    let phase = 2.0 * std::f64::consts::PI * cycles;
                    let i = 1000.0 * phase.cos() + rng.gen_range(-200.0..200.0);
                    let q = 1000.0 * phase.sin() + rng.gen_range(-200.0..200.0);
                    samples.push(Sample::new(i.round() as i16, q.round() as i16));
                }
            }
        }
        samples
    }

    fn run(pipeline: &mut RadarCorePipeline, samples: &[Sample]) -> Vec<Beat<TrackReport>> {
        drive(pipeline, rows_to_beats(samples, N_RANGE), |_| true, 4 * N_RANGE * N_DOPPLER)
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = config();
        config.tracker.max_tracks = 0;
        assert!(RadarCorePipeline::new(&config).is_err());
    }

    #[test]
    fn cell_indexer_wraps_at_frame_end() {
        let geometry = FrameGeometry {
            n_range: 2,
            n_doppler: 4,
        };
        let mut indexer = CellIndexer::new(geometry, 6);
        assert_eq!(indexer.peek(9), Detection::new(1, 2, 9));
        indexer.advance();
        indexer.advance();
        assert_eq!(indexer.peek(1), Detection::new(0, 0, 1));
        indexer.reset();
        assert_eq!(indexer.peek(1), Detection::new(1, 2, 1));
    }

    #[test]
    fn point_target_becomes_firm_track() {
        let mut pipeline = RadarCorePipeline::new(&config()).unwrap();
        let reports = run(&mut pipeline, &raw_frames(8, 7));

        assert!(!reports.is_empty());
        assert!(reports
            .iter()
            .all(|beat| beat.data.status != TrackStatus::Tentative));
        assert!(reports.iter().any(|beat| {
            let report = beat.data;
            report.status == TrackStatus::Firm
                && (i32::from(report.range_q2) - 4 * TARGET_RANGE as i32).abs() <= 4
                && (i32::from(report.doppler_q2) - 4 * TARGET_DOPPLER as i32).abs() <= 4
        }));

        let detections = pipeline.drain_detections();
        assert!(detections
            .iter()
            .any(|d| d.range_bin as usize == TARGET_RANGE && d.doppler_bin as usize == TARGET_DOPPLER));

        let status = pipeline.status();
        assert!(status.scans_completed >= 5);
        assert!(!status.corner_overflow);
        assert!(!status.corner_framing_error);
        assert!(!status.window_saturation);
        assert!(status.active_tracks >= 1);

        let metrics = pipeline.metrics();
        assert_eq!(metrics.samples_ingested, (8 * N_RANGE * N_DOPPLER) as u64);
        assert_eq!(metrics.input_stalls, 0);
        assert_eq!(metrics.scans, status.scans_completed);
    }

    #[test]
    fn sustains_one_sample_per_tick_across_many_scans() {
        const FRAMES: usize = 24;
        let mut pipeline = RadarCorePipeline::new(&config()).unwrap();
        let beats = rows_to_beats(&raw_frames(FRAMES, 19), N_RANGE);

        let mut stalls = 0;
        for beat in beats {
            while !pipeline.in_ready() {
                stalls += 1;
                pipeline.tick(Some(beat), true);
            }
            pipeline.tick(Some(beat), true);
        }
        for _ in 0..2 * N_RANGE * N_DOPPLER {
            pipeline.tick(None, true);
        }

        let status = pipeline.status();
        assert_eq!(stalls, 0);
        assert!(!status.corner_overflow);
        assert!(status.scans_completed >= 20, "{} scans", status.scans_completed);
        let metrics = pipeline.metrics();
        assert_eq!(metrics.samples_ingested, (FRAMES * N_RANGE * N_DOPPLER) as u64);
        assert_eq!(metrics.input_stalls, 0);
    }

    #[test]
    fn summaries_match_streamed_reports() {
        let mut pipeline = RadarCorePipeline::new(&config()).unwrap();
        let reports = run(&mut pipeline, &raw_frames(6, 3));
        let summaries = pipeline.take_scan_summaries();
        let summarized: Vec<TrackReport> = summaries.iter().flat_map(|s| s.tracks.clone()).collect();
        let streamed: Vec<TrackReport> = reports.iter().map(|b| b.data).collect();
        assert_eq!(summarized, streamed);
    }

    #[test]
    fn reset_replays_identically() {
        let samples = raw_frames(6, 11);
        let mut pipeline = RadarCorePipeline::new(&config()).unwrap();
        let first = run(&mut pipeline, &samples);
        let first_summaries = pipeline.take_scan_summaries();
        let first_status = pipeline.status();

        // Reset mid-frame as well as between runs.
        run(&mut pipeline, &samples[..N_RANGE * 3 + 5]);
        pipeline.reset();
        assert_eq!(pipeline.status(), CoreStatus::default());
        assert_eq!(pipeline.metrics(), MetricsSnapshot::default());
        assert!(pipeline.drain_detections().is_empty());

        let second = run(&mut pipeline, &samples);
        assert_eq!(first, second);
        assert_eq!(first_summaries, pipeline.take_scan_summaries());
        assert_eq!(first_status, pipeline.status());
    }

    #[test]
    fn scale_override_reverts_on_reset() {
        let mut pipeline = RadarCorePipeline::new(&config()).unwrap();
        pipeline.set_scale_override(u32::MAX);
        pipeline.set_bypass(true);
        run(&mut pipeline, &raw_frames(3, 5));
        assert!(pipeline.drain_detections().is_empty());

        pipeline.reset();
        run(&mut pipeline, &raw_frames(3, 5));
        assert!(!pipeline.drain_detections().is_empty());
    }
}
