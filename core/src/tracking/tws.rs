//! Track-While-Scan tracker.
//!
//! One FSM iteration per scan:
//! Collect -> Predict -> Associate -> Update -> Initiate -> Maintain -> Output.
//! Every state except Collect takes one tick, and Output emits one
//! reportable track per tick. Cells keep arriving throughout: hits for the
//! next scan land in a second detection buffer while the FSM works on the
//! current one, so the tracker never stalls the CFAR stream.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::interface::{Detection, TrackReport, TrackStatus};
use crate::math::fixed::bin_to_q2;
use crate::prelude::{ClockedStage, TrackerConfig};
use crate::stream::{Beat, OutputPipe};
use crate::telemetry::log::LogManager;
use crate::tracking::track::{DetectionBuffer, TrackFile};

/// Scan summaries kept for a supervisor that drains them.
const SUMMARY_HISTORY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwsState {
    Collect,
    Predict,
    Associate,
    Update,
    Initiate,
    Maintain,
    Output,
}

/// What one scan produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan: u64,
    pub detections: usize,
    pub active_tracks: usize,
    pub tracks: Vec<TrackReport>,
}

impl ScanSummary {
    /// Track log lines followed by the scan terminator.
    pub fn log_lines(&self) -> Vec<String> {
        self.tracks
            .iter()
            .map(TrackReport::log_line)
            .chain(std::iter::once(format!("SCAN_END ACTIVE={}", self.active_tracks)))
            .collect()
    }
}

pub struct TrackWhileScanTracker {
    config: TrackerConfig,
    state: TwsState,
    file: TrackFile,
    /// Scan being processed by Predict..Output.
    detections: DetectionBuffer,
    /// Hits for the next scan, gathered in every state.
    collecting: DetectionBuffer,
    /// The next scan's `last` cell arrived while the FSM was still busy.
    scan_pending: bool,
    /// Detection claimed by each slot during Associate.
    assignment: Vec<Option<usize>>,
    active_count: usize,
    reporting: VecDeque<TrackReport>,
    current: ScanSummary,
    summaries: VecDeque<ScanSummary>,
    scans_completed: u64,
    detections_dropped: u64,
    detection_overflow: bool,
    track_file_full: bool,
    out: OutputPipe<TrackReport>,
    logger: LogManager,
}

impl TrackWhileScanTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        let logger = LogManager::new("tws");
        logger.record(&format!(
            "{} slots, {} detections/scan, firm after {} hits, freed after {} misses",
            config.max_tracks, config.detection_capacity, config.init_hits, config.coast_max
        ));
        Self {
            config: *config,
            state: TwsState::Collect,
            file: TrackFile::new(config.max_tracks),
            detections: DetectionBuffer::new(config.detection_capacity),
            collecting: DetectionBuffer::new(config.detection_capacity),
            scan_pending: false,
            assignment: vec![None; config.max_tracks],
            active_count: 0,
            reporting: VecDeque::with_capacity(config.max_tracks),
            current: ScanSummary::default(),
            summaries: VecDeque::new(),
            scans_completed: 0,
            detections_dropped: 0,
            detection_overflow: false,
            track_file_full: false,
            out: OutputPipe::new(0),
            logger,
        }
    }

    pub fn state(&self) -> TwsState {
        self.state
    }

    pub fn track_file(&self) -> &TrackFile {
        &self.file
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed
    }

    pub fn detections_dropped(&self) -> u64 {
        self.detections_dropped
    }

    /// Sticky: a scan held more detections than the buffer.
    pub fn detection_overflow(&self) -> bool {
        self.detection_overflow
    }

    /// Sticky: an unassociated detection found no free slot.
    pub fn track_file_full(&self) -> bool {
        self.track_file_full
    }

    pub fn take_scan_summaries(&mut self) -> Vec<ScanSummary> {
        self.summaries.drain(..).collect()
    }

    fn collect(&mut self, detection: Detection) {
        if !self.collecting.push(detection) {
            self.detections_dropped += 1;
            self.logger.anomaly(
                &mut self.detection_overflow,
                "detection buffer full, dropping detections",
            );
        }
    }

    /// Hands the gathered hits to the FSM and starts a fresh collection.
    fn begin_scan(&mut self) {
        std::mem::swap(&mut self.detections, &mut self.collecting);
        self.collecting.clear();
        self.scan_pending = false;
        self.state = TwsState::Predict;
    }

    fn predict(&mut self) {
        for index in 0..self.file.capacity() {
            if let Some(track) = self.file.slot_mut(index).filter(|t| t.is_live()) {
                track.predict();
            }
        }
    }

    /// Greedy per-track nearest neighbour under rectangular gates. The
    /// first detection to beat the running best wins ties.
    fn associate(&mut self) {
        let gate_range = bin_to_q2(self.config.gate_range);
        let gate_doppler = bin_to_q2(self.config.gate_doppler);

        for (slot, track) in self.file.slots().iter().enumerate() {
            self.assignment[slot] = None;
            if !track.is_live() {
                continue;
            }
            let mut best: Option<(usize, i32)> = None;
            for (index, entry) in self.detections.entries().iter().enumerate() {
                if entry.associated {
                    continue;
                }
                let dr = (bin_to_q2(entry.detection.range_bin) - track.range_q2).abs();
                let dd = (bin_to_q2(entry.detection.doppler_bin) - track.doppler_q2).abs();
                if dr > gate_range || dd > gate_doppler {
                    continue;
                }
                let distance = dr + dd;
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((index, distance));
                }
            }
            if let Some((index, _)) = best {
                self.detections.mark_associated(index);
                self.assignment[slot] = Some(index);
            }
        }
    }

    fn update(&mut self) {
        let TrackerConfig {
            init_hits,
            coast_max,
            alpha_q8,
            beta_q8,
            ..
        } = self.config;

        for slot in 0..self.file.capacity() {
            let assigned = self.assignment[slot].map(|i| self.detections.entries()[i].detection);
            let Some(track) = self.file.slot_mut(slot).filter(|t| t.is_live()) else {
                continue;
            };
            match assigned {
                Some(detection) => {
                    track.correct(&detection, alpha_q8, beta_q8);
                    track.miss_count = 0;
                    track.hit_count = track.hit_count.saturating_add(1);
                    track.quality = (track.quality + 1).min(crate::tracking::track::QUALITY_MAX);
                    track.status = match track.status {
                        TrackStatus::Tentative if track.hit_count >= init_hits => TrackStatus::Firm,
                        TrackStatus::Coast => TrackStatus::Firm,
                        status => status,
                    };
                }
                None => {
                    track.miss_count = track.miss_count.saturating_add(1);
                    track.hit_count = 0;
                    track.quality = track.quality.saturating_sub(1);
                    if track.status == TrackStatus::Firm {
                        track.status = TrackStatus::Coast;
                    }
                    if track.miss_count >= coast_max {
                        self.file.release(slot);
                    }
                }
            }
        }
    }

    fn initiate(&mut self) {
        let unclaimed: Vec<Detection> = self
            .detections
            .entries()
            .iter()
            .filter(|e| !e.associated)
            .map(|e| e.detection)
            .collect();
        for detection in unclaimed {
            match self.file.first_free() {
                Some(slot) => {
                    if let Some(track) = self.file.slot_mut(slot) {
                        track.initiate(&detection);
                    }
                }
                None => {
                    self.logger.anomaly(
                        &mut self.track_file_full,
                        "track file exhausted, detections left uninitiated",
                    );
                    break;
                }
            }
        }
    }

    fn maintain(&mut self) {
        self.active_count = self.file.active_count();
        self.reporting = self
            .file
            .slots()
            .iter()
            .filter(|t| t.is_live() && t.status.is_reportable())
            .map(|t| t.report())
            .collect();
        self.current = ScanSummary {
            scan: self.scans_completed,
            detections: self.detections.len(),
            active_tracks: self.active_count,
            tracks: self.reporting.iter().copied().collect(),
        };
    }

    /// Emits at most one report; finishes the scan once all are out.
    fn output(&mut self) -> Option<Beat<TrackReport>> {
        let mut emitted = None;
        if !self.reporting.is_empty() && self.out.can_accept(0) {
            if let Some(report) = self.reporting.pop_front() {
                emitted = Some(Beat::new(report, self.reporting.is_empty()));
            }
        }
        if self.reporting.is_empty() {
            self.detections.clear();
            self.scans_completed += 1;
            self.logger.trace(&format!(
                "scan {} complete: {} detections, {} active, {} reported",
                self.current.scan,
                self.current.detections,
                self.current.active_tracks,
                self.current.tracks.len()
            ));
            if self.summaries.len() == SUMMARY_HISTORY {
                self.summaries.pop_front();
            }
            self.summaries.push_back(std::mem::take(&mut self.current));
            self.state = TwsState::Collect;
            if self.scan_pending {
                self.begin_scan();
            }
        }
        emitted
    }

    /// Runs one complete FSM iteration over `detections`, presenting them
    /// as a single scan, and returns its summary.
    pub fn process_scan(&mut self, detections: &[Detection]) -> ScanSummary {
        let mut beats: Vec<Beat<Detection>> = detections
            .iter()
            .enumerate()
            .map(|(i, &d)| Beat::new(d, i + 1 == detections.len()))
            .collect();
        if beats.is_empty() {
            beats.push(Beat::new(Detection::new(0, 0, 0), true));
        }

        let target = self.scans_completed + 1;
        let mut pending = beats.into_iter().peekable();
        while self.scans_completed < target {
            let presented = pending.peek().copied();
            let accepted = presented.is_some() && self.in_ready();
            self.tick(presented, true);
            if accepted {
                pending.next();
            }
        }
        self.summaries.back().cloned().unwrap_or_default()
    }
}

impl ClockedStage for TrackWhileScanTracker {
    type Input = Detection;
    type Output = TrackReport;

    /// Refuses cells only when a whole further scan arrived before the
    /// FSM finished the current one.
    fn in_ready(&self) -> bool {
        !self.scan_pending
    }

    fn out_beat(&self) -> Option<Beat<TrackReport>> {
        self.out.head()
    }

    fn tick(&mut self, input: Option<Beat<Detection>>, out_ready: bool) {
        let accepted = input.filter(|_| self.in_ready());
        let mut emitted = None;

        if let Some(beat) = accepted {
            if beat.data.is_hit() {
                self.collect(beat.data);
            }
            if beat.last {
                self.scan_pending = true;
            }
        }

        match self.state {
            TwsState::Collect => {
                if self.scan_pending {
                    self.begin_scan();
                }
            }
            TwsState::Predict => {
                self.predict();
                self.state = TwsState::Associate;
            }
            TwsState::Associate => {
                self.associate();
                self.state = TwsState::Update;
            }
            TwsState::Update => {
                self.update();
                self.state = TwsState::Initiate;
            }
            TwsState::Initiate => {
                self.initiate();
                self.state = TwsState::Maintain;
            }
            TwsState::Maintain => {
                self.maintain();
                self.state = TwsState::Output;
            }
            TwsState::Output => emitted = self.output(),
        }

        self.out.advance(emitted, out_ready);
    }

    fn reset(&mut self) {
        self.state = TwsState::Collect;
        self.file.clear();
        self.detections.clear();
        self.collecting.clear();
        self.scan_pending = false;
        self.assignment.iter_mut().for_each(|a| *a = None);
        self.active_count = 0;
        self.reporting.clear();
        self.current = ScanSummary::default();
        self.summaries.clear();
        self.scans_completed = 0;
        self.detections_dropped = 0;
        self.detection_overflow = false;
        self.track_file_full = false;
        self.out.clear();
    }
}
