//! Adaptive 2-D order-statistic CFAR over a raster-order magnitude stream.
//!
//! Rows of the line buffer are range bins, columns are Doppler bins. The
//! window is addressed linearly through the buffer, so a window that runs
//! past a row edge continues into the neighbouring range bin exactly as a
//! shift-register line buffer would.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::math::stats::StatsHelper;
use crate::prelude::{CfarConfig, ClockedStage, FrameGeometry};
use crate::stream::{Beat, OutputPipe};
use crate::telemetry::log::LogManager;

/// Ticks between window assembly and a classified output.
pub const CFAR_LATENCY: usize = 2;

/// Local statistics class used to pick the threshold scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClutterRegion {
    /// Ranked value below half the mean.
    Uniform,
    Nominal,
    /// Ranked value above one and a half times the mean.
    HighClutter,
}

pub fn classify_region(ranked: u32, mean: u32) -> ClutterRegion {
    let ranked = u64::from(ranked) * 2;
    let mean = u64::from(mean);
    if ranked > mean * 3 {
        ClutterRegion::HighClutter
    } else if ranked < mean {
        ClutterRegion::Uniform
    } else {
        ClutterRegion::Nominal
    }
}

pub struct AdaptiveCfar {
    geometry: FrameGeometry,
    config: CfarConfig,
    scale_override: u32,
    line: Array2<u32>,
    ingested: u64,
    /// Linear distance from the window's newest cell to its centre.
    origin: usize,
    reference: Vec<u32>,
    out: OutputPipe<u32>,
}

impl AdaptiveCfar {
    pub fn new(geometry: FrameGeometry, config: &CfarConfig) -> Self {
        let rows = 2 * config.half_range() + 1;
        let origin = config.half_range() * geometry.n_doppler + config.half_doppler();
        LogManager::new("cfar").record(&format!(
            "{}x{} window, {} reference cells, rank {}%, scales {}/{}/{}",
            rows,
            2 * config.half_doppler() + 1,
            config.reference_cells(),
            config.rank_percent,
            config.scale_min,
            config.scale_nominal,
            config.scale_max
        ));
        Self {
            geometry,
            config: *config,
            scale_override: config.scale_override,
            line: Array2::zeros((rows, geometry.n_doppler)),
            ingested: 0,
            origin,
            reference: Vec::with_capacity(config.reference_cells()),
            out: OutputPipe::new(CFAR_LATENCY),
        }
    }

    /// Runtime override; zero restores adaptive scaling.
    pub fn set_scale_override(&mut self, scale: u32) {
        self.scale_override = scale;
    }

    /// Linear raster index of the cell classified by the first output.
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Samples ingested before the window is fully populated.
    pub fn startup_delay(&self) -> usize {
        2 * self.origin
    }

    fn cell(&self, index: usize) -> u32 {
        let n_doppler = self.geometry.n_doppler;
        let rows = self.line.nrows();
        self.line[[(index / n_doppler) % rows, index % n_doppler]]
    }

    fn scale_for(&self, ranked: u32, mean: u32) -> u32 {
        if self.scale_override != 0 {
            return self.scale_override;
        }
        match classify_region(ranked, mean) {
            ClutterRegion::Uniform => self.config.scale_min,
            ClutterRegion::Nominal => self.config.scale_nominal,
            ClutterRegion::HighClutter => self.config.scale_max,
        }
    }

    /// Writes one magnitude into the line buffer and classifies the cell
    /// now at the window centre, once the window is populated.
    fn ingest(&mut self, magnitude: u32) -> Option<Beat<u32>> {
        let n_doppler = self.geometry.n_doppler;
        let newest = self.ingested as usize;
        let rows = self.line.nrows();
        self.line[[(newest / n_doppler) % rows, newest % n_doppler]] = magnitude;
        self.ingested += 1;

        if newest < self.startup_delay() {
            return None;
        }

        let cut = newest - self.origin;
        let hr = self.config.half_range() as isize;
        let hd = self.config.half_doppler() as isize;
        let gr = self.config.guard_range as isize;
        let gd = self.config.guard_doppler as isize;

        let mut reference = std::mem::take(&mut self.reference);
        reference.clear();
        for di in -hr..=hr {
            for dj in -hd..=hd {
                if di.abs() <= gr && dj.abs() <= gd {
                    continue;
                }
                let index = cut as isize + di * n_doppler as isize + dj;
                reference.push(self.cell(index as usize));
            }
        }
        reference.sort_unstable();

        let rank = (reference.len() * self.config.rank_percent as usize / 100)
            .min(reference.len() - 1);
        let ranked = reference[rank];
        let mean = StatsHelper::mean(&reference);
        let threshold = u64::from(ranked) * u64::from(self.scale_for(ranked, mean));
        self.reference = reference;

        let value = self.cell(cut);
        let detected = if u64::from(value) > threshold { value } else { 0 };
        let last = (cut + 1) % self.geometry.cells() == 0;
        Some(Beat::new(detected, last))
    }
}

impl ClockedStage for AdaptiveCfar {
    type Input = u32;
    type Output = u32;

    fn in_ready(&self) -> bool {
        self.out.can_accept(0)
    }

    fn out_beat(&self) -> Option<Beat<u32>> {
        self.out.head()
    }

    fn tick(&mut self, input: Option<Beat<u32>>, out_ready: bool) {
        let accepted = input.filter(|_| self.in_ready());
        let classified = accepted.and_then(|beat| self.ingest(beat.data));
        self.out.advance(classified, out_ready);
    }

    fn reset(&mut self) {
        self.line.fill(0);
        self.ingested = 0;
        self.scale_override = self.config.scale_override;
        self.out.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{drive, rows_to_beats};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const N: usize = 16;

    fn geometry() -> FrameGeometry {
        FrameGeometry {
            n_range: N,
            n_doppler: N,
        }
    }

    /// 3 x 7 window with only the CUT guarded: 20 reference cells.
    fn config() -> CfarConfig {
        CfarConfig {
            guard_range: 0,
            guard_doppler: 0,
            ref_range: 1,
            ref_doppler: 3,
            rank_percent: 75,
            scale_min: 3,
            scale_nominal: 4,
            scale_max: 6,
            scale_override: 0,
        }
    }

    fn noise_frames(frames: usize, seed: u64) -> Vec<u32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..frames * N * N).map(|_| rng.gen_range(100..=130)).collect()
    }

    /// (raster index within its frame, classified value) for each output.
    fn classify(cfar: &mut AdaptiveCfar, map: &[u32]) -> Vec<(usize, u32)> {
        let origin = cfar.origin();
        drive(cfar, rows_to_beats(map, N), |_| true, 8)
            .into_iter()
            .enumerate()
            .map(|(j, beat)| ((origin + j) % (N * N), beat.data))
            .collect()
    }

    #[test]
    fn reference_window_has_twenty_cells() {
        assert_eq!(config().reference_cells(), 20);
    }

    #[test]
    fn strong_target_in_noise_is_detected() {
        let mut map = noise_frames(2, 7);
        let target = 8 * N + 8;
        map[target] = 5000;
        let mut cfar = AdaptiveCfar::new(geometry(), &config());
        let cells = classify(&mut cfar, &map);
        let hits: Vec<_> = cells.iter().filter(|(_, v)| *v > 0).collect();
        assert_eq!(hits, vec![&(target, 5000)]);
    }

    #[test]
    fn pure_noise_yields_bounded_false_alarms() {
        let map = noise_frames(3, 11);
        let mut cfar = AdaptiveCfar::new(geometry(), &config());
        let alarms = classify(&mut cfar, &map)
            .iter()
            .filter(|(_, v)| *v > 0)
            .count();
        assert!(alarms <= 2, "{} false alarms", alarms);
    }

    #[test]
    fn output_suppressed_until_window_populated() {
        let mut cfar = AdaptiveCfar::new(geometry(), &config());
        let delay = cfar.startup_delay();
        assert_eq!(delay, 2 * (N + 3));
        let map = noise_frames(1, 3);
        let outputs = drive(&mut cfar, rows_to_beats(&map[..delay], N), |_| true, 8);
        assert!(outputs.is_empty());
        let outputs = drive(&mut cfar, rows_to_beats(&map[delay..delay + 1], N), |_| true, 8);
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn idle_cycles_do_not_move_the_window() {
        let mut map = noise_frames(2, 5);
        map[5 * N + 2] = 4000;
        let contiguous = classify(&mut AdaptiveCfar::new(geometry(), &config()), &map);

        let mut cfar = AdaptiveCfar::new(geometry(), &config());
        let mut gapped = Vec::new();
        let mut inputs = rows_to_beats(&map, N).into_iter().peekable();
        let mut cycle = 0u64;
        while inputs.peek().is_some() || cycle < 4 * (N * N) as u64 {
            let presented = if cycle % 3 == 1 { None } else { inputs.peek().copied() };
            let accepted = presented.is_some() && cfar.in_ready();
            if let Some(beat) = cfar.out_beat() {
                gapped.push(beat.data);
            }
            cfar.tick(presented, true);
            if accepted {
                inputs.next();
            }
            cycle += 1;
        }
        let contiguous: Vec<u32> = contiguous.into_iter().map(|(_, v)| v).collect();
        assert_eq!(gapped, contiguous);
    }

    #[test]
    fn override_forces_fixed_scale() {
        let mut map = noise_frames(2, 7);
        map[8 * N + 8] = 5000;
        let mut cfar = AdaptiveCfar::new(geometry(), &config());
        cfar.set_scale_override(100);
        assert!(classify(&mut cfar, &map).iter().all(|(_, v)| *v == 0));
        cfar.reset();
        assert!(classify(&mut cfar, &map).iter().any(|(_, v)| *v == 5000));
    }

    fn value_at(cells: &[(usize, u32)], index: usize) -> u32 {
        cells
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, v)| *v)
            .unwrap_or_default()
    }

    #[test]
    fn high_clutter_window_raises_scale_to_max() {
        // Five of the twenty reference cells at 1000: rank 15 lands on 1000
        // against a mean of 250.
        let mut map = vec![0u32; 2 * N * N];
        let target = 8 * N + 8;
        map[target] = 5000;
        for d in 5..=9 {
            map[7 * N + d] = 1000;
        }

        let mut cfar = AdaptiveCfar::new(geometry(), &config());
        assert_eq!(value_at(&classify(&mut cfar, &map), target), 0);

        cfar.reset();
        cfar.set_scale_override(config().scale_nominal);
        assert_eq!(value_at(&classify(&mut cfar, &map), target), 5000);
    }

    #[test]
    fn uniform_window_lowers_scale_to_min() {
        // Four window corners at 2000 over a floor of 100: rank 15 stays at
        // 100 against a mean of 480.
        let mut map = vec![100u32; 2 * N * N];
        let target = 8 * N + 8;
        map[target] = 350;
        for corner in [7 * N + 5, 7 * N + 11, 9 * N + 5, 9 * N + 11] {
            map[corner] = 2000;
        }

        let mut cfar = AdaptiveCfar::new(geometry(), &config());
        assert_eq!(value_at(&classify(&mut cfar, &map), target), 350);

        cfar.reset();
        cfar.set_scale_override(config().scale_nominal);
        assert_eq!(value_at(&classify(&mut cfar, &map), target), 0);
    }

    #[test]
    fn region_classification_thresholds() {
        assert_eq!(classify_region(200, 100), ClutterRegion::HighClutter);
        assert_eq!(classify_region(150, 100), ClutterRegion::Nominal);
        assert_eq!(classify_region(49, 100), ClutterRegion::Uniform);
        assert_eq!(classify_region(0, 0), ClutterRegion::Nominal);
    }

    #[test]
    fn last_marks_final_cell_of_each_frame() {
        let map = noise_frames(3, 1);
        let mut cfar = AdaptiveCfar::new(geometry(), &config());
        let origin = cfar.origin();
        let outputs = drive(&mut cfar, rows_to_beats(&map, N), |_| true, 8);
        for (j, beat) in outputs.iter().enumerate() {
            assert_eq!(beat.last, (origin + j + 1) % (N * N) == 0);
        }
        assert_eq!(outputs.iter().filter(|b| b.last).count(), 2);
    }
}
