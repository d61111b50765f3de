//! Window multiplier collaborator: per-sample multiply against a Q15
//! coefficient table indexed by position within the row.

use std::f64::consts::PI;

use crate::interface::Sample;
use crate::math::fixed::{round_shift, saturate_i16};
use crate::prelude::{ClockedStage, WindowKind};
use crate::stream::{Beat, OutputPipe};
use crate::telemetry::log::LogManager;

const COEFF_FRAC_BITS: u32 = 15;

/// Streaming contract of a window stage.
pub trait WindowMultiplier: ClockedStage<Input = Sample, Output = Sample> + Send {
    /// Sticky saturation flag.
    fn saturated(&self) -> bool;
}

/// Builds a Q15 coefficient table of `len` entries. `None` means unity.
pub fn coefficient_table(kind: WindowKind, len: usize) -> Option<Vec<i16>> {
    let shape = |k: usize| -> f64 {
        let x = 2.0 * PI * k as f64 / len as f64;
        match kind {
            WindowKind::Rectangular => 1.0,
            WindowKind::Hann => 0.5 - 0.5 * x.cos(),
            WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
        }
    };
    match kind {
        WindowKind::Rectangular => None,
        _ => Some(
            (0..len)
                .map(|k| {
                    let q = (shape(k) * f64::from(1u32 << COEFF_FRAC_BITS)).round();
                    q.min(f64::from(i16::MAX)) as i16
                })
                .collect(),
        ),
    }
}

pub struct CoefficientWindow {
    table: Option<Vec<i16>>,
    index: usize,
    out: OutputPipe<Sample>,
    saturated: bool,
    logger: LogManager,
}

impl CoefficientWindow {
    pub fn new(kind: WindowKind, len: usize, name: &'static str) -> Self {
        let logger = LogManager::new(name);
        logger.record(&format!("{:?} window over {} samples", kind, len));
        Self {
            table: coefficient_table(kind, len),
            index: 0,
            out: OutputPipe::new(0),
            saturated: false,
            logger,
        }
    }

    fn apply(&mut self, sample: Sample) -> Sample {
        let coeff = match &self.table {
            None => return sample,
            Some(table) => i64::from(table[self.index % table.len()]),
        };
        let re = saturate_i16(round_shift(i64::from(sample.re) * coeff, COEFF_FRAC_BITS));
        let im = saturate_i16(round_shift(i64::from(sample.im) * coeff, COEFF_FRAC_BITS));
        if re.clipped || im.clipped {
            self.logger.anomaly(&mut self.saturated, "window product saturated");
        }
        Sample::new(re.value, im.value)
    }
}

impl WindowMultiplier for CoefficientWindow {
    fn saturated(&self) -> bool {
        self.saturated
    }
}

impl ClockedStage for CoefficientWindow {
    type Input = Sample;
    type Output = Sample;

    fn in_ready(&self) -> bool {
        self.out.can_accept(0)
    }

    fn out_beat(&self) -> Option<Beat<Sample>> {
        self.out.head()
    }

    fn tick(&mut self, input: Option<Beat<Sample>>, out_ready: bool) {
        let accepted = input.filter(|_| self.in_ready());
        let result = accepted.map(|beat| {
            let y = self.apply(beat.data);
            self.index = if beat.last { 0 } else { self.index + 1 };
            Beat::new(y, beat.last)
        });
        self.out.advance(result, out_ready);
    }

    fn reset(&mut self) {
        self.index = 0;
        self.out.clear();
        self.saturated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{drive, rows_to_beats};

    #[test]
    fn rectangular_is_exact_pass_through() {
        let input: Vec<Sample> = (0..8).map(|k| Sample::new(i16::MAX - k, i16::MIN + k)).collect();
        let mut window = CoefficientWindow::new(WindowKind::Rectangular, 8, "test");
        let out: Vec<Sample> = drive(&mut window, rows_to_beats(&input, 8), |_| true, 3)
            .into_iter()
            .map(|b| b.data)
            .collect();
        assert_eq!(out, input);
    }

    #[test]
    fn hann_starts_at_zero_and_peaks_mid_row() {
        let table = coefficient_table(WindowKind::Hann, 16).unwrap();
        assert_eq!(table[0], 0);
        assert_eq!(table[8], i16::MAX);
        assert!(table[4] > 16_000 && table[4] < 16_800);
    }

    #[test]
    fn index_restarts_each_row() {
        let input = vec![Sample::new(1000, 1000); 8];
        let mut window = CoefficientWindow::new(WindowKind::Hann, 4, "test");
        let out = drive(&mut window, rows_to_beats(&input, 4), |_| true, 3);
        assert_eq!(out[0].data, Sample::new(0, 0));
        assert_eq!(out[4].data, Sample::new(0, 0));
        assert_eq!(out[2].data, out[6].data);
        assert!(!window.saturated());
    }
}
