//! Alpha-max/beta-min modulus estimate: max + min/4 + min/8.
//!
//! Two pipeline stages: absolute value with min/max select, then the
//! shift-add weighted sum. Output is 17 bits unsigned.

use crate::interface::Sample;
use crate::prelude::ClockedStage;
use crate::stream::{Beat, OutputPipe};

/// Output width in bits.
pub const MAGNITUDE_BITS: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MinMax {
    max: u32,
    min: u32,
}

fn select(sample: Sample) -> MinMax {
    let i = i32::from(sample.re).unsigned_abs();
    let q = i32::from(sample.im).unsigned_abs();
    MinMax {
        max: i.max(q),
        min: i.min(q),
    }
}

fn weighted_sum(mm: MinMax) -> u32 {
    (mm.max + (mm.min >> 2) + (mm.min >> 3)) & ((1 << MAGNITUDE_BITS) - 1)
}

/// Combinational form of the estimate.
pub fn estimate(sample: Sample) -> u32 {
    weighted_sum(select(sample))
}

pub struct MagnitudeEstimator {
    select_stage: Option<Beat<MinMax>>,
    out: OutputPipe<u32>,
}

impl MagnitudeEstimator {
    pub fn new() -> Self {
        Self {
            select_stage: None,
            out: OutputPipe::with_upstream(0, 1),
        }
    }
}

impl Default for MagnitudeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockedStage for MagnitudeEstimator {
    type Input = Sample;
    type Output = u32;

    fn in_ready(&self) -> bool {
        self.out.can_accept(usize::from(self.select_stage.is_some()))
    }

    fn out_beat(&self) -> Option<Beat<u32>> {
        self.out.head()
    }

    fn tick(&mut self, input: Option<Beat<Sample>>, out_ready: bool) {
        let accepted = input.filter(|_| self.in_ready());
        let summed = self.select_stage.take().map(|beat| beat.map(weighted_sum));
        self.out.advance(summed, out_ready);
        self.select_stage = accepted.map(|beat| beat.map(select));
    }

    fn reset(&mut self) {
        self.select_stage = None;
        self.out.clear();
    }
}
