//! Streaming FFT collaborator.
//!
//! Behaves as a fixed-latency pass-through stream once its one-time
//! configuration handshake has been observed. Refuses data before then.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::interface::Sample;
use crate::math::fft::FftHelper;
use crate::prelude::{ClockedStage, CoreError, CoreResult};
use crate::stream::Beat;
use crate::telemetry::log::LogManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FftDirection {
    Forward,
    Inverse,
}

/// Configuration word delivered before the first data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FftSetup {
    pub direction: FftDirection,
    /// Total right shift applied across the butterfly stages.
    pub scaling_shift: u32,
}

/// Streaming contract of a transform stage.
pub trait FftEngine: ClockedStage<Input = Sample, Output = Sample> + Send {
    fn configure(&mut self, setup: FftSetup) -> CoreResult<()>;
    fn is_configured(&self) -> bool;
    /// Ticks from the first sample of a row to its first output bin.
    fn latency(&self) -> usize;
    /// Sticky flag: a bin clipped when narrowed to 16 bits.
    fn overflowed(&self) -> bool;
}

/// Row-at-a-time transform backed by `rustfft`.
pub struct StreamingFft {
    helper: FftHelper,
    setup: Option<FftSetup>,
    collecting: Vec<Sample>,
    emitting: VecDeque<Beat<Sample>>,
    overflowed: bool,
    logger: LogManager,
}

impl StreamingFft {
    pub fn new(size: usize, name: &'static str) -> Self {
        Self {
            helper: FftHelper::new(size),
            setup: None,
            collecting: Vec::with_capacity(size),
            emitting: VecDeque::with_capacity(2 * size),
            overflowed: false,
            logger: LogManager::new(name),
        }
    }

    fn size(&self) -> usize {
        self.helper.len()
    }

    fn finish_row(&mut self) {
        let shift = self.setup.map(|s| s.scaling_shift).unwrap_or(0);
        let row = self.helper.forward_fixed(&self.collecting, shift);
        if row.clipped {
            self.logger.anomaly(&mut self.overflowed, "transform output clipped");
        }
        let n = row.bins.len();
        self.emitting.extend(
            row.bins
                .into_iter()
                .enumerate()
                .map(|(idx, bin)| Beat::new(bin, idx + 1 == n)),
        );
        self.collecting.clear();
    }
}

impl FftEngine for StreamingFft {
    fn configure(&mut self, setup: FftSetup) -> CoreResult<()> {
        if setup.direction == FftDirection::Inverse {
            return Err(CoreError::Unsupported(
                "only forward transforms are provided".into(),
            ));
        }
        if setup.scaling_shift > 16 {
            return Err(CoreError::InvalidConfig(format!(
                "scaling shift {} exceeds 16",
                setup.scaling_shift
            )));
        }
        self.logger.record(&format!(
            "configured {}-point forward transform, shift {}",
            self.size(),
            setup.scaling_shift
        ));
        self.setup = Some(setup);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.setup.is_some()
    }

    fn latency(&self) -> usize {
        self.size() + 1
    }

    fn overflowed(&self) -> bool {
        self.overflowed
    }
}

impl ClockedStage for StreamingFft {
    type Input = Sample;
    type Output = Sample;

    fn in_ready(&self) -> bool {
        self.setup.is_some() && self.collecting.len() + self.emitting.len() < 2 * self.size()
    }

    fn out_beat(&self) -> Option<Beat<Sample>> {
        self.emitting.front().copied()
    }

    fn tick(&mut self, input: Option<Beat<Sample>>, out_ready: bool) {
        let accepted = input.filter(|_| self.in_ready());
        if out_ready {
            self.emitting.pop_front();
        }
        if let Some(beat) = accepted {
            self.collecting.push(beat.data);
            if beat.last || self.collecting.len() == self.size() {
                self.finish_row();
            }
        }
    }

    /// Clears in-flight rows; the configuration handshake is retained.
    fn reset(&mut self) {
        self.collecting.clear();
        self.emitting.clear();
        self.overflowed = false;
    }
}
