//! MTI clutter canceller applied along each Doppler row.

use crate::interface::Sample;
use crate::math::fixed::saturate_i16;
use crate::prelude::{ClockedStage, NotchConfig, NotchMode};
use crate::stream::{Beat, OutputPipe};
use crate::telemetry::log::LogManager;

pub struct DopplerNotch {
    config: NotchConfig,
    bypass: bool,
    /// x[n-1], x[n-2]; cleared at every row end.
    delay: [Sample; 2],
    out: OutputPipe<Sample>,
    saturated: bool,
    logger: LogManager,
}

impl DopplerNotch {
    pub fn new(config: &NotchConfig) -> Self {
        let logger = LogManager::new("doppler_notch");
        logger.record(&format!(
            "mode {:?}, bypass {}",
            config.mode, config.bypass
        ));
        Self {
            config: *config,
            bypass: config.bypass,
            delay: [Sample::new(0, 0); 2],
            out: OutputPipe::new(0),
            saturated: false,
            logger,
        }
    }

    /// Runtime bypass input; reset restores the configured value.
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn bypass(&self) -> bool {
        self.bypass
    }

    /// Sticky arithmetic saturation flag.
    pub fn saturated(&self) -> bool {
        self.saturated
    }

    fn cancel(&mut self, x: Sample) -> Sample {
        let [x1, x2] = self.delay;
        let (re, im) = match self.config.mode {
            NotchMode::TwoPulse => (
                i64::from(x.re) - i64::from(x1.re),
                i64::from(x.im) - i64::from(x1.im),
            ),
            NotchMode::ThreePulse => (
                i64::from(x.re) - 2 * i64::from(x1.re) + i64::from(x2.re),
                i64::from(x.im) - 2 * i64::from(x1.im) + i64::from(x2.im),
            ),
        };
        let re = saturate_i16(re);
        let im = saturate_i16(im);
        if re.clipped || im.clipped {
            self.logger
                .anomaly(&mut self.saturated, "canceller output saturated");
        }
        Sample::new(re.value, im.value)
    }
}

impl ClockedStage for DopplerNotch {
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
            let y = if self.bypass { beat.data } else { self.cancel(beat.data) };
            if beat.last {
                self.delay = [Sample::new(0, 0); 2];
            } else {
                self.delay = [beat.data, self.delay[0]];
            }
            Beat::new(y, beat.last)
        });
        self.out.advance(result, out_ready);
    }

    fn reset(&mut self) {
        self.bypass = self.config.bypass;
        self.delay = [Sample::new(0, 0); 2];
        self.out.clear();
        self.saturated = false;
    }
}
