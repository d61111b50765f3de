use anyhow::bail;
use ndarray::Array2;
use num_complex::Complex;
use radar_core::prelude::FrameGeometry;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One point target as seen after range compression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub range_bin: f64,
    /// Signed Doppler bin; negative values wrap to the upper half.
    pub doppler_bin: f64,
    /// Peak I/Q amplitude in ADC counts.
    pub amplitude: f64,
    /// Range walk in bins per frame.
    pub range_rate: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            range_bin: 100.0,
            doppler_bin: 5.0,
            amplitude: 1000.0,
            range_rate: 0.0,
        }
    }
}

/// Synthetic raw I/Q scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub targets: Vec<TargetConfig>,
    /// Amplitude of stationary clutter on every range sample.
    pub clutter_amplitude: f64,
    /// Half-width of the uniform noise added to I and Q.
    pub noise: f64,
    pub seed: u64,
    pub description: Option<String>,
    pub scenario: Option<String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                TargetConfig::default(),
                TargetConfig {
                    range_bin: 500.0,
                    doppler_bin: -10.0,
                    amplitude: 800.0,
                    range_rate: 0.0,
                },
            ],
            clutter_amplitude: 150.0,
            noise: 200.0,
            seed: 0,
            description: None,
            scenario: Some("two-target baseline".into()),
        }
    }
}

impl ScenarioConfig {
    /// Scenario sized for the reduced 128 x 32 geometry.
    pub fn quick() -> Self {
        Self {
            targets: vec![
                TargetConfig {
                    range_bin: 20.0,
                    doppler_bin: 5.0,
                    amplitude: 1000.0,
                    range_rate: 0.0,
                },
                TargetConfig {
                    range_bin: 80.0,
                    doppler_bin: -6.0,
                    amplitude: 800.0,
                    range_rate: 0.5,
                },
            ],
            scenario: Some("quick two-target".into()),
            ..Self::default()
        }
    }
}

/// Produces row-major raw frames: one row per chirp, one column per range
/// sample.
pub struct ScenarioGenerator {
    config: ScenarioConfig,
    geometry: FrameGeometry,
    clutter: Vec<Complex<f64>>,
    rng: StdRng,
    frame: u64,
}

impl ScenarioGenerator {
    pub fn new(config: ScenarioConfig, geometry: FrameGeometry) -> anyhow::Result<Self> {
        for (idx, target) in config.targets.iter().enumerate() {
            if target.range_bin < 0.0 || target.range_bin >= geometry.n_range as f64 {
                bail!(
                    "target {} range bin {} outside 0..{}",
                    idx,
                    target.range_bin,
                    geometry.n_range
                );
            }
            if target.doppler_bin.abs() >= geometry.n_doppler as f64 {
                bail!(
                    "target {} Doppler bin {} outside +/-{}",
                    idx,
                    target.doppler_bin,
                    geometry.n_doppler
                );
            }
        }
        if config.noise.is_nan() || config.noise < 0.0 {
            bail!("noise amplitude must be non-negative");
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let clutter = (0..geometry.n_range)
            .map(|_| Complex::from_polar(config.clutter_amplitude, rng.gen_range(0.0..2.0 * PI)))
            .collect();

        Ok(Self {
            config,
            geometry,
            clutter,
            rng,
            frame: 0,
        })
    }

    pub fn next_frame(&mut self) -> Array2<Complex<i16>> {
        let FrameGeometry { n_range, n_doppler } = self.geometry;
        let frame_index = self.frame as f64;
        let mut frame = Array2::from_elem((n_doppler, n_range), Complex::new(0i16, 0i16));

        for ((chirp, r), cell) in frame.indexed_iter_mut() {
            let mut value = self.clutter[r];
            for target in &self.config.targets {
                let range = target.range_bin + target.range_rate * frame_index;
                let cycles = range * r as f64 / n_range as f64
                    + target.doppler_bin * chirp as f64 / n_doppler as f64;
                value += Complex::from_polar(target.amplitude, 2.0 * PI * cycles);
            }
            if self.config.noise > 0.0 {
                value += Complex::new(
                    self.rng.gen_range(-self.config.noise..self.config.noise),
                    self.rng.gen_range(-self.config.noise..self.config.noise),
                );
            }
            *cell = Complex::new(to_adc(value.re), to_adc(value.im));
        }

        self.frame += 1;
        frame
    }
}

fn to_adc(value: f64) -> i16 {
    value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}
