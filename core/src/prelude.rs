use serde::{Deserialize, Serialize};

use crate::stream::Beat;

/// Largest range geometry representable by the 10-bit range field.
pub const MAX_RANGE_BINS: usize = 1 << 10;
/// Largest Doppler geometry representable by the 7-bit Doppler field.
pub const MAX_DOPPLER_BINS: usize = 1 << 7;
/// Track ids are 6 bits wide.
pub const MAX_TRACK_SLOTS: usize = 1 << 6;

/// Frame geometry, fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameGeometry {
    /// Samples per chirp (range bins).
    pub n_range: usize,
    /// Chirps per CPI (Doppler bins).
    pub n_doppler: usize,
}

impl FrameGeometry {
    pub fn cells(&self) -> usize {
        self.n_range * self.n_doppler
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            n_range: 1024,
            n_doppler: 128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerTurnerConfig {
    /// Read latency of a bank access, in ticks.
    pub bank_latency: usize,
}

impl Default for CornerTurnerConfig {
    fn default() -> Self {
        Self { bank_latency: 2 }
    }
}

/// Pulse-canceller order of the MTI notch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotchMode {
    /// y[n] = x[n] - x[n-1]
    TwoPulse,
    /// y[n] = x[n] - 2x[n-1] + x[n-2]
    ThreePulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotchConfig {
    pub mode: NotchMode,
    pub bypass: bool,
}

impl Default for NotchConfig {
    fn default() -> Self {
        Self {
            mode: NotchMode::TwoPulse,
            bypass: false,
        }
    }
}

/// Coefficient table loaded into a window multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub range: WindowKind,
    pub doppler: WindowKind,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            range: WindowKind::Hann,
            doppler: WindowKind::Hann,
        }
    }
}

/// Scaling schedules for the two transforms, as total right shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FftScaling {
    pub range_shift: u32,
    pub doppler_shift: u32,
}

impl Default for FftScaling {
    fn default() -> Self {
        Self {
            range_shift: 10,
            doppler_shift: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfarConfig {
    /// Guard half-width along the range (slow) axis.
    pub guard_range: usize,
    /// Guard half-width along the Doppler (fast) axis.
    pub guard_doppler: usize,
    /// Reference depth beyond the guard along the range axis.
    pub ref_range: usize,
    /// Reference depth beyond the guard along the Doppler axis.
    pub ref_doppler: usize,
    /// Percentile of the sorted reference cells used as the noise estimate.
    pub rank_percent: u32,
    /// Scale used when the region looks like uniform noise.
    pub scale_min: u32,
    pub scale_nominal: u32,
    /// Scale used in high-clutter regions.
    pub scale_max: u32,
    /// Forces a fixed scale when non-zero.
    pub scale_override: u32,
}

impl CfarConfig {
    pub fn half_range(&self) -> usize {
        self.guard_range + self.ref_range
    }

    pub fn half_doppler(&self) -> usize {
        self.guard_doppler + self.ref_doppler
    }

    pub fn reference_cells(&self) -> usize {
        let window = (2 * self.half_range() + 1) * (2 * self.half_doppler() + 1);
        let guard = (2 * self.guard_range + 1) * (2 * self.guard_doppler + 1);
        window - guard
    }
}

impl Default for CfarConfig {
    fn default() -> Self {
        Self {
            guard_range: 1,
            guard_doppler: 1,
            ref_range: 2,
            ref_doppler: 2,
            rank_percent: 75,
            scale_min: 3,
            scale_nominal: 4,
            scale_max: 6,
            scale_override: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub max_tracks: usize,
    pub detection_capacity: usize,
    /// Consecutive hits that promote a Tentative track to Firm.
    pub init_hits: u8,
    /// Consecutive misses after which a track slot is freed.
    pub coast_max: u8,
    /// Range gate half-width in bins.
    pub gate_range: u16,
    /// Doppler gate half-width in bins.
    pub gate_doppler: u16,
    /// Position gain, Q8.
    pub alpha_q8: i32,
    /// Velocity gain, Q8.
    pub beta_q8: i32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_tracks: 32,
            detection_capacity: 64,
            init_hits: 3,
            coast_max: 5,
            gate_range: 4,
            gate_doppler: 3,
            alpha_q8: 128,
            beta_q8: 64,
        }
    }
}

/// Shared configuration for the whole core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub geometry: FrameGeometry,
    pub corner_turner: CornerTurnerConfig,
    pub notch: NotchConfig,
    pub window: WindowConfig,
    pub fft: FftScaling,
    pub cfar: CfarConfig,
    pub tracker: TrackerConfig,
}

impl CoreConfig {
    /// Deployed geometry: 1024 range bins by 128 chirps.
    pub fn full() -> Self {
        Self::default()
    }

    /// Reduced geometry used for fast scenario runs.
    pub fn quick() -> Self {
        Self {
            geometry: FrameGeometry {
                n_range: 128,
                n_doppler: 32,
            },
            fft: FftScaling {
                range_shift: 7,
                doppler_shift: 5,
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        let FrameGeometry { n_range, n_doppler } = self.geometry;
        if n_range < 2 || n_range > MAX_RANGE_BINS {
            return Err(CoreError::InvalidConfig(format!(
                "n_range {} outside 2..={}",
                n_range, MAX_RANGE_BINS
            )));
        }
        if n_doppler < 2 || n_doppler > MAX_DOPPLER_BINS {
            return Err(CoreError::InvalidConfig(format!(
                "n_doppler {} outside 2..={}",
                n_doppler, MAX_DOPPLER_BINS
            )));
        }
        if self.corner_turner.bank_latency == 0 {
            return Err(CoreError::InvalidConfig(
                "bank latency must be at least one tick".into(),
            ));
        }

        let cfar = &self.cfar;
        if 2 * cfar.half_doppler() + 1 > n_doppler {
            return Err(CoreError::InvalidConfig(format!(
                "CFAR Doppler extent {} exceeds {} bins",
                2 * cfar.half_doppler() + 1,
                n_doppler
            )));
        }
        if 2 * cfar.half_range() + 1 > n_range {
            return Err(CoreError::InvalidConfig(format!(
                "CFAR range extent {} exceeds {} bins",
                2 * cfar.half_range() + 1,
                n_range
            )));
        }
        if cfar.reference_cells() == 0 {
            return Err(CoreError::InvalidConfig(
                "CFAR window has no reference cells".into(),
            ));
        }
        if cfar.rank_percent == 0 || cfar.rank_percent > 100 {
            return Err(CoreError::InvalidConfig(format!(
                "CFAR rank {} outside 1..=100",
                cfar.rank_percent
            )));
        }
        if !(cfar.scale_min <= cfar.scale_nominal && cfar.scale_nominal <= cfar.scale_max) {
            return Err(CoreError::InvalidConfig(
                "CFAR scales must satisfy min <= nominal <= max".into(),
            ));
        }

        let tracker = &self.tracker;
        if tracker.max_tracks == 0 || tracker.max_tracks > MAX_TRACK_SLOTS {
            return Err(CoreError::InvalidConfig(format!(
                "max_tracks {} outside 1..={}",
                tracker.max_tracks, MAX_TRACK_SLOTS
            )));
        }
        if tracker.detection_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "detection buffer needs at least one slot".into(),
            ));
        }
        if tracker.init_hits == 0 || tracker.coast_max == 0 {
            return Err(CoreError::InvalidConfig(
                "init_hits and coast_max must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Common error type for configuration and collaborator setup.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// A component advanced once per global tick.
///
/// `in_ready` and `out_beat` must depend only on state committed by the
/// previous tick. A transfer happens on the input side when `tick` is
/// given a beat and `in_ready()` held; on the output side when
/// `out_beat()` was `Some` and `out_ready` is true.
pub trait ClockedStage {
    type Input: Copy;
    type Output: Copy;

    fn in_ready(&self) -> bool;
    fn out_beat(&self) -> Option<Beat<Self::Output>>;
    fn tick(&mut self, input: Option<Beat<Self::Input>>, out_ready: bool);
    /// Synchronous, total state clear.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        CoreConfig::full().validate().unwrap();
        CoreConfig::quick().validate().unwrap();
    }

    #[test]
    fn default_cfar_window_has_forty_reference_cells() {
        assert_eq!(CfarConfig::default().reference_cells(), 40);
    }

    #[test]
    fn oversized_geometry_is_rejected() {
        let mut config = CoreConfig::quick();
        config.geometry.n_doppler = 256;
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn cfar_window_wider_than_doppler_axis_is_rejected() {
        let mut config = CoreConfig::quick();
        config.geometry.n_doppler = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_parses_partial_json() {
        let config: CoreConfig = serde_json::from_str(
            r#"{"geometry": {"n_range": 64, "n_doppler": 16}, "notch": {"mode": "three_pulse"}}"#,
        )
        .unwrap();
        assert_eq!(config.geometry.n_range, 64);
        assert_eq!(config.notch.mode, NotchMode::ThreePulse);
        assert_eq!(config.cfar, CfarConfig::default());
    }
}
