use serde::{Deserialize, Serialize};

/// Physical scaling of bin indices for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarUnits {
    pub max_range_km: f64,
    pub wavelength_m: f64,
    pub prf_hz: f64,
}

impl Default for RadarUnits {
    fn default() -> Self {
        Self {
            max_range_km: 120.0,
            wavelength_m: 0.1,
            prf_hz: 8000.0,
        }
    }
}

impl RadarUnits {
    pub fn range_km(&self, range_bin: f64, n_range: usize) -> f64 {
        range_bin / n_range as f64 * self.max_range_km
    }

    /// Radial velocity of a natural-order Doppler bin; bins at or above
    /// N/2 are negative frequencies.
    pub fn velocity_mps(&self, doppler_bin: f64, n_doppler: usize) -> f64 {
        let n = n_doppler as f64;
        let signed = if doppler_bin >= n / 2.0 {
            doppler_bin - n
        } else {
            doppler_bin
        };
        signed * self.prf_hz / n * self.wavelength_m / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_half_bins_are_receding() {
        let units = RadarUnits::default();
        assert_eq!(units.velocity_mps(0.0, 128), 0.0);
        assert!(units.velocity_mps(5.0, 128) > 0.0);
        assert!((units.velocity_mps(118.0, 128) + 10.0 * 8000.0 / 128.0 * 0.05).abs() < 1e-9);
        assert_eq!(units.range_km(512.0, 1024), 60.0);
    }
}
