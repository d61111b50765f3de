use crate::interface::Sample;

pub struct StatsHelper;

impl StatsHelper {
    /// Integer mean, truncated.
    pub fn mean(values: &[u32]) -> u32 {
        if values.is_empty() {
            return 0;
        }
        let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
        (sum / values.len() as u64) as u32
    }

    /// Mean of |x|^2 over a complex sequence.
    pub fn average_power(samples: &[Sample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = samples
            .iter()
            .map(|s| {
                let re = f64::from(s.re);
                let im = f64::from(s.im);
                re * re + im * im
            })
            .sum();
        sum / samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_sequence_is_zero() {
        assert_eq!(StatsHelper::mean(&[]), 0);
        assert_eq!(StatsHelper::mean(&[3, 4]), 3);
    }

    #[test]
    fn average_power_sums_both_components() {
        assert_eq!(StatsHelper::average_power(&[Sample::new(3, 4)]), 25.0);
        assert_eq!(StatsHelper::average_power(&[]), 0.0);
    }
}
