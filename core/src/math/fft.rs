use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};

use crate::interface::Sample;
use crate::math::fixed::{round_shift, saturate_i16};

/// Wraps a planned forward `rustfft` transform for fixed-point rows.
pub struct FftHelper {
    fft: std::sync::Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

/// Transformed row plus whether any bin clipped on narrowing.
pub struct FixedRow {
    pub bins: Vec<Sample>,
    pub clipped: bool,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex32::zero(); fft.get_inplace_scratch_len()];
        Self { fft, scratch }
    }

    pub fn len(&self) -> usize {
        self.fft.len()
    }

    /// Forward transform of one row, scaled by 2^-shift and saturated
    /// back to 16-bit components. Short rows are zero-padded.
    pub fn forward_fixed(&mut self, input: &[Sample], shift: u32) -> FixedRow {
        let mut buffer: Vec<Complex32> = input
            .iter()
            .map(|s| Complex32::new(f32::from(s.re), f32::from(s.im)))
            .collect();
        buffer.resize(self.fft.len(), Complex32::zero());

        self.fft.process_with_scratch(&mut buffer, &mut self.scratch);

        let mut clipped = false;
        let bins = buffer
            .iter()
            .map(|bin| {
                let re = saturate_i16(round_shift(bin.re.round() as i64, shift));
                let im = saturate_i16(round_shift(bin.im.round() as i64, shift));
                clipped |= re.clipped || im.clipped;
                Sample::new(re.value, im.value)
            })
            .collect();
        FixedRow { bins, clipped }
    }
}
