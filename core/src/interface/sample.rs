use num_complex::Complex;

/// Complex fixed-point sample: 16-bit two's-complement I and Q.
pub type Sample = Complex<i16>;

/// Packs a sample as I in the low half, Q in the high half.
pub fn pack_sample(sample: Sample) -> u32 {
    u32::from(sample.re as u16) | (u32::from(sample.im as u16) << 16)
}

pub fn unpack_sample(word: u32) -> Sample {
    Sample::new(word as u16 as i16, (word >> 16) as u16 as i16)
}
