//! Two's-complement saturation and Q2 helpers.

/// Fractional bits of track positions.
pub const Q2_BITS: u32 = 2;

/// Result of a saturating narrowing: the clamped value and whether it clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Saturation<T> {
    pub value: T,
    pub clipped: bool,
}

/// Clamps `value` into a signed field of `bits` width.
pub fn saturate_signed(value: i64, bits: u32) -> Saturation<i64> {
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    Saturation {
        value: value.clamp(min, max),
        clipped: value > max || value < min,
    }
}

/// Clamps `value` into an unsigned field of `bits` width.
pub fn saturate_unsigned(value: i64, bits: u32) -> Saturation<i64> {
    let max = (1i64 << bits) - 1;
    Saturation {
        value: value.clamp(0, max),
        clipped: value > max || value < 0,
    }
}

pub fn saturate_i16(value: i64) -> Saturation<i16> {
    let sat = saturate_signed(value, 16);
    Saturation {
        value: sat.value as i16,
        clipped: sat.clipped,
    }
}

/// Arithmetic right shift with round-half-up.
pub fn round_shift(value: i64, shift: u32) -> i64 {
    if shift == 0 {
        value
    } else {
        (value + (1i64 << (shift - 1))) >> shift
    }
}

/// Bin index to Q2.
pub fn bin_to_q2(bin: u16) -> i32 {
    i32::from(bin) << Q2_BITS
}

/// Q2 position to the nearest bin.
pub fn q2_to_bin(q2: i32) -> i32 {
    (q2 + (1 << (Q2_BITS - 1))) >> Q2_BITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_saturation_clips_both_ends() {
        assert_eq!(saturate_i16(40_000), Saturation { value: i16::MAX, clipped: true });
        assert_eq!(saturate_i16(-40_000), Saturation { value: i16::MIN, clipped: true });
        assert_eq!(saturate_i16(-5), Saturation { value: -5, clipped: false });
        assert_eq!(saturate_signed(600, 10).value, 511);
        assert_eq!(saturate_signed(-600, 10).value, -512);
    }

    #[test]
    fn unsigned_saturation_clamps_negatives() {
        assert_eq!(saturate_unsigned(-3, 12).value, 0);
        assert_eq!(saturate_unsigned(5000, 12).value, 4095);
        assert!(!saturate_unsigned(4095, 12).clipped);
    }

    #[test]
    fn q2_round_trip() {
        assert_eq!(bin_to_q2(10), 40);
        assert_eq!(q2_to_bin(41), 10);
        assert_eq!(q2_to_bin(42), 11);
    }

    #[test]
    fn round_shift_rounds_half_up() {
        assert_eq!(round_shift(6, 2), 2);
        assert_eq!(round_shift(5, 2), 1);
        assert_eq!(round_shift(-6, 2), -1);
    }
}
