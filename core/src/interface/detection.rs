use serde::{Deserialize, Serialize};

const RANGE_BITS: u32 = 10;
const DOPPLER_BITS: u32 = 7;
const MAGNITUDE_BITS: u32 = 17;

/// One classified cell of the range-Doppler map. A magnitude of zero
/// marks a non-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub range_bin: u16,
    pub doppler_bin: u16,
    pub magnitude: u32,
}

impl Detection {
    pub fn new(range_bin: u16, doppler_bin: u16, magnitude: u32) -> Self {
        Self {
            range_bin,
            doppler_bin,
            magnitude,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.magnitude != 0
    }

    /// 34-bit word: range [9:0], doppler [16:10], magnitude [33:17].
    pub fn pack(&self) -> u64 {
        let range = u64::from(self.range_bin) & mask(RANGE_BITS);
        let doppler = u64::from(self.doppler_bin) & mask(DOPPLER_BITS);
        let magnitude = u64::from(self.magnitude) & mask(MAGNITUDE_BITS);
        range | (doppler << RANGE_BITS) | (magnitude << (RANGE_BITS + DOPPLER_BITS))
    }

    pub fn unpack(word: u64) -> Self {
        Self {
            range_bin: (word & mask(RANGE_BITS)) as u16,
            doppler_bin: ((word >> RANGE_BITS) & mask(DOPPLER_BITS)) as u16,
            magnitude: ((word >> (RANGE_BITS + DOPPLER_BITS)) & mask(MAGNITUDE_BITS)) as u32,
        }
    }

    /// One line of the detection log: `range doppler magnitude`.
    pub fn log_line(&self) -> String {
        format!("{} {} {}", self.range_bin, self.doppler_bin, self.magnitude)
    }
}

fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}
