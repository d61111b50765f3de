use serde::{Deserialize, Serialize};

/// Lifecycle status, encoded in two bits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    Free = 0,
    Tentative = 1,
    Firm = 2,
    Coast = 3,
}

impl TrackStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            1 => TrackStatus::Tentative,
            2 => TrackStatus::Firm,
            3 => TrackStatus::Coast,
            _ => TrackStatus::Free,
        }
    }

    /// Firm and Coast tracks are externally visible.
    pub fn is_reportable(self) -> bool {
        matches!(self, TrackStatus::Firm | TrackStatus::Coast)
    }
}

/// Externally visible snapshot of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackReport {
    pub id: u8,
    /// Range position, 12-bit Q2.
    pub range_q2: u16,
    /// Doppler position, 9-bit Q2.
    pub doppler_q2: u16,
    /// Range rate, 10-bit signed Q2 per scan.
    pub range_rate: i16,
    /// Doppler rate, 8-bit signed Q2 per scan.
    pub doppler_rate: i8,
    pub quality: u8,
    pub status: TrackStatus,
}

const FIELDS: [(u32, u32); 7] = [
    (0, 6),   // id
    (6, 12),  // range
    (18, 9),  // doppler
    (27, 10), // range rate
    (37, 8),  // doppler rate
    (45, 4),  // quality
    (49, 2),  // status
];

fn put(word: &mut u64, field: usize, value: u64) {
    let (offset, width) = FIELDS[field];
    *word |= (value & ((1u64 << width) - 1)) << offset;
}

fn get(word: u64, field: usize) -> u64 {
    let (offset, width) = FIELDS[field];
    (word >> offset) & ((1u64 << width) - 1)
}

fn sign_extend(value: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

impl TrackReport {
    /// 51-bit track tuple.
    pub fn pack(&self) -> u64 {
        let mut word = 0u64;
        put(&mut word, 0, u64::from(self.id));
        put(&mut word, 1, u64::from(self.range_q2));
        put(&mut word, 2, u64::from(self.doppler_q2));
        put(&mut word, 3, self.range_rate as u64);
        put(&mut word, 4, self.doppler_rate as u64);
        put(&mut word, 5, u64::from(self.quality));
        put(&mut word, 6, u64::from(self.status.code()));
        word
    }

    pub fn unpack(word: u64) -> Self {
        Self {
            id: get(word, 0) as u8,
            range_q2: get(word, 1) as u16,
            doppler_q2: get(word, 2) as u16,
            range_rate: sign_extend(get(word, 3), 10) as i16,
            doppler_rate: sign_extend(get(word, 4), 8) as i8,
            quality: get(word, 5) as u8,
            status: TrackStatus::from_code(get(word, 6) as u8),
        }
    }

    /// One line of the track log.
    pub fn log_line(&self) -> String {
        format!(
            "TRK {} R={} D={} VR={} Q={} S={}",
            self.id,
            self.range_q2,
            self.doppler_q2,
            self.range_rate,
            self.quality,
            self.status.code()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_rates_survive_packing() {
        let report = TrackReport {
            id: 63,
            range_q2: 4095,
            doppler_q2: 300,
            range_rate: -512,
            doppler_rate: -3,
            quality: 15,
            status: TrackStatus::Coast,
        };
        let word = report.pack();
        assert!(word < 1u64 << 51);
        assert_eq!(TrackReport::unpack(word), report);
    }

    #[test]
    fn log_line_uses_key_value_fields() {
        let report = TrackReport {
            id: 2,
            range_q2: 400,
            doppler_q2: 20,
            range_rate: -1,
            doppler_rate: 0,
            quality: 7,
            status: TrackStatus::Firm,
        };
        assert_eq!(report.log_line(), "TRK 2 R=400 D=20 VR=-1 Q=7 S=2");
    }

    #[test]
    fn only_firm_and_coast_are_reportable() {
        assert!(!TrackStatus::Tentative.is_reportable());
        assert!(!TrackStatus::Free.is_reportable());
        assert!(TrackStatus::Coast.is_reportable());
    }
}
