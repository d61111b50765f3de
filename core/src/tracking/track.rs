//! Track slots, the fixed-capacity track file and the per-scan detection
//! buffer.

use crate::interface::{Detection, TrackReport, TrackStatus};
use crate::math::fixed::{bin_to_q2, saturate_signed, saturate_unsigned};

pub const RANGE_Q2_BITS: u32 = 12;
pub const DOPPLER_Q2_BITS: u32 = 9;
pub const RANGE_RATE_BITS: u32 = 10;
pub const DOPPLER_RATE_BITS: u32 = 8;
pub const QUALITY_MAX: u8 = 15;

/// One slot of the track file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: u8,
    pub active: bool,
    pub status: TrackStatus,
    /// Q2 range position.
    pub range_q2: i32,
    /// Q2 Doppler position.
    pub doppler_q2: i32,
    /// Q2 range change per scan.
    pub range_rate: i32,
    /// Q2 Doppler change per scan.
    pub doppler_rate: i32,
    pub hit_count: u8,
    pub miss_count: u8,
    pub quality: u8,
    pub age: u16,
}

impl Track {
    pub fn free(id: u8) -> Self {
        Self {
            id,
            active: false,
            status: TrackStatus::Free,
            range_q2: 0,
            doppler_q2: 0,
            range_rate: 0,
            doppler_rate: 0,
            hit_count: 0,
            miss_count: 0,
            quality: 0,
            age: 0,
        }
    }

    /// Eligible for prediction and association.
    pub fn is_live(&self) -> bool {
        self.active && self.status != TrackStatus::Free
    }

    /// Starts a Tentative track on `detection`; the seeding detection
    /// counts as the first hit.
    pub fn initiate(&mut self, detection: &Detection) {
        *self = Self {
            active: true,
            status: TrackStatus::Tentative,
            range_q2: bin_to_q2(detection.range_bin),
            doppler_q2: bin_to_q2(detection.doppler_bin),
            hit_count: 1,
            quality: 1,
            ..Self::free(self.id)
        };
    }

    /// Constant-velocity step of one scan.
    pub fn predict(&mut self) {
        self.range_q2 = clamp_range(self.range_q2 + self.range_rate);
        self.doppler_q2 = clamp_doppler(self.doppler_q2 + self.doppler_rate);
        self.age = self.age.saturating_add(1);
    }

    /// Alpha-beta correction toward `detection`. Gains are Q8.
    pub fn correct(&mut self, detection: &Detection, alpha_q8: i32, beta_q8: i32) {
        let innovation_r = bin_to_q2(detection.range_bin) - self.range_q2;
        let innovation_d = bin_to_q2(detection.doppler_bin) - self.doppler_q2;

        self.range_q2 = clamp_range(self.range_q2 + ((alpha_q8 * innovation_r) >> 8));
        self.doppler_q2 = clamp_doppler(self.doppler_q2 + ((alpha_q8 * innovation_d) >> 8));
        self.range_rate = saturate_signed(
            i64::from(self.range_rate + ((beta_q8 * innovation_r) >> 8)),
            RANGE_RATE_BITS,
        )
        .value as i32;
        self.doppler_rate = saturate_signed(
            i64::from(self.doppler_rate + ((beta_q8 * innovation_d) >> 8)),
            DOPPLER_RATE_BITS,
        )
        .value as i32;
    }

    pub fn report(&self) -> TrackReport {
        TrackReport {
            id: self.id,
            range_q2: self.range_q2 as u16,
            doppler_q2: self.doppler_q2 as u16,
            range_rate: self.range_rate as i16,
            doppler_rate: self.doppler_rate as i8,
            quality: self.quality,
            status: self.status,
        }
    }
}

fn clamp_range(q2: i32) -> i32 {
    saturate_unsigned(i64::from(q2), RANGE_Q2_BITS).value as i32
}

fn clamp_doppler(q2: i32) -> i32 {
    saturate_unsigned(i64::from(q2), DOPPLER_Q2_BITS).value as i32
}

/// Fixed-capacity array of track slots; slot index is the track id.
#[derive(Debug, Clone)]
pub struct TrackFile {
    slots: Vec<Track>,
}

impl TrackFile {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|id| Track::free(id as u8)).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Track] {
        &self.slots
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.slots.get_mut(index)
    }

    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(|t| !t.is_live())
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|t| t.is_live()).count()
    }

    pub fn release(&mut self, index: usize) {
        if let Some(track) = self.slots.get_mut(index) {
            *track = Track::free(track.id);
        }
    }

    pub fn clear(&mut self) {
        for track in self.slots.iter_mut() {
            *track = Track::free(track.id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferedDetection {
    pub detection: Detection,
    pub associated: bool,
}

/// Per-scan detection list; entries beyond capacity are dropped.
#[derive(Debug, Clone)]
pub struct DetectionBuffer {
    entries: Vec<BufferedDetection>,
    capacity: usize,
}

impl DetectionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false when the buffer is full and the detection was dropped.
    pub fn push(&mut self, detection: Detection) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push(BufferedDetection {
            detection,
            associated: false,
        });
        true
    }

    pub fn entries(&self) -> &[BufferedDetection] {
        &self.entries
    }

    pub fn mark_associated(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.associated = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiate_seeds_tentative_track_in_q2() {
        let mut track = Track::free(4);
        track.initiate(&Detection::new(100, 5, 900));
        assert_eq!(track.id, 4);
        assert_eq!(track.status, TrackStatus::Tentative);
        assert_eq!((track.range_q2, track.doppler_q2), (400, 20));
        assert_eq!(track.hit_count, 1);
        assert!(track.is_live());
    }

    #[test]
    fn prediction_clamps_to_field_width() {
        let mut track = Track::free(0);
        track.initiate(&Detection::new(1023, 127, 1));
        track.range_rate = 200;
        track.doppler_rate = -100;
        track.predict();
        assert_eq!(track.range_q2, 4095);
        assert_eq!(track.doppler_q2, 408);
        assert_eq!(track.age, 1);
    }

    #[test]
    fn correction_moves_halfway_with_default_gains() {
        let mut track = Track::free(0);
        track.initiate(&Detection::new(10, 10, 1));
        track.correct(&Detection::new(12, 10, 1), 128, 64);
        assert_eq!(track.range_q2, 44);
        assert_eq!(track.range_rate, 2);
        assert_eq!(track.doppler_q2, 40);
    }

    #[test]
    fn track_file_allocates_first_free_slot() {
        let mut file = TrackFile::new(3);
        file.slot_mut(0).unwrap().initiate(&Detection::new(1, 1, 1));
        assert_eq!(file.first_free(), Some(1));
        assert_eq!(file.active_count(), 1);
        file.release(0);
        assert_eq!(file.first_free(), Some(0));
        assert_eq!(file.slots()[0].status, TrackStatus::Free);
    }

    #[test]
    fn detection_buffer_drops_beyond_capacity() {
        let mut buffer = DetectionBuffer::new(1);
        assert!(buffer.push(Detection::new(1, 1, 1)));
        assert!(!buffer.push(Detection::new(2, 2, 2)));
        assert_eq!(buffer.len(), 1);
    }
}
