//! Double-buffered transpose between row-major chirps and column-major
//! range bins.
//!
//! While one bank is written the other is read. Banks swap exactly once per
//! completed write-frame. A write-frame that completes while the previous
//! read is still draining raises the sticky overflow flag and holds the
//! input until that read finishes, so the swap never tears a frame.

use crate::interface::Sample;
use crate::prelude::{ClockedStage, CornerTurnerConfig, FrameGeometry};
use crate::stream::{Beat, OutputPipe};
use crate::telemetry::log::LogManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankId {
    A,
    B,
}

impl BankId {
    fn other(self) -> Self {
        match self {
            BankId::A => BankId::B,
            BankId::B => BankId::A,
        }
    }
}

/// Ping-pong frame storage. The only access path hands out the write bank
/// mutably and the read bank shared, so the two can never alias.
struct BankPair {
    banks: [Vec<Sample>; 2],
    write: BankId,
}

impl BankPair {
    fn new(cells: usize) -> Self {
        Self {
            banks: [vec![Sample::new(0, 0); cells], vec![Sample::new(0, 0); cells]],
            write: BankId::A,
        }
    }

    /// (write bank, read bank)
    fn split(&mut self) -> (&mut [Sample], &[Sample]) {
        let (a, b) = self.banks.split_at_mut(1);
        match self.write {
            BankId::A => (&mut a[0][..], &b[0][..]),
            BankId::B => (&mut b[0][..], &a[0][..]),
        }
    }

    fn swap(&mut self) {
        self.write = self.write.other();
    }

    fn clear(&mut self) {
        for bank in self.banks.iter_mut() {
            bank.iter_mut().for_each(|s| *s = Sample::new(0, 0));
        }
        self.write = BankId::A;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadCursor {
    range: usize,
    doppler: usize,
    addr: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WriteCursor {
    chirp: usize,
    sample: usize,
    addr: usize,
}

pub struct CornerTurner {
    geometry: FrameGeometry,
    banks: BankPair,
    write: WriteCursor,
    read: Option<ReadCursor>,
    swap_pending: bool,
    frames_completed: u64,
    out: OutputPipe<Sample>,
    overflow: bool,
    framing_error: bool,
    logger: LogManager,
}

impl CornerTurner {
    pub fn new(geometry: FrameGeometry, config: &CornerTurnerConfig) -> Self {
        let logger = LogManager::new("corner_turner");
        logger.record(&format!(
            "{} chirps x {} samples, bank latency {}",
            geometry.n_doppler, geometry.n_range, config.bank_latency
        ));
        Self {
            geometry,
            banks: BankPair::new(geometry.cells()),
            write: WriteCursor::default(),
            read: None,
            swap_pending: false,
            frames_completed: 0,
            out: OutputPipe::new(config.bank_latency),
            overflow: false,
            framing_error: false,
            logger,
        }
    }

    /// Sticky: a write-frame completed before the previous read drained.
    pub fn overflow(&self) -> bool {
        self.overflow
    }

    /// Sticky: an input `last` marker disagreed with the chirp length.
    pub fn framing_error(&self) -> bool {
        self.framing_error
    }

    pub fn write_bank(&self) -> BankId {
        self.banks.write
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    pub fn is_reading(&self) -> bool {
        self.read.is_some()
    }

    /// Issues one read address and steps the cursor; the read ends after
    /// the final column.
    fn issue_read(&mut self, cursor: ReadCursor) -> Beat<Sample> {
        let FrameGeometry { n_range, n_doppler } = self.geometry;
        let (_, read_bank) = self.banks.split();
        let column_end = cursor.doppler + 1 == n_doppler;
        let beat = Beat::new(read_bank[cursor.addr], column_end);

        let next = if column_end {
            ReadCursor {
                range: cursor.range + 1,
                doppler: 0,
                addr: cursor.range + 1,
            }
        } else {
            ReadCursor {
                range: cursor.range,
                doppler: cursor.doppler + 1,
                addr: cursor.addr + n_range,
            }
        };
        self.read = if next.range == n_range { None } else { Some(next) };
        beat
    }

    /// Stores one sample. Returns true when it completed the frame.
    fn write_sample(&mut self, beat: Beat<Sample>) -> bool {
        let FrameGeometry { n_range, n_doppler } = self.geometry;
        let cursor = self.write;
        let (write_bank, _) = self.banks.split();
        write_bank[cursor.addr] = beat.data;

        let chirp_end = cursor.sample + 1 == n_range;
        if beat.last != chirp_end {
            self.logger.anomaly(
                &mut self.framing_error,
                &format!(
                    "last marker at sample {} of chirp {} (chirp length {})",
                    cursor.sample, cursor.chirp, n_range
                ),
            );
        }

        let frame_end = chirp_end && cursor.chirp + 1 == n_doppler;
        self.write = if frame_end {
            WriteCursor::default()
        } else if chirp_end {
            WriteCursor {
                chirp: cursor.chirp + 1,
                sample: 0,
                addr: cursor.addr + 1,
            }
        } else {
            WriteCursor {
                chirp: cursor.chirp,
                sample: cursor.sample + 1,
                addr: cursor.addr + 1,
            }
        };
        frame_end
    }

    fn swap_and_start_read(&mut self) {
        self.banks.swap();
        self.read = Some(ReadCursor {
            range: 0,
            doppler: 0,
            addr: 0,
        });
        self.frames_completed += 1;
    }
}

impl ClockedStage for CornerTurner {
    type Input = Sample;
    type Output = Sample;

    fn in_ready(&self) -> bool {
        !self.swap_pending
    }

    fn out_beat(&self) -> Option<Beat<Sample>> {
        self.out.head()
    }

    fn tick(&mut self, input: Option<Beat<Sample>>, out_ready: bool) {
        let accepted = input.filter(|_| self.in_ready());

        let cursor = self.read.filter(|_| self.out.can_accept(0));
        let fetched = cursor.map(|c| self.issue_read(c));
        self.out.advance(fetched, out_ready);

        let frame_done = match accepted {
            Some(beat) => self.write_sample(beat),
            None => false,
        };

        if frame_done {
            if self.read.is_some() {
                self.logger.anomaly(
                    &mut self.overflow,
                    "write-frame completed before the previous read drained",
                );
                self.swap_pending = true;
            } else {
                self.swap_and_start_read();
            }
        } else if self.swap_pending && self.read.is_none() {
            self.swap_pending = false;
            self.swap_and_start_read();
        }
    }

    fn reset(&mut self) {
        self.banks.clear();
        self.write = WriteCursor::default();
        self.read = None;
        self.swap_pending = false;
        self.frames_completed = 0;
        self.out.clear();
        self.overflow = false;
        self.framing_error = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::MatrixHelper;
    use crate::stream::drive;

    const CHIRPS: usize = 8;
    const RANGE: usize = 16;

    fn geometry() -> FrameGeometry {
        FrameGeometry {
            n_range: RANGE,
            n_doppler: CHIRPS,
        }
    }

    fn turner() -> CornerTurner {
        CornerTurner::new(geometry(), &CornerTurnerConfig { bank_latency: 2 })
    }

    /// Row-major frame where cell (d, r) = d*256 + r; Q carries the frame number.
    fn frame_beats(frame: i16) -> Vec<Beat<Sample>> {
        let mut beats = Vec::with_capacity(CHIRPS * RANGE);
        for d in 0..CHIRPS {
            for r in 0..RANGE {
                beats.push(Beat::new(
                    Sample::new((d * 256 + r) as i16, frame),
                    r + 1 == RANGE,
                ));
            }
        }
        beats
    }

    /// Compares each output frame with the ndarray reference transpose.
    fn check_transposed(outputs: &[Beat<Sample>], frames: usize) {
        assert_eq!(outputs.len(), frames * CHIRPS * RANGE);
        for (frame, chunk) in outputs.chunks(CHIRPS * RANGE).enumerate() {
            let written: Vec<Sample> = frame_beats(frame as i16).iter().map(|b| b.data).collect();
            let written = MatrixHelper::from_raster(CHIRPS, RANGE, written).unwrap();
            let expected = MatrixHelper::raster(MatrixHelper::transpose(written.view()).view());
            let observed: Vec<Sample> = chunk.iter().map(|b| b.data).collect();
            assert_eq!(observed, expected, "frame {}", frame);

            let (r, d) = (RANGE - 1, CHIRPS - 2);
            assert_eq!(chunk[r * CHIRPS + d].data.re, (d * 256 + r) as i16);
            for (k, beat) in chunk.iter().enumerate() {
                assert_eq!(beat.last, (k + 1) % CHIRPS == 0);
            }
        }
    }

    #[test]
    fn transposes_every_completed_frame_exactly_once() {
        let mut ct = turner();
        let inputs: Vec<_> = (0..3).flat_map(frame_beats).collect();
        let outputs = drive(&mut ct, inputs, |_| true, 16);
        check_transposed(&outputs, 3);
        assert!(!ct.overflow());
        assert!(!ct.framing_error());
        assert_eq!(ct.frames_completed(), 3);
    }

    #[test]
    fn first_frame_produces_no_output_while_written() {
        let mut ct = turner();
        for beat in frame_beats(0) {
            assert!(ct.out_beat().is_none());
            assert!(ct.in_ready());
            ct.tick(Some(beat), true);
        }
        assert!(ct.is_reading());
        assert_eq!(ct.write_bank(), BankId::B);
    }

    #[test]
    fn backpressure_delays_but_never_drops() {
        let mut ct = turner();
        let inputs: Vec<_> = (0..4).flat_map(frame_beats).collect();
        let outputs = drive(&mut ct, inputs, |cycle| cycle % 3 != 0, 16);
        check_transposed(&outputs, 4);
    }

    #[test]
    fn stalled_reader_raises_overflow_and_holds_input() {
        let mut ct = turner();
        let inputs: Vec<_> = (0..2).flat_map(frame_beats).collect();
        let mut pending = inputs.into_iter().peekable();
        let mut outputs = Vec::new();
        let mut cycle = 0;
        while pending.peek().is_some() || outputs.len() < 2 * CHIRPS * RANGE {
            let ready = cycle > 3 * CHIRPS * RANGE;
            let presented = pending.peek().copied();
            let accepted = presented.is_some() && ct.in_ready();
            if let Some(beat) = ct.out_beat().filter(|_| ready) {
                outputs.push(beat);
            }
            ct.tick(presented, ready);
            if accepted {
                pending.next();
            }
            cycle += 1;
            assert!(cycle < 10 * CHIRPS * RANGE, "pipeline wedged");
        }
        assert!(ct.overflow());
        check_transposed(&outputs, 2);
    }

    #[test]
    fn misplaced_last_flags_framing_error() {
        let mut ct = turner();
        let mut beats = frame_beats(0);
        beats[3].last = true;
        drive(&mut ct, beats, |_| true, 4);
        assert!(ct.framing_error());
        assert_eq!(ct.frames_completed(), 1);
    }

    #[test]
    fn reset_returns_to_cold_start() {
        let mut ct = turner();
        drive(&mut ct, frame_beats(0), |_| false, 4);
        ct.reset();
        assert!(!ct.is_reading());
        assert!(ct.out_beat().is_none());
        assert_eq!(ct.write_bank(), BankId::A);
        let outputs = drive(&mut ct, frame_beats(0), |_| true, 16);
        check_transposed(&outputs, 1);
    }
}
