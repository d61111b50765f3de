//! Valid/ready/last flow control shared by every stage boundary.
//!
//! A stage exposes its registered output (`out_beat`) and its registered
//! readiness (`in_ready`). Both are sampled by the orchestrator before any
//! stage ticks, so every stage sees the previous tick's committed state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::prelude::ClockedStage;

/// One item on a stream link. `last` marks the final item of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat<T> {
    pub data: T,
    pub last: bool,
}

impl<T> Beat<T> {
    pub fn new(data: T, last: bool) -> Self {
        Self { data, last }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Beat<U> {
        Beat {
            data: f(self.data),
            last: self.last,
        }
    }
}

/// Splits a flat sequence into rows of `row_len`, marking each row end.
pub fn rows_to_beats<T: Copy>(items: &[T], row_len: usize) -> Vec<Beat<T>> {
    items
        .iter()
        .enumerate()
        .map(|(idx, &data)| Beat::new(data, row_len > 0 && (idx + 1) % row_len == 0))
        .collect()
}

/// Fixed-depth result pipeline feeding a skid FIFO.
///
/// Items entering the pipe surface at the FIFO head `depth` ticks later.
/// `can_accept` counts items still in flight, so a stalled consumer never
/// causes an in-flight item to be lost.
#[derive(Debug, Clone)]
pub struct OutputPipe<T> {
    stages: VecDeque<Option<Beat<T>>>,
    fifo: VecDeque<Beat<T>>,
    capacity: usize,
}

impl<T: Copy> OutputPipe<T> {
    pub fn new(depth: usize) -> Self {
        Self::with_upstream(depth, 0)
    }

    /// Sizes the FIFO to also absorb `upstream` register stages that the
    /// owner keeps outside the pipe.
    pub fn with_upstream(depth: usize, upstream: usize) -> Self {
        let capacity = depth + upstream + 2;
        Self {
            stages: std::iter::repeat(None).take(depth).collect(),
            fifo: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn occupancy(&self) -> usize {
        self.fifo.len() + self.stages.iter().filter(|s| s.is_some()).count()
    }

    /// True when one more item may enter this tick, given `reserved`
    /// items held upstream that will also land here.
    pub fn can_accept(&self, reserved: usize) -> bool {
        self.occupancy() + reserved < self.capacity
    }

    pub fn head(&self) -> Option<Beat<T>> {
        self.fifo.front().copied()
    }

    /// Commits one tick: pops the head if it was consumed, shifts the
    /// pipe and inserts `incoming` at its tail.
    pub fn advance(&mut self, incoming: Option<Beat<T>>, out_ready: bool) {
        if out_ready {
            self.fifo.pop_front();
        }
        let surfaced = match self.stages.pop_front() {
            Some(slot) => {
                self.stages.push_back(incoming);
                slot
            }
            None => incoming,
        };
        if let Some(beat) = surfaced {
            debug_assert!(self.fifo.len() < self.capacity);
            self.fifo.push_back(beat);
        }
    }

    pub fn clear(&mut self) {
        for slot in self.stages.iter_mut() {
            *slot = None;
        }
        self.fifo.clear();
    }
}

/// Bounded point-to-point link. Presents its oldest item and refuses
/// new ones while full.
#[derive(Debug, Clone)]
pub struct StreamChannel<T> {
    queue: VecDeque<Beat<T>>,
    capacity: usize,
}

impl<T: Copy> StreamChannel<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T: Copy> ClockedStage for StreamChannel<T> {
    type Input = T;
    type Output = T;

    fn in_ready(&self) -> bool {
        self.queue.len() < self.capacity
    }

    fn out_beat(&self) -> Option<Beat<T>> {
        self.queue.front().copied()
    }

    fn tick(&mut self, input: Option<Beat<T>>, out_ready: bool) {
        let accept = input.filter(|_| self.in_ready());
        if out_ready {
            self.queue.pop_front();
        }
        if let Some(beat) = accept {
            self.queue.push_back(beat);
        }
    }

    fn reset(&mut self) {
        self.queue.clear();
    }
}

/// Steps `stage` against `inputs`, presenting each beat until it is
/// accepted. `ready` decides downstream readiness per tick. Stops after
/// the inputs are exhausted and `idle_limit` consecutive ticks pass
/// without output.
pub fn drive<S, I, F>(stage: &mut S, inputs: I, mut ready: F, idle_limit: usize) -> Vec<Beat<S::Output>>
where
    S: ClockedStage + ?Sized,
    I: IntoIterator<Item = Beat<S::Input>>,
    F: FnMut(u64) -> bool,
{
    let mut pending = inputs.into_iter().peekable();
    let mut outputs = Vec::new();
    let mut idle = 0usize;
    let mut cycle = 0u64;

    while pending.peek().is_some() || idle < idle_limit {
        let presented = pending.peek().copied();
        let accepted = presented.is_some() && stage.in_ready();
        let downstream_ready = ready(cycle);
        let emitted = stage.out_beat().filter(|_| downstream_ready);

        stage.tick(presented, downstream_ready);

        if accepted {
            pending.next();
        }
        match emitted {
            Some(beat) => {
                outputs.push(beat);
                idle = 0;
            }
            None if pending.peek().is_none() => idle += 1,
            None => {}
        }
        cycle += 1;
    }
    outputs
}
