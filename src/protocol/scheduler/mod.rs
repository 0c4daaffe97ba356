//! Transmission timing for outbound frames.
//!
//! The scheduler is driven by a periodic tick and keeps one timing state
//! per frame. Three patterns exist: purely periodic frames, purely
//! event-driven frames debounced by a minimum distance, and mixed frames
//! that fall back to a periodic send when no event fires.
//!
//! The scheduler itself never touches the bus. The dispatch loop asks for
//! the frames currently due, performs the sends, and acknowledges each
//! success. A frame whose send was rejected stays due and is retried on
//! the next tick.
use crate::core::{Direction, FrameDescriptor, HandlerIndex, SendMode};
use crate::error::RegistryError;

//==================================================================================SCHEDULE_STATE

#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Per-frame timing state.
pub struct ScheduleState {
    /// Milliseconds elapsed since the last successful send.
    elapsed_ms: u32,
    /// An accepted event trigger awaits transmission.
    pending: bool,
    /// The frame has been sent at least once.
    sent_once: bool,
}

//==================================================================================TX_SCHEDULER

/// Timing engine over the full descriptor table. `N` must match the table
/// length; inbound descriptors occupy their slot but never become due.
pub struct TxScheduler<'a, const N: usize> {
    frames: &'a [FrameDescriptor],
    states: [ScheduleState; N],
}

/// The bus driver refused a frame; the scheduler keeps it due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendRejected;

impl<'a, const N: usize> TxScheduler<'a, N> {
    /// Build the scheduler over a descriptor table.
    pub fn new(frames: &'a [FrameDescriptor]) -> Result<Self, RegistryError> {
        if frames.len() != N {
            return Err(RegistryError::CapacityMismatch {
                capacity: N,
                count: frames.len(),
            });
        }
        Ok(Self {
            frames,
            states: [ScheduleState::default(); N],
        })
    }

    /// Request an event-driven transmission of a frame.
    ///
    /// The trigger is accepted when the frame was never sent or when its
    /// minimum distance has elapsed since the last send; otherwise it is
    /// dropped, not queued, and the caller may simply trigger again
    /// later. Returns whether the trigger was accepted.
    ///
    /// Triggers on periodic or inbound frames are always rejected.
    pub fn trigger(&mut self, handler: HandlerIndex) -> bool {
        let idx = handler.as_usize();
        let Some(desc) = self.frames.get(idx) else {
            return false;
        };
        if desc.direction != Direction::Outbound {
            return false;
        }
        if !matches!(desc.send_mode, SendMode::Event | SendMode::Mixed) {
            return false;
        }

        let state = &mut self.states[idx];
        if state.sent_once && state.elapsed_ms < desc.ti_min_distance_ms {
            return false;
        }
        state.pending = true;
        true
    }

    /// Advance every timing state by one tick interval.
    pub fn advance(&mut self, dt_ms: u32) {
        for (desc, state) in self.frames.iter().zip(self.states.iter_mut()) {
            if desc.direction == Direction::Outbound {
                state.elapsed_ms = state.elapsed_ms.saturating_add(dt_ms);
            }
        }
    }

    /// The frames currently due for transmission, in handler order.
    pub fn due(&self) -> impl Iterator<Item = HandlerIndex> + '_ {
        self.frames
            .iter()
            .zip(self.states.iter())
            .filter(|(desc, state)| Self::is_due(desc, state))
            .map(|(desc, _)| desc.handler)
    }

    fn is_due(desc: &FrameDescriptor, state: &ScheduleState) -> bool {
        if desc.direction != Direction::Outbound {
            return false;
        }
        match desc.send_mode {
            SendMode::Regular => state.elapsed_ms >= desc.ti_cycle_ms,
            SendMode::Event => state.pending,
            SendMode::Mixed => state.pending || state.elapsed_ms >= desc.ti_cycle_ms,
        }
    }

    /// Acknowledge a successful send and clear any pending trigger.
    ///
    /// Periodic frames keep the tick overshoot, so their deadlines stay
    /// anchored to the cycle grid instead of drifting by up to one tick
    /// per send. The carried residual is capped at one cycle: a send
    /// delayed by a long rejection streak does not replay every missed
    /// deadline. Event and mixed frames re-anchor on the send itself; a
    /// triggered mixed send pushes the next periodic deadline a full
    /// cycle away.
    pub fn mark_sent(&mut self, handler: HandlerIndex) {
        let idx = handler.as_usize();
        let Some(desc) = self.frames.get(idx) else {
            return;
        };
        let state = &mut self.states[idx];
        state.elapsed_ms = match desc.send_mode {
            SendMode::Regular => state
                .elapsed_ms
                .saturating_sub(desc.ti_cycle_ms)
                .min(desc.ti_cycle_ms),
            SendMode::Event | SendMode::Mixed => 0,
        };
        state.pending = false;
        state.sent_once = true;
    }

    /// Convenience driver for synchronous callers: advance the clock,
    /// then offer every due frame to `sink`. A frame is acknowledged only
    /// when the sink accepts it; refused frames stay due for the next
    /// tick. Returns the number of frames sent.
    pub fn tick<F>(&mut self, dt_ms: u32, mut sink: F) -> usize
    where
        F: FnMut(&FrameDescriptor) -> Result<(), SendRejected>,
    {
        self.advance(dt_ms);
        let mut sent = 0;
        for idx in 0..self.frames.len() {
            let desc = &self.frames[idx];
            if !Self::is_due(desc, &self.states[idx]) {
                continue;
            }
            if sink(desc).is_ok() {
                self.mark_sent(desc.handler);
                sent += 1;
            }
        }
        sent
    }
}
