//! Deferred delivery of presentation effects.
//!
//! The progression controller mutates state immediately, but the
//! presentation layer wants its effects (path reveals, stage bounces,
//! audio cues) played back in a visually coherent order -- and not at
//! all while an exclusive overlay is up. [`DeferredQueue`] is that
//! scheduler: entries are delivered immediately while the queue is
//! skippable, or queued with per-entry timing metadata and replayed in
//! insertion order once queuing is lifted.
//!
//! There are no real timers here. Scheduling computes absolute fire
//! times against a caller-supplied clock; [`DeferredQueue::take_due`]
//! releases whatever is due at the caller's `now`. Tests drive any
//! clock they like.

use slotmap::SlotMap;

use crate::id::TimerId;

// ---------------------------------------------------------------------------
// Timing metadata
// ---------------------------------------------------------------------------

/// Per-entry timing metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timing {
    /// Offset from the end of the previous entry's slot when replay
    /// respects delays.
    pub delay_ms: u64,
    /// Minimum duration reserved after the entry runs, to keep
    /// subsequent animations from overlapping it.
    pub block_ms: u64,
    /// Bypass queuing entirely; the entry is delivered immediately even
    /// while the queue is closed.
    pub skip_queue: bool,
}

impl Timing {
    /// Deliver immediately, always.
    pub fn immediate() -> Self {
        Self {
            skip_queue: true,
            ..Self::default()
        }
    }

    /// Queue with a delay and no blocking slot.
    pub fn after(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    /// Queue with a delay and a blocking slot.
    pub fn slot(delay_ms: u64, block_ms: u64) -> Self {
        Self {
            delay_ms,
            block_ms,
            skip_queue: false,
        }
    }
}

/// What [`DeferredQueue::add`] did with an entry.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery<T> {
    /// The queue is skippable (or the entry skips it): the caller must
    /// dispatch the payload now.
    Immediate(T),
    /// The entry was appended for later replay.
    Queued,
}

// ---------------------------------------------------------------------------
// Internal entries
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct QueuedEntry<T> {
    payload: T,
    delay_ms: u64,
    block_ms: u64,
    seq: u64,
}

#[derive(Debug)]
struct ScheduledEntry<T> {
    payload: T,
    fire_at_ms: u64,
    seq: u64,
}

// ---------------------------------------------------------------------------
// DeferredQueue
// ---------------------------------------------------------------------------

/// An ordered queue of deferred payloads with immediate-delivery
/// bypass.
///
/// Ordering guarantee: payloads are always delivered in the order they
/// were added; timing only affects *when*, never whether or in what
/// relative order. `take_due` therefore releases a seq-ordered prefix
/// and stops at the first entry that is not yet due.
#[derive(Debug)]
pub struct DeferredQueue<T> {
    /// `true`: new entries are delivered immediately. `false`: queued.
    skippable: bool,
    queued: Vec<QueuedEntry<T>>,
    scheduled: SlotMap<TimerId, ScheduledEntry<T>>,
    next_seq: u64,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeferredQueue<T> {
    /// Create an open (skippable) queue.
    pub fn new() -> Self {
        Self {
            skippable: true,
            queued: Vec::new(),
            scheduled: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    /// Toggle whether newly added entries are delivered immediately
    /// (`true`) or queued (`false`).
    pub fn set_skippable(&mut self, skippable: bool) {
        self.skippable = skippable;
    }

    pub fn is_skippable(&self) -> bool {
        self.skippable
    }

    /// Add an entry. Returns [`Delivery::Immediate`] when the queue is
    /// skippable or the timing bypasses it; the caller dispatches the
    /// payload synchronously. Otherwise the entry is queued.
    pub fn add(&mut self, payload: T, timing: Timing) -> Delivery<T> {
        if self.skippable || timing.skip_queue {
            return Delivery::Immediate(payload);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queued.push(QueuedEntry {
            payload,
            delay_ms: timing.delay_ms,
            block_ms: timing.block_ms,
            seq,
        });
        Delivery::Queued
    }

    /// Move every queued entry onto the timer wheel.
    ///
    /// With `respect_delays`, fire times are cumulative: each entry
    /// fires `delay_ms` after the previous entry's slot (`fire time +
    /// block_ms`) ends, preserving the authored animation sequencing.
    /// Without it (reduced motion), every entry fires at `now` -- still
    /// in insertion order.
    pub fn schedule_queued(&mut self, now_ms: u64, respect_delays: bool) {
        let mut slot_end = now_ms;
        for entry in self.queued.drain(..) {
            let fire_at_ms = if respect_delays {
                slot_end.saturating_add(entry.delay_ms)
            } else {
                now_ms
            };
            slot_end = fire_at_ms.saturating_add(entry.block_ms);
            self.scheduled.insert(ScheduledEntry {
                payload: entry.payload,
                fire_at_ms,
                seq: entry.seq,
            });
        }
    }

    /// Release the scheduled entries that are due at `now_ms`, in
    /// insertion order. Stops at the first entry that is not yet due so
    /// relative order is never violated.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<T> {
        let mut order: Vec<(u64, u64, TimerId)> = self
            .scheduled
            .iter()
            .map(|(key, entry)| (entry.seq, entry.fire_at_ms, key))
            .collect();
        order.sort_by_key(|(seq, _, _)| *seq);

        let mut due = Vec::new();
        for (_, fire_at_ms, key) in order {
            if fire_at_ms > now_ms {
                break;
            }
            if let Some(entry) = self.scheduled.remove(key) {
                due.push(entry.payload);
            }
        }
        due
    }

    /// Release everything -- queued and scheduled -- in insertion
    /// order, ignoring timing. For deterministic tests and teardown.
    pub fn flush(&mut self) -> Vec<T> {
        let mut entries: Vec<(u64, T)> = self
            .queued
            .drain(..)
            .map(|e| (e.seq, e.payload))
            .collect();
        let keys: Vec<TimerId> = self.scheduled.keys().collect();
        for key in keys {
            if let Some(entry) = self.scheduled.remove(key) {
                entries.push((entry.seq, entry.payload));
            }
        }
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, payload)| payload).collect()
    }

    /// Drop queued entries that have not been scheduled yet.
    pub fn clear_queued(&mut self) {
        self.queued.clear();
    }

    /// Cancel every scheduled entry. Nothing stale can fire after this.
    pub fn clear_scheduled(&mut self) {
        self.scheduled.clear();
    }

    /// Cancel one scheduled entry. Returns whether it existed.
    pub fn cancel(&mut self, timer: TimerId) -> bool {
        self.scheduled.remove(timer).is_some()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn scheduled_len(&self) -> usize {
        self.scheduled.len()
    }

    /// Whether nothing is waiting anywhere.
    pub fn is_idle(&self) -> bool {
        self.queued.is_empty() && self.scheduled.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
