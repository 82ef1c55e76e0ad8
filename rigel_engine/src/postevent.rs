//! Bounded MPSC... actually SPSC: the RT thread is the sole producer,
//! the idle thread (or, for single-thread-hint plugins, the UI thread)
//! is the sole consumer (§3, §5). Fixed at 152 slots per plugin.
//!
//! Overflow drops the oldest entry rather than the newest, so a
//! UI that's fallen behind still sees a contiguous recent history
//! instead of getting stuck on stale events; a debug counter tracks how
//! many were lost.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use rigel_shared::MAX_POST_EVENTS;

#[derive(Debug, Clone, Copy)]
pub enum PostEvent {
    Debug,
    ParameterChange { index: i32, value: f32 },
    ProgramChange { index: i32 },
    MidiProgramChange { index: i32 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    Custom,
}

struct Slot {
    occupied: std::sync::atomic::AtomicBool,
    event: std::cell::UnsafeCell<PostEvent>,
}

// SAFETY: exactly one producer (RT thread) writes a slot and flips
// `occupied` after the write; exactly one consumer reads a slot and
// clears `occupied` after the read. The atomic ordering below makes the
// write visible before `occupied` is observed true by the consumer.
unsafe impl Sync for Slot {}

pub struct PostEventQueue {
    slots: Box<[Slot]>,
    capacity: usize,
    head: AtomicU32,
    tail: AtomicU32,
    dropped: AtomicU64,
}

impl PostEventQueue {
    pub fn new() -> Self {
        Self::with_capacity(MAX_POST_EVENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                occupied: std::sync::atomic::AtomicBool::new(false),
                event: std::cell::UnsafeCell::new(PostEvent::Debug),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots, capacity, head: AtomicU32::new(0), tail: AtomicU32::new(0), dropped: AtomicU64::new(0) }
    }

    /// RT-thread producer. Never blocks and never allocates: if the ring
    /// is full, it overwrites the oldest slot and advances `tail` past
    /// it, counting the loss.
    pub fn post(&self, event: PostEvent) {
        let head = self.head.load(Ordering::Relaxed);
        let index = head as usize % self.capacity;
        let slot = &self.slots[index];

        if slot.occupied.load(Ordering::Acquire) {
            self.tail.fetch_add(1, Ordering::AcqRel);
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }

        // SAFETY: single producer; the consumer only touches this slot
        // after observing `occupied == true`, which we set below after
        // the write is complete.
        unsafe {
            *slot.event.get() = event;
        }
        slot.occupied.store(true, Ordering::Release);
        self.head.store(head.wrapping_add(1), Ordering::Release);
    }

    /// Idle-thread (or single-thread-hint UI thread) consumer.
    pub fn drain(&self) -> Vec<PostEvent> {
        let mut out = Vec::new();
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);
            if tail == head {
                break;
            }
            let index = tail as usize % self.capacity;
            let slot = &self.slots[index];
            if !slot.occupied.load(Ordering::Acquire) {
                break;
            }
            // SAFETY: only the consumer reaches here, and only for a
            // slot it has not yet cleared.
            let event = unsafe { *slot.event.get() };
            slot.occupied.store(false, Ordering::Release);
            self.tail.store(tail.wrapping_add(1), Ordering::Release);
            out.push(event);
        }
        out
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for PostEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_order_for_events_posted_before_drain() {
        let queue = PostEventQueue::with_capacity(8);
        queue.post(PostEvent::NoteOn { channel: 0, note: 60, velocity: 100 });
        queue.post(PostEvent::NoteOff { channel: 0, note: 60 });
        let drained = queue.drain();
        assert!(matches!(drained[0], PostEvent::NoteOn { .. }));
        assert!(matches!(drained[1], PostEvent::NoteOff { .. }));
    }

    #[test]
    fn overflow_drops_oldest_and_counts_it() {
        let queue = PostEventQueue::with_capacity(2);
        queue.post(PostEvent::ProgramChange { index: 0 });
        queue.post(PostEvent::ProgramChange { index: 1 });
        queue.post(PostEvent::ProgramChange { index: 2 });
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], PostEvent::ProgramChange { index: 1 }));
        assert!(matches!(drained[1], PostEvent::ProgramChange { index: 2 }));
        assert_eq!(queue.dropped_count(), 1);
    }
}
