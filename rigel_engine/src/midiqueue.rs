//! External MIDI note injection ring (§3, §9): UI code (or an OSC
//! `note_on`/`note_off` message) pushes notes here; the RT thread drains
//! them into the plugin's native MIDI format during `process`.
//!
//! Multiple non-RT producers may push concurrently, so pushes take a
//! short-lived mutex (§9's "non-RT-side lock"); the RT thread is the
//! sole consumer and never blocks on it.

use std::sync::Mutex;

use rigel_shared::MAX_EXTERNAL_MIDI_NOTES;

#[derive(Debug, Clone, Copy)]
pub struct ExternalMidiNote {
    /// `-1` marks an empty slot.
    pub channel: i8,
    pub note: u8,
    pub velocity: u8,
}

impl ExternalMidiNote {
    pub const EMPTY: Self = Self { channel: -1, note: 0, velocity: 0 };

    pub fn is_empty(&self) -> bool {
        self.channel < 0
    }
}

pub struct ExternalMidiQueue {
    slots: Mutex<Vec<ExternalMidiNote>>,
    capacity: usize,
}

impl ExternalMidiQueue {
    pub fn new() -> Self {
        Self::with_capacity(MAX_EXTERNAL_MIDI_NOTES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { slots: Mutex::new(vec![ExternalMidiNote::EMPTY; capacity]), capacity }
    }

    /// Non-RT producer. Finds the first empty slot; silently drops the
    /// note if the ring is full (same "never fail, never report"
    /// discipline as the RT-side buffers).
    pub fn push(&self, note: ExternalMidiNote) -> bool {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.iter_mut().find(|s| s.is_empty()) {
            *slot = note;
            true
        } else {
            false
        }
    }

    /// RT-thread consumer: drains every occupied slot into `out` and
    /// resets them to empty. Takes the same mutex, but contention is
    /// with non-RT producers only and the critical section is a memcpy,
    /// not an unbounded operation.
    pub fn drain_into(&self, out: &mut Vec<ExternalMidiNote>) {
        let mut slots = self.slots.lock().unwrap();
        for slot in slots.iter_mut() {
            if !slot.is_empty() {
                out.push(*slot);
                *slot = ExternalMidiNote::EMPTY;
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ExternalMidiQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_drain_round_trips() {
        let queue = ExternalMidiQueue::with_capacity(4);
        queue.push(ExternalMidiNote { channel: 0, note: 60, velocity: 100 });
        queue.push(ExternalMidiNote { channel: 1, note: 62, velocity: 80 });
        let mut out = Vec::new();
        queue.drain_into(&mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn full_queue_drops_new_pushes() {
        let queue = ExternalMidiQueue::with_capacity(1);
        assert!(queue.push(ExternalMidiNote { channel: 0, note: 60, velocity: 100 }));
        assert!(!queue.push(ExternalMidiNote { channel: 0, note: 61, velocity: 100 }));
    }
}
