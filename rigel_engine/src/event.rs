//! Bounded, time-ordered event sequence shared between the engine and a
//! plugin's event ports (§3 "Event buffer", §4.2).

use rigel_shared::{ControlEvent, ControlEventType, MidiEvent};

#[derive(Debug, Clone, Copy)]
pub enum Event {
    Null,
    Control(ControlEvent),
    Midi(MidiEvent),
}

impl Event {
    pub fn time(&self) -> u32 {
        match self {
            Event::Null => 0,
            Event::Control(c) => c.time,
            Event::Midi(m) => m.time,
        }
    }

    /// Channel extracted from the status nibble for MIDI, carried
    /// explicitly for control events.
    pub fn channel(&self) -> Option<u8> {
        match self {
            Event::Null => None,
            Event::Control(c) => Some(c.channel),
            Event::Midi(m) => Some(m.channel),
        }
    }
}

/// Fixed-capacity, insertion-stable-ordered buffer. Writers append in
/// any order; [`EventBuffer::stable_sort_by_time`] restores ascending
/// time order while preserving insertion order among ties, which is the
/// contract §4.2 requires when the engine merges multiple sources into
/// one plugin input.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Event>,
    capacity: usize,
}

impl EventBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { events: Vec::with_capacity(capacity), capacity }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Event> {
        self.events.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Appends, dropping silently (not an error — the RT thread cannot
    /// report) once `capacity` is reached.
    fn push(&mut self, event: Event) -> bool {
        if self.events.len() >= self.capacity {
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn push_control(&mut self, event: ControlEvent) -> bool {
        self.push(Event::Control(event))
    }

    pub fn push_midi(&mut self, event: MidiEvent) -> bool {
        self.push(Event::Midi(event))
    }

    /// Stable sort by ascending `time`; ties keep their relative
    /// insertion order because `sort_by_key` in `std` is stable.
    pub fn stable_sort_by_time(&mut self) {
        self.events.sort_by_key(Event::time);
    }

    /// Merges `other` into `self` in time-stable order, used when the
    /// engine combines system MIDI with UI-injected notes into one
    /// plugin input buffer (§4.2).
    pub fn merge_from(&mut self, other: &EventBuffer) {
        for event in other.iter() {
            if !self.push(*event) {
                break;
            }
        }
        self.stable_sort_by_time();
    }

    /// `time < frames` invariant check (§3).
    pub fn all_within(&self, frames: u32) -> bool {
        self.events.iter().all(|e| e.time() < frames)
    }
}

pub fn decode_midi_channel(status: u8) -> u8 {
    status & 0x0F
}

pub fn control_event_from_midi_cc(time: u32, channel: u8, controller: u8, value: u8) -> ControlEvent {
    ControlEvent {
        time,
        channel,
        kind: ControlEventType::ParameterChange,
        param: controller as u32,
        value: value as f32 / 127.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midi(time: u32) -> MidiEvent {
        MidiEvent { time, channel: 0, data: [0x90, 60, 100], size: 3 }
    }

    #[test]
    fn merge_preserves_time_order_and_ties() {
        let mut a = EventBuffer::with_capacity(8);
        a.push_midi(midi(5));
        a.push_midi(midi(1));
        let mut b = EventBuffer::with_capacity(8);
        b.push_midi(midi(1));
        b.push_midi(midi(3));

        a.merge_from(&b);
        let times: Vec<u32> = a.iter().map(Event::time).collect();
        assert_eq!(times, vec![1, 1, 3, 5]);
    }

    #[test]
    fn drops_past_capacity() {
        let mut buf = EventBuffer::with_capacity(1);
        assert!(buf.push_midi(midi(0)));
        assert!(!buf.push_midi(midi(1)));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn all_within_respects_frame_bound() {
        let mut buf = EventBuffer::with_capacity(4);
        buf.push_midi(midi(10));
        assert!(buf.all_within(11));
        assert!(!buf.all_within(10));
    }
}
