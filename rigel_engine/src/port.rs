//! Port abstractions a [`crate::client::Client`] exposes to the engine.
//!
//! A port's `is_input` flag and its process-mode affiliation are fixed at
//! construction; only the buffer it wraps changes call to call.

use rigel_shared::{ControlEvent, ControlEventType, MidiEvent};

use crate::event::EventBuffer;

/// What an audio routing slot looks like before it is bound to a real
/// buffer. Rack mode never uses `Null`; patchbay ports that aren't wired
/// to anything process through one so per-plugin code stays uniform.
#[derive(Debug)]
pub enum Port {
    Null(NullPort),
    Audio(AudioPort),
    Event(EventPort),
}

#[derive(Debug, Default)]
pub struct NullPort {
    pub is_input: bool,
}

/// Float buffer. The pointer backing `buffer` is only valid for the
/// duration of the process call that set it via [`AudioPort::bind`].
#[derive(Debug, Default)]
pub struct AudioPort {
    pub is_input: bool,
    buffer: Vec<f32>,
}

impl AudioPort {
    pub fn new(is_input: bool) -> Self {
        Self { is_input, buffer: Vec::new() }
    }

    /// Rebinds the port to an externally owned buffer by copying it in
    /// (rack mode plugins each own their slice of the shared track
    /// buffer, so "binding" means "own a scratch copy sized to match").
    pub fn bind(&mut self, frames: usize) {
        if self.buffer.len() != frames {
            self.buffer.resize(frames, 0.0);
        } else {
            self.buffer.iter_mut().for_each(|s| *s = 0.0);
        }
    }

    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }
}

/// Ordered event queue. Inputs expose a read view over events already
/// merged in time-stable order; outputs accept writes that silently drop
/// once the fixed capacity is exhausted (§4.1).
#[derive(Debug)]
pub struct EventPort {
    pub is_input: bool,
    buffer: EventBuffer,
}

impl EventPort {
    pub fn new(is_input: bool, capacity: usize) -> Self {
        Self { is_input, buffer: EventBuffer::with_capacity(capacity) }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn event_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn get_event(&self, i: usize) -> Option<&crate::event::Event> {
        self.buffer.get(i)
    }

    pub fn events(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn events_mut(&mut self) -> &mut EventBuffer {
        &mut self.buffer
    }

    /// Drops the event rather than erroring if the buffer is full,
    /// matching the "never fail a process call" RT contract.
    pub fn write_control_event(
        &mut self,
        time: u32,
        channel: u8,
        kind: ControlEventType,
        param: u32,
        value: f32,
    ) {
        let _ = self.buffer.push_control(ControlEvent { time, channel, kind, param, value });
    }

    pub fn write_midi_event(&mut self, time: u32, channel: u8, data: [u8; 3], size: u8) {
        let _ = self.buffer.push_midi(MidiEvent { time, channel, data, size });
    }
}

impl Port {
    pub fn is_input(&self) -> bool {
        match self {
            Port::Null(p) => p.is_input,
            Port::Audio(p) => p.is_input,
            Port::Event(p) => p.is_input,
        }
    }

    /// Called on every process call before routing to (re)bind the port
    /// to this call's buffer.
    pub fn init_buffer(&mut self, frames: usize) {
        match self {
            Port::Null(_) => {}
            Port::Audio(p) => p.bind(frames),
            Port::Event(p) => p.clear(),
        }
    }

    pub fn as_audio(&self) -> Option<&AudioPort> {
        match self {
            Port::Audio(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_audio_mut(&mut self) -> Option<&mut AudioPort> {
        match self {
            Port::Audio(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventPort> {
        match self {
            Port::Event(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_event_mut(&mut self) -> Option<&mut EventPort> {
        match self {
            Port::Event(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_port_drops_writes_past_capacity() {
        let mut port = EventPort::new(false, 2);
        port.write_control_event(0, 0, ControlEventType::ParameterChange, 1, 0.5);
        port.write_control_event(1, 0, ControlEventType::ParameterChange, 2, 0.5);
        port.write_control_event(2, 0, ControlEventType::ParameterChange, 3, 0.5);
        assert_eq!(port.event_count(), 2);
    }

    #[test]
    fn audio_port_rebind_resizes_and_zeroes() {
        let mut port = AudioPort::new(true);
        port.bind(64);
        port.buffer_mut()[0] = 1.0;
        port.bind(64);
        assert_eq!(port.buffer()[0], 0.0);
    }
}
