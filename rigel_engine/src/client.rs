//! Per-plugin audio-graph node: activation state, ports, latency (§4.3).

use rigel_shared::ProcessMode;

use crate::port::{AudioPort, EventPort, Port};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Inactive,
    Active,
}

/// Rack mode gives every client exactly four fixed ports; this mirrors
/// that layout so `add_port` in rack mode can return a handle into it
/// without allocating.
pub struct RackPorts {
    pub audio_in: [usize; 2],
    pub audio_out: [usize; 2],
    pub event_in: usize,
    pub event_out: usize,
}

pub struct Client {
    process_mode: ProcessMode,
    state: ActivationState,
    /// `true` once the underlying driver has accepted the client. Rack
    /// and patchbay clients are synthetic and always report `true`.
    driver_ok: bool,
    ports: Vec<Port>,
    rack_ports: Option<RackPorts>,
    latency_frames: u32,
}

impl Client {
    pub fn new(process_mode: ProcessMode) -> Self {
        let mut client = Self {
            process_mode,
            state: ActivationState::Inactive,
            driver_ok: true,
            ports: Vec::new(),
            rack_ports: None,
            latency_frames: 0,
        };
        if matches!(process_mode, ProcessMode::ContinuousRack) {
            client.init_rack_ports();
        }
        client
    }

    fn init_rack_ports(&mut self) {
        self.ports.push(Port::Audio(AudioPort::new(true)));
        self.ports.push(Port::Audio(AudioPort::new(true)));
        self.ports.push(Port::Audio(AudioPort::new(false)));
        self.ports.push(Port::Audio(AudioPort::new(false)));
        self.ports.push(Port::Event(EventPort::new(true, rigel_shared::MAX_MIDI_EVENTS)));
        self.ports.push(Port::Event(EventPort::new(false, rigel_shared::MAX_MIDI_EVENTS)));
        self.rack_ports = Some(RackPorts {
            audio_in: [0, 1],
            audio_out: [2, 3],
            event_in: 4,
            event_out: 5,
        });
    }

    pub fn activate(&mut self) {
        self.state = ActivationState::Active;
    }

    pub fn deactivate(&mut self) {
        self.state = ActivationState::Inactive;
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }

    /// Rack and patchbay clients are synthetic, so the driver can never
    /// reject them.
    pub fn is_ok(&self) -> bool {
        match self.process_mode {
            ProcessMode::ContinuousRack | ProcessMode::Patchbay => true,
            _ => self.driver_ok,
        }
    }

    /// In rack mode this is a no-op that hands back one of the four
    /// fixed ports (§4.3); other modes append a freshly allocated one.
    pub fn add_port(&mut self, is_audio: bool, is_input: bool) -> usize {
        if let Some(rack) = &self.rack_ports {
            return if is_audio {
                if is_input { rack.audio_in[0] } else { rack.audio_out[0] }
            } else if is_input {
                rack.event_in
            } else {
                rack.event_out
            };
        }
        let index = self.ports.len();
        if is_audio {
            self.ports.push(Port::Audio(AudioPort::new(is_input)));
        } else {
            self.ports.push(Port::Event(EventPort::new(is_input, rigel_shared::MAX_MIDI_EVENTS)));
        }
        index
    }

    pub fn port(&self, index: usize) -> Option<&Port> {
        self.ports.get(index)
    }

    pub fn port_mut(&mut self, index: usize) -> Option<&mut Port> {
        self.ports.get_mut(index)
    }

    pub fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    pub fn rack_ports(&self) -> Option<&RackPorts> {
        self.rack_ports.as_ref()
    }

    pub fn latency(&self) -> u32 {
        self.latency_frames
    }

    /// Driver reporting is a non-RT side effect out of scope here (the
    /// driver is an external collaborator); this just records the value
    /// for the rest of the plugin contract to use.
    pub fn set_latency(&mut self, samples: u32) {
        self.latency_frames = samples;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_state_machine() {
        let mut client = Client::new(ProcessMode::ContinuousRack);
        assert!(!client.is_active());
        client.activate();
        assert!(client.is_active());
        client.deactivate();
        assert!(!client.is_active());
    }

    #[test]
    fn rack_mode_is_always_ok_and_reuses_fixed_ports() {
        let mut client = Client::new(ProcessMode::ContinuousRack);
        assert!(client.is_ok());
        let a = client.add_port(true, true);
        let b = client.add_port(true, true);
        assert_eq!(a, b);
    }
}
