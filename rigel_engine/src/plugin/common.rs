//! State every plugin variant carries regardless of format (§3 "Plugin
//! slot", §9 "shared composition held in a common struct").

use std::sync::atomic::{AtomicBool, Ordering};

use rigel_shared::PluginType;

use crate::client::Client;
use crate::customdata::CustomDataStore;
use crate::delay::DelayLine;
use crate::midiqueue::ExternalMidiQueue;
use crate::parameter::ParameterTable;
use crate::postevent::{PostEvent, PostEventQueue};
use crate::program::{MidiProgramTable, ProgramTable};

/// Host-mixer controls applied after a plugin's native process returns
/// (§4.4 step 6).
pub struct MixerControls {
    pub dry_wet: f32,
    pub volume: f32,
    pub balance_left: f32,
    pub balance_right: f32,
}

impl Default for MixerControls {
    fn default() -> Self {
        Self { dry_wet: 1.0, volume: 1.0, balance_left: -1.0, balance_right: 1.0 }
    }
}

pub struct PeakMeters {
    pub in_left: f32,
    pub in_right: f32,
    pub out_left: f32,
    pub out_right: f32,
}

impl Default for PeakMeters {
    fn default() -> Self {
        Self { in_left: 0.0, in_right: 0.0, out_left: 0.0, out_right: 0.0 }
    }
}

pub struct PluginCommon {
    pub id: u32,
    pub plugin_type: PluginType,
    pub hints: u32,
    pub options: u32,
    /// RT reads this to skip processing without tearing anything down;
    /// `ScopedDisabler` clears it for the duration of a non-RT mutation.
    pub enabled: AtomicBool,
    pub active: bool,
    pub mixer: MixerControls,
    /// `-1` disables host-level MIDI control of this plugin.
    pub ctrl_in_channel: i8,
    pub filename: String,
    pub label: String,
    pub name: String,
    pub latency: u32,
    pub client: Client,
    pub parameters: ParameterTable,
    pub programs: ProgramTable,
    pub midi_programs: MidiProgramTable,
    pub custom_data: CustomDataStore,
    pub post_events: PostEventQueue,
    pub external_midi: ExternalMidiQueue,
    /// One delay line per audio input, sized to `latency` once known,
    /// holding the dry signal for the dry/wet mix (§4.4 steps 6-7).
    pub latency_rings: Vec<DelayLine>,
    pub peaks: PeakMeters,
    /// Bank selected by a pending `MidiBankChange`, consumed by the next
    /// `MidiProgramChange` (§4.4 step 2).
    pub pending_bank: Option<u32>,
}

impl PluginCommon {
    pub fn new(id: u32, plugin_type: PluginType, process_mode: rigel_shared::ProcessMode) -> Self {
        Self {
            id,
            plugin_type,
            hints: 0,
            options: 0,
            enabled: AtomicBool::new(true),
            active: false,
            mixer: MixerControls::default(),
            ctrl_in_channel: 0,
            filename: String::new(),
            label: String::new(),
            name: String::new(),
            latency: 0,
            client: Client::new(process_mode),
            parameters: ParameterTable::new(),
            programs: ProgramTable::new(),
            midi_programs: MidiProgramTable::new(),
            custom_data: CustomDataStore::new(),
            post_events: PostEventQueue::new(),
            external_midi: ExternalMidiQueue::new(),
            latency_rings: Vec::new(),
            peaks: PeakMeters::default(),
            pending_bank: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, value: bool) {
        self.enabled.store(value, Ordering::Release);
    }

    /// `setActive` with OSC/callback notification flags, clamped the
    /// same as every other host-mixer setter (§4.4 "Host-mixer
    /// setters"); idempotent while already in the target state.
    pub fn set_active(&mut self, active: bool) -> bool {
        if self.active == active {
            return false;
        }
        self.active = active;
        self.post_events.post(PostEvent::Debug);
        true
    }

    pub fn set_dry_wet(&mut self, value: f32) {
        self.mixer.dry_wet = value.clamp(0.0, 1.0);
    }

    pub fn set_volume(&mut self, value: f32) {
        self.mixer.volume = value.clamp(0.0, 1.27);
    }

    pub fn set_balance_left(&mut self, value: f32) {
        self.mixer.balance_left = value.clamp(-1.0, 1.0);
    }

    pub fn set_balance_right(&mut self, value: f32) {
        self.mixer.balance_right = value.clamp(-1.0, 1.0);
    }

    pub fn resize_latency_rings(&mut self, channel_count: usize, latency: u32) {
        self.latency = latency;
        self.latency_rings = (0..channel_count).map(|_| DelayLine::new(latency as usize)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_active_is_idempotent() {
        let mut common = PluginCommon::new(0, PluginType::Internal, rigel_shared::ProcessMode::ContinuousRack);
        assert!(common.set_active(true));
        assert!(!common.set_active(true));
        assert!(common.set_active(false));
    }

    #[test]
    fn mixer_setters_clamp() {
        let mut common = PluginCommon::new(0, PluginType::Internal, rigel_shared::ProcessMode::ContinuousRack);
        common.set_volume(5.0);
        assert_eq!(common.mixer.volume, 1.27);
        common.set_dry_wet(-1.0);
        assert_eq!(common.mixer.dry_wet, 0.0);
    }
}
