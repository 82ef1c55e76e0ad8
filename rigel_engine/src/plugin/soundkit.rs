//! Sound-kit adapter (§4.5): SF2 playback via a SoundFont synthesizer,
//! exposing the fixed 14-parameter FluidSynth-shaped "control panel"
//! rather than per-preset native parameters (grounded on `fluidsynth.cpp`'s
//! reverb/chorus/gain/interpolation/polyphony/detune layout).

use std::fs::File;
use std::sync::Arc;

use rigel_shared::error::{RigelError, RigelResult};
use rigel_shared::{parameter_hints, plugin_hints, ParameterType, PluginType, ProcessMode};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};

use crate::parameter::{ParameterData, ParameterRanges};
use crate::plugin::{PluginCapability, PluginCommon};

/// Index within the fixed control-panel table; order matches the
/// original control's declaration order so presets saved against one
/// line up against the other.
mod param {
    pub const REVERB_ON: usize = 0;
    pub const REVERB_LEVEL: usize = 1;
    pub const REVERB_WIDTH: usize = 2;
    pub const REVERB_DAMP: usize = 3;
    pub const REVERB_ROOM_SIZE: usize = 4;
    pub const CHORUS_ON: usize = 5;
    pub const CHORUS_TYPE: usize = 6;
    pub const CHORUS_SPEED: usize = 7;
    pub const CHORUS_DEPTH: usize = 8;
    pub const CHORUS_LEVEL: usize = 9;
    pub const GAIN: usize = 10;
    pub const INTERPOLATION: usize = 11;
    pub const POLYPHONY: usize = 12;
    pub const DETUNE: usize = 13;
    /// Kept only because the original control panel carries it; no
    /// longer wired to anything.
    pub const RESERVED1: usize = 14;
    pub const COUNT: usize = 15;
}

pub struct SoundKitPlugin {
    common: PluginCommon,
    soundfont: Arc<SoundFont>,
    synth: Option<Synthesizer>,
    sample_rate: i32,
    pending_events: Vec<rigel_shared::MidiEvent>,
}

// SAFETY: `Synthesizer` is only ever touched from the RT thread that
// owns this adapter, same as the native format adapters.
unsafe impl Send for SoundKitPlugin {}

impl SoundKitPlugin {
    pub fn load(id: u32, path: &str, sample_rate: i32) -> RigelResult<Self> {
        let mut file = File::open(path)
            .map_err(|e| RigelError::PluginLoadFailure { path: path.into(), label: "sf2".into(), reason: e.to_string() })?;
        let soundfont = SoundFont::new(&mut file)
            .map_err(|e| RigelError::PluginLoadFailure { path: path.into(), label: "sf2".into(), reason: e.to_string() })?;

        let mut common = PluginCommon::new(id, PluginType::Sf2, ProcessMode::ContinuousRack);
        common.filename = path.into();
        common.name = std::path::Path::new(path).file_stem().and_then(|s| s.to_str()).unwrap_or("sf2").to_string();
        common.hints |= plugin_hints::IS_SYNTH;

        Ok(Self {
            common,
            soundfont: Arc::new(soundfont),
            synth: None,
            sample_rate,
            pending_events: Vec::with_capacity(rigel_shared::MAX_MIDI_EVENTS),
        })
    }

    fn push_control_panel(&mut self) {
        self.common.parameters.clear();
        let specs: [(bool, f32, f32, f32); param::COUNT] = [
            (true, 0.0, 1.0, 1.0),    // reverb on
            (false, 0.0, 1.0, 0.2),   // reverb level
            (false, 0.0, 100.0, 0.5), // reverb width
            (false, 0.0, 1.0, 0.0),   // reverb damp
            (false, 0.0, 1.0, 0.7),   // reverb room size
            (true, 0.0, 1.0, 1.0),    // chorus on
            (true, 0.0, 1.0, 0.0),    // chorus type (0=sine, 1=triangle)
            (false, 0.1, 5.0, 0.3),   // chorus speed (Hz)
            (false, 0.0, 256.0, 8.0), // chorus depth
            (false, 0.0, 10.0, 2.0),  // chorus level
            (false, 0.0, 10.0, 0.2),  // gain
            (true, 0.0, 2.0, 1.0),    // interpolation method
            (true, 1.0, 128.0, 64.0), // polyphony
            (false, -12.0, 12.0, 0.0), // detune (semitones)
            (false, 0.0, 0.0, 0.0),   // reserved1
        ];
        for (i, (is_boolean_or_integer, min, max, def)) in specs.into_iter().enumerate() {
            let hints = if i == param::REVERB_ON || i == param::CHORUS_ON {
                parameter_hints::BOOLEAN
            } else if is_boolean_or_integer {
                parameter_hints::INTEGER
            } else {
                0
            };
            self.common.parameters.push(
                ParameterData {
                    param_type: ParameterType::Input,
                    index: i as u32,
                    rindex: i as i32,
                    hints: hints | parameter_hints::ENABLED | parameter_hints::AUTOMABLE,
                    midi_channel: 0,
                    midi_cc: -1,
                },
                ParameterRanges { def, min, max, step: (max - min).max(0.01) / 100.0, step_small: (max - min).max(0.01) / 1000.0, step_large: (max - min).max(0.01) / 10.0 },
            );
        }
    }

    fn gain(&self) -> f32 {
        self.common.parameters.value(param::GAIN).unwrap_or(0.2)
    }
}

impl PluginCapability for SoundKitPlugin {
    fn common(&self) -> &PluginCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PluginCommon {
        &mut self.common
    }

    fn reload(&mut self) -> RigelResult<()> {
        let settings = SynthesizerSettings::new(self.sample_rate);
        let synth = Synthesizer::new(&self.soundfont, &settings)
            .map_err(|e| RigelError::PluginLoadFailure { path: self.common.filename.clone(), label: "sf2".into(), reason: e.to_string() })?;
        self.synth = Some(synth);
        self.push_control_panel();
        self.common.resize_latency_rings(2, 0);
        Ok(())
    }

    /// Stores this call's translated events; `native_process` feeds them
    /// to the synthesizer one at a time before rendering (§4.5 sound-kit
    /// formats read MIDI through their own note-on/note-off API rather
    /// than a native process-events call).
    fn queue_midi(&mut self, events: &[rigel_shared::MidiEvent]) {
        self.pending_events.clear();
        self.pending_events.extend_from_slice(events);
    }

    fn native_process(&mut self, _inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        let gain = self.gain();
        let Some(synth) = &mut self.synth else { return };
        if outputs.len() < 2 {
            return;
        }

        for event in self.pending_events.drain(..) {
            let command = (event.data[0] & 0xF0) as i32;
            synth.process_midi_message(event.channel as i32, command, event.data[1] as i32, event.data[2] as i32);
        }

        let (left_out, rest) = outputs.split_at_mut(1);
        let left = &mut left_out[0][..frames];
        let right = &mut rest[0][..frames];
        synth.render(left, right);
        for sample in left.iter_mut().chain(right.iter_mut()) {
            *sample *= gain;
        }
    }

    fn set_program(&mut self, index: i32) {
        // A "program" here is a bank/preset pair selected through the
        // MIDI-program table, not a separate native program list.
        if let Some(synth) = &mut self.synth {
            if let Some(data) = self.common.midi_programs.get(index.max(0) as usize) {
                synth.process_midi_message(0, 0xC0, data.program as i32, 0);
            }
        }
        self.common.programs.set_current(index);
    }
}
