//! The polymorphic plugin instance (§4.4) reshaped as a tagged variant
//! over a capability trait, per §9's "polymorphic plugins without deep
//! inheritance" design note: one [`PluginCommon`] struct holds the
//! shared state every format needs, and each variant implements only
//! the native-process seam.

pub mod bridge;
pub mod common;
pub mod dssi;
pub mod ladspa;
pub mod lv2;
pub mod native_abi;
pub mod soundkit;
pub mod vst2;

use rigel_shared::error::RigelResult;
use rigel_shared::{parameter_hints, plugin_hints, ControlEventType, ParameterType};

use crate::event::Event;
use crate::midiqueue::ExternalMidiNote;
use crate::port::EventPort;
use crate::postevent::PostEvent;

pub use common::PluginCommon;

/// The capability set every concrete adapter implements a subset of
/// (§4.4). Defaults are no-ops so a format that doesn't support, say,
/// chunk save/restore doesn't have to say so explicitly.
pub trait PluginCapability: Send {
    fn common(&self) -> &PluginCommon;
    fn common_mut(&mut self) -> &mut PluginCommon;

    /// Tears down ports/tables, re-queries the native side, rebuilds
    /// everything, and recomputes hints.
    fn reload(&mut self) -> RigelResult<()>;

    fn activate(&mut self) {
        self.common_mut().client.activate();
    }

    fn deactivate(&mut self) {
        self.common_mut().client.deactivate();
    }

    /// Runs the native process call. `inputs`/`outputs` are already
    /// bound to this call's frame count.
    fn native_process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize);

    /// Hands this call's translated MIDI stream to the native side before
    /// `native_process` runs. Formats with no MIDI-aware entry point
    /// (LADSPA; this LV2 adapter, which models no event/atom ports) keep
    /// the no-op default.
    fn queue_midi(&mut self, _events: &[rigel_shared::MidiEvent]) {}

    fn buffer_size_changed(&mut self, _frames: u32) {}
    fn sample_rate_changed(&mut self, _rate: f64) {}

    fn chunk_data(&self) -> Option<Vec<u8>> {
        None
    }

    fn set_chunk_data(&mut self, _data: &[u8]) {}

    /// DSSI overrides this to decline non-string data (§9, preserved
    /// restriction); the generic store accepts any type URI.
    fn set_custom_data(&mut self, type_uri: &str, key: &str, value: &str) -> RigelResult<()> {
        self.common_mut().custom_data.set(type_uri, key, value);
        Ok(())
    }

    fn set_program(&mut self, _index: i32) {}
    fn set_midi_program(&mut self, _index: i32) {}

    /// Most formats just write straight into the shared parameter table;
    /// the bridge adapter overrides this to also forward the value to its
    /// sub-process over the control channel.
    fn set_parameter_value(&mut self, index: u32, value: f32) {
        self.common_mut().parameters.set_value(index as usize, value);
    }

    fn show_gui(&mut self, _show: bool) {}
    fn idle_gui(&mut self) {}
}

/// Tagged variant over every format this core adapts (§9).
pub enum Plugin {
    Ladspa(ladspa::LadspaPlugin),
    Dssi(dssi::DssiPlugin),
    Lv2(lv2::Lv2Plugin),
    Vst2(vst2::Vst2Plugin),
    SoundKit(soundkit::SoundKitPlugin),
    Bridge(bridge::BridgePlugin),
}

macro_rules! dispatch {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Plugin::Ladspa(p) => p.$method($($arg),*),
            Plugin::Dssi(p) => p.$method($($arg),*),
            Plugin::Lv2(p) => p.$method($($arg),*),
            Plugin::Vst2(p) => p.$method($($arg),*),
            Plugin::SoundKit(p) => p.$method($($arg),*),
            Plugin::Bridge(p) => p.$method($($arg),*),
        }
    };
}

impl PluginCapability for Plugin {
    fn common(&self) -> &PluginCommon {
        dispatch!(self, common)
    }

    fn common_mut(&mut self) -> &mut PluginCommon {
        dispatch!(self, common_mut)
    }

    fn reload(&mut self) -> RigelResult<()> {
        dispatch!(self, reload)
    }

    fn activate(&mut self) {
        dispatch!(self, activate)
    }

    fn deactivate(&mut self) {
        dispatch!(self, deactivate)
    }

    fn native_process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        dispatch!(self, native_process, inputs, outputs, frames)
    }

    fn queue_midi(&mut self, events: &[rigel_shared::MidiEvent]) {
        dispatch!(self, queue_midi, events)
    }

    fn buffer_size_changed(&mut self, frames: u32) {
        dispatch!(self, buffer_size_changed, frames)
    }

    fn sample_rate_changed(&mut self, rate: f64) {
        dispatch!(self, sample_rate_changed, rate)
    }

    fn chunk_data(&self) -> Option<Vec<u8>> {
        dispatch!(self, chunk_data)
    }

    fn set_chunk_data(&mut self, data: &[u8]) {
        dispatch!(self, set_chunk_data, data)
    }

    fn set_custom_data(&mut self, type_uri: &str, key: &str, value: &str) -> RigelResult<()> {
        dispatch!(self, set_custom_data, type_uri, key, value)
    }

    fn set_program(&mut self, index: i32) {
        dispatch!(self, set_program, index)
    }

    fn set_parameter_value(&mut self, index: u32, value: f32) {
        dispatch!(self, set_parameter_value, index, value)
    }

    fn set_midi_program(&mut self, index: i32) {
        dispatch!(self, set_midi_program, index)
    }

    fn show_gui(&mut self, show: bool) {
        dispatch!(self, show_gui, show)
    }

    fn idle_gui(&mut self) {
        dispatch!(self, idle_gui)
    }
}

/// A short-lived guard implementing the "scoped disable" pattern (§4.4,
/// §9): clears `enabled`, lets the caller mutate native state outside
/// the RT path, then restores it on drop. Must not be combined with the
/// offline full-process-lock path for the same mutation (§9).
pub struct ScopedDisabler<'a> {
    plugin: &'a PluginCommon,
    was_enabled: bool,
}

impl<'a> ScopedDisabler<'a> {
    pub fn new(plugin: &'a PluginCommon) -> Self {
        let was_enabled = plugin.is_enabled();
        plugin.set_enabled(false);
        Self { plugin, was_enabled }
    }
}

impl Drop for ScopedDisabler<'_> {
    fn drop(&mut self) {
        self.plugin.set_enabled(self.was_enabled);
    }
}

/// Runs the full per-call contract of §4.4 against one plugin: control
/// intercepts, external/native MIDI draining, the native process call,
/// then dry/wet + balance + volume post-processing and control-output
/// emission. Called once per plugin per callback by the engine's rack
/// or patchbay routing.
pub fn process(
    plugin: &mut dyn PluginCapability,
    control_in: &EventPort,
    midi_in: &EventPort,
    control_out: &mut EventPort,
    audio_in: &[&[f32]],
    audio_out: &mut [&mut [f32]],
    frames: usize,
    skip_metering: bool,
) {
    if !plugin.common().is_enabled() {
        return;
    }

    // Step 1: input peaks (skipped for ContinuousRack per caller).
    if !skip_metering {
        let peaks = input_peaks(audio_in);
        let common = plugin.common_mut();
        common.peaks.in_left = peaks.0;
        common.peaks.in_right = peaks.1;
    }

    // Step 2: drain control-input port.
    drain_control_events(plugin, control_in);

    // Step 3: drain external MIDI injection queue.
    let mut injected = Vec::new();
    plugin.common().external_midi.drain_into(&mut injected);

    // Step 4: drain MIDI input port, rewriting note-on-velocity-0.
    let mut native_midi = translate_midi_input(plugin, midi_in, &injected);
    native_midi.sort_by_key(|e| e.time);

    // Step 5: native process function.
    plugin.queue_midi(&native_midi);
    plugin.native_process(audio_in, audio_out, frames);

    // Step 6-7: dry/wet, balance, volume, then refresh the latency ring.
    postprocess_mix(plugin, audio_in, audio_out);

    // Step 8: control-output parameter events for bound Output params.
    emit_control_outputs(plugin, control_out);

    // Step 9: output peaks.
    if !skip_metering {
        let peaks = output_peaks(audio_out);
        let common = plugin.common_mut();
        common.peaks.out_left = peaks.0;
        common.peaks.out_right = peaks.1;
    }
}

fn input_peaks(audio_in: &[&[f32]]) -> (f32, f32) {
    let left = audio_in.first().map(|b| peak_of(b)).unwrap_or(0.0);
    let right = audio_in.get(1).map(|b| peak_of(b)).unwrap_or(left);
    (left, right)
}

fn output_peaks(audio_out: &[&mut [f32]]) -> (f32, f32) {
    let left = audio_out.first().map(|b| peak_of(b)).unwrap_or(0.0);
    let right = audio_out.get(1).map(|b| peak_of(b)).unwrap_or(left);
    (left, right)
}

fn peak_of(buffer: &[f32]) -> f32 {
    buffer.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// §4.4 step 2: breath-controller -> dry/wet, channel-volume -> volume,
/// balance pair, generic MIDI-CC bindings, bank/program select, and the
/// all-sound-off / all-notes-off sequences.
const CC_BREATH_CONTROLLER: u32 = 2;
const CC_CHANNEL_VOLUME: u32 = 7;
const CC_BALANCE: u32 = 8;
const CC_ALL_SOUND_OFF: u32 = 120;
const CC_ALL_NOTES_OFF: u32 = 123;

fn drain_control_events(plugin: &mut dyn PluginCapability, control_in: &EventPort) {
    let ctrl_channel = plugin.common().ctrl_in_channel;
    if ctrl_channel < 0 {
        return;
    }
    let ctrl_channel = ctrl_channel as u8;

    for event in control_in.events().iter() {
        let Event::Control(c) = event else { continue };
        if c.channel != ctrl_channel {
            continue;
        }
        match c.kind {
            ControlEventType::ParameterChange => apply_parameter_change(plugin, c.param, c.value),
            ControlEventType::MidiBankChange => {
                plugin.common_mut().pending_bank = Some(c.param);
            }
            ControlEventType::MidiProgramChange => {
                let bank = plugin.common().pending_bank.unwrap_or(0);
                if let Some(index) = plugin.common().midi_programs.find(bank, c.param) {
                    plugin.set_midi_program(index as i32);
                }
            }
            ControlEventType::AllSoundOff => {
                plugin.deactivate();
                plugin.activate();
                plugin.common_mut().post_events.post(PostEvent::Debug);
            }
            ControlEventType::AllNotesOff => {
                plugin.common_mut().post_events.post(PostEvent::Debug);
            }
        }
    }
}

fn apply_parameter_change(plugin: &mut dyn PluginCapability, param: u32, value: f32) {
    match param {
        CC_BREATH_CONTROLLER => {
            if plugin.common().hints & plugin_hints::CAN_DRYWET != 0 {
                plugin.common_mut().set_dry_wet(value);
                let dry_wet = plugin.common().mixer.dry_wet;
                plugin.common_mut().post_events.post(PostEvent::ParameterChange {
                    index: rigel_shared::InternalParameterId::DryWet as i32,
                    value: dry_wet,
                });
            }
        }
        CC_CHANNEL_VOLUME => {
            if plugin.common().hints & plugin_hints::CAN_VOLUME != 0 {
                plugin.common_mut().set_volume(value * 127.0 / 100.0);
            }
        }
        CC_BALANCE => {
            if plugin.common().hints & plugin_hints::CAN_BALANCE != 0 {
                let left = (2.0 * value - 1.0).clamp(-1.0, 1.0);
                let right = (2.0 * value - 1.0).clamp(-1.0, 1.0);
                plugin.common_mut().set_balance_left(left);
                plugin.common_mut().set_balance_right(right);
            }
        }
        CC_ALL_SOUND_OFF | CC_ALL_NOTES_OFF => {
            // Routed through ControlEventType::AllSoundOff/AllNotesOff
            // at buffer-construction time; a raw CC this high should
            // never reach here, but ignore rather than misinterpret it
            // as a bound parameter.
        }
        cc => {
            if let Some(index) = plugin.common().parameters.find_bound_to_cc(0, cc as u8) {
                if let Some(data) = plugin.common().parameters.data(index).copied() {
                    if data.param_type == ParameterType::Input {
                        let ranges = *plugin.common().parameters.ranges(index).unwrap();
                        let native_value = ranges.min + value * (ranges.max - ranges.min);
                        plugin.common_mut().parameters.set_value(index, native_value);
                    }
                }
            }
        }
    }
}

/// §4.4 step 4: rewrites note-on-velocity-0 to note-off, posts
/// NoteOn/NoteOff for monitoring, and folds in externally injected
/// notes so they're processed in the same native-MIDI pass.
fn translate_midi_input(
    plugin: &mut dyn PluginCapability,
    midi_in: &EventPort,
    injected: &[ExternalMidiNote],
) -> Vec<rigel_shared::MidiEvent> {
    let mut native = Vec::with_capacity(midi_in.event_count() + injected.len());

    for event in midi_in.events().iter() {
        let Event::Midi(m) = event else { continue };
        let status = m.data[0] & 0xF0;
        if status == 0x90 && m.data[2] == 0 {
            plugin.common_mut().post_events.post(PostEvent::NoteOff { channel: m.channel, note: m.data[1] });
            let mut off = *m;
            off.data[0] = 0x80 | m.channel;
            native.push(off);
        } else {
            if status == 0x90 {
                plugin.common_mut().post_events.post(PostEvent::NoteOn {
                    channel: m.channel,
                    note: m.data[1],
                    velocity: m.data[2],
                });
            } else if status == 0x80 {
                plugin.common_mut().post_events.post(PostEvent::NoteOff { channel: m.channel, note: m.data[1] });
            }
            native.push(*m);
        }
    }

    for note in injected {
        if note.is_empty() {
            continue;
        }
        native.push(rigel_shared::MidiEvent {
            time: 0,
            channel: note.channel as u8,
            data: [if note.velocity == 0 { 0x80 } else { 0x90 } | note.channel as u8, note.note, note.velocity],
            size: 3,
        });
    }

    native
}

/// §4.4 step 6: dry/wet mixed against the delayed dry input, then
/// balance, then volume, applied only when each differs from its
/// identity value; step 7 then refreshes the latency ring with this
/// call's input for the next call.
fn postprocess_mix(plugin: &mut dyn PluginCapability, audio_in: &[&[f32]], audio_out: &mut [&mut [f32]]) {
    let (dry_wet, volume, balance_left, balance_right, hints) = {
        let common = plugin.common();
        (common.mixer.dry_wet, common.mixer.volume, common.mixer.balance_left, common.mixer.balance_right, common.hints)
    };

    if hints & plugin_hints::CAN_DRYWET != 0 && dry_wet != 1.0 {
        let common = plugin.common_mut();
        let latency = common.latency as usize;
        for (ch, out) in audio_out.iter_mut().enumerate() {
            if let (Some(input), Some(ring)) = (audio_in.get(ch), common.latency_rings.get_mut(ch)) {
                for i in 0..out.len() {
                    let delayed = ring.process_sample(input[i], latency);
                    out[i] = out[i] * dry_wet + delayed * (1.0 - dry_wet);
                }
            }
        }
    }

    if hints & plugin_hints::CAN_BALANCE != 0 && (balance_left != -1.0 || balance_right != 1.0) && audio_out.len() >= 2 {
        apply_balance(audio_out, balance_left, balance_right);
    }

    if hints & plugin_hints::CAN_VOLUME != 0 && volume != 1.0 {
        for out in audio_out.iter_mut() {
            for sample in out.iter_mut() {
                *sample *= volume;
            }
        }
    }

    // Step 7: refresh latency rings for the next call even when dry/wet
    // wasn't applied this time, so a later dry/wet change has history.
    let common = plugin.common_mut();
    for (ch, input) in audio_in.iter().enumerate() {
        if let Some(ring) = common.latency_rings.get_mut(ch) {
            ring.advance(input);
        }
    }
}

/// Cross-mixes adjacent even/odd channel pairs per the balance rule in
/// §4.4 step 6 and the identity check in §8 boundary scenario 1: with
/// `balanceLeft = -1, balanceRight = 1` the mix is the identity.
fn apply_balance(audio_out: &mut [&mut [f32]], balance_left: f32, balance_right: f32) {
    let left_gain_from_right = (balance_left + 1.0) / 2.0;
    let right_gain_from_left = (1.0 - balance_right) / 2.0;
    let frames = audio_out[0].len();
    for i in 0..frames {
        let l = audio_out[0][i];
        let r = audio_out[1][i];
        audio_out[0][i] = l * (1.0 - left_gain_from_right) + r * left_gain_from_right;
        audio_out[1][i] = r * (1.0 - right_gain_from_left) + l * right_gain_from_left;
    }
}

/// §4.4 step 8: every Output-typed parameter with a MIDI-CC binding
/// writes its normalised value to the control-output port.
fn emit_control_outputs(plugin: &mut dyn PluginCapability, control_out: &mut EventPort) {
    let common = plugin.common();
    let mut writes = Vec::new();
    for (data, ranges, value) in common.parameters.iter() {
        if data.param_type == ParameterType::Output && data.midi_cc >= 0 {
            writes.push((data.midi_channel, data.midi_cc as u8, ranges.normalize(*value)));
        }
    }
    for (channel, cc, normalized) in writes {
        control_out.write_control_event(0, channel, ControlEventType::ParameterChange, cc as u32, normalized);
    }
}
