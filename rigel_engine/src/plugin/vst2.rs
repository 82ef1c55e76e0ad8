//! VST2 adapter (§4.5): single-threaded GUI+DSP exposed as a hint, and
//! time info synthesised from the engine's [`crate::transport`] rather
//! than tracked per-plugin, since every VST2 instance shares the same
//! transport.

use std::ffi::{c_void, CStr};

use libloading::{Library, Symbol};
use rigel_shared::error::{RigelError, RigelResult};
use rigel_shared::{plugin_hints, PluginType, ProcessMode};

use crate::plugin::native_abi::{
    vst_effect_flags, vst_opcode, AEffect, VstEvents, VstMainFn, VstMidiEvent, MAX_VST_EVENTS, VST_MAGIC,
};
use crate::plugin::{PluginCapability, PluginCommon};
use crate::transport;

/// Classic `VstTimeInfo`; only the fields VST2 synths/effects actually
/// read for tempo-synced behavior are populated, the rest are zeroed.
#[repr(C)]
struct VstTimeInfo {
    sample_pos: f64,
    sample_rate: f64,
    nanoseconds: f64,
    ppq_pos: f64,
    tempo: f64,
    bar_start_pos: f64,
    cycle_start_pos: f64,
    cycle_end_pos: f64,
    time_sig_numerator: i32,
    time_sig_denominator: i32,
    smpte_offset: i32,
    smpte_frame_rate: i32,
    samples_to_next_clock: i32,
    flags: i32,
}

const VST_TIME_TEMPO_VALID: i32 = 1 << 1;
const VST_TIME_PPQ_POS_VALID: i32 = 1 << 2;
const VST_TIME_TIME_SIG_VALID: i32 = 1 << 3;
const VST_TIME_TRANSPORT_PLAYING: i32 = 1 << 9;

thread_local! {
    static LAST_TIME_INFO: std::cell::RefCell<VstTimeInfo> = std::cell::RefCell::new(VstTimeInfo {
        sample_pos: 0.0, sample_rate: 44_100.0, nanoseconds: 0.0, ppq_pos: 0.0, tempo: 120.0,
        bar_start_pos: 0.0, cycle_start_pos: 0.0, cycle_end_pos: 0.0, time_sig_numerator: 4,
        time_sig_denominator: 4, smpte_offset: 0, smpte_frame_rate: 0, samples_to_next_clock: 0, flags: 0,
    });
}

unsafe extern "C" fn audio_master(
    _effect: *mut AEffect,
    opcode: i32,
    _index: i32,
    _value: isize,
    _ptr: *mut c_void,
    _opt: f32,
) -> isize {
    const AUDIO_MASTER_VERSION: i32 = 1;
    const AUDIO_MASTER_GET_TIME: i32 = 7;
    const AUDIO_MASTER_GET_SAMPLE_RATE: i32 = 16;
    const AUDIO_MASTER_GET_BLOCK_SIZE: i32 = 17;

    match opcode {
        AUDIO_MASTER_VERSION => 2400,
        AUDIO_MASTER_GET_TIME => LAST_TIME_INFO.with(|info| {
            let snapshot = transport::current_time_info();
            let mut info = info.borrow_mut();
            info.tempo = snapshot.tempo;
            info.ppq_pos = snapshot.song_pos_beats;
            info.bar_start_pos = snapshot.bar_start_beats;
            info.time_sig_numerator = snapshot.time_sig_num as i32;
            info.time_sig_denominator = snapshot.time_sig_denom as i32;
            info.flags = VST_TIME_TEMPO_VALID | VST_TIME_PPQ_POS_VALID | VST_TIME_TIME_SIG_VALID
                | if snapshot.is_playing { VST_TIME_TRANSPORT_PLAYING } else { 0 };
            &*info as *const VstTimeInfo as isize
        }),
        AUDIO_MASTER_GET_SAMPLE_RATE => 44_100,
        AUDIO_MASTER_GET_BLOCK_SIZE => 512,
        _ => 0,
    }
}

pub struct Vst2Plugin {
    common: PluginCommon,
    _library: Library,
    effect: *mut AEffect,
    midi_events: [VstMidiEvent; MAX_VST_EVENTS],
    num_midi_events: usize,
}

unsafe impl Send for Vst2Plugin {}

impl Vst2Plugin {
    pub fn load(id: u32, path: &str, unique_id_hint: &str) -> RigelResult<Self> {
        let library = unsafe { Library::new(path) }.map_err(|e| super::ladspa::load_failure(path, unique_id_hint, e))?;
        let main_fn: Symbol<VstMainFn> = unsafe {
            library.get(b"VSTPluginMain\0").or_else(|_| library.get(b"main\0"))
        }
        .map_err(|e| super::ladspa::load_failure(path, unique_id_hint, e))?;

        let effect = unsafe { main_fn(audio_master) };
        if effect.is_null() || unsafe { (*effect).magic } != VST_MAGIC {
            return Err(RigelError::PluginLoadFailure { path: path.into(), label: unique_id_hint.into(), reason: "invalid AEffect (bad magic or null)".into() });
        }

        let mut common = PluginCommon::new(id, PluginType::Vst2, ProcessMode::ContinuousRack);
        common.filename = path.into();
        common.label = unique_id_hint.into();
        let flags = unsafe { (*effect).flags };
        if flags & vst_effect_flags::HAS_EDITOR != 0 {
            common.hints |= plugin_hints::HAS_GUI;
        }
        if flags & vst_effect_flags::IS_SYNTH != 0 {
            common.hints |= plugin_hints::IS_SYNTH;
        }
        // VST2 requires single-threaded GUI+DSP for some plugins,
        // exposed uniformly as a hint rather than special-cased per ID
        // (§9: the IL-Harmless hardcoded-ID hack is not reproduced).
        common.hints |= plugin_hints::USES_SINGLE_THREAD;

        Ok(Self { common, _library: library, effect, midi_events: [VstMidiEvent::EMPTY; MAX_VST_EVENTS], num_midi_events: 0 })
    }

    unsafe fn dispatch(&self, opcode: i32, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize {
        ((*self.effect).dispatcher)(self.effect, opcode, index, value, ptr, opt)
    }
}

impl PluginCapability for Vst2Plugin {
    fn common(&self) -> &PluginCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PluginCommon {
        &mut self.common
    }

    fn reload(&mut self) -> RigelResult<()> {
        unsafe { self.dispatch(vst_opcode::EFF_OPEN, 0, 0, std::ptr::null_mut(), 0.0) };
        let num_params = unsafe { (*self.effect).num_params } as usize;
        self.common.parameters.clear();
        for i in 0..num_params {
            self.common.parameters.push(
                crate::parameter::ParameterData {
                    param_type: rigel_shared::ParameterType::Input,
                    index: i as u32,
                    rindex: i as i32,
                    hints: rigel_shared::parameter_hints::ENABLED | rigel_shared::parameter_hints::AUTOMABLE,
                    midi_channel: 0,
                    midi_cc: -1,
                },
                crate::parameter::ParameterRanges { def: 0.0, min: 0.0, max: 1.0, step: 0.01, step_small: 0.001, step_large: 0.1 },
            );
        }
        self.common.resize_latency_rings(2, 0);
        Ok(())
    }

    fn activate(&mut self) {
        unsafe { self.dispatch(vst_opcode::EFF_MAINS_CHANGED, 0, 1, std::ptr::null_mut(), 0.0) };
        self.common.client.activate();
    }

    fn deactivate(&mut self) {
        unsafe { self.dispatch(vst_opcode::EFF_MAINS_CHANGED, 0, 0, std::ptr::null_mut(), 0.0) };
        self.common.client.deactivate();
    }

    /// Translates this call's MIDI stream into `VstMidiEvent`s and stores
    /// them in the preallocated scratch array; `native_process` dispatches
    /// them via `EFF_PROCESS_EVENTS` right before `process_replacing`, as
    /// a real VST2 host does (§4.5).
    fn queue_midi(&mut self, events: &[rigel_shared::MidiEvent]) {
        self.num_midi_events = 0;
        for event in events.iter().take(MAX_VST_EVENTS) {
            let mut midi = VstMidiEvent::EMPTY;
            midi.delta_frames = event.time as i32;
            midi.midi_data[0] = event.data[0];
            midi.midi_data[1] = event.data[1];
            midi.midi_data[2] = event.data[2];
            self.midi_events[self.num_midi_events] = midi;
            self.num_midi_events += 1;
        }
    }

    fn native_process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        if self.num_midi_events > 0 {
            let mut event_ptrs = [std::ptr::null_mut::<VstMidiEvent>(); MAX_VST_EVENTS];
            for i in 0..self.num_midi_events {
                event_ptrs[i] = &mut self.midi_events[i];
            }
            let mut events_block = VstEvents { num_events: self.num_midi_events as i32, reserved: 0, events: event_ptrs };
            unsafe {
                self.dispatch(vst_opcode::EFF_PROCESS_EVENTS, 0, 0, &mut events_block as *mut VstEvents as *mut c_void, 0.0);
            }
        }

        let effect = unsafe { &*self.effect };
        let Some(process_replacing) = effect.process_replacing.or(effect.process) else { return };

        let in_ptrs: Vec<*const f32> = inputs.iter().map(|b| b.as_ptr()).collect();
        let mut out_ptrs: Vec<*mut f32> = outputs.iter_mut().map(|b| b.as_mut_ptr()).collect();

        unsafe {
            process_replacing(self.effect, in_ptrs.as_ptr(), out_ptrs.as_mut_ptr(), frames as i32);
        }
    }

    fn set_program(&mut self, index: i32) {
        unsafe { self.dispatch(vst_opcode::EFF_SET_PROGRAM, 0, index as isize, std::ptr::null_mut(), 0.0) };
        self.common.programs.set_current(index);
    }
}

impl Drop for Vst2Plugin {
    fn drop(&mut self) {
        unsafe { self.dispatch(vst_opcode::EFF_CLOSE, 0, 0, std::ptr::null_mut(), 0.0) };
    }
}

#[allow(dead_code)]
fn vendor_string(effect: *mut AEffect) -> String {
    let mut buf = [0u8; 64];
    unsafe {
        ((*effect).dispatcher)(effect, vst_opcode::EFF_GET_VENDOR_STRING, 0, 0, buf.as_mut_ptr() as *mut c_void, 0.0);
    }
    CStr::from_bytes_until_nul(&buf).map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}
