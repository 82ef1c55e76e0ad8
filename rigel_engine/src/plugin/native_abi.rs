//! Hand-rolled C ABI layouts for the plugin standards this core loads
//! directly (no `*-sys` crate exists in the dependency set for any of
//! these formats, the same situation the bridge's VST3 definitions are
//! in): LADSPA, its DSSI extension, LV2's minimal descriptor, and the
//! classic VST2 `AEffect` struct. Each format's adapter module loads a
//! shared library with `libloading` and casts the resolved symbol to
//! these types.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_ulong};

pub type LadspaData = f32;

/// `LADSPA_PortDescriptor` bit layout.
pub mod ladspa_port {
    pub const INPUT: u32 = 0x1;
    pub const OUTPUT: u32 = 0x2;
    pub const CONTROL: u32 = 0x4;
    pub const AUDIO: u32 = 0x8;
}

#[repr(C)]
pub struct LadspaPortRangeHint {
    pub hint_descriptor: u32,
    pub lower_bound: LadspaData,
    pub upper_bound: LadspaData,
}

pub mod ladspa_hint {
    pub const BOUNDED_BELOW: u32 = 0x1;
    pub const BOUNDED_ABOVE: u32 = 0x2;
    pub const TOGGLED: u32 = 0x4;
    pub const SAMPLE_RATE: u32 = 0x8;
    pub const LOGARITHMIC: u32 = 0x10;
    pub const INTEGER: u32 = 0x20;
    pub const DEFAULT_MINIMUM: u32 = 0x200;
}

/// Mirrors `LADSPA_Descriptor` (`ladspa.h`). Field order matches the
/// real header exactly because adapters read it via a raw pointer cast.
#[repr(C)]
pub struct LadspaDescriptor {
    pub unique_id: c_ulong,
    pub label: *const c_char,
    pub properties: c_int,
    pub name: *const c_char,
    pub maker: *const c_char,
    pub copyright: *const c_char,
    pub port_count: c_ulong,
    pub port_descriptors: *const u32,
    pub port_names: *const *const c_char,
    pub port_range_hints: *const LadspaPortRangeHint,
    pub implementation_data: *mut c_void,
    pub instantiate: unsafe extern "C" fn(descriptor: *const LadspaDescriptor, sample_rate: u64) -> *mut c_void,
    pub connect_port: unsafe extern "C" fn(instance: *mut c_void, port: c_ulong, data_location: *mut LadspaData),
    pub activate: Option<unsafe extern "C" fn(instance: *mut c_void)>,
    pub run: unsafe extern "C" fn(instance: *mut c_void, sample_count: c_ulong),
    pub run_adding: Option<unsafe extern "C" fn(instance: *mut c_void, sample_count: c_ulong)>,
    pub set_run_adding_gain: Option<unsafe extern "C" fn(instance: *mut c_void, gain: LadspaData)>,
    pub deactivate: Option<unsafe extern "C" fn(instance: *mut c_void)>,
    pub cleanup: unsafe extern "C" fn(instance: *mut c_void),
}

pub type LadspaDescriptorFn = unsafe extern "C" fn(index: c_ulong) -> *const LadspaDescriptor;

/// Minimal ALSA-sequencer-shaped event DSSI's `run_synth` expects; real
/// `snd_seq_event_t` is larger, but every field this core touches (type
/// tag, channel, note/velocity, frame offset) is represented.
#[repr(C)]
pub struct DssiSeqEvent {
    pub event_type: u8,
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
    pub frame_offset: u32,
}

pub const DSSI_SEQ_EVENT_NOTE_ON: u8 = 6;
pub const DSSI_SEQ_EVENT_NOTE_OFF: u8 = 7;

/// Mirrors `DSSI_Descriptor` (`dssi.h`): a `LADSPA_Descriptor` plus the
/// synth-specific entry points.
#[repr(C)]
pub struct DssiDescriptor {
    pub dssi_api_version: c_int,
    pub ladspa_descriptor: *const LadspaDescriptor,
    pub configure: Option<unsafe extern "C" fn(instance: *mut c_void, key: *const c_char, value: *const c_char) -> *mut c_char>,
    pub get_program: Option<unsafe extern "C" fn(instance: *mut c_void, index: u32) -> *const c_void>,
    pub select_program: Option<unsafe extern "C" fn(instance: *mut c_void, bank: u32, program: u32)>,
    pub get_midi_controller_for_port: Option<unsafe extern "C" fn(instance: *mut c_void, port: c_ulong) -> c_int>,
    pub run_synth: Option<
        unsafe extern "C" fn(instance: *mut c_void, sample_count: c_ulong, events: *const DssiSeqEvent, event_count: c_ulong),
    >,
}

pub type DssiDescriptorFn = unsafe extern "C" fn(index: c_ulong) -> *const DssiDescriptor;

/// Minimal `LV2_Descriptor` (LV2 core spec §descriptor). Real LV2 hosts
/// additionally negotiate features/extensions through `extension_data`;
/// this core passes an empty feature array, which is within spec for a
/// plugin that doesn't require any.
#[repr(C)]
pub struct Lv2Descriptor {
    pub uri: *const c_char,
    pub instantiate: unsafe extern "C" fn(
        descriptor: *const Lv2Descriptor,
        sample_rate: f64,
        bundle_path: *const c_char,
        features: *const *const c_void,
    ) -> *mut c_void,
    pub connect_port: unsafe extern "C" fn(instance: *mut c_void, port: u32, data_location: *mut c_void),
    pub activate: Option<unsafe extern "C" fn(instance: *mut c_void)>,
    pub run: unsafe extern "C" fn(instance: *mut c_void, sample_count: u32),
    pub deactivate: Option<unsafe extern "C" fn(instance: *mut c_void)>,
    pub cleanup: unsafe extern "C" fn(instance: *mut c_void),
    pub extension_data: Option<unsafe extern "C" fn(uri: *const c_char) -> *const c_void>,
}

pub type Lv2DescriptorFn = unsafe extern "C" fn(index: u32) -> *const Lv2Descriptor;

/// Classic VST2 `AEffect` struct (`aeffect.h`/`aeffectx.h`). Only the
/// fields this core reads or writes are named; the rest of the real
/// struct's padding is represented by `_reserved*` so the layout still
/// matches byte-for-byte.
#[repr(C)]
pub struct AEffect {
    pub magic: i32,
    pub dispatcher: unsafe extern "C" fn(
        effect: *mut AEffect,
        opcode: i32,
        index: i32,
        value: isize,
        ptr: *mut c_void,
        opt: f32,
    ) -> isize,
    pub process: Option<unsafe extern "C" fn(effect: *mut AEffect, inputs: *const *const f32, outputs: *mut *mut f32, sample_frames: i32)>,
    pub set_parameter: unsafe extern "C" fn(effect: *mut AEffect, index: i32, parameter: f32),
    pub get_parameter: unsafe extern "C" fn(effect: *mut AEffect, index: i32) -> f32,
    pub num_programs: i32,
    pub num_params: i32,
    pub num_inputs: i32,
    pub num_outputs: i32,
    pub flags: i32,
    pub _reserved1: isize,
    pub _reserved2: isize,
    pub initial_delay: i32,
    pub _reserved3: i32,
    pub _reserved4: i32,
    pub object: *mut c_void,
    pub user: *mut c_void,
    pub unique_id: i32,
    pub version: i32,
    pub process_replacing: Option<unsafe extern "C" fn(effect: *mut AEffect, inputs: *const *const f32, outputs: *mut *mut f32, sample_frames: i32)>,
}

pub const VST_MAGIC: i32 = 0x56737450; // 'VstP'

pub mod vst_effect_flags {
    pub const HAS_EDITOR: i32 = 1 << 0;
    pub const CAN_REPLACING: i32 = 1 << 4;
    pub const IS_SYNTH: i32 = 1 << 8;
}

pub mod vst_opcode {
    pub const EFF_OPEN: i32 = 0;
    pub const EFF_CLOSE: i32 = 1;
    pub const EFF_SET_PROGRAM: i32 = 2;
    pub const EFF_GET_PROGRAM: i32 = 3;
    pub const EFF_MAINS_CHANGED: i32 = 12; // activate/deactivate
    pub const EFF_GET_VENDOR_STRING: i32 = 47;
    pub const EFF_PROCESS_EVENTS: i32 = 25;
}

/// Maximum MIDI events forwarded to a VST2 plugin per callback; kept
/// small and fixed-size so `queue_midi` never allocates on the RT thread.
pub const MAX_VST_EVENTS: usize = 64;

pub const VST_MIDI_EVENT_TYPE: i32 = 1;
pub const VST_MIDI_EVENT_SIZE: i32 = 24;

/// `VstMidiEvent` (`aeffectx.h`): the variant of `VstEvent` carrying a
/// 3-byte MIDI message, laid out so a `*mut VstEvent` cast reads the
/// shared `type`/`byteSize`/`deltaFrames`/`flags` header correctly.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct VstMidiEvent {
    pub event_type: i32,
    pub byte_size: i32,
    pub delta_frames: i32,
    pub flags: i32,
    pub note_length: i32,
    pub note_offset: i32,
    pub midi_data: [u8; 4],
    pub detune: i8,
    pub note_off_velocity: i8,
    pub reserved1: i8,
    pub reserved2: i8,
}

impl VstMidiEvent {
    pub const EMPTY: Self = Self {
        event_type: VST_MIDI_EVENT_TYPE,
        byte_size: VST_MIDI_EVENT_SIZE,
        delta_frames: 0,
        flags: 0,
        note_length: 0,
        note_offset: 0,
        midi_data: [0; 4],
        detune: 0,
        note_off_velocity: 0,
        reserved1: 0,
        reserved2: 0,
    };
}

/// `VstEvents` (`aeffectx.h`): a fixed-size array stands in for the real
/// header's variable-length `events[]` tail, since every call here fits
/// well within `MAX_VST_EVENTS`.
#[repr(C)]
pub struct VstEvents {
    pub num_events: i32,
    pub reserved: isize,
    pub events: [*mut VstMidiEvent; MAX_VST_EVENTS],
}

pub type VstMainFn = unsafe extern "C" fn(
    audio_master: unsafe extern "C" fn(effect: *mut AEffect, opcode: i32, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize,
) -> *mut AEffect;
