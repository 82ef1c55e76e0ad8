pub mod bridge;
pub mod error;
pub mod shmem;

use serde::{Deserialize, Serialize};

pub const MAX_DEFAULT_PLUGINS: u32 = 99;
pub const MAX_RACK_PLUGINS: u32 = 16;
pub const MAX_PATCHBAY_PLUGINS: u32 = 999;
pub const MAX_DEFAULT_PARAMETERS: u32 = 200;

pub const MAX_MIDI_EVENTS: usize = 512;
pub const MAX_POST_EVENTS: usize = 152;
pub const MAX_EXTERNAL_MIDI_NOTES: usize = 512;

/// Upper bound on a single callback's frame count, used to size the
/// engine's preallocated rack-mode scratch buffers (§5 "no heap
/// allocation on the RT audio thread").
pub const MAX_AUDIO_BUFFER_FRAMES: usize = 8192;

/// Plugin hints bitset.
pub mod plugin_hints {
    pub const IS_BRIDGE: u32 = 0x001;
    pub const IS_RTSAFE: u32 = 0x002;
    pub const IS_SYNTH: u32 = 0x004;
    pub const HAS_GUI: u32 = 0x010;
    pub const USES_CHUNKS: u32 = 0x020;
    pub const USES_SINGLE_THREAD: u32 = 0x040;
    pub const CAN_DRYWET: u32 = 0x100;
    pub const CAN_VOLUME: u32 = 0x200;
    pub const CAN_BALANCE: u32 = 0x400;
    pub const CAN_FORCE_STEREO: u32 = 0x800;
}

/// Per-plugin, user-settable options bitset.
pub mod plugin_options {
    pub const FIXED_BUFFER: u32 = 0x001;
    pub const FORCE_STEREO: u32 = 0x002;
    pub const SELF_AUTOMATION: u32 = 0x004;
    pub const USE_CHUNKS: u32 = 0x008;
    pub const SEND_ALL_SOUND_OFF: u32 = 0x010;
    pub const SEND_NOTE_OFF_VELO: u32 = 0x020;
    pub const SEND_NOTE_AFTERTOUCH: u32 = 0x040;
    pub const SEND_PITCHBEND: u32 = 0x080;
}

/// Per-parameter hints bitset.
pub mod parameter_hints {
    pub const BOOLEAN: u32 = 0x01;
    pub const INTEGER: u32 = 0x02;
    pub const LOGARITHMIC: u32 = 0x04;
    pub const ENABLED: u32 = 0x08;
    pub const AUTOMABLE: u32 = 0x10;
    pub const USES_SAMPLERATE: u32 = 0x20;
    pub const USES_SCALEPOINTS: u32 = 0x40;
    pub const USES_CUSTOM_TEXT: u32 = 0x80;
}

/// Negative, internal-only parameter ids; never exposed in a plugin's own
/// parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum InternalParameterId {
    Null = -1,
    Active = -2,
    DryWet = -3,
    Volume = -4,
    BalanceLeft = -5,
    BalanceRight = -6,
    Panning = -7,
}

/// Binary flavor a bridged plugin's sub-process must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryType {
    None,
    Posix32,
    Posix64,
    Win32,
    Win64,
    Other,
}

/// Format family a `Plugin` instance adapts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginType {
    None,
    Internal,
    Ladspa,
    Dssi,
    Lv2,
    Vst2,
    Gig,
    Sf2,
    Sfz,
    Bridge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginCategory {
    None,
    Synth,
    Delay,
    Eq,
    Filter,
    Dynamics,
    Modulator,
    Utility,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    Unknown,
    Input,
    Output,
    Latency,
    SampleRate,
    Freewheel,
    Time,
}

/// Engine-wide processing topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessMode {
    SingleClient,
    MultipleClients,
    ContinuousRack,
    Patchbay,
    Bridge,
}

/// `Engine::set_option()` tags, restricted to the ones this core consumes
/// (discovery-scanner and UI-toolkit bridge path options are out of scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionsType {
    ProcessName,
    ProcessMode,
    ForceStereo,
    PreferPluginBridges,
    PreferUiBridges,
    UseDssiVstChunks,
    MaxParameters,
    OscUiTimeout,
    PreferredBufferSize,
    PreferredSampleRate,
    PathBridgeNativePosix32,
    PathBridgeNativePosix64,
    PathBridgeNativeWin32,
    PathBridgeNativeWin64,
}

/// Opcodes delivered to the host callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackAction {
    Debug,
    ParameterValueChanged,
    ParameterMidiChannelChanged,
    ParameterMidiCcChanged,
    ProgramChanged,
    MidiProgramChanged,
    NoteOn,
    NoteOff,
    ShowGui,
    Update,
    ReloadInfo,
    ReloadParameters,
    ReloadPrograms,
    ReloadAll,
    Error,
    Quit,
}

/// `ShowGui` callback state values (value carried alongside the action).
pub mod gui_state {
    pub const HIDDEN: i32 = 0;
    pub const SHOWN: i32 = 1;
    pub const CRASHED: i32 = -1;
}

/// MIDI-program table entry. Bank 128 is reserved for drum kits by the
/// sound-kit adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiProgramData {
    pub bank: u32,
    pub program: u32,
    pub name: String,
}

pub const SF2_DRUM_BANK: u32 = 128;

/// Custom-data type URIs.
pub mod custom_data_type {
    pub const CHUNK: &str = "http://kxstudio.sf.net/ns/carla/chunk";
    pub const STRING: &str = "http://kxstudio.sf.net/ns/carla/string";
}

/// A MIDI event carried across the RT boundary and over the bridge's
/// shared-memory ring. `#[repr(C)]` so it round-trips through shared
/// memory without re-encoding.
#[repr(C)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MidiEvent {
    pub time: u32,
    pub channel: u8,
    pub data: [u8; 3],
    pub size: u8,
}

/// `ControlEventType` without the Rust enum niche, so `ControlEvent` stays
/// a plain-old-data `#[repr(C)]` struct for the shared-memory ring.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlEventType {
    ParameterChange = 0,
    MidiBankChange = 1,
    MidiProgramChange = 2,
    AllSoundOff = 3,
    AllNotesOff = 4,
}

/// A parameter/bank/program change observed on a control-in port.
#[repr(C)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlEvent {
    pub time: u32,
    pub channel: u8,
    pub kind: ControlEventType,
    /// Parameter index (`ParameterChange`) or bank/program id
    /// (`MidiBankChange`/`MidiProgramChange`); unused otherwise.
    pub param: u32,
    /// Normalised value in `[0.0, 1.0]`.
    pub value: f32,
}
