//! Non-RT control-channel messages exchanged between `rigel_engine`'s
//! bridge adapter and the `rigel_bridge` sub-process. Audio, MIDI, and
//! parameter deltas never travel this way — they go over the
//! [`crate::shmem`] ring; this is the slow path, carried over OSC.

use serde::{Deserialize, Serialize};

use crate::{MidiProgramData, ParameterType};

/// Tags every message the bridge sub-process or the host side of the
/// bridge adapter can send, mirroring the announce/update/error exchange
/// a real out-of-process bridge performs before settling into steady
/// audio processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginBridgeInfoType {
    AudioCount,
    MidiCount,
    ParameterCount,
    ProgramCount,
    MidiProgramCount,
    PluginInfo,
    ParameterInfo,
    ParameterData,
    ParameterRanges,
    ProgramInfo,
    MidiProgramInfo,
    Configure,
    SetParameterValue,
    SetDefaultValue,
    SetProgram,
    SetMidiProgram,
    SetCustomData,
    SetChunkData,
    UpdateNow,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeParameterInfo {
    pub index: u32,
    pub name: String,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BridgeParameterRanges {
    pub index: u32,
    pub def: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub step_small: f32,
    pub step_large: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeProgramInfo {
    pub index: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgePluginInfo {
    pub kind: crate::PluginType,
    pub category: crate::PluginCategory,
    pub hints: u32,
    pub name: String,
    pub label: String,
    pub maker: String,
    pub copyright: String,
    pub unique_id: i64,
}

/// Sent from the host side of the bridge adapter to the sub-process.
/// Anything beyond activation, loading, and per-event control flows
/// through the shared-memory ring instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeCommand {
    Announce {
        shmem_name: String,
        shmem_size: usize,
        sample_rate: f64,
        buffer_size: u32,
    },
    LoadPlugin {
        binary_path: String,
        label: String,
        unique_id: i64,
    },
    SetParameterValue {
        index: u32,
        value: f32,
    },
    SetDefaultValue {
        index: u32,
        value: f32,
    },
    SetProgram {
        index: i32,
    },
    SetMidiProgram {
        index: i32,
    },
    SetCustomData {
        kind: String,
        key: String,
        value: String,
    },
    SetChunkData {
        data_b64: String,
    },
    ShowGui {
        show: bool,
    },
    SaveNow,
    Quit,
}

/// Sent from the sub-process back to the host side of the bridge
/// adapter, tagged by [`PluginBridgeInfoType`] the same way the wire
/// protocol this is modeled on tags its `/bridge_*` OSC methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeEvent {
    AudioCount { ins: u32, outs: u32 },
    MidiCount { ins: u32, outs: u32 },
    ParameterCount { ins: u32, outs: u32 },
    ProgramCount { count: u32 },
    MidiProgramCount { count: u32 },
    PluginInfo(BridgePluginInfo),
    ParameterInfo(BridgeParameterInfo),
    ParameterData { index: u32, param_type: ParameterType, hints: u32, midi_channel: u8, midi_cc: i16 },
    ParameterRanges(BridgeParameterRanges),
    ProgramInfo(BridgeProgramInfo),
    MidiProgramInfo(MidiProgramData),
    Configure { key: String, value: String },
    ParameterValueChanged { index: u32, value: f32 },
    ProgramChanged { index: i32 },
    MidiProgramChanged { index: i32 },
    Updated,
    SavedNow { chunk_b64: Option<String> },
    Error { reason: String },
}
