//! Layout of the shared-memory region a bridged plugin's sub-process and
//! the engine's bridge adapter both map. Audio buffers, MIDI events, and
//! parameter deltas are shuttled here; everything else (plugin loading,
//! custom data, chunk save/restore) goes over the OSC control channel in
//! [`crate::bridge`].

use serde::{Deserialize, Serialize};

use crate::{ControlEvent, MidiEvent};

pub const RIGEL_SHMEM_MAGIC: u32 = 0x52_49_47_4c; // "RIGL"

pub const CMD_IDLE: u32 = 0;
pub const CMD_PROCESS: u32 = 1;

pub const RSP_IDLE: u32 = 0;
pub const RSP_DONE: u32 = 1;

/// Upper bound on spin-wait iterations before the host side treats a
/// bridged plugin as hung and reports `RigelError::BridgeTimeout`.
pub const SPIN_TIMEOUT_ITERATIONS: u32 = 200_000;

pub const DEFAULT_BUFFER_SIZE: usize = 512;
pub const DEFAULT_CHANNEL_COUNT: usize = 2;

/// Identifies a shared-memory region by OS name and size, handed to the
/// sub-process in [`crate::bridge::BridgeCommand::Announce`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShmemConfig {
    pub os_id: String,
    pub size: usize,
}

/// Header sitting at the start of the mapped region. Every offset field
/// is a byte offset from the start of the region to the named buffer;
/// the audio buffers are `channel_count * buffer_size` `f32`s each, the
/// MIDI buffer holds up to [`crate::MAX_MIDI_EVENTS`] [`MidiEvent`]s, and
/// the control-event buffer holds the same count of [`ControlEvent`]s.
#[repr(C)]
pub struct ShmemHeader {
    pub magic: u32,
    pub status: u32,

    pub input_offset: u32,
    pub output_offset: u32,

    /// Command/response handshake: host writes `command`, spins until
    /// the sub-process flips `response` to `RSP_DONE`.
    pub command: u32,
    pub response: u32,
    pub sample_count: u32,
    pub channel_count: u32,

    pub midi_event_count: u32,
    pub midi_offset: u32,

    pub control_event_count: u32,
    pub control_offset: u32,

    /// Parameter-touch feedback for host-side automation recording.
    pub last_touched_param: u32,
    pub last_touched_value: f32,
    pub touch_generation: u32,

    /// Transport state synthesised by the engine for formats (VST2) that
    /// read time info from the host rather than receiving it as events.
    pub transport_is_playing: u32,
    pub transport_tempo: f64,
    pub transport_song_pos_beats: f64,
    pub transport_bar_start_beats: f64,
    pub transport_bar_number: i32,
    pub transport_time_sig_num: u16,
    pub transport_time_sig_denom: u16,
}

impl ShmemHeader {
    pub fn zeroed() -> Self {
        Self {
            magic: RIGEL_SHMEM_MAGIC,
            status: 0,
            input_offset: 0,
            output_offset: 0,
            command: CMD_IDLE,
            response: RSP_IDLE,
            sample_count: 0,
            channel_count: DEFAULT_CHANNEL_COUNT as u32,
            midi_event_count: 0,
            midi_offset: 0,
            control_event_count: 0,
            control_offset: 0,
            last_touched_param: crate::InternalParameterId::Null as i32 as u32,
            last_touched_value: 0.0,
            touch_generation: 0,
            transport_is_playing: 0,
            transport_tempo: 120.0,
            transport_song_pos_beats: 0.0,
            transport_bar_start_beats: 0.0,
            transport_bar_number: 1,
            transport_time_sig_num: 4,
            transport_time_sig_denom: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_header_starts_idle() {
        let header = ShmemHeader::zeroed();
        assert_eq!(header.magic, RIGEL_SHMEM_MAGIC);
        assert_eq!(header.command, CMD_IDLE);
        assert_eq!(header.response, RSP_IDLE);
        assert_eq!(header.transport_time_sig_num, 4);
    }
}
