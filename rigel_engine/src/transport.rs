//! Time-info record the engine exposes to plugins (§3 "Engine" data
//! model, §4.5 "VST2 time info must be synthesised from engine time
//! info"). The engine only forwards what the driver reports — it never
//! generates MIDI clock or transport itself (explicit non-goal).

use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

static TRANSPORT_IS_PLAYING: AtomicU32 = AtomicU32::new(0);
static TRANSPORT_TEMPO_BITS: AtomicU64 = AtomicU64::new(0);
static TRANSPORT_SONG_POS_BITS: AtomicU64 = AtomicU64::new(0);
static TRANSPORT_BAR_START_BITS: AtomicU64 = AtomicU64::new(0);
static TRANSPORT_BAR_NUMBER: AtomicI32 = AtomicI32::new(1);
static TRANSPORT_TIME_SIG: AtomicU32 = AtomicU32::new(0x0004_0004); // packed num|denom

/// Cheap-to-copy snapshot read by a format adapter's native process call
/// (directly, for VST2; via an event, for formats with their own time
/// info message).
#[derive(Clone, Copy, Debug)]
pub struct TimeInfo {
    pub is_playing: bool,
    pub tempo: f64,
    pub song_pos_beats: f64,
    pub bar_start_beats: f64,
    pub bar_number: i32,
    pub time_sig_num: u16,
    pub time_sig_denom: u16,
}

impl Default for TimeInfo {
    fn default() -> Self {
        Self {
            is_playing: false,
            tempo: 120.0,
            song_pos_beats: 0.0,
            bar_start_beats: 0.0,
            bar_number: 1,
            time_sig_num: 4,
            time_sig_denom: 4,
        }
    }
}

/// Called once per callback by the engine's RT entry, before any plugin
/// processes, with whatever the driver reported this cycle. Lock-free:
/// atomic stores only.
#[inline]
pub fn update_time_info(info: TimeInfo) {
    TRANSPORT_IS_PLAYING.store(info.is_playing as u32, Ordering::Relaxed);
    TRANSPORT_TEMPO_BITS.store(info.tempo.to_bits(), Ordering::Relaxed);
    TRANSPORT_SONG_POS_BITS.store(info.song_pos_beats.to_bits(), Ordering::Relaxed);
    TRANSPORT_BAR_START_BITS.store(info.bar_start_beats.to_bits(), Ordering::Relaxed);
    TRANSPORT_BAR_NUMBER.store(info.bar_number, Ordering::Relaxed);
    let packed_sig = ((info.time_sig_num as u32) << 16) | (info.time_sig_denom as u32);
    TRANSPORT_TIME_SIG.store(packed_sig, Ordering::Relaxed);
}

/// Read by a format adapter's native process call, possibly from a
/// different thread than the one that last called `update_time_info`
/// (single audio thread in practice, but the bridge sub-process reads
/// its own shadow copy over shared memory instead of this global).
#[inline]
pub fn current_time_info() -> TimeInfo {
    let packed_sig = TRANSPORT_TIME_SIG.load(Ordering::Relaxed);
    TimeInfo {
        is_playing: TRANSPORT_IS_PLAYING.load(Ordering::Relaxed) != 0,
        tempo: f64::from_bits(TRANSPORT_TEMPO_BITS.load(Ordering::Relaxed)),
        song_pos_beats: f64::from_bits(TRANSPORT_SONG_POS_BITS.load(Ordering::Relaxed)),
        bar_start_beats: f64::from_bits(TRANSPORT_BAR_START_BITS.load(Ordering::Relaxed)),
        bar_number: TRANSPORT_BAR_NUMBER.load(Ordering::Relaxed),
        time_sig_num: (packed_sig >> 16) as u16,
        time_sig_denom: (packed_sig & 0xFFFF) as u16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_atomics() {
        let info = TimeInfo {
            is_playing: true,
            tempo: 140.0,
            song_pos_beats: 12.5,
            bar_start_beats: 12.0,
            bar_number: 4,
            time_sig_num: 3,
            time_sig_denom: 4,
        };
        update_time_info(info);
        let read_back = current_time_info();
        assert!(read_back.is_playing);
        assert_eq!(read_back.tempo, 140.0);
        assert_eq!(read_back.time_sig_num, 3);
        assert_eq!(read_back.bar_number, 4);
    }
}
