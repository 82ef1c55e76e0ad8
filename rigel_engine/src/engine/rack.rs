//! Rack mode processing (§4.7 "Rack mode process"): fixed 2-in/2-out
//! audio chain plus one shared event buffer every plugin reads from and
//! writes into (§4.2: "the engine's rack merges system MIDI with
//! injected notes").

use crate::plugin::{process, Plugin, PluginCapability};
use crate::port::EventPort;

/// Preallocated chain buffers for [`process_rack`], sized once to
/// [`rigel_shared::MAX_AUDIO_BUFFER_FRAMES`] so no RT callback ever grows
/// or reallocates them (§5 "no heap allocation on the RT audio thread").
/// `chain_l`/`chain_r` hold the running mix; `out_l`/`out_r` hold the
/// current plugin's output and are swapped into the chain in place of a
/// move, which would otherwise allocate a fresh buffer for the plugin
/// that inherits the old chain slot.
pub struct RackScratch {
    chain_l: Vec<f32>,
    chain_r: Vec<f32>,
    out_l: Vec<f32>,
    out_r: Vec<f32>,
}

impl RackScratch {
    pub fn new() -> Self {
        let cap = rigel_shared::MAX_AUDIO_BUFFER_FRAMES;
        Self { chain_l: vec![0.0; cap], chain_r: vec![0.0; cap], out_l: vec![0.0; cap], out_r: vec![0.0; cap] }
    }
}

impl Default for RackScratch {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks `plugins` in id (table index) order; each enabled plugin's
/// output becomes the next plugin's input, duplicating mono into both
/// channels is the format adapter's job (ForceStereo), not this walk's.
/// `shared_in` is read by every plugin; `shared_out` accumulates every
/// plugin's control/MIDI output and is re-sorted into time order once
/// the whole chain has run.
pub fn process_rack(
    plugins: &mut [Option<Plugin>],
    shared_in: &EventPort,
    shared_out: &mut EventPort,
    scratch: &mut RackScratch,
    left: &mut [f32],
    right: &mut [f32],
) {
    let frames = left.len();
    scratch.chain_l[..frames].copy_from_slice(left);
    scratch.chain_r[..frames].copy_from_slice(right);

    for slot in plugins.iter_mut() {
        let Some(plugin) = slot else { continue };
        if !plugin.common().is_enabled() {
            continue;
        }

        scratch.out_l[..frames].fill(0.0);
        scratch.out_r[..frames].fill(0.0);
        let audio_in: [&[f32]; 2] = [&scratch.chain_l[..frames], &scratch.chain_r[..frames]];
        let mut audio_out: [&mut [f32]; 2] = [&mut scratch.out_l[..frames], &mut scratch.out_r[..frames]];
        // ContinuousRack mode skips per-plugin metering (§4.4 step 1/9);
        // the engine meters the chain's ends instead.
        process(plugin, shared_in, shared_in, shared_out, &audio_in, &mut audio_out, frames, true);

        std::mem::swap(&mut scratch.chain_l, &mut scratch.out_l);
        std::mem::swap(&mut scratch.chain_r, &mut scratch.out_r);
    }

    left.copy_from_slice(&scratch.chain_l[..frames]);
    right.copy_from_slice(&scratch.chain_r[..frames]);
    shared_out.events_mut().stable_sort_by_time();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chain_is_identity() {
        // No loaded plugins: the chain must pass audio through unchanged.
        let mut plugins: Vec<Option<Plugin>> = vec![None, None];
        let shared_in = EventPort::new(true, 64);
        let mut shared_out = EventPort::new(false, 64);
        let mut scratch = RackScratch::new();
        let mut left = vec![0.5f32; 8];
        let mut right = vec![0.25f32; 8];
        let left_before = left.clone();
        let right_before = right.clone();

        process_rack(&mut plugins, &shared_in, &mut shared_out, &mut scratch, &mut left, &mut right);

        assert_eq!(left, left_before);
        assert_eq!(right, right_before);
    }
}
