//! DSSI adapter (§4.5): a `DSSI_Descriptor` wraps a `LADSPA_Descriptor`
//! and adds `run_synth`, which this adapter drives with MIDI events
//! pre-sorted by frame offset, matching the ALSA-sequencer event shape
//! `run_synth` expects (grounded on the original `dssi.cpp`'s ordering
//! requirement).

use std::ffi::{c_void, CStr};

use libloading::{Library, Symbol};
use rigel_shared::error::{RigelError, RigelResult};
use rigel_shared::{custom_data_type, plugin_hints, PluginType, ProcessMode};

use crate::plugin::native_abi::{
    ladspa_port, DssiDescriptor, DssiDescriptorFn, DssiSeqEvent, DSSI_SEQ_EVENT_NOTE_OFF, DSSI_SEQ_EVENT_NOTE_ON,
};
use crate::plugin::{PluginCapability, PluginCommon};

struct NativeHandle {
    instance: *mut c_void,
    control_values: Vec<f32>,
    audio_out_rindex: Vec<usize>,
}

unsafe impl Send for NativeHandle {}

pub struct DssiPlugin {
    common: PluginCommon,
    _library: Library,
    descriptor: *const DssiDescriptor,
    handle: Option<NativeHandle>,
    pending_events: Vec<DssiSeqEvent>,
}

unsafe impl Send for DssiPlugin {}

impl DssiPlugin {
    pub fn load(id: u32, path: &str, label: &str, index: u64) -> RigelResult<Self> {
        let library = unsafe { Library::new(path) }
            .map_err(|e| super::ladspa::load_failure(path, label, e))?;
        let descriptor_fn: Symbol<DssiDescriptorFn> = unsafe { library.get(b"dssi_descriptor\0") }
            .map_err(|e| super::ladspa::load_failure(path, label, e))?;
        let descriptor = unsafe { descriptor_fn(index) };
        if descriptor.is_null() {
            return Err(RigelError::PluginLoadFailure { path: path.into(), label: label.into(), reason: "dssi_descriptor returned null".into() });
        }
        let ladspa = unsafe { &*(*descriptor).ladspa_descriptor };
        let found_label = unsafe { CStr::from_ptr(ladspa.label) }.to_string_lossy();
        if found_label != label {
            return Err(RigelError::PluginLoadFailure { path: path.into(), label: label.into(), reason: format!("label mismatch: found '{found_label}'") });
        }
        let name = unsafe { CStr::from_ptr(ladspa.name) }.to_string_lossy().into_owned();

        let mut common = PluginCommon::new(id, PluginType::Dssi, ProcessMode::ContinuousRack);
        common.filename = path.into();
        common.label = label.into();
        common.name = name;
        common.hints |= plugin_hints::IS_SYNTH;

        Ok(Self { common, _library: library, descriptor, handle: None, pending_events: Vec::new() })
    }

    fn ladspa(&self) -> &crate::plugin::native_abi::LadspaDescriptor {
        unsafe { &*(*self.descriptor).ladspa_descriptor }
    }
}

impl PluginCapability for DssiPlugin {
    fn common(&self) -> &PluginCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PluginCommon {
        &mut self.common
    }

    fn reload(&mut self) -> RigelResult<()> {
        let ladspa = self.ladspa();
        let instance = unsafe { (ladspa.instantiate)(ladspa, 44_100) };
        if instance.is_null() {
            return Err(RigelError::PluginLoadFailure { path: self.common.filename.clone(), label: self.common.label.clone(), reason: "instantiate returned null".into() });
        }
        let port_count = ladspa.port_count as usize;
        let mut control_values = vec![0.0f32; port_count];
        for i in 0..port_count {
            let desc = unsafe { *ladspa.port_descriptors.add(i) };
            if desc & ladspa_port::CONTROL != 0 {
                let ptr = control_values.as_mut_ptr().wrapping_add(i);
                unsafe { (ladspa.connect_port)(instance, i as std::os::raw::c_ulong, ptr) };
            }
        }
        let audio_out_rindex = (0..port_count)
            .filter(|&i| {
                let desc = unsafe { *ladspa.port_descriptors.add(i) };
                desc & (ladspa_port::AUDIO | ladspa_port::OUTPUT) == (ladspa_port::AUDIO | ladspa_port::OUTPUT)
            })
            .collect();
        self.handle = Some(NativeHandle { instance, control_values, audio_out_rindex });
        Ok(())
    }

    /// Feeds already-time-sorted note events into `run_synth`, the
    /// MIDI-aware replacement for LADSPA's plain `run` (§4.5).
    fn queue_midi(&mut self, events: &[rigel_shared::MidiEvent]) {
        self.pending_events.clear();
        let mut sorted: Vec<&rigel_shared::MidiEvent> = events.iter().collect();
        sorted.sort_by_key(|e| e.time);
        for event in sorted {
            let status = event.data[0] & 0xF0;
            let event_type = match status {
                0x90 if event.data[2] > 0 => DSSI_SEQ_EVENT_NOTE_ON,
                0x90 | 0x80 => DSSI_SEQ_EVENT_NOTE_OFF,
                _ => continue,
            };
            self.pending_events.push(DssiSeqEvent {
                event_type,
                channel: event.channel,
                data1: event.data[1],
                data2: event.data[2],
                frame_offset: event.time,
            });
        }
    }

    fn native_process(&mut self, _inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        let ladspa = self.ladspa();
        let Some(handle) = &self.handle else { return };
        for (slot, &rindex) in handle.audio_out_rindex.iter().enumerate() {
            if let Some(output) = outputs.get_mut(slot) {
                let ptr = output.as_mut_ptr();
                unsafe { (ladspa.connect_port)(handle.instance, rindex as std::os::raw::c_ulong, ptr) };
            }
        }
        if let Some(run_synth) = unsafe { (*self.descriptor).run_synth } {
            unsafe {
                run_synth(
                    handle.instance,
                    frames as std::os::raw::c_ulong,
                    self.pending_events.as_ptr(),
                    self.pending_events.len() as std::os::raw::c_ulong,
                )
            };
        } else {
            unsafe { (ladspa.run)(handle.instance, frames as std::os::raw::c_ulong) };
        }
    }

    /// Preserved restriction (§9): DSSI declines non-string custom data
    /// even though the generic store would accept any type URI.
    fn set_custom_data(&mut self, type_uri: &str, key: &str, value: &str) -> RigelResult<()> {
        if type_uri != custom_data_type::STRING {
            return Err(RigelError::Configuration(format!(
                "DSSI plugin '{}' refuses non-string custom data (type '{}')",
                self.common.name, type_uri
            )));
        }
        self.common.custom_data.set(type_uri, key, value);
        Ok(())
    }
}

impl Drop for DssiPlugin {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let ladspa = self.ladspa();
            unsafe { (ladspa.cleanup)(handle.instance) };
        }
    }
}
