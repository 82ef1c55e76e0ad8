//! LADSPA adapter (§4.5): forced-stereo via a second native instance,
//! and latency auto-detection by running the native process twice with
//! silent buffers before activation.

use std::ffi::{c_void, CStr, CString};

use libloading::{Library, Symbol};
use rigel_shared::error::{RigelError, RigelResult};
use rigel_shared::{parameter_hints, plugin_hints, PluginType, ProcessMode};

use crate::parameter::{ParameterData, ParameterRanges};
use crate::plugin::native_abi::{ladspa_hint, ladspa_port, LadspaDescriptor, LadspaDescriptorFn};
use crate::plugin::{PluginCapability, PluginCommon};

struct NativeHandle {
    instance: *mut c_void,
    control_values: Vec<f32>,
    audio_in_rindex: Vec<usize>,
    audio_out_rindex: Vec<usize>,
}

// SAFETY: a LADSPA instance is only ever touched from the RT thread that
// owns this adapter (see §5 "RT audio thread"); the pointer itself never
// crosses threads concurrently.
unsafe impl Send for NativeHandle {}

pub struct LadspaPlugin {
    common: PluginCommon,
    _library: Library,
    descriptor: *const LadspaDescriptor,
    primary: Option<NativeHandle>,
    /// Second instance for forced stereo (§4.5): a 1-in/1-out plugin
    /// gets a twin so each channel runs independently in lock-step.
    secondary: Option<NativeHandle>,
    sample_rate: f64,
}

// SAFETY: see `NativeHandle`.
unsafe impl Send for LadspaPlugin {}

impl LadspaPlugin {
    /// Loads `path`, resolves `ladspa_descriptor(index)`, and returns an
    /// unreloaded adapter: call [`PluginCapability::reload`] before use.
    pub fn load(id: u32, path: &str, label: &str, index: u64, sample_rate: f64) -> RigelResult<Self> {
        let library = unsafe { Library::new(path) }.map_err(|e| RigelError::PluginLoadFailure {
            path: path.to_string(),
            label: label.to_string(),
            reason: e.to_string(),
        })?;

        let descriptor_fn: Symbol<LadspaDescriptorFn> = unsafe { library.get(b"ladspa_descriptor\0") }
            .map_err(|e| RigelError::PluginLoadFailure { path: path.to_string(), label: label.to_string(), reason: e.to_string() })?;

        let descriptor = unsafe { descriptor_fn(index) };
        if descriptor.is_null() {
            return Err(RigelError::PluginLoadFailure {
                path: path.to_string(),
                label: label.to_string(),
                reason: "ladspa_descriptor returned null".into(),
            });
        }

        let found_label = unsafe { CStr::from_ptr((*descriptor).label) }.to_string_lossy();
        if found_label != label {
            return Err(RigelError::PluginLoadFailure {
                path: path.to_string(),
                label: label.to_string(),
                reason: format!("label mismatch: found '{found_label}'"),
            });
        }

        let name = unsafe { CStr::from_ptr((*descriptor).name) }.to_string_lossy().into_owned();

        let mut common = PluginCommon::new(id, PluginType::Ladspa, ProcessMode::ContinuousRack);
        common.filename = path.to_string();
        common.label = label.to_string();
        common.name = name;
        common.hints |= plugin_hints::IS_RTSAFE;

        Ok(Self { common, _library: library, descriptor, primary: None, secondary: None, sample_rate })
    }

    fn instantiate(&self) -> RigelResult<NativeHandle> {
        let descriptor = unsafe { &*self.descriptor };
        let instance = unsafe { (descriptor.instantiate)(self.descriptor, self.sample_rate as u64) };
        if instance.is_null() {
            return Err(RigelError::PluginLoadFailure {
                path: self.common.filename.clone(),
                label: self.common.label.clone(),
                reason: "instantiate returned null".into(),
            });
        }
        let port_count = descriptor.port_count as usize;
        Ok(NativeHandle {
            instance,
            control_values: vec![0.0; port_count],
            audio_in_rindex: Vec::new(),
            audio_out_rindex: Vec::new(),
        })
    }

    fn connect_control_ports(&self, handle: &mut NativeHandle) {
        let descriptor = unsafe { &*self.descriptor };
        for i in 0..descriptor.port_count as usize {
            let desc = unsafe { *descriptor.port_descriptors.add(i) };
            if desc & ladspa_port::CONTROL != 0 {
                let ptr = handle.control_values.as_mut_ptr().wrapping_add(i);
                unsafe { (descriptor.connect_port)(handle.instance, i as std::os::raw::c_ulong, ptr) };
            }
        }
    }

    /// §4.5: runs the native `run()` twice with 2 silent frames before
    /// activation to detect a `latency`/`_latency` control-output port.
    fn detect_latency(&self, handle: &NativeHandle) -> u32 {
        let descriptor = unsafe { &*self.descriptor };
        for i in 0..descriptor.port_count as usize {
            let desc = unsafe { *descriptor.port_descriptors.add(i) };
            if desc & (ladspa_port::CONTROL | ladspa_port::OUTPUT) != (ladspa_port::CONTROL | ladspa_port::OUTPUT) {
                continue;
            }
            let name = unsafe { CStr::from_ptr(*descriptor.port_names.add(i)) }.to_string_lossy();
            if name != "latency" && name != "_latency" {
                continue;
            }
            unsafe { (descriptor.run)(handle.instance, 2) };
            unsafe { (descriptor.run)(handle.instance, 2) };
            return handle.control_values[i].max(0.0) as u32;
        }
        0
    }

    fn build_parameter_table(&mut self, handle: &NativeHandle) {
        let descriptor = unsafe { &*self.descriptor };
        self.common.parameters.clear();
        for i in 0..descriptor.port_count as usize {
            let desc = unsafe { *descriptor.port_descriptors.add(i) };
            if desc & ladspa_port::CONTROL == 0 {
                continue;
            }
            let hint = unsafe { &*descriptor.port_range_hints.add(i) };
            let is_output = desc & ladspa_port::OUTPUT != 0;
            let mut hints = 0u32;
            let mut min = if hint.hint_descriptor & ladspa_hint::BOUNDED_BELOW != 0 { hint.lower_bound } else { 0.0 };
            let mut max = if hint.hint_descriptor & ladspa_hint::BOUNDED_ABOVE != 0 { hint.upper_bound } else { 1.0 };
            if hint.hint_descriptor & ladspa_hint::SAMPLE_RATE != 0 {
                min *= self.sample_rate as f32;
                max *= self.sample_rate as f32;
                hints |= parameter_hints::USES_SAMPLERATE;
            }
            if hint.hint_descriptor & ladspa_hint::TOGGLED != 0 {
                hints |= parameter_hints::BOOLEAN;
            }
            if hint.hint_descriptor & ladspa_hint::INTEGER != 0 {
                hints |= parameter_hints::INTEGER;
            }
            if hint.hint_descriptor & ladspa_hint::LOGARITHMIC != 0 {
                hints |= parameter_hints::LOGARITHMIC;
            }
            hints |= parameter_hints::ENABLED | parameter_hints::AUTOMABLE;
            let def = if hint.hint_descriptor & ladspa_hint::DEFAULT_MINIMUM != 0 { min } else { handle.control_values[i] };

            self.common.parameters.push(
                ParameterData {
                    param_type: if is_output { rigel_shared::ParameterType::Output } else { rigel_shared::ParameterType::Input },
                    index: self.common.parameters.count() as u32,
                    rindex: i as i32,
                    hints,
                    midi_channel: 0,
                    midi_cc: -1,
                },
                ParameterRanges { def, min, max, step: (max - min) / 100.0, step_small: (max - min) / 1000.0, step_large: (max - min) / 10.0 },
            );
        }
    }
}

impl PluginCapability for LadspaPlugin {
    fn common(&self) -> &PluginCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PluginCommon {
        &mut self.common
    }

    fn reload(&mut self) -> RigelResult<()> {
        let mut handle = self.instantiate()?;
        self.connect_control_ports(&mut handle);
        self.build_parameter_table(&handle);

        let descriptor = unsafe { &*self.descriptor };
        let audio_ports: Vec<(usize, bool)> = (0..descriptor.port_count as usize)
            .filter_map(|i| {
                let desc = unsafe { *descriptor.port_descriptors.add(i) };
                (desc & ladspa_port::AUDIO != 0).then(|| (i, desc & ladspa_port::INPUT != 0))
            })
            .collect();
        handle.audio_in_rindex = audio_ports.iter().filter(|(_, is_in)| *is_in).map(|(i, _)| *i).collect();
        handle.audio_out_rindex = audio_ports.iter().filter(|(_, is_in)| !*is_in).map(|(i, _)| *i).collect();

        let latency = self.detect_latency(&handle);
        self.common.resize_latency_rings(handle.audio_in_rindex.len().max(1), latency);

        self.secondary = if handle.audio_in_rindex.len() == 1 && handle.audio_out_rindex.len() == 1 {
            let mut twin = self.instantiate()?;
            self.connect_control_ports(&mut twin);
            // Lock-step: both handles share the same parameter buffer
            // values so a later `set_value` affects both channels
            // identically (§4.5).
            twin.control_values.copy_from_slice(&handle.control_values);
            Some(twin)
        } else {
            None
        };

        self.primary = Some(handle);
        Ok(())
    }

    fn activate(&mut self) {
        let descriptor = unsafe { &*self.descriptor };
        if let (Some(activate), Some(handle)) = (descriptor.activate, &self.primary) {
            unsafe { activate(handle.instance) };
        }
        if let (Some(activate), Some(handle)) = (descriptor.activate, &self.secondary) {
            unsafe { activate(handle.instance) };
        }
        self.common.client.activate();
    }

    fn deactivate(&mut self) {
        let descriptor = unsafe { &*self.descriptor };
        if let (Some(deactivate), Some(handle)) = (descriptor.deactivate, &self.primary) {
            unsafe { deactivate(handle.instance) };
        }
        if let (Some(deactivate), Some(handle)) = (descriptor.deactivate, &self.secondary) {
            unsafe { deactivate(handle.instance) };
        }
        self.common.client.deactivate();
    }

    fn native_process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        let descriptor = unsafe { &*self.descriptor };
        let Some(primary) = &self.primary else { return };

        if let Some(secondary) = &self.secondary {
            // Forced stereo: run each channel through its own instance.
            for (handle, channel) in [(primary, 0usize), (secondary, 1usize)] {
                if let (Some(&in_rindex), Some(&out_rindex)) = (handle.audio_in_rindex.first(), handle.audio_out_rindex.first()) {
                    let input = inputs.get(channel).or_else(|| inputs.first()).copied().unwrap_or(&[]);
                    let in_ptr = input.as_ptr() as *mut f32;
                    unsafe { (descriptor.connect_port)(handle.instance, in_rindex as std::os::raw::c_ulong, in_ptr) };
                    if let Some(output) = outputs.get_mut(channel) {
                        let out_ptr = output.as_mut_ptr();
                        unsafe { (descriptor.connect_port)(handle.instance, out_rindex as std::os::raw::c_ulong, out_ptr) };
                    }
                    unsafe { (descriptor.run)(handle.instance, frames as std::os::raw::c_ulong) };
                }
            }
            return;
        }

        for (slot, &rindex) in primary.audio_in_rindex.iter().enumerate() {
            if let Some(input) = inputs.get(slot) {
                let ptr = input.as_ptr() as *mut f32;
                unsafe { (descriptor.connect_port)(primary.instance, rindex as std::os::raw::c_ulong, ptr) };
            }
        }
        for (slot, &rindex) in primary.audio_out_rindex.iter().enumerate() {
            if let Some(output) = outputs.get_mut(slot) {
                let ptr = output.as_mut_ptr();
                unsafe { (descriptor.connect_port)(primary.instance, rindex as std::os::raw::c_ulong, ptr) };
            }
        }
        unsafe { (descriptor.run)(primary.instance, frames as std::os::raw::c_ulong) };
    }
}

impl Drop for LadspaPlugin {
    fn drop(&mut self) {
        let descriptor = unsafe { &*self.descriptor };
        if let Some(handle) = self.primary.take() {
            unsafe { (descriptor.cleanup)(handle.instance) };
        }
        if let Some(handle) = self.secondary.take() {
            unsafe { (descriptor.cleanup)(handle.instance) };
        }
    }
}

/// Temp-file-free helper shared with the DSSI adapter (which wraps a
/// `LADSPA_Descriptor` internally): turns a `CString` load error into
/// the uniform `RigelError::PluginLoadFailure` shape.
pub(crate) fn load_failure(path: &str, label: &str, reason: impl std::fmt::Display) -> RigelError {
    RigelError::PluginLoadFailure { path: path.to_string(), label: label.to_string(), reason: reason.to_string() }
}

#[allow(dead_code)]
fn cstring_or_empty(value: &str) -> CString {
    CString::new(value).unwrap_or_default()
}
