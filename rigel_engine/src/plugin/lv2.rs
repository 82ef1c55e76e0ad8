//! LV2 adapter (§4.5). Loads a single plugin's shared object directly
//! by URI match rather than implementing full LV2 bundle/turtle
//! discovery, which belongs to the discovery scanner this core treats
//! as an external collaborator (spec.md §1 out-of-scope list).

use std::ffi::{c_void, CStr, CString};
use std::ptr;

use libloading::{Library, Symbol};
use rigel_shared::error::{RigelError, RigelResult};
use rigel_shared::{PluginType, ProcessMode};

use crate::plugin::native_abi::{Lv2Descriptor, Lv2DescriptorFn};
use crate::plugin::{PluginCapability, PluginCommon};

struct NativeHandle {
    instance: *mut c_void,
    port_buffers: Vec<*mut c_void>,
}

unsafe impl Send for NativeHandle {}

pub struct Lv2Plugin {
    common: PluginCommon,
    _library: Library,
    descriptor: *const Lv2Descriptor,
    handle: Option<NativeHandle>,
    sample_rate: f64,
    num_audio_in: usize,
    num_audio_out: usize,
}

unsafe impl Send for Lv2Plugin {}

impl Lv2Plugin {
    /// Scans `lv2_descriptor(0..)` until it finds `uri` or runs out of
    /// entries, the same linear probe LV2 hosts use before falling back
    /// to the bundle's `manifest.ttl` (ttl parsing is out of scope).
    pub fn load(id: u32, path: &str, uri: &str, sample_rate: f64, num_audio_in: usize, num_audio_out: usize) -> RigelResult<Self> {
        let library = unsafe { Library::new(path) }.map_err(|e| super::ladspa::load_failure(path, uri, e))?;
        let descriptor_fn: Symbol<Lv2DescriptorFn> = unsafe { library.get(b"lv2_descriptor\0") }
            .map_err(|e| super::ladspa::load_failure(path, uri, e))?;

        let mut descriptor = ptr::null();
        for index in 0..256u32 {
            let candidate = unsafe { descriptor_fn(index) };
            if candidate.is_null() {
                break;
            }
            let candidate_uri = unsafe { CStr::from_ptr((*candidate).uri) }.to_string_lossy();
            if candidate_uri == uri {
                descriptor = candidate;
                break;
            }
        }
        if descriptor.is_null() {
            return Err(RigelError::PluginLoadFailure { path: path.into(), label: uri.into(), reason: "URI not found among lv2_descriptor entries".into() });
        }

        let mut common = PluginCommon::new(id, PluginType::Lv2, ProcessMode::ContinuousRack);
        common.filename = path.into();
        common.label = uri.into();
        common.name = uri.rsplit('/').next().unwrap_or(uri).to_string();

        Ok(Self { common, _library: library, descriptor, handle: None, sample_rate, num_audio_in, num_audio_out })
    }
}

impl PluginCapability for Lv2Plugin {
    fn common(&self) -> &PluginCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut PluginCommon {
        &mut self.common
    }

    fn reload(&mut self) -> RigelResult<()> {
        let descriptor = unsafe { &*self.descriptor };
        let bundle_path = CString::new(std::path::Path::new(&self.common.filename).parent().and_then(|p| p.to_str()).unwrap_or(".")).unwrap_or_default();
        let instance = unsafe { (descriptor.instantiate)(self.descriptor, self.sample_rate, bundle_path.as_ptr(), ptr::null()) };
        if instance.is_null() {
            return Err(RigelError::PluginLoadFailure { path: self.common.filename.clone(), label: self.common.label.clone(), reason: "instantiate returned null".into() });
        }
        self.common.resize_latency_rings(self.num_audio_in.max(1), 0);
        self.handle = Some(NativeHandle { instance, port_buffers: vec![ptr::null_mut(); self.num_audio_in + self.num_audio_out] });
        Ok(())
    }

    fn activate(&mut self) {
        let descriptor = unsafe { &*self.descriptor };
        if let (Some(activate), Some(handle)) = (descriptor.activate, &self.handle) {
            unsafe { activate(handle.instance) };
        }
        self.common.client.activate();
    }

    fn deactivate(&mut self) {
        let descriptor = unsafe { &*self.descriptor };
        if let (Some(deactivate), Some(handle)) = (descriptor.deactivate, &self.handle) {
            unsafe { deactivate(handle.instance) };
        }
        self.common.client.deactivate();
    }

    fn native_process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        let descriptor = unsafe { &*self.descriptor };
        let Some(handle) = &self.handle else { return };
        for (port, input) in inputs.iter().enumerate() {
            let ptr = input.as_ptr() as *mut c_void;
            unsafe { (descriptor.connect_port)(handle.instance, port as u32, ptr) };
        }
        for (slot, output) in outputs.iter_mut().enumerate() {
            let port = (self.num_audio_in + slot) as u32;
            let ptr = output.as_mut_ptr() as *mut c_void;
            unsafe { (descriptor.connect_port)(handle.instance, port, ptr) };
        }
        unsafe { (descriptor.run)(handle.instance, frames as u32) };
    }
}

impl Drop for Lv2Plugin {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let descriptor = unsafe { &*self.descriptor };
            unsafe { (descriptor.cleanup)(handle.instance) };
        }
    }
}
