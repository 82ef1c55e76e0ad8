//! The engine (§3 "Engine", §4.7): owns the plugin table, runs
//! rack/patchbay routing, dispatches host callbacks, and drives the idle
//! thread. Driver selection lives in [`crate::driver`]; this module is
//! driver-agnostic (§4.7 "only the driver differs; the plugin/OSC/
//! threading logic is shared").

pub mod callback;
pub mod idle;
pub mod options;
pub mod patchbay;
pub mod rack;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rigel_shared::error::{RigelError, RigelResult};
use rigel_shared::{BinaryType, CallbackAction, PluginType, ProcessMode};

use crate::plugin::bridge::BridgePlugin;
use crate::plugin::dssi::DssiPlugin;
use crate::plugin::ladspa::LadspaPlugin;
use crate::plugin::lv2::Lv2Plugin;
use crate::plugin::soundkit::SoundKitPlugin;
use crate::plugin::vst2::Vst2Plugin;
use crate::plugin::{Plugin, PluginCapability};
use crate::port::EventPort;
use crate::transport::{self, TimeInfo};

pub use callback::{CallbackSink, HostCallbackFn};
pub use idle::IdleThread;
pub use options::{EngineOptions, OptionValue};
pub use patchbay::{Patchbay, PortRef};

lazy_static::lazy_static! {
    /// §9 "Global state": engine names must be unique within a process;
    /// `Engine::new` rejects a duplicate rather than letting two engines'
    /// OSC path prefixes collide.
    static ref ENGINE_NAMES: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

type PluginTable = Arc<Mutex<Vec<Option<Plugin>>>>;

/// Rack/patchbay routing state, separate from the plugin table so the
/// idle thread (§4.8) can take the table lock for a whole pass without
/// blocking on routing state it never touches.
struct RouteState {
    rack_event_in: EventPort,
    rack_event_out: EventPort,
    rack_scratch: rack::RackScratch,
    patchbay: Patchbay,
}

pub struct Engine {
    name: String,
    capacity: u32,
    buffer_size: AtomicU32,
    sample_rate_bits: AtomicU64,
    plugins: PluginTable,
    routing: Mutex<RouteState>,
    pub options: Mutex<EngineOptions>,
    last_error: Mutex<String>,
    callback: CallbackSink,
    has_osc_peer: Arc<AtomicBool>,
    osc_peer_url: Mutex<Option<String>>,
    idle: Mutex<Option<IdleThread>>,
}

impl Engine {
    /// Constructed empty (§3); registers `name` in the process-wide
    /// registry, rejecting a duplicate as a configuration error.
    pub fn new(name: &str, options: EngineOptions) -> RigelResult<Arc<Self>> {
        {
            let mut names = ENGINE_NAMES.lock().unwrap();
            if !names.insert(name.to_string()) {
                return Err(RigelError::Configuration(format!("engine name '{name}' already registered")));
            }
        }

        let capacity = match options.process_mode {
            ProcessMode::ContinuousRack => rigel_shared::MAX_RACK_PLUGINS,
            ProcessMode::Patchbay => rigel_shared::MAX_PATCHBAY_PLUGINS,
            _ => rigel_shared::MAX_DEFAULT_PLUGINS,
        };
        let buffer_size = options.preferred_buffer_size;
        let sample_rate = options.preferred_sample_rate;

        let routing = RouteState {
            rack_event_in: EventPort::new(true, rigel_shared::MAX_MIDI_EVENTS),
            rack_event_out: EventPort::new(false, rigel_shared::MAX_MIDI_EVENTS),
            rack_scratch: rack::RackScratch::new(),
            patchbay: Patchbay::new(),
        };

        Ok(Arc::new(Self {
            name: name.to_string(),
            capacity,
            buffer_size: AtomicU32::new(buffer_size),
            sample_rate_bits: AtomicU64::new(sample_rate.to_bits()),
            plugins: Arc::new(Mutex::new((0..capacity).map(|_| None).collect())),
            routing: Mutex::new(routing),
            options: Mutex::new(options),
            last_error: Mutex::new(String::new()),
            callback: CallbackSink::new(),
            has_osc_peer: Arc::new(AtomicBool::new(false)),
            osc_peer_url: Mutex::new(None),
            idle: Mutex::new(None),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size.load(Ordering::Relaxed)
    }

    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate_bits.load(Ordering::Relaxed))
    }

    pub fn callback_sink(&self) -> CallbackSink {
        self.callback.clone()
    }

    pub fn set_callback(&self, callback: Box<HostCallbackFn>) {
        self.callback.set(callback);
    }

    pub fn set_last_error(&self, message: impl Into<String>) {
        let message = message.into();
        *self.last_error.lock().unwrap() = message.clone();
        self.callback.call(CallbackAction::Error, 0, 0, 0, 0.0, Some(&message));
    }

    pub fn last_error(&self) -> String {
        self.last_error.lock().unwrap().clone()
    }

    /// `init(clientName)` (§3): starts the idle thread. Opening a real
    /// audio driver is the caller's job (§1 out-of-scope list; see
    /// [`crate::driver`] for the callback contract a back-end must meet).
    pub fn init(&self) {
        let mut idle = self.idle.lock().unwrap();
        if idle.is_none() {
            *idle = Some(IdleThread::spawn(self.plugins.clone(), self.callback.clone(), self.has_osc_peer.clone()));
        }
    }

    /// `close()` (§3, §5): `setAboutToClose()` then stop the idle thread;
    /// the caller stops the driver once this returns.
    pub fn close(&self) {
        if let Some(idle) = self.idle.lock().unwrap().take() {
            drop(idle); // Drop impl requests stop and joins.
        }
        ENGINE_NAMES.lock().unwrap().remove(&self.name);
    }

    pub fn register_osc_peer(&self, url: impl Into<String>) {
        *self.osc_peer_url.lock().unwrap() = Some(url.into());
        self.has_osc_peer.store(true, Ordering::Relaxed);
    }

    pub fn unregister_osc_peer(&self) {
        *self.osc_peer_url.lock().unwrap() = None;
        self.has_osc_peer.store(false, Ordering::Relaxed);
    }

    pub fn osc_peer_url(&self) -> Option<String> {
        self.osc_peer_url.lock().unwrap().clone()
    }

    /// `getNewUniquePluginName` (§4.7): appends `" (n)"` with the
    /// smallest `n` that avoids a collision among currently loaded names.
    pub fn get_new_unique_plugin_name(&self, desired: &str) -> String {
        let table = self.plugins.lock().unwrap();
        let taken: HashSet<&str> = table.iter().flatten().map(|p| p.common().name.as_str()).collect();
        if !taken.contains(desired) {
            return desired.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{desired} ({n})");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn allocate_id(&self) -> RigelResult<u32> {
        let table = self.plugins.lock().unwrap();
        table
            .iter()
            .position(Option::is_none)
            .map(|i| i as u32)
            .ok_or_else(|| RigelError::Configuration(format!("plugin table full ({} slots)", self.capacity)))
    }

    pub fn add_ladspa_plugin(&self, path: &str, label: &str, unique_id: u64, sample_rate: f64) -> RigelResult<u32> {
        let id = self.allocate_id()?;
        let mut plugin = LadspaPlugin::load(id, path, label, unique_id, sample_rate)?;
        plugin.reload()?;
        self.plugins.lock().unwrap()[id as usize] = Some(Plugin::Ladspa(plugin));
        self.activate_and_announce(id)
    }

    pub fn add_dssi_plugin(&self, path: &str, label: &str, unique_id: u64) -> RigelResult<u32> {
        let id = self.allocate_id()?;
        let mut plugin = DssiPlugin::load(id, path, label, unique_id)?;
        plugin.reload()?;
        self.plugins.lock().unwrap()[id as usize] = Some(Plugin::Dssi(plugin));
        self.activate_and_announce(id)
    }

    pub fn add_lv2_plugin(&self, path: &str, uri: &str, sample_rate: f64, audio_ins: usize, audio_outs: usize) -> RigelResult<u32> {
        let id = self.allocate_id()?;
        let mut plugin = Lv2Plugin::load(id, path, uri, sample_rate, audio_ins, audio_outs)?;
        plugin.reload()?;
        self.plugins.lock().unwrap()[id as usize] = Some(Plugin::Lv2(plugin));
        self.activate_and_announce(id)
    }

    pub fn add_vst2_plugin(&self, path: &str, unique_id_hint: &str) -> RigelResult<u32> {
        let id = self.allocate_id()?;
        let mut plugin = Vst2Plugin::load(id, path, unique_id_hint)?;
        plugin.reload()?;
        self.plugins.lock().unwrap()[id as usize] = Some(Plugin::Vst2(plugin));
        self.activate_and_announce(id)
    }

    pub fn add_soundkit_plugin(&self, path: &str, sample_rate: i32) -> RigelResult<u32> {
        let id = self.allocate_id()?;
        let mut plugin = SoundKitPlugin::load(id, path, sample_rate)?;
        plugin.reload()?;
        self.plugins.lock().unwrap()[id as usize] = Some(Plugin::SoundKit(plugin));
        self.activate_and_announce(id)
    }

    /// §4.6 bridge initialisation: spawns the sub-process. The caller is
    /// expected to have waited out the handshake inside `BridgePlugin::load`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_bridge_plugin(&self, bridge_binary: &str, binary_type: BinaryType, bridged_type: PluginType, filename: &str, label: &str) -> RigelResult<u32> {
        let id = self.allocate_id()?;
        let plugin = BridgePlugin::load(id, &self.name, bridge_binary, binary_type, bridged_type, filename, label, self.sample_rate(), self.buffer_size())?;
        self.plugins.lock().unwrap()[id as usize] = Some(Plugin::Bridge(plugin));
        self.activate_and_announce(id)
    }

    fn activate_and_announce(&self, id: u32) -> RigelResult<u32> {
        let mut table = self.plugins.lock().unwrap();
        if let Some(plugin) = table[id as usize].as_mut() {
            plugin.activate();
        }
        drop(table);
        self.callback.call(CallbackAction::ReloadAll, id, 0, 0, 0.0, None);
        Ok(id)
    }

    /// `removePlugin(id)` (§4.7): deactivates and destroys the plugin;
    /// the id stays reserved (the slot is simply `None`) until
    /// `remove_all_plugins` compacts the table.
    pub fn remove_plugin(&self, id: u32) -> bool {
        let mut table = self.plugins.lock().unwrap();
        let Some(slot) = table.get_mut(id as usize) else { return false };
        let Some(mut plugin) = slot.take() else { return false };
        plugin.deactivate();
        true
    }

    /// `removeAllPlugins()` (§4.7): the only point at which id compaction
    /// happens, deferred this long specifically to avoid confusing
    /// concurrent OSC peers mid-session.
    pub fn remove_all_plugins(&self) {
        let mut table = self.plugins.lock().unwrap();
        for slot in table.iter_mut() {
            if let Some(mut plugin) = slot.take() {
                plugin.deactivate();
            }
        }
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.lock().unwrap().iter().flatten().count()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Applies a setter to plugin `id` under the table lock, mirroring
    /// the offline/full-lock mutation path of §4.4/§9 (this core doesn't
    /// separately implement a cross-thread scoped-disable for non-RT
    /// setters; see [`crate::plugin::ScopedDisabler`] for the in-process
    /// variant format adapters use around their own native reconfigure).
    pub fn with_plugin<R>(&self, id: u32, f: impl FnOnce(&mut Plugin) -> R) -> Option<R> {
        let mut table = self.plugins.lock().unwrap();
        table.get_mut(id as usize).and_then(|slot| slot.as_mut()).map(f)
    }

    pub fn patchbay_connect(&self, from: PortRef, to: PortRef) {
        self.routing.lock().unwrap().patchbay.connect(from, to);
    }

    pub fn patchbay_disconnect(&self, from: PortRef, to: PortRef) {
        self.routing.lock().unwrap().patchbay.disconnect(from, to);
    }

    /// RT entry point for one audio callback (§4.7). `left`/`right` are
    /// the driver's 2-channel buffers; `options.process_mode` selects
    /// rack vs. patchbay routing. Uses try-lock on both the plugin table
    /// and the routing state so the RT thread never blocks on a non-RT
    /// mutation in progress (§5 "try-style process lock"): on contention
    /// it emits silence for this callback instead.
    pub fn process(&self, left: &mut [f32], right: &mut [f32], driver_time: TimeInfo) {
        transport::update_time_info(driver_time);

        let Ok(mut table) = self.plugins.try_lock() else {
            left.fill(0.0);
            right.fill(0.0);
            return;
        };
        let Ok(mut routing) = self.routing.try_lock() else {
            left.fill(0.0);
            right.fill(0.0);
            return;
        };

        let Ok(options) = self.options.try_lock() else {
            left.fill(0.0);
            right.fill(0.0);
            return;
        };
        let process_mode = options.process_mode;
        drop(options);

        match process_mode {
            ProcessMode::ContinuousRack => {
                let routing = &mut *routing;
                rack::process_rack(&mut table, &routing.rack_event_in, &mut routing.rack_event_out, &mut routing.rack_scratch, left, right);
            }
            _ => {
                let frames = left.len();
                routing.patchbay.process(&mut table, frames);
                // Patchbay/single/multi-client modes route explicitly;
                // the caller's stereo summary is whatever the UI wired
                // to the driver's output ports (§4.7 "Graph
                // representation is out of scope here").
                left.fill(0.0);
                right.fill(0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_engine_name_is_rejected() {
        let first = Engine::new("rigel-test-dup", EngineOptions::default()).unwrap();
        let second = Engine::new("rigel-test-dup", EngineOptions::default());
        assert!(second.is_err());
        first.close();
    }

    #[test]
    fn plugin_table_starts_empty_and_reports_capacity() {
        let engine = Engine::new("rigel-test-capacity", EngineOptions::default()).unwrap();
        assert_eq!(engine.plugin_count(), 0);
        assert_eq!(engine.capacity(), rigel_shared::MAX_RACK_PLUGINS);
        engine.close();
    }

    #[test]
    fn unique_plugin_name_appends_suffix_on_collision() {
        let engine = Engine::new("rigel-test-names", EngineOptions::default()).unwrap();
        assert_eq!(engine.get_new_unique_plugin_name("Reverb"), "Reverb");
        engine.close();
    }

    #[test]
    fn process_with_no_plugins_loaded_emits_silence_not_a_panic() {
        let engine = Engine::new("rigel-test-process-empty", EngineOptions::default()).unwrap();
        let mut left = vec![1.0f32; 64];
        let mut right = vec![1.0f32; 64];
        engine.process(&mut left, &mut right, TimeInfo::default());
        assert!(left.iter().all(|&s| s == 0.0));
        assert!(right.iter().all(|&s| s == 0.0));
        engine.close();
    }
}
