//! Engine idle thread (§4.8): a cooperative loop that drains post-events,
//! broadcasts Output-parameter values, and publishes peaks, holding the
//! plugin-table lock for the whole pass so `removePlugin` can't race with
//! iteration (§4.8, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rigel_shared::{plugin_hints, CallbackAction, ParameterType};

use crate::plugin::{Plugin, PluginCapability};
use crate::postevent::PostEvent;

use super::callback::CallbackSink;

/// §4.8: 40 ms when an OSC peer is registered, 50 ms otherwise.
const INTERVAL_WITH_PEER: Duration = Duration::from_millis(40);
const INTERVAL_WITHOUT_PEER: Duration = Duration::from_millis(50);

pub struct IdleThread {
    handle: Option<std::thread::JoinHandle<()>>,
    about_to_close: Arc<AtomicBool>,
}

impl IdleThread {
    /// Spawns the loop. `has_osc_peer` is read fresh each pass so a
    /// `/register` arriving mid-run shortens the sleep on the next pass.
    pub fn spawn(plugins: Arc<Mutex<Vec<Option<Plugin>>>>, callback: CallbackSink, has_osc_peer: Arc<AtomicBool>) -> Self {
        let about_to_close = Arc::new(AtomicBool::new(false));
        let flag = about_to_close.clone();
        let handle = std::thread::spawn(move || {
            loop {
                let interval = if has_osc_peer.load(Ordering::Relaxed) { INTERVAL_WITH_PEER } else { INTERVAL_WITHOUT_PEER };
                std::thread::sleep(interval);
                if flag.load(Ordering::Acquire) {
                    break;
                }
                run_pass(&plugins, &callback);
            }
        });
        Self { handle: Some(handle), about_to_close }
    }

    /// §4.8/§5 `setAboutToClose()`: the idle thread checks this between
    /// passes and exits after the current one, rather than mid-pass.
    pub fn request_stop(&self) {
        self.about_to_close.store(true, Ordering::Release);
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IdleThread {
    fn drop(&mut self) {
        self.request_stop();
        self.join();
    }
}

fn run_pass(plugins: &Mutex<Vec<Option<Plugin>>>, callback: &CallbackSink) {
    let Ok(table) = plugins.lock() else { return };
    for slot in table.iter() {
        let Some(plugin) = slot else { continue };
        if !plugin.common().is_enabled() {
            continue;
        }

        // Single-thread-hinted plugins (VST2 GUI+DSP) drain their own
        // post-events from the UI thread instead (§4.8, §6 UsesSingleThread).
        if plugin.common().hints & plugin_hints::USES_SINGLE_THREAD == 0 {
            for event in plugin.common().post_events.drain() {
                dispatch_post_event(plugin.common().id, event, callback);
            }
        }

        for (data, _ranges, value) in plugin.common().parameters.iter() {
            if data.param_type == ParameterType::Output {
                callback.call(CallbackAction::ParameterValueChanged, plugin.common().id, data.index as i32, 0, *value, None);
            }
        }
    }
}

fn dispatch_post_event(plugin_id: u32, event: PostEvent, callback: &CallbackSink) {
    match event {
        PostEvent::Debug => callback.call(CallbackAction::Debug, plugin_id, 0, 0, 0.0, None),
        PostEvent::ParameterChange { index, value } => {
            callback.call(CallbackAction::ParameterValueChanged, plugin_id, index, 0, value, None)
        }
        PostEvent::ProgramChange { index } => callback.call(CallbackAction::ProgramChanged, plugin_id, index, 0, 0.0, None),
        PostEvent::MidiProgramChange { index } => callback.call(CallbackAction::MidiProgramChanged, plugin_id, index, 0, 0.0, None),
        PostEvent::NoteOn { channel, note, velocity } => {
            callback.call(CallbackAction::NoteOn, plugin_id, channel as i32, note as i32, velocity as f32, None)
        }
        PostEvent::NoteOff { channel, note } => callback.call(CallbackAction::NoteOff, plugin_id, channel as i32, note as i32, 0.0, None),
        PostEvent::Custom => {}
    }
}
