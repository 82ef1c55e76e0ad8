//! Host callback dispatch (§4.7 "Callback dispatch", §6 "Host callback
//! signature"). The callback must return promptly and must never be
//! invoked from the RT thread (§6) — only the idle thread and the OSC
//! dispatcher call through [`CallbackSink::call`].

use std::sync::{Arc, Mutex};

use rigel_shared::CallbackAction;

pub type HostCallbackFn = dyn FnMut(CallbackAction, u32, i32, i32, f32, Option<&str>) + Send;

/// Cloneable handle onto the single registered host callback. Cloning
/// shares the same underlying closure slot, so re-registering through one
/// handle is visible to every clone (mirrors the source's single
/// `callback + userPointer` pair per engine).
#[derive(Clone)]
pub struct CallbackSink {
    inner: Arc<Mutex<Option<Box<HostCallbackFn>>>>,
}

impl CallbackSink {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(None)) }
    }

    pub fn set(&self, callback: Box<HostCallbackFn>) {
        *self.inner.lock().unwrap() = Some(callback);
    }

    pub fn clear(&self) {
        *self.inner.lock().unwrap() = None;
    }

    pub fn call(&self, action: CallbackAction, plugin_id: u32, v1: i32, v2: i32, v3: f32, s: Option<&str>) {
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(callback) = guard.as_mut() {
                callback(action, plugin_id, v1, v2, v3, s);
            }
        }
    }
}

impl Default for CallbackSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn registered_callback_observes_dispatched_action() {
        let sink = CallbackSink::new();
        let seen = Arc::new(AtomicU32::new(0));
        let seen_cb = seen.clone();
        sink.set(Box::new(move |action, _id, _v1, _v2, _v3, _s| {
            if matches!(action, CallbackAction::ProgramChanged) {
                seen_cb.fetch_add(1, Ordering::Relaxed);
            }
        }));
        sink.call(CallbackAction::ProgramChanged, 0, 1, 0, 0.0, None);
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }
}
