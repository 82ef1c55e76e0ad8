use thiserror::Error;

/// Error kinds a non-RT entry point can return.
///
/// The RT thread never produces one of these: real-time code reports
/// failure through a post-event and the host callback instead (see
/// `rigel_engine::postevent`), per the "never propagated" rule for
/// in-process-call errors.
#[derive(Debug, Error)]
pub enum RigelError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to load plugin '{label}' from {path}: {reason}")]
    PluginLoadFailure {
        path: String,
        label: String,
        reason: String,
    },

    #[error("bridge for '{label}' did not respond within {timeout_ms}ms")]
    BridgeTimeout { label: String, timeout_ms: u64 },

    #[error("bridge for '{label}' crashed: {reason}")]
    BridgeCrash { label: String, reason: String },

    #[error("OSC protocol error on path '{path}': {reason}")]
    OscProtocol { path: String, reason: String },

    #[error("native plugin '{label}' raised an exception in {call}: {reason}")]
    NativeException {
        label: String,
        call: String,
        reason: String,
    },
}

pub type RigelResult<T> = Result<T, RigelError>;
