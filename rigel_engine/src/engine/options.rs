//! Engine options record (§4.7 "Options", §6 "Engine options type tags").

use std::collections::HashMap;

use rigel_shared::{BinaryType, ProcessMode};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub process_mode: ProcessMode,
    pub force_stereo: bool,
    pub prefer_plugin_bridges: bool,
    pub prefer_ui_bridges: bool,
    pub use_dssi_vst_chunks: bool,
    pub max_parameters: u32,
    pub osc_ui_timeout_ms: u32,
    pub preferred_buffer_size: u32,
    pub preferred_sample_rate: f64,
    /// One bridge executable path per binary type (§4.7: "seven per-format
    /// bridge executable paths" in the source; this core only needs the
    /// binary-type axis, not the UI-toolkit axis, since GUI bridging is
    /// out of scope).
    pub bridge_paths: HashMap<BinaryType, String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            process_mode: ProcessMode::ContinuousRack,
            force_stereo: false,
            prefer_plugin_bridges: false,
            prefer_ui_bridges: false,
            use_dssi_vst_chunks: false,
            max_parameters: rigel_shared::MAX_DEFAULT_PARAMETERS,
            osc_ui_timeout_ms: 4000,
            preferred_buffer_size: 512,
            preferred_sample_rate: 44100.0,
            bridge_paths: HashMap::new(),
        }
    }
}

/// Value carried by a single `OptionsType` tag (§6). Kept as a tiny tagged
/// union rather than one setter per option, matching the source's single
/// enumeration.
#[derive(Debug, Clone)]
pub enum OptionValue {
    Bool(bool),
    Int(u32),
    Float(f64),
    Str(String),
}

impl EngineOptions {
    pub fn set(&mut self, tag: rigel_shared::OptionsType, value: OptionValue) {
        use rigel_shared::OptionsType::*;
        match (tag, value) {
            (ProcessMode, OptionValue::Int(v)) => {
                self.process_mode = match v {
                    0 => rigel_shared::ProcessMode::SingleClient,
                    1 => rigel_shared::ProcessMode::MultipleClients,
                    2 => rigel_shared::ProcessMode::ContinuousRack,
                    3 => rigel_shared::ProcessMode::Patchbay,
                    _ => rigel_shared::ProcessMode::Bridge,
                };
            }
            (ForceStereo, OptionValue::Bool(v)) => self.force_stereo = v,
            (PreferPluginBridges, OptionValue::Bool(v)) => self.prefer_plugin_bridges = v,
            (PreferUiBridges, OptionValue::Bool(v)) => self.prefer_ui_bridges = v,
            (UseDssiVstChunks, OptionValue::Bool(v)) => self.use_dssi_vst_chunks = v,
            (MaxParameters, OptionValue::Int(v)) => self.max_parameters = v,
            (OscUiTimeout, OptionValue::Int(v)) => self.osc_ui_timeout_ms = v,
            (PreferredBufferSize, OptionValue::Int(v)) => self.preferred_buffer_size = v,
            (PreferredSampleRate, OptionValue::Float(v)) => self.preferred_sample_rate = v,
            (PathBridgeNativePosix32, OptionValue::Str(v)) => {
                self.bridge_paths.insert(BinaryType::Posix32, v);
            }
            (PathBridgeNativePosix64, OptionValue::Str(v)) => {
                self.bridge_paths.insert(BinaryType::Posix64, v);
            }
            (PathBridgeNativeWin32, OptionValue::Str(v)) => {
                self.bridge_paths.insert(BinaryType::Win32, v);
            }
            (PathBridgeNativeWin64, OptionValue::Str(v)) => {
                self.bridge_paths.insert(BinaryType::Win64, v);
            }
            // ProcessName carries no engine-level state here; the name is
            // fixed at `Engine::new` and rejected-on-duplicate there.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigel_shared::OptionsType;

    #[test]
    fn defaults_match_spec() {
        let options = EngineOptions::default();
        assert_eq!(options.max_parameters, 200);
        assert_eq!(options.osc_ui_timeout_ms, 4000);
        assert_eq!(options.preferred_buffer_size, 512);
        assert_eq!(options.preferred_sample_rate, 44100.0);
    }

    #[test]
    fn set_updates_matching_field_only() {
        let mut options = EngineOptions::default();
        options.set(OptionsType::ForceStereo, OptionValue::Bool(true));
        options.set(OptionsType::MaxParameters, OptionValue::Int(64));
        assert!(options.force_stereo);
        assert_eq!(options.max_parameters, 64);
        assert_eq!(options.osc_ui_timeout_ms, 4000);
    }
}
