use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Configuration from Compressor Config.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressorConfig {
    #[serde(rename = "Compressor_Settings", default)]
    pub settings: CompressorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressorSettings {
    /// Path or name of the MCM executable
    #[serde(rename = "Tool Path", default = "default_tool_path")]
    pub tool_path: String,

    /// Profile used when none is requested explicitly
    #[serde(rename = "Default Profile", default = "default_profile")]
    pub default_profile: String,

    /// Named compression profiles mapped to the tool's mode flag
    #[serde(rename = "Profiles", default = "default_profiles")]
    pub profiles: IndexMap<String, String>,

    /// Extension appended to the input folder name to build the archive path
    #[serde(rename = "Output Extension", default = "default_output_extension")]
    pub output_extension: String,

    /// Capacity of the progress event channel
    #[serde(rename = "Event Buffer", default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Mirror progress to the taskbar through the terminal
    #[serde(rename = "Taskbar Progress", default = "default_taskbar_progress")]
    pub taskbar_progress: bool,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            tool_path: default_tool_path(),
            default_profile: default_profile(),
            profiles: default_profiles(),
            output_extension: default_output_extension(),
            event_buffer: default_event_buffer(),
            taskbar_progress: default_taskbar_progress(),
            debug_mode: false,
        }
    }
}

fn default_tool_path() -> String {
    if cfg!(target_os = "windows") {
        "mcm.exe".to_string()
    } else {
        "mcm".to_string()
    }
}

fn default_profile() -> String {
    "max".to_string()
}

fn default_profiles() -> IndexMap<String, String> {
    let mut profiles = IndexMap::new();
    profiles.insert("turbo".to_string(), "-t".to_string());
    profiles.insert("fast".to_string(), "-f".to_string());
    profiles.insert("mid".to_string(), "-m".to_string());
    profiles.insert("high".to_string(), "-h".to_string());
    profiles.insert("max".to_string(), "-x11".to_string());
    profiles
}

fn default_output_extension() -> String {
    "mcm".to_string()
}

fn default_event_buffer() -> usize {
    256
}

fn default_taskbar_progress() -> bool {
    true
}

impl CompressorSettings {
    /// Mode flag for a profile, case-insensitive. `None` selects the default profile.
    pub fn mode_flag(&self, profile: Option<&str>) -> Option<&str> {
        let wanted = profile.unwrap_or(&self.default_profile);
        self.profiles
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, flag)| flag.as_str())
    }

    /// Profile names in their configured order
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}
