//! Machine configuration
//!
//! Loaded from JSON, e.g.
//!
//! ```json
//! { "pal": true, "japanese": false, "timing": { "cycle_scale": 1 } }
//! ```
//!
//! Missing fields take their defaults.

use crate::timing::Timing;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// 50 Hz PAL timing instead of 60 Hz NTSC
    pub pal: bool,
    /// Japanese console variant
    pub japanese: bool,
    pub rom_writeable: bool,
    /// Override for the per-scanline budget
    pub timing: Option<Timing>,
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
