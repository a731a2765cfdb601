use serde::{Deserialize, Serialize};

/// Media kinds a call carries. Chosen by the callee when accepting and fixed for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    pub audio: bool,
    pub video: bool,
}

impl CallConfig {
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}
