use anyhow::Context;
use intent_parser::IntentConfig;
use motion_policy::PolicyConfig;
use robot_link::LinkConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Port the rover's camera serves its MJPEG stream on
pub const CAMERA_STREAM_PORT: u16 = 81;

/// Everything `rover run` needs, loaded from one YAML file.
/// Missing sections and fields take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    pub intent: IntentConfig,
    pub policy: PolicyConfig,
    pub link: LinkConfig,
    pub camera: CameraConfig,
    pub control: ControlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index, file path or stream URL; defaults to the rover's stream
    pub device: Option<String>,
    pub frame_interval_ms: u64,
    /// Haar cascade for the person detector (opencv builds only)
    pub person_cascade: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            frame_interval_ms: 100,
            person_cascade: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub tick_ms: u64,
    /// Seconds without an accepted voice command before going autonomous
    pub command_timeout_s: u64,
    /// Minimum pause between reconnect attempts
    pub reconnect_interval_ms: u64,
    /// Run the calibration sequence after connecting
    pub calibrate_on_start: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            command_timeout_s: 30,
            reconnect_interval_ms: 2000,
            calibrate_on_start: true,
        }
    }
}

impl ControlConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_s)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl RoverConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config: RoverConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing yaml: {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Camera spec handed to the capture backend
    pub fn camera_spec(&self) -> String {
        match &self.camera.device {
            Some(device) => device.clone(),
            None => format!("http://{}:{}/stream", self.link.host, CAMERA_STREAM_PORT),
        }
    }
}
