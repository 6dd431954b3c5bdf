//! TOML-based driver configuration.
//!
//! Every field has a serde default so a partial file — or no file at all —
//! yields a working configuration. Example:
//!
//! ```toml
//! agent_host = "127.0.0.1"
//! agent_port = 19734
//! connect_timeout_secs = 30.0
//! command_timeout_secs = 5.0
//! poll_interval_ms = 250
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Driver client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Agent host, overridable per `connect` call.
    #[serde(default = "default_host")]
    pub agent_host: String,

    /// Agent TCP port.
    #[serde(default = "default_port")]
    pub agent_port: u16,

    /// Budget for TCP establishment plus handshake, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: f32,

    /// Default per-command timeout for calls without an explicit one.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: f32,

    /// Interval between condition re-evaluations in `wait_for_*` loops.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How close (in pixels) the pointer must be to a target for
    /// `wait_for_arrival` to consider it arrived.
    #[serde(default = "default_pointer_tolerance")]
    pub pointer_tolerance: f32,

    /// Waypoint count for smooth (interpolated) pointer moves.
    #[serde(default = "default_smooth_steps")]
    pub smooth_move_steps: u32,

    /// Pacing delay between interpolated pointer waypoints.
    #[serde(default = "default_step_delay")]
    pub pointer_step_delay_ms: u64,

    /// Driver name advertised in the handshake.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    19734
}

fn default_connect_timeout() -> f32 {
    30.0
}

fn default_command_timeout() -> f32 {
    5.0
}

fn default_poll_interval() -> u64 {
    250
}

fn default_pointer_tolerance() -> f32 {
    2.0
}

fn default_smooth_steps() -> u32 {
    24
}

fn default_step_delay() -> u64 {
    10
}

fn default_client_name() -> String {
    "codriver".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            agent_host: default_host(),
            agent_port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            poll_interval_ms: default_poll_interval(),
            pointer_tolerance: default_pointer_tolerance(),
            smooth_move_steps: default_smooth_steps(),
            pointer_step_delay_ms: default_step_delay(),
            client_name: default_client_name(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Serializes the configuration to TOML text.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Writes the configuration to disk.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_toml_string()?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.connect_timeout_secs.max(0.0))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.command_timeout_secs.max(0.0))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn pointer_step_delay(&self) -> Duration {
        Duration::from_millis(self.pointer_step_delay_ms)
    }
}
