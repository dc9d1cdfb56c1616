use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VeriscanConfig {
    pub camera: CameraConfig,
    pub focus: FocusConfig,
    pub stability: StabilityConfig,
    pub controller: ControllerConfig,
    pub gateway: GatewayConfig,
    pub queue: QueueConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Frame source kind ("replay" is the only built-in; hosts may supply
    /// their own FrameSource implementation)
    #[serde(default = "default_camera_source")]
    pub source: String,

    /// Directory of JPEG files served by the replay source
    #[serde(default = "default_replay_dir")]
    pub replay_dir: String,

    /// Maximum width of preview frames handed to the focus estimator
    #[serde(default = "default_preview_max_width")]
    pub preview_max_width: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FocusConfig {
    /// Sampling stride across both pixel dimensions (2 = every second pixel)
    #[serde(default = "default_sample_stride")]
    pub sample_stride: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StabilityConfig {
    /// Number of recent focus scores kept in the window
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Minimum observations before a window can classify as stable
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Score variance must stay below this to classify stable
    #[serde(default = "default_variance_threshold")]
    pub variance_threshold: f64,

    /// Mean score must exceed this to classify stable
    #[serde(default = "default_mean_threshold")]
    pub mean_threshold: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ControllerConfig {
    /// Poll cadence for the capture-and-score cycle, in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Consecutive stable windows required to trigger a capture
    #[serde(default = "default_trigger_streak")]
    pub trigger_streak: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    /// Base URL of the verification gateway
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Opaque credential attached to every call via the X-Api-Key header
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Document-type tag submitted with every frame
    #[serde(default = "default_doc_type")]
    pub doc_type: String,

    /// Deadline for each remote request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueueConfig {
    /// Directory holding the queue record file and spooled frame images
    #[serde(default = "default_queue_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Number of verification outcomes kept in the in-memory scan history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl VeriscanConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("veriscan.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("camera.source", default_camera_source())?
            .set_default("camera.replay_dir", default_replay_dir())?
            .set_default("camera.preview_max_width", default_preview_max_width())?
            .set_default("focus.sample_stride", default_sample_stride())?
            .set_default(
                "stability.window_capacity",
                default_window_capacity() as i64,
            )?
            .set_default("stability.min_samples", default_min_samples() as i64)?
            .set_default(
                "stability.variance_threshold",
                default_variance_threshold(),
            )?
            .set_default("stability.mean_threshold", default_mean_threshold())?
            .set_default(
                "controller.tick_interval_ms",
                default_tick_interval_ms() as i64,
            )?
            .set_default("controller.trigger_streak", default_trigger_streak())?
            .set_default("gateway.url", default_gateway_url())?
            .set_default("gateway.api_key", default_api_key())?
            .set_default("gateway.doc_type", default_doc_type())?
            .set_default(
                "gateway.request_timeout_secs",
                default_request_timeout_secs() as i64,
            )?
            .set_default("queue.path", default_queue_path())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default(
                "system.history_capacity",
                default_history_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with VERISCAN_ prefix
            .add_source(Environment::with_prefix("VERISCAN").separator("__"))
            .build()?;

        let config: VeriscanConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.focus.sample_stride == 0 {
            return Err(ConfigError::Message(
                "Focus sample_stride must be greater than 0".to_string(),
            ));
        }

        if self.stability.window_capacity == 0 {
            return Err(ConfigError::Message(
                "Stability window_capacity must be greater than 0".to_string(),
            ));
        }

        if self.stability.min_samples == 0
            || self.stability.min_samples > self.stability.window_capacity
        {
            return Err(ConfigError::Message(
                "Stability min_samples must be in 1..=window_capacity".to_string(),
            ));
        }

        if self.stability.variance_threshold <= 0.0 {
            return Err(ConfigError::Message(
                "Stability variance_threshold must be greater than 0".to_string(),
            ));
        }

        if self.controller.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Controller tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.controller.trigger_streak == 0 {
            return Err(ConfigError::Message(
                "Controller trigger_streak must be greater than 0".to_string(),
            ));
        }

        if self.gateway.url.is_empty() {
            return Err(ConfigError::Message(
                "Gateway url must not be empty".to_string(),
            ));
        }

        if self.gateway.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Gateway request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.queue.path.is_empty() {
            return Err(ConfigError::Message(
                "Queue path must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "System event_bus_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for VeriscanConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                source: default_camera_source(),
                replay_dir: default_replay_dir(),
                preview_max_width: default_preview_max_width(),
            },
            focus: FocusConfig {
                sample_stride: default_sample_stride(),
            },
            stability: StabilityConfig {
                window_capacity: default_window_capacity(),
                min_samples: default_min_samples(),
                variance_threshold: default_variance_threshold(),
                mean_threshold: default_mean_threshold(),
            },
            controller: ControllerConfig {
                tick_interval_ms: default_tick_interval_ms(),
                trigger_streak: default_trigger_streak(),
            },
            gateway: GatewayConfig {
                url: default_gateway_url(),
                api_key: default_api_key(),
                doc_type: default_doc_type(),
                request_timeout_secs: default_request_timeout_secs(),
            },
            queue: QueueConfig {
                path: default_queue_path(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                history_capacity: default_history_capacity(),
            },
        }
    }
}

fn default_camera_source() -> String {
    "replay".to_string()
}

fn default_replay_dir() -> String {
    "./frames".to_string()
}

fn default_preview_max_width() -> u32 {
    320
}

fn default_sample_stride() -> u32 {
    2
}

fn default_window_capacity() -> usize {
    8
}

fn default_min_samples() -> usize {
    6
}

fn default_variance_threshold() -> f64 {
    8.0
}

fn default_mean_threshold() -> f64 {
    12.0
}

fn default_tick_interval_ms() -> u64 {
    550
}

fn default_trigger_streak() -> u32 {
    3
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:7001".to_string()
}

fn default_api_key() -> String {
    "dev-key".to_string()
}

fn default_doc_type() -> String {
    "NCS_ORIGIN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_queue_path() -> String {
    "./queue".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}

fn default_history_capacity() -> usize {
    50
}
