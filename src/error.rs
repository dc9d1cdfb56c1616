use thiserror::Error;

#[derive(Error, Debug)]
pub enum VeriscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("System error: {message}")]
    System { message: String },
}

impl VeriscanError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Frame acquisition failures. All variants are transient: the controller
/// logs them and proceeds with the next tick.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera unavailable: {details}")]
    Unavailable { details: String },

    #[error("capture failed: {details}")]
    CaptureFailed { details: String },

    #[error("frame decode failed: {details}")]
    Decode { details: String },
}

/// Remote submission failures. None of these are fatal; session-create and
/// submit failures feed the offline-queue path.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("session create failed: {details}")]
    SessionCreate { details: String },

    #[error("frame submit failed: {details}")]
    Submit { details: String },

    #[error("malformed gateway response: {details}")]
    InvalidResponse { details: String },

    #[error("request deadline exceeded after {seconds}s")]
    Deadline { seconds: u64 },
}

/// Durable queue store failures. A corrupt store is read as empty; a write
/// failure loses the frame being enqueued (the accepted data-loss edge case).
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue store corrupt: {details}")]
    Corrupt { details: String },

    #[error("queue read failed: {details}")]
    Read { details: String },

    #[error("queue write failed: {details}")]
    Write { details: String },
}

pub type Result<T> = std::result::Result<T, VeriscanError>;
