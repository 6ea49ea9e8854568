use thiserror::Error;

/// Errors surfaced by the Telemetry and Actuator clients. Every network call
/// has an explicit timeout; the core never retries transparently (§4.4/§4.5).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {0} failed: {1}")]
    Transport(String, String),
    #[error("could not decode response from {0}: {1}")]
    Decode(String, String),
    #[error("{0}")]
    Missing(String),
}

impl ClientError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(url.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            ClientError::Transport(url.to_string(), err.to_string())
        }
    }
}

/// Structured error for the eight Lifecycle API operations (§4.11, §7). The
/// API never throws control flow up; every operation returns
/// `Result<T, LifecycleError>` which the outer HTTP façade (out of scope
/// here) would map to a JSON error envelope.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("greenhouse {0} is not configured")]
    NotConfigured(String),
    #[error("greenhouse {0} has no actuator endpoint configured")]
    MissingEndpoint(String),
    #[error("irrigation already in progress for greenhouse {0}")]
    AlreadyInProgress(String),
    #[error("no sensor readings available for greenhouse {0}")]
    NoReadings(String),
    #[error("telemetry backend unavailable: {0}")]
    BackendUnavailable(#[from] ClientError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
