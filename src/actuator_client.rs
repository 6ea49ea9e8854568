//! Thin client over the greenhouse actuator (C5). No implicit retries:
//! retrying an actuator write without reading back is unsafe (§4.5).

use crate::error::ClientError;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ActuatorClient {
    http: Client,
}

#[derive(Debug, Serialize)]
struct ActivatePulseRequest {
    duration_ms: u64,
}

impl ActuatorClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// `POST {endpoint}/pump/activate` with `{"duration_ms": <int>}`. HTTP
    /// 2xx is success; anything else is an error.
    pub async fn activate_pulse(&self, endpoint: &str, duration_ms: u64) -> Result<(), ClientError> {
        let url = format!("{endpoint}/pump/activate");
        let response = self
            .http
            .post(&url)
            .timeout(TIMEOUT)
            .json(&ActivatePulseRequest { duration_ms })
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(&url, err))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            })
        }
    }

    /// `GET {endpoint}/pump/status`. Diagnostic only, used by `analyze`.
    pub async fn pump_status(&self, endpoint: &str) -> Result<JsonValue, ClientError> {
        let url = format!("{endpoint}/pump/status");
        let response = self
            .http
            .get(&url)
            .timeout(TIMEOUT)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(&url, err))?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|err| ClientError::Decode(url, err.to_string()))
    }
}
