//! Thin client over the data backend (C4). Every call has an explicit
//! timeout; the core never retries transparently — retries belong to the
//! Supervisor's tick cadence (§4.4).

use crate::error::ClientError;
use crate::models::SensorReading;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TelemetryClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SensorReadingJson {
    #[serde(rename = "airTemperature")]
    air_temperature: f64,
    #[serde(rename = "airHumidity")]
    air_humidity: f64,
    #[serde(rename = "soilMoisture")]
    soil_moisture: f64,
    #[serde(rename = "soilTemperature")]
    soil_temperature: f64,
    timestamp: DateTime<Utc>,
}

impl From<SensorReadingJson> for SensorReading {
    fn from(value: SensorReadingJson) -> Self {
        SensorReading {
            air_temperature: value.air_temperature,
            air_humidity: value.air_humidity,
            soil_moisture: value.soil_moisture,
            soil_temperature: value.soil_temperature,
            timestamp: value.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestEnvelope {
    success: bool,
    data: Option<LatestData>,
}

#[derive(Debug, Deserialize)]
struct LatestData {
    #[serde(rename = "latestReading")]
    latest_reading: Option<SensorReadingJson>,
    #[serde(rename = "currentValues")]
    current_values: Option<SensorReadingJson>,
}

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    success: bool,
    data: Option<Vec<SensorReadingJson>>,
}

#[derive(Debug, Deserialize)]
struct PlantConfigEnvelope {
    success: bool,
    data: Option<PlantConfigData>,
}

#[derive(Debug, Deserialize)]
pub struct PlantConfigData {
    #[serde(rename = "greenhouseId")]
    pub greenhouse_id: String,
    #[serde(rename = "plantType")]
    pub plant_type: String,
    #[serde(rename = "plantName")]
    pub plant_name: Option<String>,
    #[serde(rename = "soilMoistureMin")]
    pub soil_moisture_min: Option<f64>,
    #[serde(rename = "soilMoistureMax")]
    pub soil_moisture_max: Option<f64>,
    #[serde(rename = "soilMoistureIdeal")]
    pub soil_moisture_ideal: Option<f64>,
}

/// Outcome of an attempted irrigation sequence, reported exactly once per
/// sequence regardless of success or failure (invariant 5, P5).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationEvent {
    pub greenhouse_id: String,
    pub status: IrrigationEventStatus,
    pub duration_ms: u64,
    pub pulse_count: u32,
    pub moisture_before: f64,
    pub moisture_after: Option<f64>,
    pub target_moisture: f64,
    pub plant_type: String,
    pub actuator_host: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IrrigationEventStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    MoistureDrop,
    TemperatureRise,
    HumidityDrop,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionPayload {
    pub greenhouse_id: String,
    pub prediction_type: PredictionType,
    pub current_moisture: f64,
    pub predicted_moisture: f64,
    pub confidence: f64,
    pub horizon_hours: u32,
    pub plant_type: String,
    pub recommendation: String,
}

#[derive(Debug, Deserialize)]
struct PredictionResponseJson {
    success: bool,
    #[serde(default)]
    skipped: bool,
    #[serde(rename = "notificationId", default)]
    #[allow(dead_code)]
    notification_id: Option<String>,
}

/// Outcome of `reportPrediction`; only `accepted` counts as "sent" (P6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionReportOutcome {
    pub accepted: bool,
    pub skipped: bool,
}

impl TelemetryClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `GET /sensor/greenhouse/{id}/latest`. The core tolerates
    /// `latestReading` nested under `data` or flattened as `currentValues`.
    pub async fn latest_reading(&self, greenhouse_id: &str) -> Result<Option<SensorReading>, ClientError> {
        let url = format!("{}/sensor/greenhouse/{greenhouse_id}/latest", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(&url, err))?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let envelope: LatestEnvelope = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(url.clone(), err.to_string()))?;

        if !envelope.success {
            return Ok(None);
        }

        let reading = envelope.data.and_then(|data| {
            data.latest_reading
                .or(data.current_values)
                .map(SensorReading::from)
        });
        Ok(reading)
    }

    /// `GET /sensor/greenhouse/{id}/history?hours=H&limit=L`, oldest first.
    pub async fn recent_window(
        &self,
        greenhouse_id: &str,
        hours: u32,
        max_points: u32,
    ) -> Result<Vec<SensorReading>, ClientError> {
        let url = format!("{}/sensor/greenhouse/{greenhouse_id}/history", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("hours", hours), ("limit", max_points)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(&url, err))?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let envelope: HistoryEnvelope = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(url.clone(), err.to_string()))?;

        if !envelope.success {
            return Ok(Vec::new());
        }

        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(SensorReading::from)
            .collect())
    }

    /// `GET /greenhouses/ai/irrigation-config`, used by `reloadConfig`.
    pub async fn fetch_plant_config(&self, greenhouse_id: &str) -> Result<PlantConfigData, ClientError> {
        let url = format!("{}/greenhouses/ai/irrigation-config", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("greenhouseId", greenhouse_id)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(&url, err))?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let envelope: PlantConfigEnvelope = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(url.clone(), err.to_string()))?;

        envelope
            .data
            .filter(|_| envelope.success)
            .ok_or_else(|| ClientError::Missing(format!("no irrigation config for {greenhouse_id}")))
    }

    /// `POST /irrigation/ai/report`. Fire-and-observe: a post failure is
    /// returned to the caller (the Pulse Executor), which logs it but never
    /// fails the pulse sequence because of it (§4.4).
    pub async fn report_irrigation(&self, event: &IrrigationEvent) -> Result<(), ClientError> {
        let url = format!("{}/irrigation/ai/report", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(event)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(&url, err))?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// `POST /irrigation/ai/prediction`. The backend may dedup (`skipped`);
    /// only `accepted` advances `lastPredictionAt`.
    pub async fn report_prediction(
        &self,
        payload: &PredictionPayload,
    ) -> Result<PredictionReportOutcome, ClientError> {
        let url = format!("{}/irrigation/ai/prediction", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(&url, err))?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let decoded: PredictionResponseJson = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(url.clone(), err.to_string()))?;

        Ok(PredictionReportOutcome {
            accepted: decoded.success && !decoded.skipped,
            skipped: decoded.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn latest_reading_tolerates_current_values_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sensor/greenhouse/gh-1/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "currentValues": {
                        "airTemperature": 28.0,
                        "airHumidity": 55.0,
                        "soilMoisture": 40.0,
                        "soilTemperature": 24.0,
                        "timestamp": "2026-01-01T12:00:00Z"
                    }
                }
            })))
            .mount(&server)
            .await;

        let client = TelemetryClient::new(Client::new(), server.uri());
        let reading = client.latest_reading("gh-1").await.unwrap().unwrap();
        assert_eq!(reading.soil_moisture, 40.0);
    }

    #[tokio::test]
    async fn latest_reading_returns_none_when_unsuccessful() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sensor/greenhouse/gh-1/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
            .mount(&server)
            .await;

        let client = TelemetryClient::new(Client::new(), server.uri());
        assert!(client.latest_reading("gh-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn report_prediction_accepted_requires_success_and_not_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/irrigation/ai/prediction"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"success": true, "skipped": false})),
            )
            .mount(&server)
            .await;

        let client = TelemetryClient::new(Client::new(), server.uri());
        let outcome = client
            .report_prediction(&PredictionPayload {
                greenhouse_id: "gh-1".into(),
                prediction_type: PredictionType::MoistureDrop,
                current_moisture: 60.0,
                predicted_moisture: 38.0,
                confidence: 80.0,
                horizon_hours: 6,
                plant_type: "tomato".into(),
                recommendation: "irrigate soon".into(),
            })
            .await
            .unwrap();
        assert!(outcome.accepted);
        assert!(!outcome.skipped);
    }

    #[tokio::test]
    async fn report_prediction_skipped_is_not_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/irrigation/ai/prediction"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"success": true, "skipped": true})),
            )
            .mount(&server)
            .await;

        let client = TelemetryClient::new(Client::new(), server.uri());
        let outcome = client
            .report_prediction(&PredictionPayload {
                greenhouse_id: "gh-1".into(),
                prediction_type: PredictionType::HumidityDrop,
                current_moisture: 60.0,
                predicted_moisture: 50.0,
                confidence: 80.0,
                horizon_hours: 6,
                plant_type: "tomato".into(),
                recommendation: "irrigate soon".into(),
            })
            .await
            .unwrap();
        assert!(!outcome.accepted);
        assert!(outcome.skipped);
    }
}
