//! Prediction Gate (C9): turns a forecast into at most one notification per
//! cooldown window, classifying the dominant risk and reporting it to the
//! backend (§4.9). Advances `lastPredictionAt` only when the backend accepts
//! the report (invariant 6, P6).

use crate::error::ClientError;
use crate::models::GreenhouseConfig;
use crate::runtime::GreenhouseRuntime;
use crate::telemetry_client::{PredictionPayload, PredictionType, TelemetryClient};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const PREDICTION_COOLDOWN_SEC: i64 = 7200;
const MIN_FORECAST_LEN: usize = 6;
const MOISTURE_DROP_THRESHOLD_PCT: f64 = 15.0;
const TEMPERATURE_RISE_THRESHOLD_C: f64 = 10.0;
const HUMIDITY_DROP_THRESHOLD_PCT: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOutcome {
    /// Still inside the cooldown window since the last accepted prediction.
    Cooldown,
    /// Forecast too short to classify (fewer than 6 hours).
    InsufficientForecast,
    /// No risk crossed any threshold; nothing reported.
    NoRisk,
    /// A risk was classified and reported; `accepted` mirrors the backend's
    /// dedup response (P6).
    Reported { prediction_type: PredictionType, accepted: bool },
}

#[derive(Clone)]
pub struct PredictionGate {
    telemetry: TelemetryClient,
}

impl PredictionGate {
    pub fn new(telemetry: TelemetryClient) -> Self {
        Self { telemetry }
    }

    /// Evaluates one greenhouse's forecast and reports at most one
    /// notification. `drop6h` in the moisture-drop branch is the change
    /// between the current reading and the mean of the forecast's first 6
    /// hours, matching the Decision Engine's own 6-hour averaging window.
    pub async fn evaluate(
        &self,
        runtime: &Arc<GreenhouseRuntime>,
        cfg: &GreenhouseConfig,
        history_len: usize,
        current_moisture: f64,
        current_temperature: f64,
        current_humidity: f64,
        forecast: &[f64],
        now: DateTime<Utc>,
    ) -> Result<GateOutcome, ClientError> {
        if let Some(last) = runtime.last_prediction_at().await {
            if (now - last).num_seconds() < PREDICTION_COOLDOWN_SEC {
                return Ok(GateOutcome::Cooldown);
            }
        }

        if forecast.len() < MIN_FORECAST_LEN {
            return Ok(GateOutcome::InsufficientForecast);
        }

        let window = &forecast[..MIN_FORECAST_LEN];
        let predicted_moisture = window.iter().sum::<f64>() / window.len() as f64;
        let drop6h = current_moisture - predicted_moisture;

        let classification = classify(drop6h, current_temperature, current_humidity);
        let Some((prediction_type, recommendation)) = classification else {
            return Ok(GateOutcome::NoRisk);
        };

        let confidence = 75.0 + ((history_len / 5) as f64).min(20.0);
        let payload = PredictionPayload {
            greenhouse_id: cfg.greenhouse_id.clone(),
            prediction_type,
            current_moisture,
            predicted_moisture,
            confidence,
            horizon_hours: MIN_FORECAST_LEN as u32,
            plant_type: cfg.plant_type.clone(),
            recommendation,
        };

        let outcome = self.telemetry.report_prediction(&payload).await?;
        if outcome.accepted {
            runtime.record_prediction(now).await;
        }

        Ok(GateOutcome::Reported {
            prediction_type,
            accepted: outcome.accepted,
        })
    }
}

/// Dominant-risk classification, checked in order: moisture drop first,
/// then temperature rise, then humidity drop. Only one risk is ever
/// reported per evaluation even if several thresholds are crossed.
fn classify(drop6h: f64, current_temperature: f64, current_humidity: f64) -> Option<(PredictionType, String)> {
    if drop6h > MOISTURE_DROP_THRESHOLD_PCT {
        return Some((
            PredictionType::MoistureDrop,
            format!("Soil moisture projected to drop {drop6h:.1}% over the next 6h, irrigate soon"),
        ));
    }
    if current_temperature > 30.0 && drop6h > TEMPERATURE_RISE_THRESHOLD_C {
        return Some((
            PredictionType::TemperatureRise,
            "Rising temperature will accelerate moisture loss, monitor closely".to_string(),
        ));
    }
    if current_humidity < 40.0 && drop6h > HUMIDITY_DROP_THRESHOLD_PCT {
        return Some((
            PredictionType::HumidityDrop,
            "Low humidity combined with declining soil moisture, consider an early pulse".to_string(),
        ));
    }
    None
}
