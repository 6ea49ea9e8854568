//! Supervisor (C10): one long-lived tick loop over every monitored
//! greenhouse. Grounded on the teacher's `CancellationToken` +
//! `tokio::select!` service pattern (`ForecastService::start`,
//! `AlarmEngineService::start`) — spawn once, cooperatively cancel.

use crate::config_registry::ConfigRegistry;
use crate::decision;
use crate::forecaster::ForecasterAdapter;
use crate::history_registry::HistoryRegistry;
use crate::models::GreenhouseStatus;
use crate::prediction_gate::PredictionGate;
use crate::pulse_executor::PulseExecutor;
use crate::runtime::RuntimeRegistry;
use crate::telemetry_client::TelemetryClient;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

const MIN_TICK_SEC: u64 = 5;

#[derive(Clone)]
pub struct Supervisor {
    configs: Arc<ConfigRegistry>,
    histories: Arc<HistoryRegistry>,
    runtimes: Arc<RuntimeRegistry>,
    telemetry: TelemetryClient,
    pulse_executor: PulseExecutor,
    prediction_gate: PredictionGate,
    forecaster: Option<ForecasterAdapter>,
    monitored: Arc<RwLock<HashSet<String>>>,
    last_checked_at: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl Supervisor {
    pub fn new(
        configs: Arc<ConfigRegistry>,
        histories: Arc<HistoryRegistry>,
        runtimes: Arc<RuntimeRegistry>,
        telemetry: TelemetryClient,
        pulse_executor: PulseExecutor,
        prediction_gate: PredictionGate,
        forecaster: Option<ForecasterAdapter>,
    ) -> Self {
        Self {
            configs,
            histories,
            runtimes,
            telemetry,
            pulse_executor,
            prediction_gate,
            forecaster,
            monitored: Arc::new(RwLock::new(HashSet::new())),
            last_checked_at: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn start_monitoring(&self, greenhouse_id: &str) {
        self.monitored.write().await.insert(greenhouse_id.to_string());
    }

    pub async fn stop_monitoring(&self, greenhouse_id: &str) {
        self.monitored.write().await.remove(greenhouse_id);
        self.last_checked_at.write().await.remove(greenhouse_id);
    }

    pub async fn is_monitoring(&self, greenhouse_id: &str) -> bool {
        self.monitored.read().await.contains(greenhouse_id)
    }

    pub async fn monitored_ids(&self) -> Vec<String> {
        self.monitored.read().await.iter().cloned().collect()
    }

    /// Spawns the tick loop. The sleep period is recomputed every iteration
    /// as `min(checkIntervalSec)` across currently monitored greenhouses, so
    /// a newly configured fast-polling greenhouse shortens the next wait.
    pub fn start(self, cancel: CancellationToken) {
        tokio::spawn(async move {
            loop {
                let period = self.next_tick_period().await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(period) => {
                        self.run_due_cycles().await;
                    }
                }
            }
            tracing::info!("supervisor loop stopped");
        });
    }

    async fn next_tick_period(&self) -> Duration {
        let monitored = self.monitored.read().await.clone();
        let mut min_interval = None;
        for id in &monitored {
            if let Some(cfg) = self.configs.get(id).await {
                min_interval = Some(min_interval.map_or(cfg.check_interval_sec, |m: u64| m.min(cfg.check_interval_sec)));
            }
        }
        Duration::from_secs(min_interval.unwrap_or(MIN_TICK_SEC).max(MIN_TICK_SEC))
    }

    async fn run_due_cycles(&self) {
        let monitored = self.monitored.read().await.clone();
        for greenhouse_id in monitored {
            let Some(cfg) = self.configs.get(&greenhouse_id).await else {
                continue;
            };

            let now = Utc::now();
            let due = match self.last_checked_at.read().await.get(&greenhouse_id) {
                Some(last) => (now - *last).num_seconds() as u64 >= cfg.check_interval_sec,
                None => true,
            };
            if !due {
                continue;
            }
            self.last_checked_at.write().await.insert(greenhouse_id.clone(), now);

            if let Err(err) = self.run_one_cycle(&greenhouse_id).await {
                tracing::warn!(greenhouse_id = %greenhouse_id, error = %err, "monitoring cycle failed");
            }
        }
    }

    async fn run_one_cycle(&self, greenhouse_id: &str) -> Result<(), crate::error::ClientError> {
        let Some(cfg) = self.configs.get(greenhouse_id).await else {
            return Ok(());
        };
        let runtime = self.runtimes.get_or_create(greenhouse_id).await;

        runtime.set_status(GreenhouseStatus::Analyzing).await;
        let latest = match self.telemetry.latest_reading(greenhouse_id).await? {
            Some(reading) => reading,
            None => {
                runtime.set_status(GreenhouseStatus::Idle).await;
                return Ok(());
            }
        };
        self.histories.push(greenhouse_id, latest).await;

        let history = self.histories.last_n(greenhouse_id, 24).await;
        let forecast = self
            .forecaster
            .as_ref()
            .and_then(|forecaster| forecaster.forecast(&history));

        let decision = decision::decide(&latest, &cfg, forecast.as_deref());

        if decision.needs_irrigation && cfg.auto_irrigate {
            match self.pulse_executor.execute(&runtime, &cfg, &decision).await {
                Ok(result) => {
                    tracing::info!(greenhouse_id, success = result.success, pulses = result.pulses_executed, "irrigation cycle complete");
                }
                Err(crate::error::LifecycleError::AlreadyInProgress(_)) => {
                    tracing::debug!(greenhouse_id, "irrigation already in progress, skipping this tick");
                }
                Err(err) => {
                    tracing::warn!(greenhouse_id, error = %err, "irrigation attempt failed");
                }
            }
        } else {
            runtime.set_status(GreenhouseStatus::Idle).await;
        }

        if let Some(forecast) = forecast {
            let history_len = self.histories.len(greenhouse_id).await;
            if let Err(err) = self
                .prediction_gate
                .evaluate(
                    &runtime,
                    &cfg,
                    history_len,
                    latest.soil_moisture,
                    latest.air_temperature,
                    latest.air_humidity,
                    &forecast,
                    Utc::now(),
                )
                .await
            {
                tracing::warn!(greenhouse_id, error = %err, "prediction report failed");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator_client::ActuatorClient;
    use crate::models::GreenhouseConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg(id: &str, check_interval_sec: u64) -> GreenhouseConfig {
        GreenhouseConfig {
            greenhouse_id: id.to_string(),
            actuator_endpoint: "http://10.0.0.5:8080".to_string(),
            plant_type: "tomato".to_string(),
            pulse_duration_sec: 1.0,
            pulse_wait_sec: 30,
            max_pulses: 15,
            auto_irrigate: true,
            check_interval_sec,
            target_moisture_pct: Some(70.0),
            gain_per_pulse_sec: 1.5,
            configured_at: Utc::now(),
        }
    }

    fn supervisor(telemetry: TelemetryClient) -> Supervisor {
        let http = reqwest::Client::new();
        Supervisor::new(
            Arc::new(ConfigRegistry::new()),
            Arc::new(HistoryRegistry::new()),
            Arc::new(RuntimeRegistry::new()),
            telemetry.clone(),
            PulseExecutor::new(ActuatorClient::new(http), telemetry.clone()),
            PredictionGate::new(telemetry),
            None,
        )
    }

    #[tokio::test]
    async fn start_stop_monitoring_toggles_membership() {
        let supervisor = supervisor(TelemetryClient::new(reqwest::Client::new(), "http://unused".to_string()));
        assert!(!supervisor.is_monitoring("gh-1").await);
        supervisor.start_monitoring("gh-1").await;
        assert!(supervisor.is_monitoring("gh-1").await);
        supervisor.stop_monitoring("gh-1").await;
        assert!(!supervisor.is_monitoring("gh-1").await);
    }

    #[tokio::test]
    async fn next_tick_period_is_the_minimum_monitored_interval() {
        let supervisor = supervisor(TelemetryClient::new(reqwest::Client::new(), "http://unused".to_string()));
        supervisor.configs.put(cfg("gh-1", 600)).await;
        supervisor.configs.put(cfg("gh-2", 120)).await;
        supervisor.start_monitoring("gh-1").await;
        supervisor.start_monitoring("gh-2").await;

        assert_eq!(supervisor.next_tick_period().await, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn next_tick_period_falls_back_to_floor_when_nothing_monitored() {
        let supervisor = supervisor(TelemetryClient::new(reqwest::Client::new(), "http://unused".to_string()));
        assert_eq!(supervisor.next_tick_period().await, Duration::from_secs(MIN_TICK_SEC));
    }

    /// Lock contention from a concurrent pulse sequence is logged and
    /// skipped, never surfaced as a cycle failure.
    #[tokio::test]
    async fn cycle_skips_quietly_when_pulse_lock_is_held() {
        let backend = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sensor/greenhouse/gh-1/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "latestReading": {
                        "airTemperature": 25.0,
                        "airHumidity": 50.0,
                        "soilMoisture": 20.0,
                        "soilTemperature": 22.0,
                        "timestamp": "2026-01-01T00:00:00Z"
                    }
                }
            })))
            .mount(&backend)
            .await;

        let supervisor = supervisor(TelemetryClient::new(reqwest::Client::new(), backend.uri()));
        supervisor.configs.put(cfg("gh-1", 300)).await;
        let runtime = supervisor.runtimes.get_or_create("gh-1").await;
        let _guard = runtime.try_acquire_pulse_lock().unwrap();

        let result = supervisor.run_one_cycle("gh-1").await;
        assert!(result.is_ok());
    }
}
