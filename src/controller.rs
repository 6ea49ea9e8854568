//! Controller (C11): the Lifecycle API. Grounded on the teacher's `AppState`
//! (`core-server-rs/src/state.rs`) — one `#[derive(Clone)]` struct owning
//! every shared collaborator behind `Arc`, cheaply cloned into tasks instead
//! of reached for through module-level globals.

use crate::actuator_client::ActuatorClient;
use crate::config_registry::ConfigRegistry;
use crate::decision;
use crate::error::{LifecycleError, LifecycleResult};
use crate::forecaster::ForecasterAdapter;
use crate::history_registry::HistoryRegistry;
use crate::models::{GreenhouseConfig, GreenhouseStatus, IrrigationDecision, IrrigationResult, PlantProfile};
use crate::plant_table;
use crate::prediction_gate::PredictionGate;
use crate::pulse_executor::PulseExecutor;
use crate::runtime::RuntimeRegistry;
use crate::supervisor::Supervisor;
use crate::telemetry_client::TelemetryClient;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Backend bootstrap window pulled into the Ring History on first
/// `configure` (§4.2) — wide enough to seed the Decision Engine's 24-hour
/// lookback without over-fetching.
const WARM_FILL_WINDOW_HOURS: u32 = 24;
const WARM_FILL_MAX_POINTS: u32 = crate::history::CAPACITY as u32;

#[derive(Debug, Clone)]
pub struct GreenhouseSnapshot {
    pub greenhouse_id: String,
    pub status: GreenhouseStatus,
    pub monitoring: bool,
    pub config: GreenhouseConfig,
    pub last_irrigation_at: Option<chrono::DateTime<Utc>>,
    pub last_prediction_at: Option<chrono::DateTime<Utc>>,
    pub history_len: usize,
}

/// `analyze`'s result: the Decision Engine's verdict plus a best-effort
/// read of the actuator's diagnostic pump status (§4.11 — `analyze` returns
/// "Decision + pump status"). `pump_status` is `None` when the actuator
/// could not be reached; that never fails the analysis itself.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub decision: IrrigationDecision,
    pub pump_status: Option<serde_json::Value>,
}

/// The eight Lifecycle operations (§4.11), all routed through one owning
/// struct instead of free functions over module statics.
#[derive(Clone)]
pub struct Controller {
    configs: Arc<ConfigRegistry>,
    histories: Arc<HistoryRegistry>,
    runtimes: Arc<RuntimeRegistry>,
    telemetry: TelemetryClient,
    actuator: ActuatorClient,
    supervisor: Supervisor,
    cancel: CancellationToken,
}

impl Controller {
    pub fn new(backend_url: impl Into<String>, forecaster: Option<ForecasterAdapter>) -> Self {
        let http = Client::new();
        let telemetry = TelemetryClient::new(http.clone(), backend_url);
        let actuator = ActuatorClient::new(http);

        let configs = Arc::new(ConfigRegistry::new());
        let histories = Arc::new(HistoryRegistry::new());
        let runtimes = Arc::new(RuntimeRegistry::new());

        let pulse_executor = PulseExecutor::new(actuator.clone(), telemetry.clone());
        let prediction_gate = PredictionGate::new(telemetry.clone());
        let supervisor = Supervisor::new(
            configs.clone(),
            histories.clone(),
            runtimes.clone(),
            telemetry.clone(),
            pulse_executor,
            prediction_gate,
            forecaster,
        );

        Self {
            configs,
            histories,
            runtimes,
            telemetry,
            actuator,
            supervisor,
            cancel: CancellationToken::new(),
        }
    }

    /// Starts the Supervisor's tick loop. Call once at process startup.
    /// `stopMonitoring()` (no id) signals this same token to exit.
    pub fn start_supervisor(&self) {
        self.supervisor.clone().start(self.cancel.clone());
    }

    /// `configure(config)`: atomic replace, does not affect monitoring
    /// state. On first configuration of a greenhouse, warm-fills its Ring
    /// History from the backend's bootstrap window (§4.2) so the Decision
    /// Engine isn't starting from an empty history.
    pub async fn configure(&self, config: GreenhouseConfig) -> LifecycleResult<()> {
        if config.actuator_endpoint.trim().is_empty() {
            return Err(LifecycleError::MissingEndpoint(config.greenhouse_id));
        }
        if config.max_pulses == 0 {
            return Err(LifecycleError::InvalidConfig("maxPulses must be at least 1".to_string()));
        }
        let greenhouse_id = config.greenhouse_id.clone();
        self.configs.put(config).await;

        if let Ok(readings) = self
            .telemetry
            .recent_window(&greenhouse_id, WARM_FILL_WINDOW_HOURS, WARM_FILL_MAX_POINTS)
            .await
        {
            self.histories.warm_fill_if_empty(&greenhouse_id, readings).await;
        }
        Ok(())
    }

    /// `startMonitoring(id, actuatorEndpoint?)`: if the greenhouse has no
    /// prior `configure` call, `actuator_endpoint` implicitly creates one
    /// with default pulse/check-interval settings (§3's "created by
    /// `configure` (or implicitly by `startMonitoring` with a fresh id)").
    pub async fn start_monitoring(
        &self,
        greenhouse_id: &str,
        actuator_endpoint: Option<&str>,
    ) -> LifecycleResult<()> {
        if !self.configs.contains(greenhouse_id).await {
            let endpoint = actuator_endpoint
                .map(str::to_string)
                .ok_or_else(|| LifecycleError::MissingEndpoint(greenhouse_id.to_string()))?;
            self.configure(GreenhouseConfig {
                greenhouse_id: greenhouse_id.to_string(),
                actuator_endpoint: endpoint,
                plant_type: "default".to_string(),
                pulse_duration_sec: GreenhouseConfig::DEFAULT_PULSE_DURATION_SEC,
                pulse_wait_sec: GreenhouseConfig::DEFAULT_PULSE_WAIT_SEC,
                max_pulses: GreenhouseConfig::DEFAULT_MAX_PULSES,
                auto_irrigate: true,
                check_interval_sec: GreenhouseConfig::DEFAULT_CHECK_INTERVAL_SEC,
                target_moisture_pct: None,
                gain_per_pulse_sec: GreenhouseConfig::DEFAULT_GAIN_PER_PULSE_SEC,
                configured_at: Utc::now(),
            })
            .await?;
        }
        self.supervisor.start_monitoring(greenhouse_id).await;
        Ok(())
    }

    /// `stopMonitoring(id?)`: with an id, removes just that greenhouse from
    /// the monitored set. With no id, removes every monitored greenhouse
    /// and signals the Supervisor's tick loop to exit before its next sleep
    /// completes (§4.10/§4.11); in-flight pulse sequences still run to
    /// completion since they hold their own lock independently of this
    /// token.
    pub async fn stop_monitoring(&self, greenhouse_id: Option<&str>) -> LifecycleResult<()> {
        match greenhouse_id {
            Some(id) => self.supervisor.stop_monitoring(id).await,
            None => {
                for id in self.supervisor.monitored_ids().await {
                    self.supervisor.stop_monitoring(&id).await;
                }
                self.cancel.cancel();
            }
        }
        Ok(())
    }

    /// `analyze(id)`: one read-only decision plus a best-effort actuator
    /// pump-status read, no actuation, no reporting.
    pub async fn analyze(&self, greenhouse_id: &str) -> LifecycleResult<AnalysisReport> {
        let cfg = self
            .configs
            .get(greenhouse_id)
            .await
            .ok_or_else(|| LifecycleError::NotConfigured(greenhouse_id.to_string()))?;

        let latest = self
            .telemetry
            .latest_reading(greenhouse_id)
            .await?
            .ok_or_else(|| LifecycleError::NoReadings(greenhouse_id.to_string()))?;

        self.histories.push(greenhouse_id, latest).await;

        // analyze is a cheap, side-effect-free read: no forecaster call.
        let forecast: Option<&[f64]> = None;
        let decision = decision::decide(&latest, &cfg, forecast);

        let pump_status = match self.actuator.pump_status(&cfg.actuator_endpoint).await {
            Ok(status) => Some(status),
            Err(err) => {
                tracing::warn!(greenhouse_id, error = %err, "pump status unavailable");
                None
            }
        };

        Ok(AnalysisReport { decision, pump_status })
    }

    /// `executeIrrigation(id, force?)`: runs `analyze` then drives the
    /// Pulse Executor directly, bypassing the Supervisor's tick cadence.
    /// When the decision says irrigation isn't needed, this is a no-op
    /// unless `force` is set, matching the original's explicit
    /// "irrigação não necessária" short-circuit — the Pulse Executor and
    /// telemetry are never invoked for a no-op.
    pub async fn execute_irrigation(&self, greenhouse_id: &str, force: bool) -> LifecycleResult<IrrigationResult> {
        let cfg = self
            .configs
            .get(greenhouse_id)
            .await
            .ok_or_else(|| LifecycleError::NotConfigured(greenhouse_id.to_string()))?;
        let report = self.analyze(greenhouse_id).await?;
        let mut decision = report.decision;

        if !decision.needs_irrigation {
            if !force {
                return Ok(IrrigationResult {
                    success: true,
                    pulses_executed: 0,
                    total_duration_sec: 0.0,
                    moisture_before: decision.current_moisture,
                    moisture_after: decision.current_moisture,
                    message: "irrigation not needed".to_string(),
                    timestamp: Utc::now(),
                });
            }
            // Forced despite no deficit: run the minimum single pulse.
            decision.pulse_count = 1;
        }

        let runtime = self.runtimes.get_or_create(greenhouse_id).await;
        let executor = PulseExecutor::new(self.actuator.clone(), self.telemetry.clone());
        Ok(executor.execute(&runtime, &cfg, &decision).await?)
    }

    /// `reloadConfig(id)`: re-fetches plant config from the backend and
    /// swaps the target moisture in place without interrupting monitoring
    /// (scenario 6, §8). Falls back to the midpoint of `[min, max]` when
    /// the backend has no explicit ideal, rather than keeping the stale
    /// previous target.
    pub async fn reload_config(&self, greenhouse_id: &str) -> LifecycleResult<GreenhouseConfig> {
        let mut cfg = self
            .configs
            .get(greenhouse_id)
            .await
            .ok_or_else(|| LifecycleError::NotConfigured(greenhouse_id.to_string()))?;

        let remote = self.telemetry.fetch_plant_config(greenhouse_id).await?;
        cfg.plant_type = remote.plant_type;
        cfg.target_moisture_pct = remote.soil_moisture_ideal.or_else(|| {
            match (remote.soil_moisture_min, remote.soil_moisture_max) {
                (Some(min), Some(max)) => Some((min + max) / 2.0),
                _ => cfg.target_moisture_pct,
            }
        });
        cfg.configured_at = Utc::now();

        self.configs.put(cfg.clone()).await;
        Ok(cfg)
    }

    pub async fn status(&self, greenhouse_id: &str) -> LifecycleResult<GreenhouseSnapshot> {
        let cfg = self
            .configs
            .get(greenhouse_id)
            .await
            .ok_or_else(|| LifecycleError::NotConfigured(greenhouse_id.to_string()))?;
        let runtime = self.runtimes.get_or_create(greenhouse_id).await;

        Ok(GreenhouseSnapshot {
            greenhouse_id: greenhouse_id.to_string(),
            status: runtime.status().await,
            monitoring: self.supervisor.is_monitoring(greenhouse_id).await,
            config: cfg,
            last_irrigation_at: runtime.last_irrigation_at().await,
            last_prediction_at: runtime.last_prediction_at().await,
            history_len: self.histories.len(greenhouse_id).await,
        })
    }

    pub fn list_plants(&self) -> Vec<(String, PlantProfile)> {
        plant_table::all_profiles()
    }
}
