use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable sample from a greenhouse's sensor set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub air_temperature: f64,
    pub air_humidity: f64,
    pub soil_moisture: f64,
    pub soil_temperature: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-plant moisture band. A `default` profile is always present in the
/// plant knowledge table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlantProfile {
    pub min: f64,
    pub ideal: f64,
    pub max: f64,
}

/// Human-facing risk bucket for an [`IrrigationDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// Lifecycle state of a monitored greenhouse, per §4.8 of the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GreenhouseStatus {
    Idle,
    Analyzing,
    Irrigating,
    Waiting,
    Error,
}

/// Per-greenhouse configuration. Mutable only via `configure`/`reloadConfig`;
/// replacement is atomic (see [`crate::config_registry::ConfigRegistry`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenhouseConfig {
    pub greenhouse_id: String,
    pub actuator_endpoint: String,
    pub plant_type: String,
    pub pulse_duration_sec: f64,
    pub pulse_wait_sec: u64,
    pub max_pulses: u32,
    pub auto_irrigate: bool,
    pub check_interval_sec: u64,
    pub target_moisture_pct: Option<f64>,
    /// Effective moisture gain per pulse-second, used by the Decision
    /// Engine's dosing formula. Flagged as an Open Question in the
    /// original spec; surfaced here as a config field (default 1.5),
    /// see DESIGN.md.
    pub gain_per_pulse_sec: f64,
    pub configured_at: DateTime<Utc>,
}

impl GreenhouseConfig {
    pub const DEFAULT_PULSE_DURATION_SEC: f64 = 1.0;
    pub const DEFAULT_PULSE_WAIT_SEC: u64 = 30;
    pub const DEFAULT_MAX_PULSES: u32 = 15;
    pub const DEFAULT_CHECK_INTERVAL_SEC: u64 = 300;
    pub const DEFAULT_GAIN_PER_PULSE_SEC: f64 = 1.5;
}

/// Pure decision value, no identity. Produced by the Decision Engine,
/// consumed by the Pulse Executor and Prediction Gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationDecision {
    pub needs_irrigation: bool,
    pub current_moisture: f64,
    pub target_moisture: f64,
    pub predicted_moisture: Option<f64>,
    pub confidence: f64,
    pub urgency: Urgency,
    pub pulse_count: u32,
    pub pulse_duration_sec: f64,
    pub plant_type: String,
    pub human_summary: String,
}

/// Outcome of one pulse sequence for one greenhouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationResult {
    pub success: bool,
    pub pulses_executed: u32,
    pub total_duration_sec: f64,
    pub moisture_before: f64,
    pub moisture_after: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
