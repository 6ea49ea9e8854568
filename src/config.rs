//! Bootstrap configuration (C12). Grounded on `node-forwarder/src/config.rs`'s
//! `env_string`/`env_u64`/`env_optional` helper trio — same fail-fast-on-
//! missing-required-var, default-on-absent-optional-var shape.

use crate::models::GreenhouseConfig;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::env;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub backend_url: String,
    pub greenhouse_id: String,
    pub actuator_endpoint: String,
    pub plant_type: String,
    pub target_moisture_pct: Option<f64>,
    pub pulse_duration_sec: f64,
    pub pulse_wait_sec: u64,
    pub max_pulses: u32,
    pub gain_per_pulse_sec: f64,
    pub check_interval_sec: u64,
    pub auto_start_monitor: bool,
    pub fetch_config_from_backend: bool,
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self> {
        let backend_url = env_string("BACKEND_URL", Some("http://127.0.0.1:3000".to_string()))?;
        let greenhouse_id = env_string("GREENHOUSE_ID", None)?;

        let esp32_ip = env_string("ESP32_IP", None)?;
        let esp32_port = env_u64("ESP32_PORT", Some(80))?;
        let actuator_endpoint = format!("http://{esp32_ip}:{esp32_port}");

        let plant_type = env_string("PLANT_TYPE", Some("default".to_string()))?;
        let target_moisture_pct = match env_optional("TARGET_MOISTURE") {
            Some(raw) => Some(raw.parse::<f64>().context("invalid TARGET_MOISTURE")?),
            None => None,
        };

        let pulse_duration_sec = env_f64("PULSE_DURATION", Some(GreenhouseConfig::DEFAULT_PULSE_DURATION_SEC))?;
        let pulse_wait_sec = env_u64("PULSE_WAIT", Some(GreenhouseConfig::DEFAULT_PULSE_WAIT_SEC))?;
        let max_pulses = env_u64("MAX_PULSES", Some(GreenhouseConfig::DEFAULT_MAX_PULSES as u64))? as u32;
        let gain_per_pulse_sec = env_f64("GAIN_PER_PULSE_SEC", Some(GreenhouseConfig::DEFAULT_GAIN_PER_PULSE_SEC))?;
        let check_interval_sec = env_u64("CHECK_INTERVAL_SEC", Some(GreenhouseConfig::DEFAULT_CHECK_INTERVAL_SEC))?;

        let auto_start_monitor = env_bool("AUTO_START_MONITOR", true)?;
        let fetch_config_from_backend = env_bool("FETCH_CONFIG_FROM_BACKEND", true)?;

        Ok(Self {
            backend_url,
            greenhouse_id,
            actuator_endpoint,
            plant_type,
            target_moisture_pct,
            pulse_duration_sec,
            pulse_wait_sec,
            max_pulses,
            gain_per_pulse_sec,
            check_interval_sec,
            auto_start_monitor,
            fetch_config_from_backend,
        })
    }

    pub fn to_greenhouse_config(&self) -> GreenhouseConfig {
        GreenhouseConfig {
            greenhouse_id: self.greenhouse_id.clone(),
            actuator_endpoint: self.actuator_endpoint.clone(),
            plant_type: self.plant_type.clone(),
            pulse_duration_sec: self.pulse_duration_sec,
            pulse_wait_sec: self.pulse_wait_sec,
            max_pulses: self.max_pulses,
            auto_irrigate: true,
            check_interval_sec: self.check_interval_sec,
            target_moisture_pct: self.target_moisture_pct,
            gain_per_pulse_sec: self.gain_per_pulse_sec,
            configured_at: Utc::now(),
        }
    }
}

fn env_string(key: &str, default: Option<String>) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value.trim().parse::<u64>().with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_f64(key: &str, default: Option<f64>) -> Result<f64> {
    match env::var(key) {
        Ok(value) => value.trim().parse::<f64>().with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(anyhow!("invalid boolean for {key}: {other}")),
        },
        Err(_) => Ok(default),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear() {
        for key in [
            "BACKEND_URL",
            "GREENHOUSE_ID",
            "ESP32_IP",
            "ESP32_PORT",
            "PLANT_TYPE",
            "TARGET_MOISTURE",
            "PULSE_DURATION",
            "PULSE_WAIT",
            "MAX_PULSES",
            "GAIN_PER_PULSE_SEC",
            "CHECK_INTERVAL_SEC",
            "AUTO_START_MONITOR",
            "FETCH_CONFIG_FROM_BACKEND",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn missing_required_greenhouse_id_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("ESP32_IP", "10.0.0.5");
        assert!(ControllerConfig::from_env().is_err());
    }

    #[test]
    fn defaults_fill_in_when_optional_vars_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("GREENHOUSE_ID", "gh-1");
        env::set_var("ESP32_IP", "10.0.0.5");
        let config = ControllerConfig::from_env().unwrap();
        assert_eq!(config.actuator_endpoint, "http://10.0.0.5:80");
        assert_eq!(config.pulse_duration_sec, GreenhouseConfig::DEFAULT_PULSE_DURATION_SEC);
        assert_eq!(config.max_pulses, GreenhouseConfig::DEFAULT_MAX_PULSES);
        assert!(config.auto_start_monitor);
        assert!(config.target_moisture_pct.is_none());
    }

    #[test]
    fn boolean_env_vars_accept_common_spellings() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("GREENHOUSE_ID", "gh-1");
        env::set_var("ESP32_IP", "10.0.0.5");
        env::set_var("AUTO_START_MONITOR", "false");
        let config = ControllerConfig::from_env().unwrap();
        assert!(!config.auto_start_monitor);
    }
}
