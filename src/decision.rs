//! Decision Engine (C7). Pure, deterministic given its inputs — no I/O —
//! so the whole control surface is unit-testable with table-driven cases
//! (§4.7 rationale, P7).

use crate::models::{GreenhouseConfig, IrrigationDecision, SensorReading, Urgency};
use crate::plant_table;
use chrono::Timelike;

/// `decide(latest, cfg, forecast) -> IrrigationDecision`, per §4.7.
/// `forecast`, if present, is the next 12 hours of predicted soil moisture
/// in percent; it annotates the decision but never overrides it.
pub fn decide(
    latest: &SensorReading,
    cfg: &GreenhouseConfig,
    forecast: Option<&[f64]>,
) -> IrrigationDecision {
    let target = cfg.target_moisture_pct.unwrap_or_else(|| {
        plant_table::target_moisture(&cfg.plant_type, latest.timestamp.hour(), latest.air_temperature)
    });

    let deficit = target - latest.soil_moisture;

    let (needs_irrigation, urgency, confidence, mut summary) = if deficit <= 0.0 {
        (false, Urgency::Low, 0.85, "OK: current >= target".to_string())
    } else if deficit > 30.0 {
        (
            true,
            Urgency::Critical,
            0.95,
            format!(
                "CRITICAL: {:.1}% -> target {:.1}% (deficit: {:.1}%)",
                latest.soil_moisture, target, deficit
            ),
        )
    } else if deficit > 15.0 {
        (
            true,
            Urgency::High,
            0.90,
            format!(
                "URGENT: {:.1}% -> target {:.1}% (deficit: {:.1}%)",
                latest.soil_moisture, target, deficit
            ),
        )
    } else if deficit > 5.0 {
        (
            true,
            Urgency::Medium,
            0.85,
            format!("Recommended: {:.1}% -> target {:.1}%", latest.soil_moisture, target),
        )
    } else {
        (
            true,
            Urgency::Low,
            0.80,
            format!("Fine-tune: {:.1}% -> target {:.1}%", latest.soil_moisture, target),
        )
    };

    let pulse_count = if needs_irrigation {
        let gain_per_pulse = cfg.gain_per_pulse_sec * cfg.pulse_duration_sec;
        let raw = (deficit / gain_per_pulse).ceil() as i64 + 1;
        raw.clamp(1, cfg.max_pulses as i64) as u32
    } else {
        0
    };

    let predicted_moisture = forecast.and_then(|values| {
        if values.is_empty() {
            return None;
        }
        let window = &values[..values.len().min(6)];
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        summary.push_str(&format!(" | forecast next 6h avg {:.1}%", mean));
        Some(mean)
    });

    IrrigationDecision {
        needs_irrigation,
        current_moisture: latest.soil_moisture,
        target_moisture: target,
        predicted_moisture,
        confidence,
        urgency,
        pulse_count,
        pulse_duration_sec: cfg.pulse_duration_sec,
        plant_type: cfg.plant_type.clone(),
        human_summary: summary,
    }
}
