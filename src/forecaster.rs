//! Forecaster Adapter (C6). Wraps the external LSTM model and sensor
//! preprocessor — both genuinely out of scope per §1 — behind two narrow
//! seams so the rest of the core stays decoupled from the model's shape.

use crate::models::SensorReading;
use std::sync::Arc;

pub const WINDOW_LEN: usize = 24;
pub const HORIZON_LEN: usize = 12;

/// Sensor preprocessing, treated as a pure function (`rows -> normalized
/// rows`) per §1. Channel order is fixed: airTemperature, airHumidity,
/// soilMoisture, soilTemperature.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, readings: &[SensorReading]) -> Vec<[f64; 4]>;
}

/// The LSTM forecaster, treated as a pure function (`window -> vector of
/// future moistures`) per §1. Returns `None` if the model is unavailable.
pub trait ForecastModel: Send + Sync {
    fn predict(&self, window: &[[f64; 4]; WINDOW_LEN]) -> Option<[f64; HORIZON_LEN]>;
}

#[derive(Clone)]
pub struct ForecasterAdapter {
    normalizer: Arc<dyn Normalizer>,
    model: Arc<dyn ForecastModel>,
}

impl ForecasterAdapter {
    pub fn new(normalizer: Arc<dyn Normalizer>, model: Arc<dyn ForecastModel>) -> Self {
        Self { normalizer, model }
    }

    /// Checks preconditions (exactly 24 inputs), normalizes, invokes the
    /// model, and rescales its `[0,1]` output to a percentage. `None` if
    /// the window is the wrong length or the model declines to predict.
    pub fn forecast(&self, last24: &[SensorReading]) -> Option<Vec<f64>> {
        if last24.len() != WINDOW_LEN {
            return None;
        }
        let normalized = self.normalizer.normalize(last24);
        let window: [[f64; 4]; WINDOW_LEN] = normalized.try_into().ok()?;
        let predicted = self.model.predict(&window)?;
        Some(predicted.iter().map(|value| value * 100.0).collect())
    }
}

/// Normalizer that treats raw sensor units as already `[0,1]`-scaled by
/// dividing through a fixed-range assumption. A real deployment plugs in
/// the trained preprocessor; this is a deterministic stand-in for tests.
pub struct PassthroughNormalizer;

impl Normalizer for PassthroughNormalizer {
    fn normalize(&self, readings: &[SensorReading]) -> Vec<[f64; 4]> {
        readings
            .iter()
            .map(|r| {
                [
                    r.air_temperature / 50.0,
                    r.air_humidity / 100.0,
                    r.soil_moisture / 100.0,
                    r.soil_temperature / 50.0,
                ]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn window_of(len: usize) -> Vec<SensorReading> {
        (0..len)
            .map(|i| SensorReading {
                air_temperature: 25.0,
                air_humidity: 50.0,
                soil_moisture: 40.0 + i as f64,
                soil_temperature: 22.0,
                timestamp: Utc::now(),
            })
            .collect()
    }

    struct FixedModel(f64);
    impl ForecastModel for FixedModel {
        fn predict(&self, _window: &[[f64; 4]; WINDOW_LEN]) -> Option<[f64; HORIZON_LEN]> {
            Some([self.0; HORIZON_LEN])
        }
    }

    struct UnavailableModel;
    impl ForecastModel for UnavailableModel {
        fn predict(&self, _window: &[[f64; 4]; WINDOW_LEN]) -> Option<[f64; HORIZON_LEN]> {
            None
        }
    }

    #[test]
    fn rejects_windows_not_exactly_24() {
        let adapter = ForecasterAdapter::new(Arc::new(PassthroughNormalizer), Arc::new(FixedModel(0.5)));
        assert!(adapter.forecast(&window_of(23)).is_none());
        assert!(adapter.forecast(&window_of(25)).is_none());
    }

    #[test]
    fn rescales_model_output_to_percent() {
        let adapter = ForecasterAdapter::new(Arc::new(PassthroughNormalizer), Arc::new(FixedModel(0.42)));
        let forecast = adapter.forecast(&window_of(24)).unwrap();
        assert_eq!(forecast.len(), HORIZON_LEN);
        assert!((forecast[0] - 42.0).abs() < 1e-9);
    }

    #[test]
    fn propagates_model_unavailability() {
        let adapter = ForecasterAdapter::new(Arc::new(PassthroughNormalizer), Arc::new(UnavailableModel));
        assert!(adapter.forecast(&window_of(24)).is_none());
    }
}
