/// DHT11 calibration
use crate::error::{DashboardError, DashboardResult};
use serde::{Deserialize, Serialize};

/// Calibrated DHT11 reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedReading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Apply the linear DHT11 correction, clamped to the sensor's physical range
pub fn calibrate_dht11(raw_temperature: f64, raw_humidity: f64) -> DashboardResult<CalibratedReading> {
    if !raw_temperature.is_finite() || !raw_humidity.is_finite() {
        return Err(DashboardError::Validation(
            "Calibration inputs must be finite numbers".to_string(),
        ));
    }

    let temperature = (raw_temperature * 0.95 + 1.1).clamp(-40.0, 85.0);
    let humidity = (raw_humidity * 1.05 - 2.0).clamp(0.0, 100.0);

    Ok(CalibratedReading {
        temperature: round2(temperature),
        humidity: round2(humidity),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
