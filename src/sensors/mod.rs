/// Sensor readings: status classification and calibration

mod calibration;
mod status;

pub use calibration::{calibrate_dht11, CalibratedReading};
pub use status::{
    evaluate_status, Band, LiveStatus, Reading, SensorStatus, SensorThresholds, Thresholds,
};
