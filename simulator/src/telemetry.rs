use rand::Rng;
use serde::Serialize;

/// Body a sensor posts to the ingestor. The server assigns the timestamp.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Telemetry {
    pub temperature: f64,
    pub humidity: f64,
}

impl Telemetry {
    /// DHT-style reading, rounded to one decimal like the sensor reports.
    pub fn generate(rng: &mut impl Rng) -> Self {
        let temperature = if rng.gen_bool(0.05) {
            rng.gen_range(-10.0..50.0) // 5% outliers
        } else {
            rng.gen_range(15.0..35.0)
        };

        let humidity = if rng.gen_bool(0.05) {
            rng.gen_range(0.0..100.0) // 5% outliers
        } else {
            rng.gen_range(30.0..80.0)
        };

        Self {
            temperature: round1(temperature),
            humidity: round1(humidity),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Submit URL for `device_id` under `base`, tolerating a trailing slash.
pub fn reading_url(base: &str, device_id: &str) -> String {
    format!(
        "{}/api/devices/{}/readings",
        base.trim_end_matches('/'),
        device_id
    )
}
