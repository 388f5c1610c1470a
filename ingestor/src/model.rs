use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// Latest temperature/humidity observation for a device.
///
/// The timestamp is assigned by the server at ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(device_id: impl Into<String>, measurement: Measurement) -> Self {
        Self {
            device_id: device_id.into(),
            temperature: measurement.temperature,
            humidity: measurement.humidity,
            timestamp: Utc::now(),
        }
    }
}

/// Validated body of a submission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub devices: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

// RFC 3339, microseconds, trailing `Z`
fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}
