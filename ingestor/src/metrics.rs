use crate::errors::{Error, Result};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref READINGS_ACCEPTED_TOTAL: IntCounter = IntCounter::new(
        "ingestor_readings_accepted_total",
        "Total readings accepted and stored"
    )
    .expect("metric name is valid");
    pub static ref UNAUTHORIZED_TOTAL: IntCounter = IntCounter::new(
        "ingestor_unauthorized_total",
        "Total submissions rejected for unknown device or bad token"
    )
    .expect("metric name is valid");
    pub static ref INVALID_PAYLOAD_TOTAL: IntCounter = IntCounter::new(
        "ingestor_invalid_payload_total",
        "Total submissions rejected for an invalid body"
    )
    .expect("metric name is valid");
    pub static ref LATEST_NOT_FOUND_TOTAL: IntCounter = IntCounter::new(
        "ingestor_latest_not_found_total",
        "Total latest-reading lookups for devices without data"
    )
    .expect("metric name is valid");
    pub static ref DEVICES_REPORTING: IntGauge = IntGauge::new(
        "ingestor_devices_reporting",
        "Number of devices with a stored reading"
    )
    .expect("metric name is valid");
}

pub fn init_metrics() -> Result<()> {
    REGISTRY.register(Box::new(READINGS_ACCEPTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UNAUTHORIZED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_PAYLOAD_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LATEST_NOT_FOUND_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEVICES_REPORTING.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::Metrics(prometheus::Error::Msg(e.to_string())))
}
