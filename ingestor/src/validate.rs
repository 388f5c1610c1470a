use crate::errors::{Error, Result};
use crate::model::Measurement;
use serde_json::{Map, Value};

/// Parses a submission body into a measurement.
///
/// The body is treated as JSON whatever its declared content type. Numeric
/// strings are coerced; any other client-supplied field is ignored.
pub fn parse_measurement(body: &[u8]) -> Result<Measurement> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| Error::InvalidPayload(e.to_string()))?;

    let fields = value.as_object().ok_or_else(|| {
        Error::InvalidPayload(format!("expected a JSON object, got {}", kind(&value)))
    })?;

    Ok(Measurement {
        temperature: number_field(fields, "temperature")?,
        humidity: number_field(fields, "humidity")?,
    })
}

fn number_field(fields: &Map<String, Value>, name: &str) -> Result<f64> {
    let value = fields
        .get(name)
        .ok_or_else(|| Error::InvalidPayload(format!("missing field '{}'", name)))?;

    let number = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            Error::InvalidPayload(format!("field '{}' is not representable as a float", name))
        })?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            Error::InvalidPayload(format!(
                "could not convert field '{}' to float: '{}'",
                name, s
            ))
        })?,
        other => {
            return Err(Error::InvalidPayload(format!(
                "field '{}' must be a number, not {}",
                name,
                kind(other)
            )))
        }
    };

    if !number.is_finite() {
        return Err(Error::InvalidPayload(format!(
            "field '{}' must be a finite number",
            name
        )));
    }

    Ok(number)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
