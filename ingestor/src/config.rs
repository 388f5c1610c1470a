use crate::errors::{Error, Result};
use crate::registry::DeviceRegistry;
use std::collections::HashMap;
use std::env;
use tracing::warn;

pub const DEFAULT_DEVICE_ID: &str = "device-001";
pub const PLACEHOLDER_TOKEN: &str = "CHANGE_ME_TO_A_LONG_RANDOM_STRING";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;

/// Service settings read from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub devices: HashMap<String, String>,
    /// `None` allows any origin.
    pub cors_allow_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got '{}'", raw)))?,
            None => DEFAULT_PORT,
        };

        let mut devices = HashMap::new();
        devices.insert(
            DEFAULT_DEVICE_ID.to_string(),
            lookup("DEVICE_001_TOKEN").unwrap_or_else(|| PLACEHOLDER_TOKEN.to_string()),
        );
        if let Some(list) = lookup("DEVICE_TOKENS") {
            devices.extend(parse_device_tokens(&list)?);
        }

        let cors_allow_origin = lookup("CORS_ALLOW_ORIGIN").filter(|o| !o.trim().is_empty());

        Ok(Self {
            host,
            port,
            devices,
            cors_allow_origin,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn registry(&self) -> DeviceRegistry {
        if self.devices.get(DEFAULT_DEVICE_ID).map(String::as_str) == Some(PLACEHOLDER_TOKEN) {
            warn!(
                device_id = DEFAULT_DEVICE_ID,
                "device is using the placeholder token; set DEVICE_001_TOKEN"
            );
        }
        DeviceRegistry::new(self.devices.clone())
    }
}

/// Parses `id=token,id2=token2`. Blank entries are skipped.
pub fn parse_device_tokens(list: &str) -> Result<HashMap<String, String>> {
    let mut devices = HashMap::new();

    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (device_id, token) = entry.split_once('=').ok_or_else(|| {
            Error::Config(format!("DEVICE_TOKENS entry '{}' is not id=token", entry))
        })?;
        let (device_id, token) = (device_id.trim(), token.trim());

        if device_id.is_empty() || token.is_empty() {
            return Err(Error::Config(format!(
                "DEVICE_TOKENS entry for '{}' has an empty id or token",
                device_id
            )));
        }
        devices.insert(device_id.to_string(), token.to_string());
    }

    Ok(devices)
}
