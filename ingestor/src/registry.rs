use std::collections::HashMap;

/// Static mapping from device id to its shared-secret token.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    tokens: HashMap<String, String>,
}

impl DeviceRegistry {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// True only for a known device presenting its exact token.
    ///
    /// Unknown devices and wrong tokens are indistinguishable to the caller.
    pub fn authorize(&self, device_id: &str, presented_token: &str) -> bool {
        match self.tokens.get(device_id) {
            Some(expected) if !presented_token.is_empty() => {
                tokens_match(expected.as_bytes(), presented_token.as_bytes())
            }
            _ => false,
        }
    }

    pub fn device_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.tokens.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

// Compares every byte so the time taken does not depend on where the inputs differ.
fn tokens_match(expected: &[u8], presented: &[u8]) -> bool {
    if expected.len() != presented.len() {
        return false;
    }
    expected
        .iter()
        .zip(presented)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
