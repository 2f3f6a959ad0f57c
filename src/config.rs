//! Runtime configuration
//!
//! Read from the process environment after `.env` has been loaded.

use crate::error::ChatError;
use crate::Result;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PORT: u16 = 8080;

/// Settings for the hosted model client
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    /// Fold system messages into the next user turn instead of sending
    /// them as a system instruction.
    pub convert_system_message_to_human: bool,
    pub timeout: Option<Duration>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: DEFAULT_BASE_URL.to_string(),
            convert_system_message_to_human: true,
            timeout: None,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub model: ModelSettings,
    pub bind_addr: String,
    pub port: u16,
}

// The key stays out of logs.
impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .finish()
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelSettings::default(),
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ChatConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY"));

        let mut model = ModelSettings::default();
        if let Some(name) = get("GEMINI_MODEL") {
            model.model = name;
        }
        if let Some(raw) = get("GEMINI_TEMPERATURE") {
            model.temperature = parse_temperature(&raw)?;
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            model.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("GEMINI_CONVERT_SYSTEM_MESSAGE") {
            model.convert_system_message_to_human =
                parse_bool("GEMINI_CONVERT_SYSTEM_MESSAGE", &raw)?;
        }
        if let Some(raw) = get("GEMINI_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ChatError::Config(format!(
                    "GEMINI_TIMEOUT_SECS must be a whole number, got {:?}",
                    raw
                ))
            })?;
            model.timeout = Some(Duration::from_secs(secs));
        }

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => raw.parse().map_err(|_| {
                ChatError::Config(format!("PORT must be a valid port, got {:?}", raw))
            })?,
            None => DEFAULT_PORT,
        };

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());

        Ok(Self {
            api_key,
            model,
            bind_addr,
            port,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_temperature(raw: &str) -> Result<f32> {
    let value: f32 = raw.parse().map_err(|_| {
        ChatError::Config(format!("GEMINI_TEMPERATURE must be a number, got {:?}", raw))
    })?;

    if !(0.0..=2.0).contains(&value) {
        return Err(ChatError::Config(format!(
            "GEMINI_TEMPERATURE must be between 0 and 2, got {}",
            value
        )));
    }

    Ok(value)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ChatError::Config(format!("{} must be a boolean, got {:?}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = tokio_test::assert_ok!(ChatConfig::from_lookup(lookup_from(&[])));
        assert!(!config.has_credential());
        assert_eq!(config.model.model, "gemini-2.0-flash");
        assert_eq!(config.model.temperature, 0.7);
        assert!(config.model.convert_system_message_to_human);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_google_key_preferred_over_gemini_key() {
        let config = ChatConfig::from_lookup(lookup_from(&[
            ("GOOGLE_API_KEY", "google"),
            ("GEMINI_API_KEY", "gemini"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("google"));

        let config = ChatConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "gemini")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("gemini"));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let config = ChatConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "   ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            ("GEMINI_TEMPERATURE", "hot"),
            ("GEMINI_TEMPERATURE", "3.5"),
            ("PORT", "99999"),
            ("GEMINI_CONVERT_SYSTEM_MESSAGE", "maybe"),
        ];

        for (key, value) in cases {
            tokio_test::assert_err!(ChatConfig::from_lookup(lookup_from(&[(key, value)])));
        }
    }

    #[test]
    fn test_overrides() {
        let config = ChatConfig::from_lookup(lookup_from(&[
            ("API_PORT", "9000"),
            ("GEMINI_BASE_URL", "http://localhost:1234/v1beta/"),
            ("GEMINI_CONVERT_SYSTEM_MESSAGE", "false"),
            ("GEMINI_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.model.base_url, "http://localhost:1234/v1beta");
        assert!(!config.model.convert_system_message_to_human);
        assert_eq!(config.model.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config =
            ChatConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "secret-value")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
