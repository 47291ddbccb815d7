use std::time::Duration;

use pinpoint_logic::prelude::*;

const fn default_base_url() -> &'static str {
    if let Some(url) = option_env!("PINPOINT_MAPS_BASE_URL") {
        url
    } else {
        "https://maps.googleapis.com"
    }
}

const fn default_timeout_secs() -> u64 {
    if let Some(secs) = option_env!("PINPOINT_MAPS_TIMEOUT_SECS") {
        const_str::parse!(secs, u64)
    } else {
        10
    }
}

const DEFAULT_BASE_URL: &str = default_base_url();
const DEFAULT_TIMEOUT_SECS: u64 = default_timeout_secs();
const BUILD_API_KEY: Option<&str> = option_env!("PINPOINT_MAPS_API_KEY");

const API_KEY_VAR: &str = "PINPOINT_MAPS_API_KEY";
const BASE_URL_VAR: &str = "PINPOINT_MAPS_BASE_URL";
const TIMEOUT_VAR: &str = "PINPOINT_MAPS_TIMEOUT_SECS";

#[derive(Debug, Clone)]
/// Where and how to reach the maps provider. Defaults are baked in at build time and can be
/// overridden from the environment at runtime.
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Limit on any single request
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: BUILD_API_KEY.map(str::to_string),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(key) = lookup(API_KEY_VAR) {
            config.api_key = Some(key);
        }

        if let Some(url) = lookup(BASE_URL_VAR) {
            config.base_url = url;
        }

        if let Some(secs) = lookup(TIMEOUT_VAR) {
            let secs = secs
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid {TIMEOUT_VAR}: {secs}"))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// The API key, if one is set and not blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_runtime_overrides() {
        let config = ProviderConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "abc123"),
            (BASE_URL_VAR, "http://localhost:9000/"),
            (TIMEOUT_VAR, "3"),
        ]))
        .unwrap();

        assert_eq!(config.api_key(), Some("abc123"));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(
            config.url("/maps/api/js"),
            "http://localhost:9000/maps/api/js"
        );
    }

    #[test]
    fn test_bad_timeout_rejected() {
        assert!(ProviderConfig::from_lookup(lookup(&[(TIMEOUT_VAR, "soon")])).is_err());
    }

    #[test]
    fn test_blank_key_is_no_key() {
        let config = ProviderConfig::from_lookup(lookup(&[(API_KEY_VAR, "  ")])).unwrap();
        assert_eq!(config.api_key(), None);
    }
}
