use std::time::Duration;

use anyhow::Context;

use ember_crypto::KdfParams;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3000/socket.io/?EIO=4&transport=websocket";

/// Runtime settings for one client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    /// Cost parameters for keys this client derives. Peers read them from
    /// each ciphertext, so clients with different settings interoperate.
    pub kdf: KdfParams,
    /// Skips the name prompt when set.
    pub display_name: Option<String>,
    pub tick_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            kdf: KdfParams::default(),
            display_name: None,
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Read `EMBER_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let server_url = lookup("EMBER_SERVER_URL").unwrap_or(defaults.server_url);

        let memory_kib = parse_var(&lookup, "EMBER_KDF_MEMORY_KIB")?.unwrap_or(defaults.kdf.memory_kib);
        let iterations = parse_var(&lookup, "EMBER_KDF_ITERATIONS")?.unwrap_or(defaults.kdf.iterations);
        let parallelism =
            parse_var(&lookup, "EMBER_KDF_PARALLELISM")?.unwrap_or(defaults.kdf.parallelism);
        let kdf = KdfParams::new(memory_kib, iterations, parallelism)
            .context("Invalid EMBER_KDF_* settings")?;

        let display_name = lookup("EMBER_DISPLAY_NAME")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self {
            server_url,
            kdf,
            display_name,
            tick_interval: defaults.tick_interval,
        })
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<u32>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u32>()
                .with_context(|| format!("{key} must be a positive integer, got {raw:?}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.kdf, KdfParams::default());
        assert_eq!(config.display_name, None);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_vars(vars(&[
            ("EMBER_SERVER_URL", "ws://chat.example:8080/socket.io/?EIO=4&transport=websocket"),
            ("EMBER_KDF_MEMORY_KIB", "65536"),
            ("EMBER_KDF_ITERATIONS", " 3 "),
            ("EMBER_DISPLAY_NAME", "  alice "),
        ]))
        .unwrap();
        assert!(config.server_url.starts_with("ws://chat.example:8080"));
        assert_eq!(config.kdf, KdfParams::new(65536, 3, 1).unwrap());
        assert_eq!(config.display_name.as_deref(), Some("alice"));
    }

    #[test]
    fn blank_display_name_means_prompt() {
        let config = ClientConfig::from_vars(vars(&[("EMBER_DISPLAY_NAME", "   ")])).unwrap();
        assert_eq!(config.display_name, None);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(ClientConfig::from_vars(vars(&[("EMBER_KDF_ITERATIONS", "many")])).is_err());
        assert!(ClientConfig::from_vars(vars(&[("EMBER_KDF_MEMORY_KIB", "999999999")])).is_err());
    }
}
