use crate::error::{BillingError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const UPSTREAM_TIMEOUT_VAR: &str = "CREDITLINE_UPSTREAM_TIMEOUT_MS";
pub const SIMULATED_LATENCY_VAR: &str = "CREDITLINE_SIMULATED_LATENCY";
pub const CATALOG_VAR: &str = "CREDITLINE_CATALOG";
pub const DB_PATH_VAR: &str = "CREDITLINE_DB_PATH";

const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 10_000;

/// Runtime settings. Command-line flags take precedence over these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Upper bound on a single upstream generation call.
    pub upstream_timeout: Duration,
    /// Whether the upstream mock sleeps for its configured latency.
    pub simulated_latency: bool,
    pub catalog_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream_timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            simulated_latency: true,
            catalog_path: None,
            db_path: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let upstream_timeout = match lookup(UPSTREAM_TIMEOUT_VAR) {
            Some(raw) => {
                let millis: u64 = raw.trim().parse().map_err(|_| {
                    BillingError::Config(format!("{UPSTREAM_TIMEOUT_VAR} must be an integer, got '{raw}'"))
                })?;
                if millis == 0 {
                    return Err(BillingError::Config(format!(
                        "{UPSTREAM_TIMEOUT_VAR} must be greater than zero"
                    )));
                }
                Duration::from_millis(millis)
            }
            None => defaults.upstream_timeout,
        };

        let simulated_latency = match lookup(SIMULATED_LATENCY_VAR) {
            Some(raw) => parse_flag(SIMULATED_LATENCY_VAR, &raw)?,
            None => defaults.simulated_latency,
        };

        Ok(Self {
            upstream_timeout,
            simulated_latency,
            catalog_path: lookup(CATALOG_VAR).filter(|v| !v.is_empty()).map(PathBuf::from),
            db_path: lookup(DB_PATH_VAR).filter(|v| !v.is_empty()).map(PathBuf::from),
        })
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(BillingError::Config(format!(
            "{name} must be a boolean, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.upstream_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let settings = Settings::from_lookup(lookup(&[
            (UPSTREAM_TIMEOUT_VAR, "250"),
            (SIMULATED_LATENCY_VAR, "off"),
            (DB_PATH_VAR, "/tmp/ledger"),
        ]))
        .unwrap();
        assert_eq!(settings.upstream_timeout, Duration::from_millis(250));
        assert!(!settings.simulated_latency);
        assert_eq!(settings.db_path, Some(PathBuf::from("/tmp/ledger")));
        assert_eq!(settings.catalog_path, None);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            [(UPSTREAM_TIMEOUT_VAR, "soon")],
            [(UPSTREAM_TIMEOUT_VAR, "0")],
            [(SIMULATED_LATENCY_VAR, "maybe")],
        ] {
            assert!(matches!(
                Settings::from_lookup(lookup(&vars)),
                Err(BillingError::Config(_))
            ));
        }
    }
}
