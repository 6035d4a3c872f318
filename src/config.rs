use std::{env, fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::{info, warn};

pub const DEFAULT_CHANNEL: &str = "survey_responses_changes";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Must match the channel used by the notify trigger.
    pub channel: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Ok(Self {
            database_url,
            max_connections: try_load("PULSE_MAX_CONNECTIONS", "5")?,
            channel: try_load("PULSE_CHANNEL", DEFAULT_CHANNEL)?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    parse_or_default(key, env::var(key).ok(), default)
}

fn parse_or_default<T: FromStr>(key: &str, value: Option<String>, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = value.unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow::anyhow!("invalid {key} value '{raw}': {e}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_use_defaults() {
        let connections: u32 = parse_or_default("PULSE_MAX_CONNECTIONS", None, "5").unwrap();
        assert_eq!(connections, 5);

        let channel: String = parse_or_default("PULSE_CHANNEL", None, DEFAULT_CHANNEL).unwrap();
        assert_eq!(channel, "survey_responses_changes");
    }

    #[test]
    fn invalid_values_are_errors() {
        let result: anyhow::Result<u32> =
            parse_or_default("PULSE_MAX_CONNECTIONS", Some("many".to_string()), "5");
        assert!(result.is_err());

        let set: u32 = parse_or_default("PULSE_MAX_CONNECTIONS", Some("12".to_string()), "5").unwrap();
        assert_eq!(set, 12);
    }
}
