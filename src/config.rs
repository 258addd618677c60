//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Port the REST server binds to.
    pub http_port: u16,
    /// Machine timings.
    pub machines: MachineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/moai.db"),
            http_port: 8080,
            machines: MachineConfig::default(),
        }
    }
}

/// Timings and defaults for the progression state machines.
///
/// Passed to the machine constructors by whatever hosts the machines. The
/// HTTP service only reads `weekly_target`.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// How long a tier promotion celebration stays up before auto-dismissing.
    pub celebration_timeout: Duration,
    /// How long the "week complete" banner stays up.
    pub week_complete_dismiss: Duration,
    /// How long the workout summary stays up before resetting.
    pub workout_complete_dismiss: Duration,
    /// How long the "matched" screen stays up before returning to idle.
    pub match_dismiss: Duration,
    /// Activities per week needed to count the week as complete.
    pub weekly_target: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            celebration_timeout: Duration::from_secs(5),
            week_complete_dismiss: Duration::from_secs(3),
            workout_complete_dismiss: Duration::from_secs(3),
            match_dismiss: Duration::from_secs(4),
            weekly_target: 3,
        }
    }
}

impl AppConfig {
    /// Build configuration from `MOAI_*` environment variables.
    ///
    /// Unset variables fall back to defaults; set-but-unparseable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let machine_defaults = MachineConfig::default();

        let db_path = std::env::var("MOAI_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        Ok(Self {
            db_path,
            http_port: parse_var("MOAI_HTTP_PORT")?.unwrap_or(defaults.http_port),
            machines: MachineConfig {
                celebration_timeout: parse_secs("MOAI_CELEBRATION_TIMEOUT_SECS")?
                    .unwrap_or(machine_defaults.celebration_timeout),
                week_complete_dismiss: parse_secs("MOAI_WEEK_COMPLETE_DISMISS_SECS")?
                    .unwrap_or(machine_defaults.week_complete_dismiss),
                workout_complete_dismiss: parse_secs("MOAI_WORKOUT_COMPLETE_DISMISS_SECS")?
                    .unwrap_or(machine_defaults.workout_complete_dismiss),
                match_dismiss: parse_secs("MOAI_MATCH_DISMISS_SECS")?
                    .unwrap_or(machine_defaults.match_dismiss),
                weekly_target: parse_var("MOAI_WEEKLY_TARGET")?
                    .unwrap_or(machine_defaults.weekly_target),
            },
        })
    }
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        Err(_) => Ok(None),
    }
}

fn parse_secs(key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_var::<u64>(key)?.map(Duration::from_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.machines.weekly_target, 3);
        assert!(config.machines.celebration_timeout > Duration::ZERO);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        // SAFETY: the key is unique to this test; nothing else reads it.
        unsafe { std::env::set_var("MOAI_TEST_BAD_PORT", "eighty") };
        let result = parse_var::<u16>("MOAI_TEST_BAD_PORT");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        unsafe { std::env::remove_var("MOAI_TEST_BAD_PORT") };
    }

    #[test]
    fn parse_var_missing_is_none() {
        let result = parse_var::<u16>("MOAI_TEST_DEFINITELY_UNSET").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn parse_secs_builds_duration() {
        // SAFETY: the key is unique to this test; nothing else reads it.
        unsafe { std::env::set_var("MOAI_TEST_SECS", " 7 ") };
        let parsed = parse_secs("MOAI_TEST_SECS").unwrap();
        assert_eq!(parsed, Some(Duration::from_secs(7)));
        unsafe { std::env::remove_var("MOAI_TEST_SECS") };
    }
}
