/*!
 * Synchronization Configuration
 *
 * Runtime configuration for wait strategy selection
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{DEFAULT_MAX_SPINS, DEFAULT_POLL_INTERVAL, DEFAULT_SPIN_DURATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable selecting the wait strategy (`spin`, `condvar`, `auto`)
pub const ENV_WAIT_STRATEGY: &str = "COORD_WAIT_STRATEGY";
/// Environment variable overriding the periodic poll interval, in milliseconds
pub const ENV_POLL_INTERVAL_MS: &str = "COORD_POLL_INTERVAL_MS";
/// Environment variable bounding coordinator waits, in milliseconds
pub const ENV_MAX_WAIT_MS: &str = "COORD_MAX_WAIT_MS";

/// Strategy type selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    /// Lock, test, unlock, back off, repeat
    SpinWait,
    /// Block on a condition variable signalled on every state change
    Condvar,
    /// Pick the best strategy for the platform
    Auto,
}

impl StrategyType {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyType::SpinWait => "spinwait",
            StrategyType::Condvar => "condvar",
            StrategyType::Auto => "auto",
        }
    }
}

impl std::str::FromStr for StrategyType {
    type Err = SyncError;

    fn from_str(s: &str) -> SyncResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spin" | "spinwait" => Ok(StrategyType::SpinWait),
            "condvar" | "block" => Ok(StrategyType::Condvar),
            "auto" => Ok(StrategyType::Auto),
            other => Err(SyncError::InvalidConfig(format!(
                "unknown wait strategy '{}'",
                other
            ))),
        }
    }
}

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Preferred strategy
    pub strategy: StrategyType,
    /// Tight-spin window before the backoff starts yielding
    pub spin_duration: Duration,
    /// Maximum spin iterations before yielding
    pub max_spins: u32,
    /// Interval between two actions of a periodic task
    pub poll_interval: Duration,
    /// Upper bound on a coordinator wait (`None` waits until a terminal state)
    pub max_wait: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyType::Auto,
            spin_duration: DEFAULT_SPIN_DURATION,
            max_spins: DEFAULT_MAX_SPINS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for low-latency (< 1ms wait expected)
    pub const fn low_latency() -> Self {
        Self {
            strategy: StrategyType::SpinWait,
            spin_duration: Duration::from_micros(50),
            max_spins: 500,
            poll_interval: Duration::from_millis(10),
            max_wait: None,
        }
    }

    /// Configuration optimized for long waits (> 1ms expected)
    pub const fn long_wait() -> Self {
        Self {
            strategy: StrategyType::Condvar,
            spin_duration: Duration::from_micros(1),
            max_spins: 10,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }

    /// Default configuration with `COORD_*` environment overrides applied
    pub fn from_env() -> SyncResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `COORD_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> SyncResult<Self> {
        if let Ok(raw) = std::env::var(ENV_WAIT_STRATEGY) {
            self.strategy = raw.parse()?;
        }
        if let Ok(raw) = std::env::var(ENV_POLL_INTERVAL_MS) {
            let millis = parse_millis(ENV_POLL_INTERVAL_MS, &raw)?;
            if millis == 0 {
                return Err(SyncError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    ENV_POLL_INTERVAL_MS
                )));
            }
            self.poll_interval = Duration::from_millis(millis);
        }
        if let Ok(raw) = std::env::var(ENV_MAX_WAIT_MS) {
            self.max_wait = Some(Duration::from_millis(parse_millis(ENV_MAX_WAIT_MS, &raw)?));
        }
        Ok(self)
    }

    /// Bound coordinator waits
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Override the strategy
    pub fn with_strategy(mut self, strategy: StrategyType) -> Self {
        self.strategy = strategy;
        self
    }

    /// Resolve `Auto`; it always maps to condvar blocking
    pub fn select_strategy(&self) -> StrategyType {
        match self.strategy {
            StrategyType::Auto => StrategyType::Condvar,
            other => other,
        }
    }
}

fn parse_millis(var: &str, raw: &str) -> SyncResult<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        SyncError::InvalidConfig(format!("{}='{}' is not a millisecond count: {}", var, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var(ENV_WAIT_STRATEGY);
        std::env::remove_var(ENV_POLL_INTERVAL_MS);
        std::env::remove_var(ENV_MAX_WAIT_MS);
    }

    #[test]
    fn test_auto_resolves_to_condvar() {
        assert_eq!(SyncConfig::default().select_strategy(), StrategyType::Condvar);
        assert_eq!(
            SyncConfig::low_latency().select_strategy(),
            StrategyType::SpinWait
        );
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("spin".parse::<StrategyType>().unwrap(), StrategyType::SpinWait);
        assert_eq!(" Condvar ".parse::<StrategyType>().unwrap(), StrategyType::Condvar);
        assert!(matches!(
            "futex".parse::<StrategyType>(),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ENV_WAIT_STRATEGY, "spin");
        std::env::set_var(ENV_POLL_INTERVAL_MS, "250");
        std::env::set_var(ENV_MAX_WAIT_MS, "5000");

        let config = SyncConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.strategy, StrategyType::SpinWait);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_wait, Some(Duration::from_secs(5)));
    }

    #[test]
    #[serial]
    fn test_env_rejects_bad_values() {
        clear_env();
        std::env::set_var(ENV_POLL_INTERVAL_MS, "soon");
        assert!(SyncConfig::from_env().is_err());

        std::env::set_var(ENV_POLL_INTERVAL_MS, "0");
        assert!(SyncConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        assert_eq!(SyncConfig::from_env().unwrap(), SyncConfig::default());
    }
}
