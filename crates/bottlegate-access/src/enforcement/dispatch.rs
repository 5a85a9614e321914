//! Enforcement backend selection.

use async_trait::async_trait;

use bottlegate_core::config::{EnforcementConfig, EnforcementProvider};
use bottlegate_core::result::AppResult;
use bottlegate_core::traits::AccessEnforcer;

use super::command::CommandEnforcer;
use super::logging::LoggingEnforcer;

/// Dispatcher for enforcement strategies.
#[derive(Debug, Clone)]
pub enum EnforcerDispatch {
    /// Log-only enforcer.
    Logging(LoggingEnforcer),
    /// External command enforcer.
    Command(CommandEnforcer),
}

impl EnforcerDispatch {
    /// Build the configured enforcer.
    ///
    /// Mock-sensor deployments always log instead of touching the firewall.
    pub fn from_config(config: &EnforcementConfig, mock_sensor: bool) -> AppResult<Self> {
        match config.provider {
            EnforcementProvider::Command if !mock_sensor => Ok(Self::Command(
                CommandEnforcer::new(config.grant_command.clone(), config.revoke_command.clone())?,
            )),
            _ => Ok(Self::Logging(LoggingEnforcer)),
        }
    }
}

#[async_trait]
impl AccessEnforcer for EnforcerDispatch {
    async fn grant(&self, ip: &str, duration_seconds: i64) -> AppResult<()> {
        match self {
            Self::Logging(inner) => inner.grant(ip, duration_seconds).await,
            Self::Command(inner) => inner.grant(ip, duration_seconds).await,
        }
    }

    async fn revoke(&self, ip: &str) -> AppResult<()> {
        match self {
            Self::Logging(inner) => inner.revoke(ip).await,
            Self::Command(inner) => inner.revoke(ip).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_sensor_forces_logging() {
        let config = EnforcementConfig {
            provider: EnforcementProvider::Command,
            grant_command: vec!["true".to_string()],
            revoke_command: vec!["true".to_string()],
        };

        assert!(matches!(
            EnforcerDispatch::from_config(&config, true).unwrap(),
            EnforcerDispatch::Logging(_)
        ));
        assert!(matches!(
            EnforcerDispatch::from_config(&config, false).unwrap(),
            EnforcerDispatch::Command(_)
        ));
    }

    #[test]
    fn test_command_without_templates_fails() {
        let config = EnforcementConfig {
            provider: EnforcementProvider::Command,
            ..Default::default()
        };
        assert!(EnforcerDispatch::from_config(&config, false).is_err());
    }
}
