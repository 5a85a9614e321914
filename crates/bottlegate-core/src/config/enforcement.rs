//! Network access enforcement configuration.

use serde::{Deserialize, Serialize};

/// Enforcement backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementProvider {
    /// Only log grant/revoke calls.
    #[default]
    Logging,
    /// Run external commands (firewall wrapper scripts).
    Command,
}

/// Enforcement backend configuration.
///
/// Command templates are argument vectors; `{ip}` and `{seconds}` are
/// substituted in every argument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Backend to use.
    #[serde(default)]
    pub provider: EnforcementProvider,
    /// Command run to grant access, e.g. `["/usr/local/bin/portal-allow", "{ip}", "{seconds}"]`.
    #[serde(default)]
    pub grant_command: Vec<String>,
    /// Command run to revoke access.
    #[serde(default)]
    pub revoke_command: Vec<String>,
}
