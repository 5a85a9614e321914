//! Enforcer that runs external firewall commands.

use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use bottlegate_core::error::{AppError, ErrorKind};
use bottlegate_core::result::AppResult;
use bottlegate_core::traits::AccessEnforcer;

/// Placeholder replaced by the client address.
const IP_PLACEHOLDER: &str = "{ip}";
/// Placeholder replaced by the grant duration in seconds.
const SECONDS_PLACEHOLDER: &str = "{seconds}";
/// Upper bound on a single command run.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs configured argument vectors, e.g. an ipset or iptables wrapper.
///
/// Commands are executed directly, never through a shell.
#[derive(Debug, Clone)]
pub struct CommandEnforcer {
    grant_command: Vec<String>,
    revoke_command: Vec<String>,
}

impl CommandEnforcer {
    /// Creates an enforcer from grant and revoke templates.
    pub fn new(grant_command: Vec<String>, revoke_command: Vec<String>) -> AppResult<Self> {
        if grant_command.is_empty() || revoke_command.is_empty() {
            return Err(AppError::configuration(
                "The command enforcer needs both enforcement.grant_command and enforcement.revoke_command",
            ));
        }
        Ok(Self {
            grant_command,
            revoke_command,
        })
    }

    async fn run(&self, template: &[String], ip: &str, seconds: i64) -> AppResult<()> {
        if ip.parse::<IpAddr>().is_err() {
            return Err(AppError::validation(format!("'{ip}' is not an IP address")));
        }

        let args = render(template, ip, seconds);
        let Some((program, rest)) = args.split_first() else {
            return Err(AppError::configuration("Empty enforcement command"));
        };

        debug!(program = %program, args = ?rest, "Running enforcement command");

        let child = tokio::process::Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(COMMAND_TIMEOUT, child)
            .await
            .map_err(|_| AppError::upstream(format!("Enforcement command '{program}' timed out")))?
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::UpstreamUnavailable,
                    format!("Failed to run enforcement command '{program}'"),
                    e,
                )
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                program = %program,
                status = %output.status,
                stderr = %stderr.trim(),
                "Enforcement command failed"
            );
            Err(AppError::upstream(format!(
                "Enforcement command '{program}' exited with {}",
                output.status
            )))
        }
    }
}

/// Substitute placeholders in every argument.
fn render(template: &[String], ip: &str, seconds: i64) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace(IP_PLACEHOLDER, ip)
                .replace(SECONDS_PLACEHOLDER, &seconds.to_string())
        })
        .collect()
}

#[async_trait]
impl AccessEnforcer for CommandEnforcer {
    async fn grant(&self, ip: &str, duration_seconds: i64) -> AppResult<()> {
        self.run(&self.grant_command, ip, duration_seconds).await
    }

    async fn revoke(&self, ip: &str) -> AppResult<()> {
        self.run(&self.revoke_command, ip, 0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = args(&["ipset", "add", "portal", "{ip}", "timeout", "{seconds}"]);
        assert_eq!(
            render(&template, "192.168.4.10", 240),
            args(&["ipset", "add", "portal", "192.168.4.10", "timeout", "240"])
        );
    }

    #[test]
    fn test_new_rejects_empty_templates() {
        let err = CommandEnforcer::new(vec![], args(&["true"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_rejects_malformed_address() {
        let enforcer = CommandEnforcer::new(args(&["true"]), args(&["true"])).unwrap();
        let err = enforcer.grant("10.0.0.1; reboot", 60).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_missing_program_is_upstream_failure() {
        let enforcer = CommandEnforcer::new(
            args(&["/nonexistent/portal-allow", "{ip}"]),
            args(&["/nonexistent/portal-deny", "{ip}"]),
        )
        .unwrap();
        let err = enforcer.revoke("10.0.0.1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
    }
}
