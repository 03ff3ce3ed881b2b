//! Lifecycle tools: sw_install, sw_activate, sw_message and sw_status.
//!
//! These are the host calls a browser would make on a service worker
//! registration.

use lantern_core::worker::{ActivationReport, InstallReport, MessageOutcome, RegistrationStatus};
use lantern_core::{AppConfig, Error, Registration, WorkerConfig};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the sw_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwInstallParams {
    /// Version tag to install. Defaults to the configured version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Output from the sw_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwInstallOutput {
    /// What the precache stored.
    pub report: InstallReport,
    /// Version controlling pages after the install.
    pub active: Option<String>,
    /// Version waiting for a skip-waiting message, if any.
    pub waiting: Option<String>,
}

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message posted by a page, e.g. `"SKIP_WAITING"` or `{"type": "SKIP_WAITING"}`.
    pub message: serde_json::Value,
}

pub async fn install_impl(
    registration: &Registration, config: &AppConfig, params: SwInstallParams,
) -> Result<CallToolResult, McpError> {
    let mut config = config.clone();
    if let Some(version) = params.version {
        if version.trim().is_empty() || version.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!("invalid version tag: {version:?}")).into());
        }
        config.version = version;
    }

    let worker_config = WorkerConfig::from_app(&config)?;
    let report = registration.install(worker_config).await?;

    let output = SwInstallOutput {
        report,
        active: registration.active().await.map(|w| w.version().to_string()),
        waiting: registration.waiting().await.map(|w| w.version().to_string()),
    };
    json_result(&output)
}

pub async fn activate_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let report: ActivationReport = registration.activate().await?;
    json_result(&report)
}

pub async fn message_impl(registration: &Registration, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let outcome: MessageOutcome = registration.post_message(&params.message).await?;
    json_result(&outcome)
}

pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let status: RegistrationStatus = registration.status().await?;
    json_result(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{app_config, output, registration, site};
    use lantern_core::ResponseSnapshot;
    use lantern_core::config::UpdatePolicy;
    use serde_json::json;

    #[tokio::test]
    async fn test_install_first_version_activates() {
        let reg = registration(site());
        let result = install_impl(&reg, &app_config("1"), SwInstallParams::default()).await.unwrap();
        let out: SwInstallOutput = output(&result);

        assert_eq!(out.active.as_deref(), Some("1"));
        assert!(out.waiting.is_none());
        assert_eq!(out.report.core_cached, vec!["https://app.test/index.html".to_string()]);
    }

    #[tokio::test]
    async fn test_install_version_override_waits() {
        let reg = registration(site());
        let config = AppConfig { update_policy: UpdatePolicy::WaitForUser, ..app_config("1") };
        install_impl(&reg, &config, SwInstallParams::default()).await.unwrap();

        let result = install_impl(&reg, &config, SwInstallParams { version: Some("2".into()) }).await.unwrap();
        let out: SwInstallOutput = output(&result);
        assert_eq!(out.active.as_deref(), Some("1"));
        assert_eq!(out.waiting.as_deref(), Some("2"));

        let result = message_impl(&reg, SwMessageParams { message: json!("SKIP_WAITING") }).await.unwrap();
        let outcome: serde_json::Value = output(&result);
        assert_eq!(outcome["outcome"], "activated");
        assert_eq!(outcome["report"]["version"], "2");
    }

    #[tokio::test]
    async fn test_install_rejects_bad_version() {
        let reg = registration(site());
        let params = SwInstallParams { version: Some("1 2".into()) };
        assert!(install_impl(&reg, &app_config("1"), params).await.is_err());
    }

    #[tokio::test]
    async fn test_install_failure_is_an_error() {
        let network = site();
        network.set("https://app.test/index.html", ResponseSnapshot::new(500, "down"));
        let reg = registration(network);

        let err = install_impl(&reg, &app_config("1"), SwInstallParams::default()).await.unwrap_err();
        assert_eq!(err.code.0, -32000);
        assert!(err.message.contains("INSTALL_FAILED"));
    }

    #[tokio::test]
    async fn test_activate_without_waiting_worker() {
        let reg = registration(site());
        let err = activate_impl(&reg).await.unwrap_err();
        assert_eq!(err.code.0, -32010);
    }

    #[tokio::test]
    async fn test_message_unknown_is_invalid_input() {
        let reg = registration(site());
        let err = message_impl(&reg, SwMessageParams { message: json!({"type": "PING"}) }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_status_before_and_after_install() {
        let reg = registration(site());
        let before: RegistrationStatus = output(&status_impl(&reg).await.unwrap());
        assert!(before.active.is_none());

        install_impl(&reg, &app_config("1"), SwInstallParams::default()).await.unwrap();
        let after: RegistrationStatus = output(&status_impl(&reg).await.unwrap());
        assert_eq!(after.active.unwrap().version.as_str(), "1");
        assert_eq!(after.namespaces, vec!["lantern-pages-1".to_string()]);
    }
}
