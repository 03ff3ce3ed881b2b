//! Client tools: client_open, client_messages and client_close.

use lantern_core::clients::ClientInfo;
use lantern_core::{ClientId, ClientKind, Registration, WorkerMessage};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the client_open tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientOpenParams {
    /// URL of the page being opened.
    pub url: String,

    /// Client kind (default: window). Only windows receive update notices.
    #[serde(default = "default_kind")]
    pub kind: ClientKind,
}

fn default_kind() -> ClientKind {
    ClientKind::Window
}

/// Parameters for the client_messages tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientMessagesParams {
    pub client_id: ClientId,
}

/// Parameters for the client_close tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientCloseParams {
    pub client_id: ClientId,
}

/// Output from the client_close tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientCloseOutput {
    pub client_id: ClientId,
    /// Clients still open.
    pub open: usize,
}

/// Output from the client_messages tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientMessagesOutput {
    pub client: ClientInfo,
    /// Messages posted to the client since the last call.
    pub messages: Vec<WorkerMessage>,
}

pub async fn open_impl(registration: &Registration, params: ClientOpenParams) -> Result<CallToolResult, McpError> {
    let id = registration.open_client(params.kind, &params.url).await;
    let client = registration
        .clients()
        .get(id)
        .await
        .ok_or_else(|| lantern_core::Error::InvalidInput(format!("client {id} closed")))?;
    json_result(&client)
}

pub async fn messages_impl(
    registration: &Registration, params: ClientMessagesParams,
) -> Result<CallToolResult, McpError> {
    let messages = registration.clients().drain(params.client_id).await?;
    let client = registration
        .clients()
        .get(params.client_id)
        .await
        .ok_or_else(|| lantern_core::Error::InvalidInput(format!("unknown client: {}", params.client_id)))?;

    json_result(&ClientMessagesOutput { client, messages })
}

pub async fn close_impl(registration: &Registration, params: ClientCloseParams) -> Result<CallToolResult, McpError> {
    registration.close_client(params.client_id).await?;
    let open = registration.clients().list().await.len();
    json_result(&ClientCloseOutput { client_id: params.client_id, open })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{app_config, output, registration, site};
    use crate::tools::lifecycle::{SwInstallParams, install_impl};

    #[tokio::test]
    async fn test_open_before_and_after_install() {
        let reg = registration(site());
        let params = ClientOpenParams { url: "https://app.test/".into(), kind: ClientKind::Window };
        let early: ClientInfo = output(&open_impl(&reg, params.clone()).await.unwrap());
        assert!(early.controller.is_none());

        install_impl(&reg, &app_config("1"), SwInstallParams::default()).await.unwrap();
        let late: ClientInfo = output(&open_impl(&reg, params).await.unwrap());
        assert_eq!(late.controller.as_deref(), Some("1"));
        assert_ne!(early.id, late.id);
    }

    #[tokio::test]
    async fn test_messages_after_update() {
        let reg = registration(site());
        let params = ClientOpenParams { url: "https://app.test/app/home.html".into(), kind: ClientKind::Window };
        let page: ClientInfo = output(&open_impl(&reg, params).await.unwrap());
        install_impl(&reg, &app_config("1"), SwInstallParams::default()).await.unwrap();

        let result = messages_impl(&reg, ClientMessagesParams { client_id: page.id }).await.unwrap();
        let out: ClientMessagesOutput = output(&result);
        assert_eq!(out.client.controller.as_deref(), Some("1"));
        assert_eq!(out.messages, vec![WorkerMessage::Updated { version: "1".into() }]);

        let again: ClientMessagesOutput =
            output(&messages_impl(&reg, ClientMessagesParams { client_id: page.id }).await.unwrap());
        assert!(again.messages.is_empty());
    }

    #[tokio::test]
    async fn test_messages_unknown_client() {
        let reg = registration(site());
        assert!(messages_impl(&reg, ClientMessagesParams { client_id: 42 }).await.is_err());
    }

    #[tokio::test]
    async fn test_close_stops_update_notices() {
        let reg = registration(site());
        let params = ClientOpenParams { url: "https://app.test/".into(), kind: ClientKind::Window };
        let page: ClientInfo = output(&open_impl(&reg, params).await.unwrap());

        let out: ClientCloseOutput = output(&close_impl(&reg, ClientCloseParams { client_id: page.id }).await.unwrap());
        assert_eq!(out.open, 0);

        install_impl(&reg, &app_config("1"), SwInstallParams::default()).await.unwrap();
        assert!(messages_impl(&reg, ClientMessagesParams { client_id: page.id }).await.is_err());
        assert!(close_impl(&reg, ClientCloseParams { client_id: page.id }).await.is_err());
    }
}
