//! MCP tool implementations.
//!
//! This module contains all tools exposed by the lantern server.

pub mod cache;
pub mod clients;
pub mod fetch;
pub mod lifecycle;

use lantern_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Pretty JSON text content, the shape every tool returns.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use lantern_core::config::PrecacheConfig;
    use lantern_core::testing::StaticNetwork;
    use lantern_core::{AppConfig, MemoryStore, Registration, ResponseSnapshot};
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;

    pub fn app_config(version: &str) -> AppConfig {
        AppConfig {
            version: version.into(),
            scope: "https://app.test/".into(),
            db_path: None,
            precache: PrecacheConfig { core: vec!["./index.html".into()], large: vec![] },
            ..Default::default()
        }
    }

    pub fn site() -> Arc<StaticNetwork> {
        Arc::new(
            StaticNetwork::new()
                .route("https://app.test/index.html", ResponseSnapshot::new(200, "index"))
                .route("https://app.test/app/manifest.json", ResponseSnapshot::new(200, "{}")),
        )
    }

    pub fn registration(network: Arc<StaticNetwork>) -> Arc<Registration> {
        Arc::new(Registration::new(Arc::new(MemoryStore::new()), network))
    }

    /// Parse the JSON text content of a tool result.
    pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
