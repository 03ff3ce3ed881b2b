//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheDownloadParams, CacheKeysParams, download_impl, keys_impl, refresh_impl};
use crate::tools::clients::{
    ClientCloseParams, ClientMessagesParams, ClientOpenParams, close_impl, messages_impl, open_impl,
};
use crate::tools::fetch::{SwFetchParams, fetch_impl};
use crate::tools::lifecycle::{
    SwInstallParams, SwMessageParams, activate_impl, install_impl, message_impl, status_impl,
};

use lantern_core::{AppConfig, Registration};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for lantern.
#[derive(Clone)]
pub struct LanternServer {
    config: Arc<AppConfig>,
    registration: Arc<Registration>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl LanternServer {
    /// Create a new server handler.
    pub fn new(config: AppConfig, registration: Arc<Registration>) -> Self {
        Self { config: Arc::new(config), registration, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Install a worker version: precache its core files (all-or-nothing) and large files (best effort). Activates immediately on first install or when the update policy skips waiting."
    )]
    async fn sw_install(&self, params: Parameters<SwInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.registration, &self.config, params.0).await
    }

    #[tool(description = "Activate the waiting worker: evict stale caches, claim open pages and notify them.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.registration).await
    }

    /// Route a request through the active worker.
    ///
    /// HTML navigations go network-first with cache and fallback document
    /// when offline; other assets go cache-first.
    #[tool(
        description = "Fetch a URL through the active worker. Returns the response and whether it came from the network, the cache, the fallback page or a synthetic 503."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, &self.config, params.0).await
    }

    #[tool(description = "Post a message from a page to the worker. \"SKIP_WAITING\" activates a waiting version now.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.registration, params.0).await
    }

    #[tool(description = "Show the active, waiting and installing worker versions and all cache namespaces.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    #[tool(description = "Open a page (client). It is controlled by the active worker, if any.")]
    async fn client_open(&self, params: Parameters<ClientOpenParams>) -> Result<CallToolResult, McpError> {
        open_impl(&self.registration, params.0).await
    }

    #[tool(description = "Read and clear the messages a page received, such as update notices.")]
    async fn client_messages(&self, params: Parameters<ClientMessagesParams>) -> Result<CallToolResult, McpError> {
        messages_impl(&self.registration, params.0).await
    }

    #[tool(
        description = "Close a page (client). It stops receiving update notices and its queued messages are dropped."
    )]
    async fn client_close(&self, params: Parameters<ClientCloseParams>) -> Result<CallToolResult, McpError> {
        close_impl(&self.registration, params.0).await
    }

    #[tool(description = "List cache namespaces, or the request keys stored in one namespace.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.registration, params.0).await
    }

    #[tool(description = "Download files into the persistent offline cache, which survives version updates.")]
    async fn cache_download(&self, params: Parameters<CacheDownloadParams>) -> Result<CallToolResult, McpError> {
        download_impl(&self.registration, params.0).await
    }

    #[tool(description = "Reload app data: re-run the precache of the active worker.")]
    async fn cache_refresh(&self) -> Result<CallToolResult, McpError> {
        refresh_impl(&self.registration).await
    }
}

impl ServerHandler for LanternServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "lantern".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
