//! cache_download and cache_refresh tool implementations.
//!
//! `cache_download` fills the persistent offline namespace with files the
//! user asked for; `cache_refresh` re-runs the precache of the active worker
//! ("reload app data").

use lantern_core::worker::{DownloadReport, InstallReport};
use lantern_core::{Error, Registration};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_download tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDownloadParams {
    /// URLs to download, absolute or relative to the worker scope.
    pub urls: Vec<String>,
}

pub async fn download_impl(
    registration: &Registration, params: CacheDownloadParams,
) -> Result<CallToolResult, McpError> {
    if params.urls.is_empty() {
        return Err(Error::InvalidInput("urls cannot be empty".into()).into());
    }

    let report: DownloadReport = registration.offline_download(&params.urls).await?;
    json_result(&report)
}

pub async fn refresh_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let report: InstallReport = registration.refresh_precache().await?;
    json_result(&report)
}
