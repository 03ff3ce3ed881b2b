//! sw_fetch tool implementation.
//!
//! Routes one request through the active worker and reports where the
//! response came from. Background cache writes are left running.

use lantern_core::worker::{FetchOutcome, ResponseSource};
use lantern_core::{AppConfig, ClientId, Error, Registration, Request, Scope};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path relative to the worker scope.
    pub url: String,

    /// HTTP method (default: GET). Only GET is ever intercepted.
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional Accept header, e.g. `text/html` for a navigation.
    #[serde(default)]
    pub accept: Option<String>,

    /// Page issuing the request. Omit for a top-level navigation.
    #[serde(default)]
    pub client_id: Option<ClientId>,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Not intercepted; the page would go to the network itself.
    Passthrough,
    Respond,
    NoResponse,
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// Canonical request URL.
    pub url: String,
    pub outcome: OutcomeKind,
    pub source: Option<ResponseSource>,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: Option<String>,
    /// Body length in bytes.
    pub bytes: usize,
}

pub async fn fetch_impl(
    registration: &Registration, config: &AppConfig, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    // Same resolution as the precache manifest, so keys always line up.
    let url = match registration.active().await {
        Some(worker) => worker.config().scope.resolve(&params.url)?,
        None => Scope::parse(&config.scope)?.resolve(&params.url)?,
    };

    let mut request = Request::new(&params.method, url);
    if let Some(accept) = &params.accept {
        request = request.with_header("Accept", accept);
    }

    let outcome = registration.fetch(params.client_id, &request).await;
    let mut output = SwFetchOutput {
        url: request.url.to_string(),
        outcome: OutcomeKind::Passthrough,
        source: None,
        status: None,
        content_type: None,
        body: None,
        bytes: 0,
    };

    match outcome {
        FetchOutcome::Passthrough => {}
        FetchOutcome::NoResponse => output.outcome = OutcomeKind::NoResponse,
        FetchOutcome::Respond { response, source, .. } => {
            output.outcome = OutcomeKind::Respond;
            output.source = Some(source);
            output.status = Some(response.status);
            output.content_type = response.content_type().map(str::to_string);
            output.bytes = response.body.len();
            output.body = Some(String::from_utf8_lossy(&response.body).into_owned());
        }
    }

    json_result(&output)
}
