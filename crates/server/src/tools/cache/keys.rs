//! cache_keys tool implementation.
//!
//! Lists namespaces, or the request keys stored in one namespace.

use lantern_core::{Error, Registration};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Namespace to list. Omit to list the namespaces themselves.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub namespace: Option<String>,
    /// Namespace names, or `METHOD url` keys when a namespace was given.
    pub keys: Vec<String>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(registration: &Registration, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let store = registration.store();

    let keys = match &params.namespace {
        None => store.keys().await?,
        Some(name) => {
            if !store.keys().await?.contains(name) {
                return Err(Error::InvalidInput(format!("unknown namespace: {name}")).into());
            }
            store.entries(name).await?.iter().map(ToString::to_string).collect()
        }
    };

    json_result(&CacheKeysOutput { namespace: params.namespace, keys })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{app_config, output, registration, site};
    use crate::tools::lifecycle::{SwInstallParams, install_impl};

    #[tokio::test]
    async fn test_keys_lists_namespaces_then_entries() {
        let reg = registration(site());
        install_impl(&reg, &app_config("1"), SwInstallParams::default()).await.unwrap();

        let out: CacheKeysOutput = output(&keys_impl(&reg, CacheKeysParams::default()).await.unwrap());
        assert_eq!(out.keys, vec!["lantern-pages-1".to_string()]);

        let params = CacheKeysParams { namespace: Some("lantern-pages-1".into()) };
        let out: CacheKeysOutput = output(&keys_impl(&reg, params).await.unwrap());
        assert_eq!(out.keys, vec!["GET https://app.test/index.html".to_string()]);
    }

    #[tokio::test]
    async fn test_keys_unknown_namespace() {
        let reg = registration(site());
        let params = CacheKeysParams { namespace: Some("lantern-static-9".into()) };
        assert!(keys_impl(&reg, params).await.is_err());
    }
}
