//! Network seam used by the precache loader and the fetch router.

use async_trait::async_trait;

use crate::Error;
use crate::http::{Request, ResponseSnapshot};

/// Something that can perform a request against the network.
///
/// A transport failure (offline, connection refused, timeout) is an `Err`.
/// An HTTP error status is still an `Ok` snapshot: deciding whether a 404
/// is acceptable belongs to the caller.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error>;
}
