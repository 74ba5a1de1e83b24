//! Transport trait for streaming requests.

use super::request::OutboundRequest;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw response fragments, split at arbitrary byte boundaries.
pub type FragmentStream = BoxStream<'static, Result<Vec<u8>>>;

/// Opens frame streams against the producer.
///
/// Dropping the returned stream closes the underlying connection. Timeouts
/// and network failures surface as `CasegenError::Transport`, either from
/// `open` or as an item of the stream.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, request: &OutboundRequest) -> Result<FragmentStream>;
}
