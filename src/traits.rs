//! Core CompletionProvider trait

use async_trait::async_trait;

use crate::types::{CompletionRequest, CompletionResponse};
use crate::Result;

/// An upstream text-generation provider.
///
/// Providers are opaque to the cost-control layer: a prompt goes in, a
/// completion plus token-usage counts comes out, or the call fails. No
/// timeout is enforced here; callers wanting one must impose it
/// externally.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider name for logs and metric labels.
    fn name(&self) -> &str;

    /// Execute a completion against the upstream API.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}
