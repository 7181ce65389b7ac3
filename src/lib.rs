//! Mimir - response memoization and admission control for LLM calls
//!
//! This crate provides the request cost-control layer for systems that
//! call upstream text-generation providers: a [`ResponseCache`] that
//! memoizes responses and coalesces concurrent identical requests, and
//! an [`AdmissionGate`] that bounds how many provider calls run at
//! once. The two components are independent; [`CompletionService`]
//! composes them for the common path.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mimir::{CompletionRequest, Mimir, Provider};
//! # use mimir::{CompletionProvider, CompletionResponse};
//! # struct MyProvider;
//! # #[async_trait::async_trait]
//! # impl CompletionProvider for MyProvider {
//! #     fn name(&self) -> &str { "my-provider" }
//! #     async fn complete(&self, _: &CompletionRequest) -> mimir::Result<CompletionResponse> {
//! #         Ok(CompletionResponse::default())
//! #     }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> mimir::Result<()> {
//! let service = Mimir::builder()
//!     .provider(Provider::OpenRouter, Arc::new(MyProvider))
//!     .build()?;
//!
//! let resolved = service
//!     .execute(&CompletionRequest::new("What is the capital of France?"))
//!     .await?;
//!
//! println!("{} (cached: {})", resolved.response.text, resolved.cached);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod service;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheMetrics, ResponseCache};
pub use error::{MimirError, Result};
pub use gate::{ActiveTaskCounter, AdmissionGate, AdmissionPermit, GateObserver, GateStats};
pub use service::{CacheSettings, CacheStats, CompletionService, Mimir, MimirBuilder, Utilization};
pub use traits::CompletionProvider;
pub use types::{CompletionRequest, CompletionResponse, Provider, Resolved, Usage};
