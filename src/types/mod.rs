//! Public data model: requests, responses, provider identifiers.

pub mod provider;
pub mod request;
pub mod response;

pub use provider::Provider;
pub use request::CompletionRequest;
pub use response::{CompletionResponse, Resolved, Usage};
