//! Remote LMS web service access.
//!
//! The rest of the crate depends only on [`LmsApi`]: "given a function name
//! and parameters, return parsed JSON or a transport/parse error". Typed
//! decoding of each collection lives in [`functions`].

pub mod client;
pub mod functions;
#[cfg(test)]
pub mod stub;

use crate::error::LmsError;
use async_trait::async_trait;
use serde_json::Value;

pub use client::{LmsClient, LmsClientConfig};
pub use functions::{decode_collection, fetch_source, fetch_user_roles, FunctionNames};

/// RPC-over-HTTP contract of the LMS.
#[async_trait]
pub trait LmsApi: Send + Sync {
    /// Invoke `function` with form-style `params` and return the JSON reply.
    async fn call(&self, function: &str, params: &[(String, String)]) -> Result<Value, LmsError>;
}
