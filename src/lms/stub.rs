//! In-process [`LmsApi`] with canned replies, for tests.

use super::LmsApi;
use crate::error::LmsError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

struct Reply {
    result: Result<Value, String>,
    delay: Duration,
}

/// Answers each function name with a fixed payload or failure.
#[derive(Default)]
pub struct StubLms {
    replies: HashMap<String, Reply>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StubLms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, function: &str, payload: Value) -> Self {
        self.with_delay(function, payload, Duration::ZERO)
    }

    pub fn with_delay(mut self, function: &str, payload: Value, delay: Duration) -> Self {
        self.replies.insert(
            function.to_string(),
            Reply {
                result: Ok(payload),
                delay,
            },
        );
        self
    }

    pub fn failing(mut self, function: &str, message: &str) -> Self {
        self.replies.insert(
            function.to_string(),
            Reply {
                result: Err(message.to_string()),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// How many times `function` has been called.
    pub fn calls(&self, function: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(function)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl LmsApi for StubLms {
    async fn call(&self, function: &str, _params: &[(String, String)]) -> Result<Value, LmsError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(function.to_string())
            .or_insert(0) += 1;

        let Some(reply) = self.replies.get(function) else {
            return Err(LmsError::Remote {
                errorcode: "invalidrecord".to_string(),
                message: format!("function {} not found", function),
            });
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        match &reply.result {
            Ok(payload) => Ok(payload.clone()),
            Err(message) => Err(LmsError::Transport(message.clone())),
        }
    }
}
