//! HTTP client for the LMS web service endpoint.

use super::LmsApi;
use crate::error::LmsError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the LMS.
#[derive(Debug, Clone)]
pub struct LmsClientConfig {
    /// Full URL of the web service endpoint (e.g. `.../webservice/rest/server.php`).
    pub endpoint: String,
    /// Bearer token; token acquisition happens elsewhere.
    pub token: String,
    pub timeout_seconds: u64,
}

impl Default for LmsClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost/webservice/rest/server.php".to_string(),
            token: String::new(),
            timeout_seconds: 30,
        }
    }
}

/// reqwest-backed [`LmsApi`].
pub struct LmsClient {
    config: LmsClientConfig,
    http_client: reqwest::Client,
}

impl LmsClient {
    pub fn new(config: LmsClientConfig) -> Result<Self, LmsError> {
        info!("Using LMS endpoint {}", config.endpoint);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LmsError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }
}

#[async_trait]
impl LmsApi for LmsClient {
    async fn call(&self, function: &str, params: &[(String, String)]) -> Result<Value, LmsError> {
        let mut form: Vec<(String, String)> = vec![
            ("wsfunction".to_string(), function.to_string()),
            ("moodlewsrestformat".to_string(), "json".to_string()),
        ];
        form.extend(params.iter().cloned());

        debug!("Calling LMS function {} ({} params)", function, params.len());

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.token)
            .form(&form)
            .send()
            .await
            .map_err(|e| LmsError::from_reqwest(e, &self.config.endpoint, self.timeout()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LmsError::Status { status, body });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LmsError::MalformedPayload(format!("{}: {}", function, e)))?;

        check_exception(&payload)?;
        Ok(payload)
    }
}

/// The LMS reports failures as a 200 response carrying an exception object.
pub fn check_exception(payload: &Value) -> Result<(), LmsError> {
    let Some(obj) = payload.as_object() else {
        return Ok(());
    };
    if !obj.contains_key("exception") {
        return Ok(());
    }

    let errorcode = obj
        .get("errorcode")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    Err(LmsError::Remote { errorcode, message })
}
