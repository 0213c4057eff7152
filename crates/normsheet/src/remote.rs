//! HTTP client for the remote function service

use std::future::Future;
use std::time::Duration;

use normsheet_formula::{BridgeError, EvaluationRequest, EvaluationResponse, FunctionEvaluator};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where and how to reach the function service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEvaluatorConfig {
    /// Endpoint receiving `POST` evaluation requests
    pub url: String,
    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

impl HttpEvaluatorConfig {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            token: None,
            timeout: default_timeout(),
        }
    }

    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`FunctionEvaluator`] that POSTs requests as JSON
#[derive(Debug, Clone)]
pub struct HttpFunctionEvaluator {
    client: reqwest::Client,
    config: HttpEvaluatorConfig,
}

impl HttpFunctionEvaluator {
    pub fn new(config: HttpEvaluatorConfig) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpEvaluatorConfig {
        &self.config
    }

    async fn send(&self, request: EvaluationRequest) -> Result<EvaluationResponse, BridgeError> {
        let mut builder = self.client.post(&self.config.url).json(&request);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        debug!(url = %self.config.url, functions = request.functions.len(), "posting evaluation request");
        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<EvaluationResponse>()
            .await
            .map_err(|e| BridgeError::InvalidResponse(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::Timeout
    } else {
        BridgeError::Transport(e.to_string())
    }
}

impl FunctionEvaluator for HttpFunctionEvaluator {
    fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> impl Future<Output = Result<EvaluationResponse, BridgeError>> + Send {
        self.send(request)
    }
}
