//! HTTP client for the impact model
//!
//! The model is served elsewhere; this client only speaks its inference
//! contract: `POST {features, feature_names}` answered by
//! `{prediction, confidence}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlens_analyzer::{FeatureVector, ImpactPredictor, InferenceError, Prediction};

use crate::error::{ServiceError, ServiceResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct PredictRequest<'a> {
    features: [f64; 8],
    feature_names: &'a [&'a str; 8],
}

#[derive(Deserialize)]
struct PredictResponse {
    prediction: f64,
    confidence: f64,
}

/// Impact model reached over JSON/HTTP
pub struct HttpImpactPredictor {
    endpoint: String,
    timeout: Duration,
    client: Client,
}

impl std::fmt::Debug for HttpImpactPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImpactPredictor")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpImpactPredictor {
    /// Creates a client for `endpoint` with the default request timeout
    pub fn new(endpoint: impl Into<String>) -> ServiceResult<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ServiceError::Configuration(format!(
                "inference endpoint '{}' must be an http(s) URL",
                endpoint
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            endpoint,
            timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImpactPredictor for HttpImpactPredictor {
    async fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError> {
        let request = PredictRequest {
            features: features.to_array(),
            feature_names: FeatureVector::names(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(self.timeout)
                } else {
                    InferenceError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Unavailable(format!(
                "status {}: {}",
                status,
                body.trim()
            )));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Unavailable(format!("invalid response: {}", e)))?;

        tracing::trace!(
            prediction = body.prediction,
            confidence = body.confidence,
            "impact model answered"
        );
        Ok(Prediction::new(body.prediction, body.confidence))
    }
}
