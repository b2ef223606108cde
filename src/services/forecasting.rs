//! Client for the external forecasting service.
//!
//! Only the health probe is used: the service produces the predicted water
//! levels this API turns into discharges, so its reachability is part of
//! this API's own health report.

use serde::Deserialize;
use std::time::Duration;

use crate::errors::AppError;

/// Timeout for the health probe.
const HEALTH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct ForecastingClient {
    client: reqwest::Client,
    base_url: String,
}

/// Body of the forecasting service's `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastingHealth {
    pub status: Option<String>,
    #[serde(default)]
    pub model_loaded: Option<bool>,
}

impl ForecastingClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call `GET {base_url}/health`.
    ///
    /// A non-2xx status or unreachable host is an `ExternalServiceError`;
    /// an unparseable body on a 2xx is reported as healthy with no details.
    pub async fn health(&self) -> Result<ForecastingHealth, AppError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::ExternalServiceError(format!("Forecasting service request failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "Forecasting service returned HTTP {}",
                response.status()
            )));
        }

        Ok(response
            .json::<ForecastingHealth>()
            .await
            .unwrap_or(ForecastingHealth {
                status: None,
                model_loaded: None,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_health_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "healthy", "model_loaded": true})),
            )
            .mount(&server)
            .await;

        let client = ForecastingClient::new(&format!("{}/", server.uri())).unwrap();
        let health = client.health().await.unwrap();

        assert_eq!(health.status.as_deref(), Some("healthy"));
        assert_eq!(health.model_loaded, Some(true));
    }

    #[tokio::test]
    async fn test_health_non_json_body_still_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let client = ForecastingClient::new(&server.uri()).unwrap();
        let health = client.health().await.unwrap();
        assert!(health.status.is_none());
    }

    #[tokio::test]
    async fn test_health_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ForecastingClient::new(&server.uri()).unwrap();
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ForecastingClient::new("http://forecast:8000/").unwrap();
        assert_eq!(client.base_url(), "http://forecast:8000");
    }
}
