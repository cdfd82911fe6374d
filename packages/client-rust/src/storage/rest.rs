//! HTTP plumbing shared by the PostgREST-style remote tiers.
//!
//! One [`RestClient`] carries the REST root, credentials and a pooled
//! `reqwest` client; the fallback table and every entity adapter built on
//! it map transport failures and status codes onto [`TierError`] the same
//! way.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use stratum_core::TierError;

/// Where the REST tables live and how to authenticate.
#[derive(Debug, Clone)]
pub struct RestEndpoint {
    /// REST root, e.g. `https://project.example.co/rest/v1`.
    pub base_url: String,
    /// Public API key sent as the `apikey` header.
    pub api_key: String,
    /// Session token of the signed-in user. Falls back to `api_key`.
    pub bearer_token: Option<String>,
    /// Transport-level timeout. The resolver applies its own bound as well.
    pub request_timeout: Duration,
}

impl Default for RestEndpoint {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321/rest/v1".to_string(),
            api_key: String::new(),
            bearer_token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Cheaply cloneable handle to one REST root.
#[derive(Clone)]
pub struct RestClient {
    endpoint: Arc<RestEndpoint>,
    http: Client,
}

impl RestClient {
    /// Builds the pooled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(endpoint: RestEndpoint) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(endpoint.request_timeout).build()?;
        Ok(Self {
            endpoint: Arc::new(endpoint),
            http,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &RestEndpoint {
        &self.endpoint
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.endpoint.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .endpoint
            .bearer_token
            .as_deref()
            .unwrap_or(&self.endpoint.api_key);
        request
            .header("apikey", &self.endpoint.api_key)
            .bearer_auth(token)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn classify_transport(&self, err: &reqwest::Error) -> TierError {
        if err.is_timeout() {
            TierError::Timeout {
                timeout_ms: self.endpoint.request_timeout.as_millis() as u64,
            }
        } else {
            TierError::Network(err.to_string())
        }
    }

    /// Sends an authorised request and classifies the response status.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, TierError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| self.classify_transport(&e))?;
        check_status(response).await
    }
}

/// Maps HTTP status codes onto the tier error taxonomy.
async fn check_status(response: Response) -> Result<Response, TierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TierError::AuthRequired),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            Err(TierError::Network(format!("remote busy: {status}")))
        }
        s if s.is_server_error() => Err(TierError::Network(format!("server error: {status}"))),
        _ => {
            let message = response.text().await.unwrap_or_default();
            Err(TierError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults() {
        let endpoint = RestEndpoint::default();
        assert!(endpoint.bearer_token.is_none());
        assert_eq!(endpoint.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn table_url_tolerates_trailing_slash() {
        let client = RestClient::new(RestEndpoint {
            base_url: "https://db.example.com/rest/v1/".to_string(),
            ..RestEndpoint::default()
        })
        .unwrap();
        assert_eq!(
            client.table_url("customers"),
            "https://db.example.com/rest/v1/customers"
        );
    }
}
