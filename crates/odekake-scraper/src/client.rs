use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::error::FetchError;

/// The text of a fetched page, held only for the duration of one resolution.
#[derive(Debug, Clone)]
pub struct RawPageContent {
    pub url: String,
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

/// HTTP client for facility pages.
///
/// No retries: a failed fetch just demotes the resolver to a lower tier, so
/// retrying would only slow the answer down. Certificate leniency is
/// configurable because several museum hosts still serve ancient TLS.
pub struct PageClient {
    client: Client,
}

impl PageClient {
    /// Creates a `PageClient` with the configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        accept_invalid_certs: bool,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { client })
    }

    /// Fetches a page and returns its body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Status`] on non-2xx responses and
    /// [`FetchError::Http`] on network or body-read failures.
    pub async fn fetch_text(&self, url: &str) -> Result<RawPageContent, FetchError> {
        tracing::debug!(url, "fetching facility page");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let text = response.text().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })?;

        Ok(RawPageContent {
            url: url.to_string(),
            text,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn fetch_text_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/daisetz/date.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("10月 6(月),14(火)"))
            .mount(&server)
            .await;

        let client = PageClient::new(5, "test-agent", false).unwrap();
        let page = client
            .fetch_text(&format!("{}/daisetz/date.html", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.text, "10月 6(月),14(火)");
        assert!(page.url.ends_with("/daisetz/date.html"));
    }

    #[tokio::test]
    async fn fetch_text_maps_404_to_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = PageClient::new(5, "test-agent", false).unwrap();
        let err = client
            .fetch_text(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status, .. } if status.as_u16() == 404
        ));
    }
}
