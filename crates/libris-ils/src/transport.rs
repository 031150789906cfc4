//! HTTP transport to the ILS (reqwest-based).
//!
//! One request in, one [`IlsResponse`] out. Server errors and network
//! failures become [`IlsError::Transport`]; 4xx answers are handed back to
//! the driver because their meaning is dialect-specific. No retries.

use crate::error::{IlsError, IlsResult};
use crate::xml::XmlElement;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub tls_verify: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tls_verify: true,
        }
    }
}

/// A decoded ILS answer.
#[derive(Debug, Clone)]
pub struct IlsResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body text.
    pub raw: String,
    /// Parsed document; `None` for an empty body.
    pub document: Option<XmlElement>,
}

impl IlsResponse {
    /// Check for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parsed document, or an error when the body was empty.
    pub fn require_document(&self) -> IlsResult<&XmlElement> {
        self.document.as_ref().ok_or_else(|| {
            IlsError::MalformedResponse(format!("empty body (HTTP {})", self.status))
        })
    }
}

/// Shared HTTP client for ILS drivers.
#[derive(Debug, Clone)]
pub struct IlsTransport {
    http_client: Client,
}

impl IlsTransport {
    /// Create a transport with its own connection pool.
    pub fn new(config: &TransportConfig) -> IlsResult<Self> {
        let http_client = Client::builder()
            .timeout(config.read_timeout)
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .user_agent(concat!("libris-ils/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IlsError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    /// Create a transport with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Send one request and decode the XML answer.
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> IlsResult<IlsResponse> {
        debug!(method = %method, path = url.path(), "ILS request");

        let mut builder = self.http_client.request(method.clone(), url.clone());
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/xml")
                .body(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(method = %method, path = url.path(), error = %e, "ILS request failed");
            IlsError::transport_with_source(format!("request to {} failed", url.path()), e)
        })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| IlsError::transport_with_source("failed to read ILS response body", e))?;

        if status.is_server_error() {
            warn!(status = status.as_u16(), path = url.path(), "ILS server error");
            return Err(IlsError::server_error(
                status.as_u16(),
                format!("ILS answered HTTP {status}"),
            ));
        }

        let document = if raw.trim().is_empty() {
            None
        } else {
            Some(XmlElement::parse(&raw)?)
        };

        Ok(IlsResponse {
            status: status.as_u16(),
            raw,
            document,
        })
    }
}

/// Join a relative path onto a base URL, keeping the base path.
pub(crate) fn join_path(base: &Url, segments: &[&str]) -> IlsResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| IlsError::Configuration(format!("base URL cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> IlsTransport {
        IlsTransport::new(&TransportConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_send_parses_xml() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/42"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<user><primary_id>42</primary_id></user>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/users/42", server.uri())).unwrap();
        let response = transport().send(Method::GET, url, None, &[]).await.unwrap();

        assert!(response.is_success());
        let doc = response.require_document().unwrap();
        assert_eq!(doc.child_text("primary_id"), Some("42"));
    }

    #[tokio::test]
    async fn test_send_passes_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/users/42"))
            .and(header("content-type", "application/xml"))
            .and(header("x-test", "yes"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/users/42", server.uri())).unwrap();
        let response = transport()
            .send(Method::PUT, url, Some("<user/>".into()), &[("x-test", "yes")])
            .await
            .unwrap();

        assert_eq!(response.status, 204);
        assert!(response.document.is_none());
        assert!(matches!(
            response.require_document(),
            Err(IlsError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let err = transport().send(Method::GET, url, None, &[]).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.upstream_status(), Some(503));
    }

    #[tokio::test]
    async fn test_client_error_is_returned_to_driver() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("<error>bad</error>"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let response = transport().send(Method::GET, url, None, &[]).await.unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(response.document.unwrap().text(), Some("bad"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<user><id>"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let err = transport().send(Method::GET, url, None, &[]).await.unwrap_err();
        assert!(matches!(err, IlsError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let url = Url::parse("http://127.0.0.1:9/nothing").unwrap();
        let err = transport().send(Method::GET, url, None, &[]).await.unwrap_err();
        assert!(matches!(err, IlsError::Transport { status: None, .. }));
    }

    #[test]
    fn test_join_path_keeps_base_path() {
        let base = Url::parse("https://ils.example.org/api/v1/").unwrap();
        let url = join_path(&base, &["users", "a b"]).unwrap();
        assert_eq!(url.as_str(), "https://ils.example.org/api/v1/users/a%20b");
    }
}
