//! HTTP delivery of push requests

use esptail_core::{LokiConfig, OutputError};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::future::Future;
use tracing::debug;

/// Status line of a completed push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushResponse {
    pub status: u16,
    pub content_length: Option<u64>,
}

impl PushResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one serialized push request to the configured endpoint
///
/// An `Err` means no response was received at all. Any HTTP status, including
/// 4xx and 5xx, is reported through `PushResponse`.
pub trait PushTransport: Send + Sync {
    fn push(
        &self,
        config: &LokiConfig,
        body: &[u8],
    ) -> impl Future<Output = Result<PushResponse, OutputError>> + Send;
}

/// `reqwest`-backed transport sharing one connection pool
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, OutputError> {
        let client = Client::builder()
            .build()
            .map_err(|e| OutputError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxy, TLS roots)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl PushTransport for HttpTransport {
    async fn push(&self, config: &LokiConfig, body: &[u8]) -> Result<PushResponse, OutputError> {
        // the timeout is applied per request so a reloaded value takes effect
        let mut request = self
            .client
            .post(&config.endpoint)
            .timeout(config.timeout())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());

        if let Some(credentials) = &config.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        debug!(endpoint = %config.endpoint, bytes = body.len(), "Pushing entry");

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                OutputError::Network(format!("Failed to push to Loki: {}", e))
            } else {
                OutputError::Http(format!("Failed to push to Loki: {}", e))
            }
        })?;

        Ok(PushResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esptail_core::config::Credentials;
    use mockito::{Matcher, Server};
    use tokio::net::TcpListener;

    const PUSH_PATH: &str = "/loki/api/v1/push";

    fn transport() -> HttpTransport {
        HttpTransport::with_client(Client::builder().no_proxy().build().unwrap())
    }

    fn config_for(server: &Server) -> LokiConfig {
        LokiConfig {
            endpoint: format!("{}{}", server.url(), PUSH_PATH),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_push_posts_json_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", PUSH_PATH)
            .match_header("content-type", "application/json")
            .match_header("authorization", Matcher::Missing)
            .match_body(r#"{"streams":[]}"#)
            .with_status(204)
            .create_async()
            .await;

        let response = transport()
            .push(&config_for(&server), br#"{"streams":[]}"#)
            .await
            .unwrap();

        assert_eq!(response.status, 204);
        assert!(response.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_push_reports_content_length_and_error_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", PUSH_PATH)
            .with_status(400)
            .with_body("no")
            .create_async()
            .await;

        let response = transport().push(&config_for(&server), b"{}").await.unwrap();

        assert_eq!(response.status, 400);
        assert_eq!(response.content_length, Some(2));
        assert!(!response.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_push_sends_basic_auth() {
        let mut server = Server::new_async().await;
        // base64("user:pass")
        let mock = server
            .mock("POST", PUSH_PATH)
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(204)
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.credentials = Some(Credentials {
            username: "user".to_string(),
            password: "pass".to_string(),
        });

        let response = transport().push(&config, b"{}").await.unwrap();
        assert_eq!(response.status, 204);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_push_to_closed_port_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = LokiConfig {
            endpoint: format!("http://{}{}", addr, PUSH_PATH),
            ..Default::default()
        };
        let result = transport().push(&config, b"{}").await;

        assert!(matches!(result, Err(OutputError::Network(_))));
    }
}
