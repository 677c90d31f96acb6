//! Pushover adapter for delivering alert messages.
//!
//! Sends one multipart `POST` per message to the Pushover messages API
//! (`https://api.pushover.net/1/messages.json`). Each request carries the
//! application token, the recipient user key, a title, the message text and
//! an optional image attachment.
//!
//! Any 2xx status is a successful delivery. Every other status is returned
//! as [`AdapterError::Status`] with the response body, so callers can log
//! what the API complained about.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tdswatch_adapters::pushover::PushoverClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PushoverClient::builder()
//!         .token("app-token")
//!         .user("user-key")
//!         .build()?;
//!
//!     client.send("Water level is fine", None).await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::AdapterError;

/// Default messages API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";

/// Default notification title.
pub const DEFAULT_TITLE: &str = "AeroGarden";

/// Binary attachment sent along with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name reported to the API.
    pub file_name: String,
    /// MIME type of `bytes`.
    pub mime: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Create a PNG attachment.
    pub fn png(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: "image/png".to_string(),
            bytes,
        }
    }
}

/// Result of a successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    /// HTTP status returned by the API.
    pub status: u16,
    /// Request id reported by Pushover, when the body could be parsed.
    pub request: Option<String>,
}

/// Client for the Pushover messages API.
#[derive(Debug, Clone)]
pub struct PushoverClient {
    client: Client,
    endpoint: String,
    token: String,
    user: String,
    title: String,
}

impl PushoverClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> PushoverClientBuilder {
        PushoverClientBuilder::default()
    }

    /// Endpoint requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Title attached to every message.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Send a message, optionally with an attachment.
    pub async fn send(
        &self,
        message: &str,
        attachment: Option<Attachment>,
    ) -> Result<Receipt, AdapterError> {
        let mut form = Form::new()
            .text("token", self.token.clone())
            .text("user", self.user.clone())
            .text("title", self.title.clone())
            .text("message", message.to_string());

        if let Some(attachment) = attachment {
            let part = Part::bytes(attachment.bytes)
                .file_name(attachment.file_name)
                .mime_str(&attachment.mime)?;
            form = form.part("attachment", part);
        }

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // The body is informational only; a 2xx without JSON still counts.
        let request = match response.json::<MessageResponse>().await {
            Ok(parsed) => parsed.request,
            Err(e) => {
                debug!("Pushover response body was not JSON: {}", e);
                None
            }
        };

        Ok(Receipt {
            status: status.as_u16(),
            request,
        })
    }
}

/// Builder for PushoverClient.
#[derive(Debug, Default)]
pub struct PushoverClientBuilder {
    endpoint: Option<String>,
    token: Option<String>,
    user: Option<String>,
    title: Option<String>,
    timeout: Option<Duration>,
}

impl PushoverClientBuilder {
    /// Set the messages endpoint (default: [`DEFAULT_ENDPOINT`]).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the application API token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the recipient user key.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the message title (default: [`DEFAULT_TITLE`]).
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    ///
    /// Token and user are required.
    pub fn build(self) -> Result<PushoverClient, AdapterError> {
        let token = self.token.ok_or(AdapterError::Config("pushover token"))?;
        let user = self.user.ok_or(AdapterError::Config("pushover user"))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder().timeout(timeout).build()?;

        Ok(PushoverClient {
            client,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            token,
            user,
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        })
    }
}

/// Success body returned by the messages API.
#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    request: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one HTTP request on a loopback port, answering with
    /// `status` and `body`. The join handle yields the raw request bytes.
    async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        (format!("http://{}/1/messages.json", addr), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let Some(header_end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
        let body_len = request.len() - (header_end + 4);

        match headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
        {
            Some(len) => len.trim().parse::<usize>().map(|len| body_len >= len).unwrap_or(true),
            None => request.ends_with(b"\r\n0\r\n\r\n"),
        }
    }

    fn client_for(endpoint: &str) -> PushoverClient {
        PushoverClient::builder()
            .endpoint(endpoint)
            .token("tok-123")
            .user("user-456")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let client = PushoverClient::builder()
            .token("t")
            .user("u")
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(client.title(), "AeroGarden");
    }

    #[test]
    fn test_builder_requires_credentials() {
        let err = PushoverClient::builder().user("u").build().unwrap_err();
        assert!(matches!(err, AdapterError::Config("pushover token")));

        let err = PushoverClient::builder().token("t").build().unwrap_err();
        assert!(matches!(err, AdapterError::Config("pushover user")));
    }

    #[tokio::test]
    async fn test_send_posts_all_fields() {
        let (endpoint, server) = serve_once(200, r#"{"status":1,"request":"abc-1"}"#).await;
        let client = client_for(&endpoint);

        let receipt = client
            .send(
                "TDS is 80ppm",
                Some(Attachment::png("20240101000000.png", vec![0x89, b'P', b'N', b'G'])),
            )
            .await
            .unwrap();

        assert_eq!(receipt.status, 200);
        assert_eq!(receipt.request.as_deref(), Some("abc-1"));

        let request = String::from_utf8_lossy(&server.await.unwrap()).into_owned();
        assert!(request.starts_with("POST /1/messages.json"));
        assert!(request.contains("name=\"token\"\r\n\r\ntok-123"));
        assert!(request.contains("name=\"user\"\r\n\r\nuser-456"));
        assert!(request.contains("name=\"title\"\r\n\r\nAeroGarden"));
        assert!(request.contains("name=\"message\"\r\n\r\nTDS is 80ppm"));
        assert!(request.contains("name=\"attachment\"; filename=\"20240101000000.png\""));
        assert!(request.contains("image/png"));
    }

    #[tokio::test]
    async fn test_send_reports_error_status_with_body() {
        let (endpoint, server) =
            serve_once(400, r#"{"user":"invalid","errors":["user identifier is invalid"]}"#).await;
        let client = client_for(&endpoint);

        let err = client.send("hello", None).await.unwrap_err();
        match err {
            AdapterError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("user identifier is invalid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_accepts_non_json_success() {
        let (endpoint, server) = serve_once(202, "accepted").await;
        let client = client_for(&endpoint);

        let receipt = client.send("hello", None).await.unwrap();
        assert_eq!(receipt.status, 202);
        assert_eq!(receipt.request, None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_connection_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{}/1/messages.json", addr));
        let err = client.send("hello", None).await.unwrap_err();
        assert!(matches!(err, AdapterError::Connection(_) | AdapterError::Http(_)));
    }
}
