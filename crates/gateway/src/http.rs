//! HTTP relay gateway.
//!
//! Posts replies to `{base}/reply` and pushes to `{base}/push` as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::GatewayError;
use crate::message::{OutboundMessage, ReplyContext};
use crate::sender::MessageGateway;

/// Configuration for the HTTP relay.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the relay (e.g., "http://localhost:9000").
    pub base_url: String,
    /// Bearer token sent with every request, if set.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Create a configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the reply endpoint URL.
    pub fn reply_url(&self) -> String {
        format!("{}/reply", self.base_url)
    }

    /// Get the push endpoint URL.
    pub fn push_url(&self) -> String {
        format!("{}/push", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_token: Option<&'a str>,
    user_id: &'a str,
    messages: &'a [OutboundMessage],
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: &'a [OutboundMessage],
}

/// Gateway that delivers messages through an HTTP relay.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Build a gateway client.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.base_url.is_empty() {
            return Err(GatewayError::Config("gateway base URL is empty".into()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GatewayError::Http)?;

        Ok(Self { http, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<(), GatewayError> {
        debug!("POST {}", url);

        let mut request = self.http.post(url).json(body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessageGateway for HttpGateway {
    async fn reply(
        &self,
        context: &ReplyContext,
        messages: &[OutboundMessage],
    ) -> Result<(), GatewayError> {
        let body = ReplyRequest {
            reply_token: context.reply_token.as_deref(),
            user_id: &context.user_id,
            messages,
        };
        self.post(&self.config.reply_url(), &body).await
    }

    async fn push(&self, user_id: &str, messages: &[OutboundMessage]) -> Result<(), GatewayError> {
        let body = PushRequest {
            to: user_id,
            messages,
        };
        self.post(&self.config.push_url(), &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_config_urls() {
        let config = GatewayConfig::new("http://relay:9000/");
        assert_eq!(config.reply_url(), "http://relay:9000/reply");
        assert_eq!(config.push_url(), "http://relay:9000/push");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = HttpGateway::new(GatewayConfig::new(""));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_push_posts_json_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({
                "to": "U1",
                "messages": [{"type": "text", "text": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let gateway =
            HttpGateway::new(GatewayConfig::new(server.uri()).with_token("secret")).unwrap();
        gateway.push_text("U1", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_includes_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reply"))
            .and(body_json(json!({
                "reply_token": "rt",
                "user_id": "U1",
                "messages": [{"type": "text", "text": "ok"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(GatewayConfig::new(server.uri())).unwrap();
        gateway
            .reply(
                &ReplyContext::new("U1", Some("rt".into())),
                &[OutboundMessage::text("ok")],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejection_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad token"))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(GatewayConfig::new(server.uri())).unwrap();
        let err = gateway.push_text("U1", "hello").await.unwrap_err();
        match err {
            GatewayError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
