//! HTTP transport for one instance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use boardwire_core::{
    ApiRequest, ClientError, ClientResult, ConfigError, Connector, InstanceConfig, Method,
    Transport,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

const API_KEY_HEADER: &str = "apikey";

/// reqwest-backed [`Transport`] bound to one instance's base URL and token.
///
/// Cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    instance: String,
    auth_header: HeaderMap,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("instance", &self.instance)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(
        instance: &InstanceConfig,
        token: &SecretString,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Internal(format!("failed to build HTTP client: {e}")))?;

        let auth_header = build_auth_headers(instance, token)?;
        Ok(Self {
            client,
            base_url: instance.api_url.trim_end_matches('/').to_string(),
            instance: instance.id.clone(),
            auth_header,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: &ApiRequest) -> ClientResult<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };

        let mut builder = builder.headers(self.auth_header.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        parse_response(response).await
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn execute(&self, request: ApiRequest) -> ClientResult<Value> {
        let started = Instant::now();
        let result = self.send(&request).await;
        debug!(
            instance = %self.instance,
            method = %request.method,
            path = %request.path,
            status = ?result.as_ref().err().and_then(ClientError::status),
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream request"
        );
        result
    }
}

/// Builds a [`RestClient`] for every instance the factory resolves.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for HttpConnector {
    fn connect(
        &self,
        instance: &InstanceConfig,
        token: SecretString,
    ) -> ClientResult<Arc<dyn Transport>> {
        let client = RestClient::new(instance, &token, self.timeout)?;
        Ok(Arc::new(client))
    }
}

fn build_auth_headers(instance: &InstanceConfig, token: &SecretString) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut value = HeaderValue::from_str(token.expose_secret()).map_err(|_| {
        ConfigError::invalid(
            &instance.id,
            &instance.token_env,
            "token contains characters that are not allowed in an HTTP header",
        )
    })?;
    value.set_sensitive(true);
    headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn transport_error(err: reqwest::Error) -> ClientError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    ClientError::upstream(err.status().map(|s| s.as_u16()), reason)
}

async fn parse_response(response: reqwest::Response) -> ClientResult<Value> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport_error)?;

    if status.is_success() {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        return serde_json::from_slice(&bytes).map_err(|e| ClientError::decode(e.to_string()));
    }

    let text = String::from_utf8_lossy(&bytes);
    Err(ClientError::upstream(
        Some(status.as_u16()),
        error_message(&text).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        }),
    ))
}

/// Pull a human readable message out of an error body.
///
/// Accepts `{"error": {"message": ..}}`, `{"error": ".."}`, `{"message": ..}`
/// and falls back to the raw text.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };
    let message = value
        .pointer("/error/message")
        .or_else(|| value.get("error"))
        .or_else(|| value.get("message"))
        .and_then(Value::as_str);
    Some(message.map(str::to_string).unwrap_or_else(|| trimmed.to_string()))
}
