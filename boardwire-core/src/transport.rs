//! Transport seams between resource modules and the remote API.
//!
//! Resource modules never talk to `reqwest` directly. They build an
//! [`ApiRequest`] and hand it to a [`Transport`]; the HTTP implementation
//! lives in `boardwire-client`, the in-memory one in `boardwire-test-utils`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;

use crate::error::ClientResult;
use crate::instance::InstanceConfig;

/// HTTP verbs used against the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the verb changes remote state.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request against an instance's API, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Append a query parameter only when `value` is present.
    pub fn query_opt<T: ToString>(self, name: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }
}

/// Executes requests against one instance.
///
/// Implementations return the decoded JSON body as-is (including any
/// `{"data": ...}` envelope). Empty bodies come back as `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> ClientResult<Value>;
}

/// Builds the transport for a resolved instance.
///
/// Called by the client factory at most once per instance on the happy path.
/// `token` has already been read from the variable named by
/// [`InstanceConfig::token_env`].
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        instance: &InstanceConfig,
        token: SecretString,
    ) -> ClientResult<Arc<dyn Transport>>;
}
