//! Port for querying remote chains.
//!
//! Every remote lookup made while bootstrapping a DA light client goes through
//! [`ChainClient`]: hub queries, DA block lookups and light-node JSON-RPC calls.
//! [`RemoteChainClient`] shells out to chain binaries or talks HTTP, and
//! [`fake::FakeChainClient`] answers from canned responses.

pub mod fake;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Default upper bound for a single remote request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Output fragments chain binaries print when the node cannot be reached.
const UNREACHABLE_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "no such host",
    "dial tcp",
    "post failed",
    "i/o timeout",
    "context deadline exceeded",
    "network is unreachable",
];

/// Errors that can occur when querying a remote chain.
#[derive(Error, Debug)]
pub enum ChainClientError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} failed ({status}): {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stdout: String,
        stderr: String,
    },
    #[error("request timed out after {after:?}: {request}")]
    Timeout { request: String, after: Duration },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("JSON-RPC error: code={code}, message={message}")]
    JsonRpc { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ChainClientError {
    /// Whether the captured output of a failed request mentions `needle`.
    ///
    /// Chain binaries only report some conditions (such as a missing state entry)
    /// through their output text, so callers match on it.
    pub fn output_contains(&self, needle: &str) -> bool {
        match self {
            Self::CommandFailed { stdout, stderr, .. } => {
                stdout.contains(needle) || stderr.contains(needle)
            }
            Self::JsonRpc { message, .. } => message.contains(needle),
            Self::InvalidResponse(message) => message.contains(needle),
            _ => false,
        }
    }

    /// Whether the remote endpoint could not be reached at all.
    ///
    /// A failed command only counts when its output looks like a network
    /// error; a rejected flag or an unknown chain ID does not.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Http(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            Self::CommandFailed { stdout, stderr, .. } => {
                let output = format!("{stdout}\n{stderr}").to_lowercase();
                UNREACHABLE_MARKERS.iter().any(|m| output.contains(m))
            }
            _ => false,
        }
    }
}

/// A single request against a remote chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainRequest {
    /// Run a chain binary and capture its stdout.
    Exec { program: PathBuf, args: Vec<String> },
    /// JSON-RPC 2.0 call over HTTP; the response is the JSON text of `result`.
    JsonRpc {
        url: String,
        method: String,
        params: Value,
        auth_token: Option<String>,
    },
    /// Plain HTTP GET; the response is the body.
    HttpGet { url: String },
}

impl ChainRequest {
    pub fn exec<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exec {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn json_rpc(url: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self::JsonRpc {
            url: url.into(),
            method: method.into(),
            params,
            auth_token: None,
        }
    }

    pub fn http_get(url: impl Into<String>) -> Self {
        Self::HttpGet { url: url.into() }
    }

    /// Attach a bearer token. No-op for anything but JSON-RPC requests.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        if let Self::JsonRpc { auth_token, .. } = &mut self {
            *auth_token = Some(token.into());
        }
        self
    }
}

impl fmt::Display for ChainRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exec { program, args } => {
                write!(f, "{}", program.display())?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            // auth token is never rendered
            Self::JsonRpc {
                url,
                method,
                params,
                ..
            } => write!(f, "POST {url} {method} {params}"),
            Self::HttpGet { url } => write!(f, "GET {url}"),
        }
    }
}

/// Opaque query interface to a hub or DA chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Perform the request and return its raw textual output.
    async fn request(&self, request: &ChainRequest) -> Result<String, ChainClientError>;
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for Arc<T> {
    async fn request(&self, request: &ChainRequest) -> Result<String, ChainClientError> {
        (**self).request(request).await
    }
}

/// JSON-RPC request envelope.
#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

/// JSON-RPC response envelope.
#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// Production client: chain binaries as subprocesses, HTTP through reqwest.
///
/// Every request is bounded by the configured timeout; a subprocess that
/// outlives it is killed.
#[derive(Clone)]
pub struct RemoteChainClient {
    http: reqwest::Client,
    timeout: Duration,
    request_id: Arc<AtomicU64>,
}

impl RemoteChainClient {
    /// Create a client with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
            request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn bounded<F, T>(&self, request: &ChainRequest, fut: F) -> Result<T, ChainClientError>
    where
        F: Future<Output = Result<T, ChainClientError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ChainClientError::Timeout {
                request: request.to_string(),
                after: self.timeout,
            })?
    }

    async fn exec(&self, program: &Path, args: &[String]) -> Result<String, ChainClientError> {
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ChainClientError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(ChainClientError::CommandFailed {
                program: program.display().to_string(),
                status: output.status.to_string(),
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(stdout)
    }

    async fn call(
        &self,
        url: &str,
        method: &str,
        params: &Value,
        auth_token: Option<&str>,
    ) -> Result<String, ChainClientError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id(),
            method,
            params,
        };

        let mut builder = self.http.post(url).json(&request);
        if let Some(token) = auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let json: JsonRpcResponse = response.json().await?;

        if let Some(error) = json.error {
            return Err(ChainClientError::JsonRpc {
                code: error.code,
                message: error.message,
            });
        }

        json.result
            .map(|result| result.to_string())
            .ok_or_else(|| ChainClientError::InvalidResponse("no result in response".to_string()))
    }

    async fn get(&self, url: &str) -> Result<String, ChainClientError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChainClientError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

impl Default for RemoteChainClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for RemoteChainClient {
    async fn request(&self, request: &ChainRequest) -> Result<String, ChainClientError> {
        debug!("Requesting {}", request);

        match request {
            ChainRequest::Exec { program, args } => {
                self.bounded(request, self.exec(program, args)).await
            }
            ChainRequest::JsonRpc {
                url,
                method,
                params,
                auth_token,
            } => {
                self.bounded(
                    request,
                    self.call(url, method, params, auth_token.as_deref()),
                )
                .await
            }
            ChainRequest::HttpGet { url } => self.bounded(request, self.get(url)).await,
        }
    }
}
