//! In-memory [`ChainClient`] for tests.
//!
//! Responses are routed by key: the longest registered key that is a substring
//! of the rendered request wins. Each key holds a queue of responses; once only
//! one is left it is replayed for every further request.

use crate::{ChainClient, ChainClientError, ChainRequest, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// A canned answer.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// Successful output.
    Output(String),
    /// The chain binary exited non-zero with this output.
    Failure { stdout: String, stderr: String },
    /// The request never completed.
    Timeout,
    /// The JSON-RPC server returned an error object.
    JsonRpcError { code: i64, message: String },
}

impl FakeResponse {
    fn into_result(self, rendered: &str) -> Result<String, ChainClientError> {
        match self {
            Self::Output(out) => Ok(out),
            Self::Failure { stdout, stderr } => Err(ChainClientError::CommandFailed {
                program: "fake".to_string(),
                status: "exit status: 1".to_string(),
                stdout,
                stderr,
            }),
            Self::Timeout => Err(ChainClientError::Timeout {
                request: rendered.to_string(),
                after: DEFAULT_TIMEOUT,
            }),
            Self::JsonRpcError { code, message } => Err(ChainClientError::JsonRpc { code, message }),
        }
    }
}

#[derive(Default)]
pub struct FakeChainClient {
    routes: Mutex<Vec<(String, VecDeque<FakeResponse>)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for requests matching `key`.
    pub fn push(&self, key: impl Into<String>, response: FakeResponse) -> &Self {
        let key = key.into();
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        match routes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, queue)) => queue.push_back(response),
            None => routes.push((key, VecDeque::from([response]))),
        }
        self
    }

    pub fn respond(&self, key: impl Into<String>, output: impl Into<String>) -> &Self {
        self.push(key, FakeResponse::Output(output.into()))
    }

    pub fn fail(&self, key: impl Into<String>, stderr: impl Into<String>) -> &Self {
        self.push(
            key,
            FakeResponse::Failure {
                stdout: String::new(),
                stderr: stderr.into(),
            },
        )
    }

    pub fn time_out(&self, key: impl Into<String>) -> &Self {
        self.push(key, FakeResponse::Timeout)
    }

    /// Every request seen so far, rendered.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests whose rendering contains `key`.
    pub fn call_count(&self, key: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| call.contains(key))
            .count()
    }

    fn next_response(&self, rendered: &str) -> Option<FakeResponse> {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let (_, queue) = routes
            .iter_mut()
            .filter(|(key, _)| rendered.contains(key.as_str()))
            .max_by_key(|(key, _)| key.len())?;

        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn request(&self, request: &ChainRequest) -> Result<String, ChainClientError> {
        let rendered = request.to_string();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rendered.clone());

        match self.next_response(&rendered) {
            Some(response) => response.into_result(&rendered),
            None => Err(ChainClientError::InvalidResponse(format!(
                "no fake response registered for `{rendered}`"
            ))),
        }
    }
}
