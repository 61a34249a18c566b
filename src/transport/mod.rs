//! Transport layer abstraction
//!
//! The coordinator is reached through a [`RequestExecutor`]: given an endpoint
//! path and ordered arguments it returns the raw response body. This module
//! provides:
//! - [`HttpExecutor`] for a node's HTTP API
//! - [`memory::RecordingExecutor`] with scripted responses (for testing)
//!
//! # Design
//!
//! Executors only move bytes. Arguments are byte strings because some signed
//! artifacts are sent as raw binary rather than text.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod http;
pub use http::HttpExecutor;

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The remote answered with an error status
    #[error("Remote error ({status}): {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Message reported by the remote
        message: String,
    },

    /// Receive failed
    #[error("Failed to receive: {0}")]
    ReceiveFailed(String),

    /// Deadline expired before the remote answered
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// One call to the coordinator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    path: String,
    args: Vec<Vec<u8>>,
    options: Vec<(String, String)>,
}

impl Request {
    /// Start a request for an endpoint such as `storage/upload/sign`
    pub fn new(path: impl Into<String>) -> Self {
        Request {
            path: path.into(),
            args: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl AsRef<[u8]>) -> Self {
        self.args.push(value.as_ref().to_vec());
        self
    }

    /// Set a named option
    pub fn option(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.options.push((name.into(), value.to_string()));
        self
    }

    /// Endpoint path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Positional arguments, in order
    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }

    /// Positional argument as text, if it is valid UTF-8
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args
            .get(index)
            .and_then(|arg| std::str::from_utf8(arg).ok())
    }

    /// Named options, in insertion order
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }
}

/// Executes coordinator requests
///
/// Implementations return the response body on success. They never retry;
/// retry policy belongs to the caller.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Send the request and wait for the response body
    async fn execute(&self, request: &Request) -> TransportResult<Vec<u8>>;
}

#[async_trait]
impl<E: RequestExecutor + ?Sized> RequestExecutor for Arc<E> {
    async fn execute(&self, request: &Request) -> TransportResult<Vec<u8>> {
        (**self).execute(request).await
    }
}

/// In-memory executor for testing
///
/// Responses are scripted per endpoint path and consumed in order; every
/// request is recorded for later inspection.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// Scripted executor endpoint
    #[derive(Default)]
    pub struct RecordingExecutor {
        responses: Mutex<HashMap<String, VecDeque<TransportResult<Vec<u8>>>>>,
        requests: Mutex<Vec<Request>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl RecordingExecutor {
        /// Create an executor with no scripted responses
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful response body for `path`
        pub fn respond(&self, path: &str, body: impl Into<Vec<u8>>) -> &Self {
            lock(&self.responses)
                .entry(path.to_string())
                .or_default()
                .push_back(Ok(body.into()));
            self
        }

        /// Queue a failure for `path`
        pub fn fail(&self, path: &str, error: TransportError) -> &Self {
            lock(&self.responses)
                .entry(path.to_string())
                .or_default()
                .push_back(Err(error));
            self
        }

        /// All requests received so far
        pub fn requests(&self) -> Vec<Request> {
            lock(&self.requests).clone()
        }

        /// Requests received for one endpoint
        pub fn requests_to(&self, path: &str) -> Vec<Request> {
            lock(&self.requests)
                .iter()
                .filter(|r| r.path() == path)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl RequestExecutor for RecordingExecutor {
        async fn execute(&self, request: &Request) -> TransportResult<Vec<u8>> {
            lock(&self.requests).push(request.clone());

            lock(&self.responses)
                .get_mut(request.path())
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| {
                    Err(TransportError::ConnectionFailed(format!(
                        "no response scripted for {}",
                        request.path()
                    )))
                })
        }
    }
}
