//! Response envelope returned by a remote cluster for every request.
//!
//! A well-formed response carries a `status` key holding either `"OK"` or
//! `"FAIL"`; on failure the `err` key holds a human readable message. The
//! accessors below are pure views and never mutate the map.

use crate::config::RemoteClusterConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value result returned by a peer.
///
/// # Example
///
/// ```
/// use remotecluster::models::Response;
///
/// let response = Response::fail("token expired");
/// assert!(!response.is_success());
/// assert_eq!(response.error(), "FAIL: token expired");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response(Map<String, Value>);

impl Response {
    /// Create an empty response (no status).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a response with the success status.
    pub fn ok() -> Self {
        let mut response = Self::new();
        response.set_status(RemoteClusterConfig::RESPONSE_STATUS_OK);
        response
    }

    /// Create a response with the failure status and an error message.
    pub fn fail(message: impl Into<String>) -> Self {
        let mut response = Self::new();
        response.set_failure(message);
        response
    }

    /// Textual form of the value under `key`, or an empty string.
    ///
    /// JSON strings are returned without quotes; any other value uses its
    /// JSON rendering.
    pub fn string(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// True iff the status key equals the success sentinel.
    pub fn is_success(&self) -> bool {
        self.string(RemoteClusterConfig::RESPONSE_STATUS_KEY)
            == RemoteClusterConfig::RESPONSE_STATUS_OK
    }

    /// `"FAIL: <message>"` when the status is the failure sentinel, else `""`.
    ///
    /// Unknown status values are not successes but do not format an error
    /// either.
    pub fn error(&self) -> String {
        let status = self.string(RemoteClusterConfig::RESPONSE_STATUS_KEY);
        if status == RemoteClusterConfig::RESPONSE_STATUS_FAIL {
            return format!(
                "{}: {}",
                status,
                self.string(RemoteClusterConfig::RESPONSE_ERROR_KEY)
            );
        }
        String::new()
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Set the status key.
    pub fn set_status(&mut self, status: &str) {
        self.set(RemoteClusterConfig::RESPONSE_STATUS_KEY, status);
    }

    /// Mark the response failed with `message`.
    pub fn set_failure(&mut self, message: impl Into<String>) {
        self.set_status(RemoteClusterConfig::RESPONSE_STATUS_FAIL);
        self.set(RemoteClusterConfig::RESPONSE_ERROR_KEY, message.into());
    }
}

impl From<Map<String, Value>> for Response {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
