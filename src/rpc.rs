//!
//! JSON-RPC 2.0 client for the monitoring backend
//! ----------------------------------------------
//! Single chokepoint for all outbound backend communication.
//!
//! Responsibilities:
//! - Envelope construction with a process-local monotonically increasing id.
//! - Bearer auth header when a token is supplied (the login call has none).
//! - Bounded retry with linear backoff on transport timeouts only.
//! - Translation of backend error shapes into the `GatewayError` taxonomy.
//!
//! The transport is a trait object and the retry policy an explicit value so
//! both can be swapped in tests without a network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};

/// One JSON-RPC 2.0 request envelope. Built once per logical call and reused
/// across retry attempts of that call.
#[derive(Debug, Clone, Serialize)]
pub struct RpcEnvelope {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport timeout")]
    Timeout,
    #[error("connect failure: {0}")]
    Connect(String),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Body(String),
}

/// Moves one envelope to the backend and returns the raw response body.
/// Implementations must not retry; the client owns the retry loop.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn post(
        &self,
        envelope: &RpcEnvelope,
        auth_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

/// Production transport: HTTP POST via reqwest to the configured endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint).context("invalid backend URL")?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, endpoint })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Body(err.to_string())
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn post(
        &self,
        envelope: &RpcEnvelope,
        auth_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let mut req = self
            .client
            .post(self.endpoint.clone())
            .json(envelope)
            .timeout(timeout);
        if let Some(token) = auth_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        resp.json::<Value>().await.map_err(classify)
    }
}

/// Retry budget for one call: `max_retries` additional attempts after the
/// first, with a linear `attempt * backoff_base` delay before each retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, backoff_base: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.backoff_base * retry
    }
}

pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
    next_id: AtomicU64,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self { transport, next_id: AtomicU64::new(1), timeout, retry }
    }

    /// Convenience constructor for the production HTTP transport.
    pub fn http(endpoint: &str, timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(endpoint)?), timeout, retry))
    }

    /// Issue one backend call with the client's default timeout and retry budget.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        auth_token: Option<&str>,
    ) -> GatewayResult<Value> {
        self.call_with(method, params, auth_token, self.timeout, self.retry).await
    }

    /// Issue one backend call with explicit timeout and retry budget.
    ///
    /// A backend-level `error` field fails immediately (logical error, not
    /// transient); only transport timeouts are retried; any other transport
    /// failure surfaces as an infrastructure error on the first occurrence.
    pub async fn call_with(
        &self,
        method: &str,
        params: Value,
        auth_token: Option<&str>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> GatewayResult<Value> {
        let envelope = RpcEnvelope {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.transport.post(&envelope, auth_token, timeout).await {
                Ok(body) => {
                    if let Some(err) = body.get("error") {
                        return Err(GatewayError::backend(backend_error_message(err)));
                    }
                    debug!(method, id = envelope.id, "rpc call ok");
                    return body
                        .get("result")
                        .cloned()
                        .ok_or_else(|| GatewayError::backend("response missing result field"));
                }
                Err(TransportError::Timeout) if attempt <= retry.max_retries => {
                    let delay = retry.delay_before(attempt);
                    warn!(method, attempt, ?delay, "backend call timed out, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(TransportError::Timeout) => return Err(GatewayError::timeout(attempt)),
                Err(e) => {
                    return Err(GatewayError::infra(format!("backend unreachable: {}", e)))
                }
            }
        }
    }
}

/// The backend reports errors as `{code, message, data}`; `data` carries the
/// human-readable detail when present.
fn backend_error_message(err: &Value) -> String {
    err.get("data")
        .and_then(|v| v.as_str())
        .or_else(|| err.get("message").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Scripted transport that records every envelope; shared by gateway and
    /// broker tests.
    pub(crate) struct RecordingTransport {
        script: Mutex<VecDeque<Result<Value, TransportError>>>,
        pub seen: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingTransport {
        pub fn new(script: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script.into()), seen: Mutex::new(Vec::new()) })
        }
    }

    /// One-shot client over a recording transport, with retries disabled.
    pub(crate) fn client_for(transport: &Arc<RecordingTransport>) -> RpcClient {
        RpcClient::new(
            transport.clone(),
            Duration::from_secs(1),
            RetryPolicy { max_retries: 0, backoff_base: Duration::ZERO },
        )
    }

    #[async_trait]
    impl RpcTransport for RecordingTransport {
        async fn post(
            &self,
            envelope: &RpcEnvelope,
            _auth_token: Option<&str>,
            _timeout: Duration,
        ) -> Result<Value, TransportError> {
            self.seen.lock().push((envelope.method.clone(), envelope.params.clone()));
            self.script.lock().pop_front().expect("script exhausted")
        }
    }

    pub(crate) fn rpc_result(result: Value) -> Result<Value, TransportError> {
        Ok(serde_json::json!({"jsonrpc": "2.0", "result": result, "id": 1}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Scripted transport: pops one outcome per attempt and records traffic.
    struct FakeTransport {
        script: Mutex<VecDeque<Result<Value, TransportError>>>,
        calls: AtomicUsize,
        ids: Mutex<Vec<u64>>,
    }

    impl FakeTransport {
        fn new(script: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                ids: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl RpcTransport for FakeTransport {
        async fn post(
            &self,
            envelope: &RpcEnvelope,
            _auth_token: Option<&str>,
            _timeout: Duration,
        ) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.ids.lock().push(envelope.id);
            self.script.lock().pop_front().expect("script exhausted")
        }
    }

    fn no_backoff(max_retries: u32) -> RetryPolicy {
        RetryPolicy { max_retries, backoff_base: Duration::ZERO }
    }

    fn client(transport: Arc<FakeTransport>, retry: RetryPolicy) -> RpcClient {
        RpcClient::new(transport, Duration::from_secs(1), retry)
    }

    fn ok_body(result: Value) -> Result<Value, TransportError> {
        Ok(json!({"jsonrpc": "2.0", "result": result, "id": 1}))
    }

    #[tokio::test]
    async fn retry_budget_is_inclusive() {
        // Two timeouts then a success must succeed with max_retries = 2.
        let t = FakeTransport::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            ok_body(json!("tok")),
        ]);
        let c = client(t.clone(), no_backoff(2));
        let out = c.call("user.login", json!({}), None).await.unwrap();
        assert_eq!(out, json!("tok"));
        assert_eq!(t.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_attempt_count() {
        let t = FakeTransport::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
        ]);
        let c = client(t.clone(), no_backoff(2));
        let err = c.call("host.get", json!({}), Some("tok")).await.unwrap_err();
        match err {
            GatewayError::GatewayTimeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected GatewayTimeout, got {other}"),
        }
        assert_eq!(t.calls(), 3);
    }

    #[tokio::test]
    async fn backend_error_fails_without_retry() {
        let t = FakeTransport::new(vec![
            Ok(json!({
                "jsonrpc": "2.0",
                "error": {"code": -32602, "message": "Invalid params.", "data": "Incorrect user name or password."},
                "id": 1
            })),
            ok_body(json!("unreachable")),
        ]);
        let c = client(t.clone(), no_backoff(2));
        let err = c.call("user.login", json!({}), None).await.unwrap_err();
        match err {
            GatewayError::Backend { message } => {
                assert_eq!(message, "Incorrect user name or password.")
            }
            other => panic!("expected Backend, got {other}"),
        }
        // Exactly one round-trip: logical errors are not transient.
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn connect_failure_fails_without_retry() {
        let t = FakeTransport::new(vec![
            Err(TransportError::Connect("connection refused".into())),
            ok_body(json!("unreachable")),
        ]);
        let c = client(t.clone(), no_backoff(2));
        let err = c.call("host.get", json!({}), Some("tok")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Infrastructure { .. }));
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn request_ids_advance_per_call_not_per_attempt() {
        let t = FakeTransport::new(vec![
            Err(TransportError::Timeout),
            ok_body(json!(1)),
            ok_body(json!(2)),
        ]);
        let c = client(t.clone(), no_backoff(1));
        c.call("a.b", json!({}), None).await.unwrap();
        c.call("c.d", json!({}), None).await.unwrap();
        // Retried attempt reuses the call's id; the next call advances it.
        assert_eq!(*t.ids.lock(), vec![1, 1, 2]);
    }

    #[tokio::test]
    async fn missing_result_field_is_a_backend_error() {
        let t = FakeTransport::new(vec![Ok(json!({"jsonrpc": "2.0", "id": 1}))]);
        let c = client(t, no_backoff(0));
        let err = c.call("user.get", json!({}), Some("tok")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Backend { .. }));
    }
}
