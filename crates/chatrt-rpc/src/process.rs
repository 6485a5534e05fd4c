//! The line-delimited JSON-RPC 2.0 process manager.
//!
//! Grounded on `conductor/core/src/transport/unix_socket/client.rs`'s
//! split read-task/write-task-over-channels pattern, repointed at a child
//! process's stdio instead of a Unix socket, and on
//! `conductor/core/src/transport/frame.rs`'s decode-loop shape, simplified
//! from length-prefixed+CRC32 framing to newline-delimited framing (the
//! wire format a line-oriented CLI like `signal-cli --json-rpc` speaks).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::RpcError;

/// A JSON-RPC 2.0 request envelope.
#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    id: i64,
}

/// A JSON-RPC 2.0 error object.
#[derive(Deserialize, Debug)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// A decoded inbound line: either a response to a pending request, or an
/// unsolicited notification (e.g. a `receive` envelope).
#[derive(Deserialize, Debug)]
struct RpcEnvelope {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
    #[serde(flatten)]
    rest: Value,
}

/// Callback invoked for every inbound line that carries no `id` (an
/// unsolicited notification).
pub type NotificationCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Callback invoked once, when the child process exits or its stdio
/// errors, after every pending request has already been rejected.
pub type ProcessErrorCallback = Arc<dyn Fn(&RpcError) + Send + Sync>;

type Pending = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, RpcError>>>>>;

/// Spawns a long-running CLI and exchanges line-delimited JSON-RPC 2.0
/// requests/responses over its stdio.
///
/// Outbound requests are assigned monotonically increasing integer ids and
/// tracked in a `{id -> pending oneshot}` map with a per-request timeout.
/// Inbound lines are parsed individually; a line with an `id` resolves (or
/// rejects, if it carries a JSON-RPC error object) the matching pending
/// entry, a line without one is handed to the registered notification
/// callback, and a line that fails to parse as JSON is silently discarded.
pub struct ProcessManager {
    next_id: AtomicI64,
    pending: Pending,
    request_timeout_ms: u64,
    stdin: Mutex<Option<tokio::process::ChildStdin>>,
    pid: Mutex<Option<u32>>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    waiter_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    running: std::sync::atomic::AtomicBool,
}

impl ProcessManager {
    /// Construct a process manager with the given per-request timeout. The
    /// manager does nothing (and `request()` fails `NotRunning`) until
    /// [`Self::start`] is called.
    #[must_use]
    pub fn new(request_timeout_ms: u64) -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            request_timeout_ms,
            stdin: Mutex::new(None),
            pid: Mutex::new(None),
            reader_task: Mutex::new(None),
            waiter_task: Mutex::new(None),
            running: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Whether the manager has an active child process.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn `program` with `args`, wiring piped stdin/stdout and beginning
    /// the read loop. Fails [`RpcError::AlreadyStarted`] if already running.
    pub async fn start(
        self: &Arc<Self>,
        program: &str,
        args: &[String],
        on_notification: NotificationCallback,
        on_process_error: ProcessErrorCallback,
    ) -> Result<(), RpcError> {
        if self.running.swap(true, Ordering::SeqCst) {
            self.running.store(true, Ordering::SeqCst);
            return Err(RpcError::AlreadyStarted);
        }

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(RpcError::Spawn)?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let pid = child.id();

        *self.stdin.lock() = Some(stdin);
        *self.pid.lock() = pid;

        let pending = Arc::clone(&self.pending);
        let reader_callback = Arc::clone(&on_notification);
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        Self::handle_line(&pending, &reader_callback, &line);
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "subprocess stdout read error");
                        break;
                    }
                }
            }
        });
        *self.reader_task.lock() = Some(reader_task);

        let pending_for_wait = Arc::clone(&self.pending);
        let manager = Arc::clone(self);
        let waiter_task = tokio::spawn(async move {
            let status = child.wait().await;
            manager.running.store(false, Ordering::SeqCst);
            let reason = match status {
                Ok(status) => format!("subprocess exited with {status}"),
                Err(err) => format!("subprocess wait failed: {err}"),
            };
            debug!(%reason, "subprocess terminated, rejecting pending requests");
            Self::reject_all(&pending_for_wait, &reason);
            on_process_error(&RpcError::Terminated(reason));
            *manager.pid.lock() = None;
        });
        *self.waiter_task.lock() = Some(waiter_task);

        Ok(())
    }

    fn handle_line(pending: &Pending, on_notification: &NotificationCallback, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        let Ok(envelope) = serde_json::from_str::<RpcEnvelope>(trimmed) else {
            debug!(line = trimmed, "discarding non-JSON subprocess line");
            return;
        };

        match envelope.id {
            Some(id) => {
                let sender = pending.lock().remove(&id);
                if let Some(sender) = sender {
                    let resolved = match envelope.error {
                        Some(err) => Err(RpcError::Rpc { code: err.code, message: err.message }),
                        None => Ok(envelope.result.unwrap_or(Value::Null)),
                    };
                    let _ = sender.send(resolved);
                } else {
                    debug!(id, "response for unknown or already-resolved request id");
                }
            }
            None => on_notification(envelope.rest),
        }
    }

    fn reject_all(pending: &Pending, reason: &str) {
        let mut pending = pending.lock();
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(RpcError::Terminated(reason.to_string())));
        }
    }

    /// Send a JSON-RPC request and await its response, or
    /// [`RpcError::RequestTimeout`] after the configured timeout.
    ///
    /// Fails [`RpcError::NotRunning`] if [`Self::start`] hasn't been called
    /// (or the process has already terminated).
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(RpcError::NotRunning);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = RpcRequest { jsonrpc: "2.0", method: method.to_string(), params, id };
        let mut line = serde_json::to_vec(&request).expect("request always serializes");
        line.push(b'\n');

        {
            let mut guard = self.stdin.lock();
            let stdin = guard.as_mut().ok_or(RpcError::NotRunning)?;
            stdin.write_all(&line).await.map_err(RpcError::Write)?;
        }

        match tokio::time::timeout(Duration::from_millis(self.request_timeout_ms), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_canceled)) => Err(RpcError::Terminated("response channel dropped".to_string())),
            Err(_elapsed) => {
                self.pending.lock().remove(&id);
                Err(RpcError::RequestTimeout { method: method.to_string(), timeout_ms: self.request_timeout_ms })
            }
        }
    }

    /// Gracefully stop the subprocess: send `SIGTERM` and await its exit.
    /// No-op if not running.
    pub async fn stop(&self) {
        let pid = *self.pid.lock();

        #[cfg(unix)]
        if let Some(pid) = pid {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
        }
        #[cfg(not(unix))]
        let _ = pid;

        if let Some(task) = self.waiter_task.lock().take() {
            let _ = task.await;
        }
        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn request_before_start_fails_not_running() {
        let manager = Arc::new(ProcessManager::new(1_000));
        let err = manager.request("ping", None).await.unwrap_err();
        assert!(matches!(err, RpcError::NotRunning));
    }

    #[tokio::test]
    async fn starting_twice_fails_already_started() {
        let manager = Arc::new(ProcessManager::new(1_000));
        manager
            .start("cat", &[], Arc::new(|_| {}), Arc::new(|_| {}))
            .await
            .unwrap();
        let err = manager
            .start("cat", &[], Arc::new(|_| {}), Arc::new(|_| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::AlreadyStarted));
        manager.stop().await;
    }

    #[tokio::test]
    async fn non_json_line_is_discarded_not_fatal() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = Arc::clone(&seen);
        let callback: NotificationCallback = Arc::new(move |_| seen_clone.store(true, Ordering::SeqCst));
        ProcessManager::handle_line(&pending, &callback, "not json at all");
        assert!(!seen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn notification_without_id_is_dispatched() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let callback: NotificationCallback = Arc::new(move |value| *seen_clone.lock() = Some(value));
        ProcessManager::handle_line(&pending, &callback, r#"{"method":"receive","params":{"x":1}}"#);
        assert!(seen.lock().is_some());
    }

    #[tokio::test]
    async fn response_with_error_object_rejects_pending() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().insert(7, tx);
        let callback: NotificationCallback = Arc::new(|_| {});
        ProcessManager::handle_line(&pending, &callback, r#"{"jsonrpc":"2.0","error":{"code":-1,"message":"boom"},"id":7}"#);
        let result = rx.await.unwrap();
        match result {
            Err(RpcError::Rpc { code, message }) => {
                assert_eq!(code, -1);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Rpc error, got {other:?}"),
        }
    }
}
