//! Call bridge
//!
//! Lets blocking request-handling threads run async work on a single reactor
//! thread. Work is handed over a channel to the thread that owns a
//! current-thread tokio runtime; the caller waits on a reply channel with a
//! deadline.
//!
//! A call that times out is not cancelled. The operation keeps running on the
//! reactor and its result is dropped when it eventually completes.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::Mutex;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::result::CallResult;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Errors raised while starting the reactor
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to start reactor: {0}")]
    Start(#[from] std::io::Error),
}

/// Why a blocking call produced no value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeFailure {
    /// Deadline elapsed
    Timeout,
    /// The operation panicked on the reactor
    Faulted(String),
    /// The reactor has shut down
    Stopped,
    /// Called from the reactor thread itself
    ReactorThread,
}

impl From<BridgeFailure> for CallResult {
    fn from(failure: BridgeFailure) -> Self {
        match failure {
            BridgeFailure::Timeout => CallResult::Timeout,
            BridgeFailure::Faulted(message) => CallResult::TransportError(message),
            BridgeFailure::Stopped => {
                CallResult::TransportError("reactor is not running".to_string())
            }
            BridgeFailure::ReactorThread => CallResult::TransportError(
                "blocking call issued on the reactor thread".to_string(),
            ),
        }
    }
}

/// Cloneable handle for fire-and-forget submission onto the reactor
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Queue `work` on the reactor. Returns false once the reactor is gone.
    pub fn dispatch<F>(&self, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.send(Box::pin(work)).is_ok()
    }
}

/// Synchronous facade over the reactor thread
pub struct CallBridge {
    dispatcher: Dispatcher,
    default_timeout: Duration,
    reactor_id: ThreadId,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CallBridge {
    /// Spawn the reactor thread
    pub fn start(default_timeout: Duration) -> Result<Self, BridgeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("gateway-link-reactor".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        tokio::select! {
                            job = rx.recv() => match job {
                                Some(job) => {
                                    tokio::spawn(job);
                                }
                                None => break,
                            },
                            _ = &mut shutdown_rx => break,
                        }
                    }
                });
                // Dropping the runtime drops every task still in flight.
                tracing::debug!("Reactor stopped");
            })?;

        let reactor_id = thread.thread().id();
        tracing::debug!("Reactor started (default timeout {:?})", default_timeout);

        Ok(Self {
            dispatcher: Dispatcher { tx },
            default_timeout,
            reactor_id,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Handle for fire-and-forget work
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Whether the calling thread is the reactor thread
    pub fn on_reactor_thread(&self) -> bool {
        std::thread::current().id() == self.reactor_id
    }

    /// Run a call on the reactor and block for its result with the default deadline
    pub fn call_blocking<F>(&self, operation: F) -> CallResult
    where
        F: Future<Output = CallResult> + Send + 'static,
    {
        self.call_blocking_with_timeout(operation, self.default_timeout)
    }

    /// Run a call on the reactor and block for its result
    pub fn call_blocking_with_timeout<F>(&self, operation: F, timeout: Duration) -> CallResult
    where
        F: Future<Output = CallResult> + Send + 'static,
    {
        match self.run_blocking(operation, timeout) {
            Ok(result) => result,
            Err(failure) => failure.into(),
        }
    }

    /// Run any future on the reactor and block until it resolves or `timeout` elapses.
    ///
    /// The operation is polled at most once per call; there are no retries.
    pub fn run_blocking<F, T>(&self, operation: F, timeout: Duration) -> Result<T, BridgeFailure>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.on_reactor_thread() {
            tracing::error!("Blocking call issued on the reactor thread");
            return Err(BridgeFailure::ReactorThread);
        }

        let (reply_tx, reply_rx) = std_mpsc::sync_channel(1);
        let job = async move {
            let outcome = AssertUnwindSafe(operation)
                .catch_unwind()
                .await
                .map_err(|panic| panic_message(panic.as_ref()));
            if reply_tx.send(outcome).is_err() {
                tracing::debug!("Discarding result of a call that already timed out");
            }
        };

        if !self.dispatcher.dispatch(job) {
            return Err(BridgeFailure::Stopped);
        }

        match reply_rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => {
                tracing::error!("Bridged call failed: {}", message);
                Err(BridgeFailure::Faulted(message))
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("Bridged call timed out after {:?}", timeout);
                Err(BridgeFailure::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(BridgeFailure::Stopped),
        }
    }

    /// Stop the reactor. In-flight work is dropped.
    pub fn shutdown(&self) {
        let sender = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }

        if self.on_reactor_thread() {
            return;
        }
        let thread = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::error!("Reactor thread panicked");
            }
        }
    }
}

impl Drop for CallBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("operation panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("operation panicked: {}", message)
    } else {
        "operation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn explode() -> CallResult {
        panic!("decoder exploded")
    }

    fn bridge() -> CallBridge {
        CallBridge::start(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_fast_operation_returns_its_result() {
        let bridge = bridge();

        let result = bridge.call_blocking(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            CallResult::Success { status: 200, body: json!({"ok": true}) }
        });

        assert_eq!(result, CallResult::Success { status: 200, body: json!({"ok": true}) });
    }

    #[test]
    fn test_slow_operation_times_out_near_deadline() {
        let bridge = bridge();
        let timeout = Duration::from_millis(100);
        let started = Instant::now();

        let result = bridge.call_blocking_with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                CallResult::Success { status: 200, body: json!(null) }
            },
            timeout,
        );

        assert_eq!(result, CallResult::Timeout);
        assert!(started.elapsed() < timeout + Duration::from_millis(500));
    }

    #[test]
    fn test_panic_becomes_transport_error() {
        let bridge = bridge();

        let result = bridge.call_blocking(async { explode() });

        match result {
            CallResult::TransportError(message) => assert!(message.contains("decoder exploded")),
            other => panic!("Expected TransportError, got {:?}", other),
        }

        // The reactor survives the fault
        let again = bridge.call_blocking(async { CallResult::Timeout });
        assert_eq!(again, CallResult::Timeout);
    }

    #[test]
    fn test_operation_runs_at_most_once() {
        let bridge = bridge();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        let result = bridge.call_blocking_with_timeout(
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                CallResult::Success { status: 200, body: json!(null) }
            },
            Duration::from_millis(20),
        );
        assert_eq!(result, CallResult::Timeout);

        // Let the abandoned operation finish; it must not be re-run.
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocking_on_reactor_thread_is_refused() {
        let bridge = Arc::new(bridge());
        let (tx, rx) = std_mpsc::channel();

        let inner = bridge.clone();
        assert!(bridge.dispatcher().dispatch(async move {
            let result = inner.call_blocking(async { CallResult::Timeout });
            let _ = tx.send(result);
        }));

        let result = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(result, CallResult::TransportError(ref m) if m.contains("reactor thread")));
    }

    #[test]
    fn test_calls_after_shutdown_fail_fast() {
        let bridge = bridge();
        bridge.shutdown();

        let result = bridge.call_blocking(async { CallResult::Timeout });
        assert_eq!(
            result,
            CallResult::TransportError("reactor is not running".to_string())
        );
    }

    #[test]
    fn test_run_blocking_generic_value() {
        let bridge = bridge();
        let value = bridge.run_blocking(async { 40 + 2 }, Duration::from_secs(1));
        assert_eq!(value, Ok(42));
    }
}
