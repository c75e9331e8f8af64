//! Registration heartbeat
//!
//! Pings the gateway on a fixed interval. A `204` means the gateway does not
//! know this service, which triggers a publish pass. Failures are logged and
//! retried on the next tick; there is no backoff.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use crate::bridge::{BridgeFailure, Dispatcher};
use crate::transport::TransportClient;

use super::publisher::RoutePublishing;
use super::ping_endpoint;

/// Registration state of this service as seen by the heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeartbeatState {
    /// Timer running; last ping was fine or inconclusive
    Idle,
    /// Gateway asked for the routes to be published
    RegistrationDue,
}

impl HeartbeatState {
    /// State after a ping outcome
    pub fn on_ping(self, outcome: &PingOutcome) -> Self {
        match outcome {
            PingOutcome::RegistrationRequested => HeartbeatState::RegistrationDue,
            _ => HeartbeatState::Idle,
        }
    }

    /// State after a publish pass has been kicked off
    pub fn after_publish(self) -> Self {
        HeartbeatState::Idle
    }
}

/// Classified result of one ping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    /// 200: registered, nothing to do
    Registered,
    /// 204: gateway wants the routes
    RegistrationRequested,
    /// Any other status
    Unexpected(u16),
    /// The ping never got an answer
    Failed(String),
}

impl PingOutcome {
    pub fn from_status(status: Result<u16, String>) -> Self {
        match status {
            Ok(200) => PingOutcome::Registered,
            Ok(204) => PingOutcome::RegistrationRequested,
            Ok(status) => PingOutcome::Unexpected(status),
            Err(message) => PingOutcome::Failed(message),
        }
    }
}

/// Counters for health reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeartbeatStats {
    pub pings: u64,
    pub registrations: u64,
    pub anomalies: u64,
    pub failures: u64,
    pub last_status: Option<u16>,
}

/// Periodic gateway ping with re-registration on demand
pub struct Heartbeat {
    key: String,
    interval: Duration,
    transport: TransportClient,
    publisher: Arc<dyn RoutePublishing>,
    state: Mutex<HeartbeatState>,
    stats: Mutex<HeartbeatStats>,
}

impl Heartbeat {
    pub fn new(
        key: impl Into<String>,
        interval: Duration,
        transport: TransportClient,
        publisher: Arc<dyn RoutePublishing>,
    ) -> Self {
        Self {
            key: key.into(),
            interval,
            transport,
            publisher,
            state: Mutex::new(HeartbeatState::Idle),
            stats: Mutex::new(HeartbeatStats::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> HeartbeatState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stats(&self) -> HeartbeatStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Ping the gateway once
    pub async fn ping(&self) -> PingOutcome {
        let endpoint = ping_endpoint(&self.key);
        PingOutcome::from_status(self.transport.ping_status(&endpoint).await)
    }

    /// Apply a ping outcome. Returns true when a publish pass was started.
    pub fn handle_outcome(&self, outcome: &PingOutcome) -> bool {
        {
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            stats.pings += 1;
            match outcome {
                PingOutcome::Registered => stats.last_status = Some(200),
                PingOutcome::RegistrationRequested => {
                    stats.last_status = Some(204);
                    stats.registrations += 1;
                }
                PingOutcome::Unexpected(status) => {
                    stats.last_status = Some(*status);
                    stats.anomalies += 1;
                }
                PingOutcome::Failed(_) => stats.failures += 1,
            }
        }

        match outcome {
            PingOutcome::Unexpected(status) => tracing::error!("{} - UNKNOWN ERROR", status),
            PingOutcome::Failed(message) => tracing::warn!("[ping] {}", message),
            _ => {}
        }

        let next = self.transition(|state| state.on_ping(outcome));
        if next != HeartbeatState::RegistrationDue {
            return false;
        }

        tracing::info!("204 - Registering new routes");
        if !self.publisher.publish_routes() {
            tracing::warn!("Route publish pass did not complete; retrying on a later ping");
        }
        self.transition(HeartbeatState::after_publish);
        true
    }

    /// Run the ping loop on the reactor. The first ping fires one interval
    /// after start; each tick pings independently of earlier ticks.
    pub fn start(self: Arc<Self>, dispatcher: &Dispatcher) -> Result<HeartbeatHandle, BridgeFailure> {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let heartbeat = self.clone();

        let queued = dispatcher.dispatch(async move {
            let interval = heartbeat.interval.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let heartbeat = heartbeat.clone();
                        tokio::spawn(async move {
                            let outcome = heartbeat.ping().await;
                            heartbeat.handle_outcome(&outcome);
                        });
                    }
                    _ = &mut stop_rx => break,
                }
            }
            tracing::info!("Heartbeat stopped");
        });

        if !queued {
            return Err(BridgeFailure::Stopped);
        }

        tracing::info!(
            "Activating service registration for \"{}\" every {:?}",
            self.key,
            self.interval
        );
        Ok(HeartbeatHandle {
            heartbeat: self,
            stop_tx: Mutex::new(Some(stop_tx)),
        })
    }

    fn transition(&self, step: impl FnOnce(HeartbeatState) -> HeartbeatState) -> HeartbeatState {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = step(*state);
        *state
    }
}

/// Handle to a running heartbeat
pub struct HeartbeatHandle {
    heartbeat: Arc<Heartbeat>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl HeartbeatHandle {
    pub fn heartbeat(&self) -> &Arc<Heartbeat> {
        &self.heartbeat
    }

    pub fn stats(&self) -> HeartbeatStats {
        self.heartbeat.stats()
    }

    /// Stop ticking. A ping already in flight still completes.
    pub fn stop(&self) {
        let sender = self.stop_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointBase, EndpointRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPublisher {
        passes: AtomicUsize,
    }

    impl RoutePublishing for CountingPublisher {
        fn publish_routes(&self) -> bool {
            self.passes.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn heartbeat(publisher: Arc<CountingPublisher>) -> Heartbeat {
        let registry = Arc::new(EndpointRegistry::new(EndpointBase::new("http", "127.0.0.1", 9)));
        Heartbeat::new(
            "cases",
            Duration::from_secs(5),
            TransportClient::new(registry, Duration::from_secs(1)),
            publisher,
        )
    }

    #[test]
    fn test_state_transitions() {
        use HeartbeatState::*;

        assert_eq!(Idle.on_ping(&PingOutcome::Registered), Idle);
        assert_eq!(Idle.on_ping(&PingOutcome::Unexpected(500)), Idle);
        assert_eq!(Idle.on_ping(&PingOutcome::Failed("refused".into())), Idle);
        assert_eq!(Idle.on_ping(&PingOutcome::RegistrationRequested), RegistrationDue);
        assert_eq!(RegistrationDue.after_publish(), Idle);
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(PingOutcome::from_status(Ok(200)), PingOutcome::Registered);
        assert_eq!(PingOutcome::from_status(Ok(204)), PingOutcome::RegistrationRequested);
        assert_eq!(PingOutcome::from_status(Ok(502)), PingOutcome::Unexpected(502));
        assert!(matches!(PingOutcome::from_status(Err("down".into())), PingOutcome::Failed(_)));
    }

    #[test]
    fn test_publish_runs_once_for_200_204_200() {
        let publisher = Arc::new(CountingPublisher::default());
        let heartbeat = heartbeat(publisher.clone());

        let started: Vec<bool> = [200, 204, 200]
            .into_iter()
            .map(|status| heartbeat.handle_outcome(&PingOutcome::from_status(Ok(status))))
            .collect();

        assert_eq!(started, vec![false, true, false]);
        assert_eq!(publisher.passes.load(Ordering::SeqCst), 1);
        assert_eq!(heartbeat.state(), HeartbeatState::Idle);
    }

    #[test]
    fn test_failures_never_publish_and_are_counted() {
        let publisher = Arc::new(CountingPublisher::default());
        let heartbeat = heartbeat(publisher.clone());

        heartbeat.handle_outcome(&PingOutcome::Failed("connection refused".into()));
        heartbeat.handle_outcome(&PingOutcome::Unexpected(500));
        heartbeat.handle_outcome(&PingOutcome::Failed("connection refused".into()));

        assert_eq!(publisher.passes.load(Ordering::SeqCst), 0);
        let stats = heartbeat.stats();
        assert_eq!(stats.pings, 3);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.anomalies, 1);
        assert_eq!(stats.last_status, Some(500));
    }

    #[tokio::test]
    async fn test_ping_against_unreachable_gateway_fails() {
        let publisher = Arc::new(CountingPublisher::default());
        let heartbeat = heartbeat(publisher);

        // Port 9 (discard) is closed on test hosts.
        assert!(matches!(heartbeat.ping().await, PingOutcome::Failed(_)));
    }
}
