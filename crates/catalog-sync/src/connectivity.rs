// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reachability monitoring for the catalog service.
//!
//! The monitor keeps one process-wide [`ConnectivityState`] and broadcasts
//! it to subscribers on change only. A background probe task feeds it when
//! created with [`ConnectivityMonitor::spawn`]; a monitor created with
//! [`ConnectivityMonitor::manual`] is driven by [`ConnectivityMonitor::set_state`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const STATE_UNREACHABLE: u8 = 0;
const STATE_REACHABLE: u8 = 1;

/// Transition buffer per subscriber before older transitions are dropped.
const TRANSITION_BUFFER: usize = 32;

/// Binary reachability of the catalog service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    Reachable,
    Unreachable,
}

impl ConnectivityState {
    fn to_u8(self) -> u8 {
        match self {
            ConnectivityState::Reachable => STATE_REACHABLE,
            ConnectivityState::Unreachable => STATE_UNREACHABLE,
        }
    }

    fn from_u8(raw: u8) -> Self {
        if raw == STATE_REACHABLE {
            ConnectivityState::Reachable
        } else {
            ConnectivityState::Unreachable
        }
    }

    pub fn is_reachable(self) -> bool {
        self == ConnectivityState::Reachable
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Reachable => write!(f, "reachable"),
            ConnectivityState::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// A single reachability check.
///
/// Probes never fail: anything that prevents reaching the service,
/// including having no network at all, is reported as `Unreachable`.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self) -> Pin<Box<dyn Future<Output = ConnectivityState> + Send + '_>>;
}

/// Probe that opens (and immediately drops) a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// `addr` is a `host:port` pair; the host is resolved on every probe.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        TcpProbe {
            addr: addr.into(),
            timeout,
        }
    }
}

impl Probe for TcpProbe {
    fn probe(&self) -> Pin<Box<dyn Future<Output = ConnectivityState> + Send + '_>> {
        Box::pin(async move {
            let connect = tokio::net::TcpStream::connect(self.addr.as_str());
            match tokio::time::timeout(self.timeout, connect).await {
                Ok(Ok(_)) => ConnectivityState::Reachable,
                Ok(Err(e)) => {
                    tracing::debug!(addr = %self.addr, error = %e, "probe failed");
                    ConnectivityState::Unreachable
                }
                Err(_) => {
                    tracing::debug!(addr = %self.addr, "probe timed out");
                    ConnectivityState::Unreachable
                }
            }
        })
    }
}

/// State shared between the monitor handle and its probe task.
struct Shared {
    /// Current state (atomic for lock-free reads).
    state: AtomicU8,
    transitions: broadcast::Sender<ConnectivityState>,
}

impl Shared {
    /// Store `state`, broadcasting it if it differs from the previous one.
    fn publish(&self, state: ConnectivityState) -> bool {
        let previous = self.state.swap(state.to_u8(), Ordering::AcqRel);
        if previous == state.to_u8() {
            return false;
        }
        tracing::info!(
            from = %ConnectivityState::from_u8(previous),
            to = %state,
            "connectivity changed"
        );
        let _ = self.transitions.send(state);
        true
    }
}

/// Process-wide connectivity state with change notifications.
pub struct ConnectivityMonitor {
    shared: Arc<Shared>,
    cancel_token: CancellationToken,
}

impl ConnectivityMonitor {
    /// Create a monitor with no probe. State only changes via
    /// [`set_state`](Self::set_state).
    pub fn manual(initial: ConnectivityState) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        ConnectivityMonitor {
            shared: Arc::new(Shared {
                state: AtomicU8::new(initial.to_u8()),
                transitions,
            }),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Create a monitor and start probing every `interval`.
    ///
    /// The state starts as `Unreachable` and the first probe runs
    /// immediately. Must be called from within a tokio runtime.
    pub fn spawn<P: Probe>(probe: P, interval: Duration) -> Self {
        let monitor = Self::manual(ConnectivityState::Unreachable);
        let shared = Arc::clone(&monitor.shared);
        let cancel_token = monitor.cancel_token.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let state = tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    state = probe.probe() => state,
                };
                shared.publish(state);
            }
            tracing::debug!("connectivity probe stopped");
        });

        monitor
    }

    /// The most recently observed state.
    pub fn current_state(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Record a new state. Subscribers are notified only if it changed.
    ///
    /// Returns true if this was a transition.
    pub fn set_state(&self, state: ConnectivityState) -> bool {
        self.shared.publish(state)
    }

    /// Subscribe to transitions from this point on.
    pub fn subscribe(&self) -> ConnectivitySubscription {
        ConnectivitySubscription {
            rx: self.shared.transitions.subscribe(),
            shared: Arc::clone(&self.shared),
            cancel_token: self.cancel_token.clone(),
        }
    }

    /// Invoke `handler` on every transition until the monitor shuts down.
    ///
    /// The handler runs on a runtime worker, not on the caller's thread.
    pub fn on_change<F>(&self, handler: F) -> JoinHandle<()>
    where
        F: Fn(ConnectivityState) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        tokio::spawn(async move {
            while let Some(state) = subscription.changed().await {
                handler(state);
            }
        })
    }

    /// Stop the probe task and end all subscriptions.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Receiver of connectivity transitions.
pub struct ConnectivitySubscription {
    rx: broadcast::Receiver<ConnectivityState>,
    shared: Arc<Shared>,
    cancel_token: CancellationToken,
}

impl ConnectivitySubscription {
    /// Wait for the next transition.
    ///
    /// Returns `None` once the monitor has shut down. If this subscriber fell
    /// behind and transitions were dropped, the current state is returned.
    pub async fn changed(&mut self) -> Option<ConnectivityState> {
        let received = tokio::select! {
            biased;
            result = self.rx.recv() => result,
            _ = self.cancel_token.cancelled() => return None,
        };
        match received {
            Ok(state) => Some(state),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "connectivity subscriber lagged");
                Some(self.current())
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// The monitor's current state.
    pub fn current(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.shared.state.load(Ordering::Acquire))
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
