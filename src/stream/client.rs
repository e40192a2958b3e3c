//! The metrics stream client.
//!
//! `StreamClient` owns at most one transport connection, the connection state
//! machine, the latest snapshot and the reconnect bookkeeping. It is sans-IO:
//! every input arrives through a method call and every side effect goes out
//! through the [`Transport`] and [`RetryScheduler`] seams, so all state
//! changes are serialized through `&mut self`.

use tracing::{debug, info, warn};

use crate::connection::{ConnectionEvent, ConnectionState, ConnectionStateMachine, ReconnectPolicy};
use crate::error::DecodeError;

use super::message::{decode_binary, decode_text, Inbound};
use super::snapshot::MetricsSnapshot;
use super::subscribers::{SubscriberRegistry, Subscription};
use super::transport::{ConnectionId, RetryScheduler, RetryToken, Transport, TransportEvent};

/// Live metrics stream with automatic recovery.
pub struct StreamClient<T: Transport, S: RetryScheduler> {
    endpoint: String,
    transport: T,
    scheduler: S,
    policy: ReconnectPolicy,
    machine: ConnectionStateMachine,
    latest: Option<MetricsSnapshot>,
    reconnect_attempt: u32,
    active: Option<ConnectionId>,
    last_connection: ConnectionId,
    pending_retry: Option<RetryToken>,
    last_token: RetryToken,
    auto_reconnect: bool,
    subscribers: SubscriberRegistry,
}

impl<T: Transport, S: RetryScheduler> std::fmt::Debug for StreamClient<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("endpoint", &self.endpoint)
            .field("state", &self.machine.state())
            .field("reconnect_attempt", &self.reconnect_attempt)
            .field("active", &self.active)
            .field("pending_retry", &self.pending_retry)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, S: RetryScheduler> StreamClient<T, S> {
    /// Creates a client in `Disconnected`; nothing is opened until
    /// [`connect`](Self::connect).
    pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy, transport: T, scheduler: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
            scheduler,
            policy,
            machine: ConnectionStateMachine::new(),
            latest: None,
            reconnect_attempt: 0,
            active: None,
            last_connection: ConnectionId::from_raw(0),
            pending_retry: None,
            last_token: RetryToken::from_raw(0),
            auto_reconnect: true,
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Opens the stream unless it is already connecting or connected.
    pub fn connect(&mut self) {
        let state = self.machine.state();
        if matches!(state, ConnectionState::Connecting | ConnectionState::Connected) {
            debug!(%state, "connect ignored");
            return;
        }
        self.auto_reconnect = true;
        self.start_attempt(ConnectionEvent::ConnectRequested);
    }

    /// Manual override: drops the current connection and any pending retry,
    /// resets backoff and connects immediately.
    pub fn reconnect(&mut self) {
        info!(endpoint = %self.endpoint, "manual reconnect requested");
        self.auto_reconnect = true;
        self.reconnect_attempt = 0;
        self.start_attempt(ConnectionEvent::ConnectRequested);
    }

    /// Owner teardown: closes the connection and stops automatic recovery.
    ///
    /// Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.auto_reconnect = false;
        self.cancel_pending_retry();
        self.close_active();
        self.apply(ConnectionEvent::TornDown);
    }

    /// Registers a listener for state changes and snapshot updates.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(ConnectionState, Option<&MetricsSnapshot>) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    /// Shared handle to the listener registry.
    #[must_use]
    pub fn subscribers(&self) -> SubscriberRegistry {
        self.subscribers.clone()
    }

    /// Feeds an event observed on connection `id`.
    pub fn handle_transport_event(&mut self, id: ConnectionId, event: TransportEvent) {
        if self.active != Some(id) {
            debug!(connection_id = %id, ?event, "ignoring event from abandoned connection");
            return;
        }

        match event {
            TransportEvent::Opened => {
                if self.apply(ConnectionEvent::HandshakeSucceeded) {
                    self.reconnect_attempt = 0;
                    info!(connection_id = %id, endpoint = %self.endpoint, "stream connected");
                }
            }
            TransportEvent::Text(text) => self.handle_frame(id, decode_text(&text)),
            TransportEvent::Binary(bytes) => self.handle_frame(id, decode_binary(&bytes)),
            TransportEvent::Closed => {
                let event = if self.machine.state() == ConnectionState::Connected {
                    ConnectionEvent::ClosedCleanly
                } else {
                    ConnectionEvent::HandshakeFailed
                };
                info!(connection_id = %id, "stream closed by remote");
                self.connection_lost(id, event);
            }
            TransportEvent::Failed(err) => {
                let event = if self.machine.state() == ConnectionState::Connected {
                    ConnectionEvent::TransportFailed
                } else {
                    ConnectionEvent::HandshakeFailed
                };
                warn!(connection_id = %id, error = %err, "stream connection failed");
                self.connection_lost(id, event);
            }
        }
    }

    /// Feeds expiry of the retry timer `token`.
    pub fn handle_retry_due(&mut self, token: RetryToken) {
        if self.pending_retry != Some(token) {
            debug!(token = token.as_u64(), "ignoring stale retry timer");
            return;
        }
        self.pending_retry = None;
        self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
        self.start_attempt(ConnectionEvent::RetryStarted);
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// True while the stream is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.machine.state() == ConnectionState::Connected
    }

    /// Most recent snapshot, if any arrived.
    #[must_use]
    pub const fn latest_snapshot(&self) -> Option<&MetricsSnapshot> {
        self.latest.as_ref()
    }

    /// Consecutive automatic attempts since the last success or manual reconnect.
    #[must_use]
    pub const fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    /// True if a retry timer is armed.
    #[must_use]
    pub const fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// The connection currently owned by the client.
    #[must_use]
    pub const fn active_connection(&self) -> Option<ConnectionId> {
        self.active
    }

    /// The endpoint this client connects to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Backoff policy in use.
    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// The transport seam.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The scheduler seam.
    #[must_use]
    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub(crate) fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    fn start_attempt(&mut self, event: ConnectionEvent) {
        self.cancel_pending_retry();
        self.close_active();

        let id = self.last_connection.next();
        self.last_connection = id;
        self.active = Some(id);

        if !self.apply(event) {
            self.active = None;
            return;
        }

        debug!(connection_id = %id, attempt = self.reconnect_attempt, "opening stream");
        if let Err(err) = self.transport.open(&self.endpoint, id) {
            warn!(connection_id = %id, error = %err, "failed to start connection");
            self.connection_lost(id, ConnectionEvent::HandshakeFailed);
        }
    }

    fn connection_lost(&mut self, id: ConnectionId, event: ConnectionEvent) {
        self.active = None;
        self.transport.close(id);
        if self.apply(event) {
            self.schedule_retry();
        }
    }

    fn schedule_retry(&mut self) {
        if !self.auto_reconnect {
            return;
        }

        if !self.policy.should_retry(self.reconnect_attempt) {
            warn!(
                attempts = self.reconnect_attempt,
                endpoint = %self.endpoint,
                "reconnect attempts exhausted; waiting for manual reconnect"
            );
            self.apply(ConnectionEvent::RetriesExhausted);
            return;
        }

        if !self.apply(ConnectionEvent::RetryScheduled) {
            return;
        }

        let delay = self.policy.delay_for_attempt(self.reconnect_attempt);
        let token = self.last_token.next();
        self.last_token = token;
        self.pending_retry = Some(token);
        self.scheduler.schedule(token, delay);
        info!(
            attempt = self.reconnect_attempt + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnect scheduled"
        );
    }

    fn cancel_pending_retry(&mut self) {
        if let Some(token) = self.pending_retry.take() {
            debug!(token = token.as_u64(), "cancelling pending retry");
            self.scheduler.cancel(token);
        }
    }

    fn close_active(&mut self) {
        if let Some(id) = self.active.take() {
            debug!(connection_id = %id, "closing stream connection");
            self.transport.close(id);
        }
    }

    fn handle_frame(&mut self, id: ConnectionId, decoded: Result<Inbound, DecodeError>) {
        match decoded {
            Ok(Inbound::MetricsUpdate(snapshot)) => {
                if self.machine.state() != ConnectionState::Connected {
                    debug!(connection_id = %id, state = %self.machine.state(), "dropping snapshot outside a live connection");
                    return;
                }
                self.latest = Some(snapshot);
                self.notify();
            }
            Ok(Inbound::Ignored { message_type }) => {
                debug!(connection_id = %id, %message_type, "ignoring unrecognized message type");
            }
            Err(err) => {
                warn!(connection_id = %id, error = %err, "dropping malformed stream message");
            }
        }
    }

    /// Applies `event`, notifying listeners if the state changed.
    fn apply(&mut self, event: ConnectionEvent) -> bool {
        match self.machine.apply(event) {
            Ok(transition) => {
                if transition.changed() {
                    debug!(from = %transition.from, to = %transition.to, "connection state changed");
                    self.notify();
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "rejected connection transition");
                false
            }
        }
    }

    fn notify(&self) {
        self.subscribers.notify(self.machine.state(), self.latest.as_ref());
    }
}

impl<T: Transport, S: RetryScheduler> Drop for StreamClient<T, S> {
    fn drop(&mut self) {
        self.auto_reconnect = false;
        self.cancel_pending_retry();
        self.close_active();
    }
}
