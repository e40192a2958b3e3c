//! Stream runtime worker.
//!
//! One dedicated thread owns the [`StreamClient`]. Handles talk to it through
//! a bounded command channel; reader threads report transport events through a
//! second channel. The armed retry deadline bounds every `select!` wait, so
//! retries fire on time without a separate timer thread.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::connection::ConnectionState;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::stream::{
    ConnectionId, MetricsSnapshot, RetryScheduler, RetryToken, StreamClient, SubscriberRegistry, Subscription,
    Transport, TransportEvent,
};

use super::connector::{Connection, Connector, Frame};

type EventMsg = (ConnectionId, TransportEvent);

/// Commands issued by listeners on the worker thread. They bypass the bounded
/// channel, which only the worker drains.
type InlineQueue = Arc<Mutex<VecDeque<Command>>>;

/// Point-in-time view of the client owned by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStatus {
    /// Connection state.
    pub state: ConnectionState,
    /// Latest snapshot received.
    pub snapshot: Option<MetricsSnapshot>,
    /// Consecutive automatic attempts since the last success.
    pub reconnect_attempt: u32,
    /// True if a retry is armed.
    pub retry_pending: bool,
}

#[derive(Debug)]
enum Command {
    Connect,
    Reconnect,
    Disconnect,
    Status { reply: Sender<StreamStatus> },
    Shutdown,
}

/// Entry point for running a stream client on its own thread.
#[derive(Debug)]
pub struct StreamRuntime;

impl StreamRuntime {
    /// Validates `config`, spawns the worker and starts connecting.
    pub fn start<C: Connector>(config: &StreamConfig, connector: C) -> ClientResult<StreamHandle> {
        config.validate()?;

        let (command_tx, command_rx) = bounded::<Command>(config.command_queue_capacity.max(1));
        let (event_tx, event_rx) = bounded::<EventMsg>(config.event_queue_capacity.max(1));

        let transport = ThreadTransport::new(Arc::new(connector), event_tx);
        let client = StreamClient::new(
            config.url.clone(),
            config.reconnect.clone(),
            transport,
            DeadlineScheduler::default(),
        );
        let subscribers = client.subscribers();
        let idle = config.poll_interval();
        let inline = InlineQueue::default();
        let worker_inline = Arc::clone(&inline);

        let join = thread::Builder::new()
            .name("eventara-stream".to_string())
            .spawn(move || worker_loop(client, &command_rx, &event_rx, &worker_inline, idle))
            .map_err(|e| ClientError::internal(format!("failed to spawn stream worker: {e}")))?;

        let worker = join.thread().id();
        Ok(StreamHandle {
            shared: Arc::new(Shared {
                commands: command_tx,
                inline,
                subscribers,
                worker,
                join: Mutex::new(Some(join)),
            }),
        })
    }
}

#[derive(Debug)]
struct Shared {
    commands: Sender<Command>,
    inline: InlineQueue,
    subscribers: SubscriberRegistry,
    worker: ThreadId,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Do not join: the last handle may be dropped from inside a listener.
        // The worker also exits once the command channel closes.
        let _ = self.commands.try_send(Command::Shutdown);
    }
}

/// Cloneable handle to a running stream worker.
///
/// The worker shuts down when [`shutdown`](Self::shutdown) is called or the
/// last handle is dropped.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    shared: Arc<Shared>,
}

impl StreamHandle {
    /// Connects unless already connecting or connected.
    pub fn connect(&self) -> ClientResult<()> {
        self.send(Command::Connect)
    }

    /// Manual override: drops the current connection, resets backoff and
    /// connects immediately.
    pub fn reconnect(&self) -> ClientResult<()> {
        self.send(Command::Reconnect)
    }

    /// Closes the connection and suppresses automatic reconnects.
    pub fn disconnect(&self) -> ClientResult<()> {
        self.send(Command::Disconnect)
    }

    /// Zero-argument reconnect trigger for UI controls.
    #[must_use]
    pub fn reconnect_trigger(&self) -> impl Fn() + Send + Sync + 'static {
        let handle = self.clone();
        move || {
            if let Err(err) = handle.reconnect() {
                debug!(error = %err, "reconnect trigger after shutdown");
            }
        }
    }

    /// Registers a listener. Listeners run on the worker thread.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(ConnectionState, Option<&MetricsSnapshot>) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(listener)
    }

    /// Asks the worker for its current status.
    ///
    /// Must not be called from a listener; the worker is busy delivering it.
    pub fn status(&self) -> ClientResult<StreamStatus> {
        if self.on_worker() {
            return Err(ClientError::internal("status() called from a stream listener"));
        }
        let (reply_tx, reply_rx) = bounded::<StreamStatus>(1);
        self.send(Command::Status { reply: reply_tx })?;
        reply_rx.recv().map_err(|_| ClientError::RuntimeClosed)
    }

    /// Current connection state.
    pub fn state(&self) -> ClientResult<ConnectionState> {
        self.status().map(|s| s.state)
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Called from a listener it only signals the worker.
    pub fn shutdown(&self) {
        if self.on_worker() {
            self.push_inline(Command::Shutdown);
            return;
        }
        let _ = self.shared.commands.send(Command::Shutdown);
        let handle = self
            .shared
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("stream worker panicked");
            }
        }
    }

    fn send(&self, cmd: Command) -> ClientResult<()> {
        if self.on_worker() {
            self.push_inline(cmd);
            return Ok(());
        }
        self.shared.commands.send(cmd).map_err(|_| ClientError::RuntimeClosed)
    }

    fn on_worker(&self) -> bool {
        thread::current().id() == self.shared.worker
    }

    fn push_inline(&self, cmd: Command) {
        self.shared
            .inline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(cmd);
    }
}

type WorkerClient<C> = StreamClient<ThreadTransport<C>, DeadlineScheduler>;

fn worker_loop<C: Connector>(
    mut client: WorkerClient<C>,
    command_rx: &Receiver<Command>,
    event_rx: &Receiver<EventMsg>,
    inline: &InlineQueue,
    idle: Duration,
) {
    info!(endpoint = client.endpoint(), "stream worker started");
    client.connect();

    'run: loop {
        loop {
            let next = inline.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            let Some(cmd) = next else { break };
            debug!(command = ?cmd, "applying command issued by a listener");
            if !apply(&mut client, cmd) {
                break 'run;
            }
        }

        let wait = client.scheduler().time_until_due(Instant::now()).unwrap_or(idle);

        select! {
            recv(command_rx) -> msg => {
                match msg {
                    Ok(cmd) => {
                        if !apply(&mut client, cmd) {
                            break 'run;
                        }
                    }
                    Err(_) => break 'run,
                }
            }
            recv(event_rx) -> msg => {
                // The transport owns a sender, so the channel never closes here.
                if let Ok((id, event)) = msg {
                    client.handle_transport_event(id, event);
                }
            }
            default(wait) => {}
        }

        if let Some(token) = client.scheduler_mut().take_due(Instant::now()) {
            client.handle_retry_due(token);
        }
    }

    client.disconnect();
    info!("stream worker stopped");
}

/// Applies one command; false once the worker should stop.
fn apply<C: Connector>(client: &mut WorkerClient<C>, cmd: Command) -> bool {
    match cmd {
        Command::Connect => client.connect(),
        Command::Reconnect => client.reconnect(),
        Command::Disconnect => client.disconnect(),
        Command::Status { reply } => {
            let _ = reply.send(StreamStatus {
                state: client.state(),
                snapshot: client.latest_snapshot().cloned(),
                reconnect_attempt: client.reconnect_attempt(),
                retry_pending: client.has_pending_retry(),
            });
        }
        Command::Shutdown => return false,
    }
    true
}

/// Retry timer driven by the worker's `select!` timeout.
#[derive(Debug, Default)]
pub(crate) struct DeadlineScheduler {
    pending: Option<(RetryToken, Instant)>,
}

impl DeadlineScheduler {
    pub(crate) fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|(_, deadline)| deadline.saturating_duration_since(now))
    }

    pub(crate) fn take_due(&mut self, now: Instant) -> Option<RetryToken> {
        match self.pending {
            Some((token, deadline)) if deadline <= now => {
                self.pending = None;
                Some(token)
            }
            _ => None,
        }
    }
}

impl RetryScheduler for DeadlineScheduler {
    fn schedule(&mut self, token: RetryToken, delay: Duration) {
        self.pending = Some((token, Instant::now() + delay));
    }

    fn cancel(&mut self, token: RetryToken) {
        if matches!(self.pending, Some((t, _)) if t == token) {
            self.pending = None;
        }
    }
}

/// Transport that gives every connection its own reader thread.
pub(crate) struct ThreadTransport<C> {
    connector: Arc<C>,
    events: Sender<EventMsg>,
    live: HashMap<ConnectionId, Arc<AtomicBool>>,
}

impl<C> std::fmt::Debug for ThreadTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadTransport")
            .field("live", &self.live.len())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ThreadTransport<C> {
    pub(crate) fn new(connector: Arc<C>, events: Sender<EventMsg>) -> Self {
        Self {
            connector,
            events,
            live: HashMap::new(),
        }
    }
}

impl<C: Connector> Transport for ThreadTransport<C> {
    fn open(&mut self, endpoint: &str, id: ConnectionId) -> Result<(), TransportError> {
        let closed = Arc::new(AtomicBool::new(false));
        let connector = Arc::clone(&self.connector);
        let events = self.events.clone();
        let endpoint = endpoint.to_string();
        let flag = Arc::clone(&closed);

        thread::Builder::new()
            .name(format!("eventara-{id}"))
            .spawn(move || reader_loop(connector.as_ref(), &endpoint, id, &flag, &events))
            .map_err(|e| TransportError::Io {
                message: format!("failed to spawn reader thread: {e}"),
            })?;

        self.live.insert(id, closed);
        Ok(())
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(flag) = self.live.remove(&id) {
            flag.store(true, Ordering::Release);
        }
    }
}

impl<C> Drop for ThreadTransport<C> {
    fn drop(&mut self) {
        for flag in self.live.values() {
            flag.store(true, Ordering::Release);
        }
    }
}

fn reader_loop<C: Connector>(
    connector: &C,
    endpoint: &str,
    id: ConnectionId,
    closed: &AtomicBool,
    events: &Sender<EventMsg>,
) {
    let mut conn = match connector.connect(endpoint) {
        Ok(conn) => conn,
        Err(err) => {
            if !closed.load(Ordering::Acquire) {
                let _ = events.send((id, TransportEvent::Failed(err)));
            }
            return;
        }
    };

    if closed.load(Ordering::Acquire) || events.send((id, TransportEvent::Opened)).is_err() {
        conn.close();
        return;
    }

    loop {
        if closed.load(Ordering::Acquire) {
            debug!(connection_id = %id, "reader abandoned");
            conn.close();
            return;
        }

        let (event, last) = match conn.recv() {
            Ok(None) => continue,
            Ok(Some(Frame::Text(text))) => (TransportEvent::Text(text), false),
            Ok(Some(Frame::Binary(bytes))) => (TransportEvent::Binary(bytes), false),
            Ok(Some(Frame::Closed)) => (TransportEvent::Closed, true),
            Err(err) => (TransportEvent::Failed(err), true),
        };

        if events.send((id, event)).is_err() || last {
            conn.close();
            return;
        }
    }
}
