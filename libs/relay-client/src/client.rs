//! Client handle and the background driver that owns the socket.
//!
//! [`RelayClient`] talks to the driver task over an unbounded command channel.
//! Decoded server events arrive on the bounded receiver returned by
//! [`RelayClient::spawn`]; connection state is published on a watch channel.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hyperlocal_common::{ClientMessage, ServerEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ClientError, TransportError};
use crate::policy::ReconnectPolicy;
use crate::queue::{OutboundQueue, OverflowPolicy, DEFAULT_QUEUE_CAPACITY};
use crate::state::{ConnectionState, Reliability, Step};
use crate::transport::{Connector, Transport, TransportEvent, WsConnector};

const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub policy: ReconnectPolicy,
    /// Sends held while disconnected.
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
    /// Buffered server events; further events are dropped while it is full.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_overflow_policy(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

enum Command {
    Send(ClientMessage),
    Connect,
    Disconnect,
    Shutdown,
}

pub struct RelayClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl RelayClient {
    /// Start the driver without connecting. Call [`connect`](Self::connect) to dial.
    pub fn spawn<C: Connector>(
        connector: C,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));

        let driver = Driver {
            connector: Arc::new(connector),
            machine: Reliability::new(config.policy),
            queue: OutboundQueue::new(config.queue_capacity, config.overflow),
            transport: None,
            dial: None,
            timer: None,
            state: state_tx,
            events: event_tx,
        };
        let task = tokio::spawn(driver.run(command_rx));

        let client = Self {
            commands: command_tx,
            state: state_rx,
            task: Some(task),
        };
        (client, event_rx)
    }

    /// Spawn over a WebSocket to `url` and start connecting.
    pub fn connect_ws(
        url: impl Into<String>,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (client, events) = Self::spawn(WsConnector::new(url), config);
        // The driver was just spawned, so the channel is open.
        let _ = client.command(Command::Connect);
        (client, events)
    }

    /// Send now if connected, otherwise queue until the next open.
    pub fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        if self.state() == ConnectionState::Fallback {
            return Err(ClientError::Fallback);
        }
        self.command(Command::Send(message))
    }

    /// Dial, clearing a previous manual disconnect or fallback.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.command(Command::Connect)
    }

    /// Close the socket and stop reconnecting until [`connect`](Self::connect).
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.command(Command::Disconnect)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// True when the application should poll REST instead.
    pub fn is_fallback(&self) -> bool {
        self.state() == ConnectionState::Fallback
    }

    /// Close the socket and wait for the driver to exit.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("state", &self.state())
            .field("running", &self.task.is_some())
            .finish()
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

type Dial<T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send>>;

#[derive(Debug, Clone, Copy)]
enum Timer {
    Reconnect,
    Fallback,
}

struct Driver<C: Connector> {
    connector: Arc<C>,
    machine: Reliability,
    queue: OutboundQueue,
    transport: Option<C::Transport>,
    dial: Option<Dial<C::Transport>>,
    timer: Option<(Instant, Timer)>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<ServerEvent>,
}

impl<C: Connector> Driver<C> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("relay client driver started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Send(message)) => self.enqueue(message).await,
                    Some(Command::Connect) => {
                        let step = self.machine.connect();
                        self.apply(step).await;
                    }
                    Some(Command::Disconnect) => self.disconnect().await,
                    Some(Command::Shutdown) | None => {
                        self.disconnect().await;
                        break;
                    }
                },
                result = dial_result(&mut self.dial) => {
                    self.dial = None;
                    self.on_dial(result).await;
                }
                event = next_event(&mut self.transport) => self.on_transport_event(event).await,
                timer = timer_fired(self.timer) => {
                    self.timer = None;
                    let step = match timer {
                        Timer::Reconnect => self.machine.reconnect_due(),
                        Timer::Fallback => self.machine.fallback_elapsed(),
                    };
                    self.apply(step).await;
                }
            }
        }
        debug!("relay client driver exited");
    }

    async fn apply(&mut self, mut step: Step) {
        loop {
            match step {
                Step::Idle => {}
                Step::Dial => self.start_dial(),
                Step::Flush => {
                    if let Err(err) = self.flush().await {
                        warn!(error = %err, "relay send failed; treating socket as closed");
                        self.transport = None;
                        step = self.machine.closed(false);
                        continue;
                    }
                }
                Step::Retry { attempt, delay } => {
                    info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "scheduling relay reconnect"
                    );
                    self.timer = Some((Instant::now() + delay, Timer::Reconnect));
                }
                Step::FallbackAfter(delay) => {
                    self.timer = Some((Instant::now() + delay, Timer::Fallback));
                }
                Step::Fallback => {
                    self.timer = None;
                    warn!(
                        queued = self.queue.len(),
                        "relay unreachable; falling back to REST polling"
                    );
                }
            }
            break;
        }
        self.publish_state();
    }

    fn start_dial(&mut self) {
        self.timer = None;
        let connector = Arc::clone(&self.connector);
        let timeout = self.machine.policy().connect_timeout;
        self.dial = Some(Box::pin(async move {
            match tokio::time::timeout(timeout, connector.connect()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout)),
            }
        }));
    }

    async fn on_dial(&mut self, result: Result<C::Transport, TransportError>) {
        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                info!("relay connected");
                let step = self.machine.opened();
                self.apply(step).await;
            }
            Err(err) => {
                warn!(error = %err, attempt = self.machine.attempts(), "relay connect failed");
                let step = self.machine.connect_failed();
                self.apply(step).await;
            }
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Text(text) => self.forward(&text),
            TransportEvent::Closed { clean } => {
                self.transport = None;
                info!(clean, "relay socket closed");
                let step = self.machine.closed(clean);
                self.apply(step).await;
            }
            TransportEvent::Failed(err) => {
                self.transport = None;
                warn!(error = %err, "relay socket failed");
                let step = self.machine.closed(false);
                self.apply(step).await;
            }
        }
    }

    fn forward(&self, text: &str) {
        let event = match ServerEvent::decode(text) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "dropping undecodable relay event");
                return;
            }
        };
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events.try_send(event) {
            warn!(event = %event.event, "event receiver is full; dropping event");
        }
    }

    async fn enqueue(&mut self, message: ClientMessage) {
        if let Some(dropped) = self.queue.push(message) {
            warn!(
                message_type = dropped.type_name(),
                dropped_total = self.queue.dropped(),
                "outbound queue full; message dropped"
            );
        }
        if self.machine.state() == ConnectionState::Connected {
            self.apply(Step::Flush).await;
        }
    }

    /// Write queued messages in order. A failed write leaves that message at
    /// the head of the queue.
    async fn flush(&mut self) -> Result<(), TransportError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };
        while let Some(message) = self.queue.pop_front() {
            let text = match message.encode() {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, message_type = message.type_name(), "cannot encode message");
                    continue;
                }
            };
            if let Err(err) = transport.send(text).await {
                self.queue.requeue_front(message);
                return Err(err);
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.dial = None;
        self.timer = None;
        let step = self.machine.disconnect();
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.apply(step).await;
    }

    fn publish_state(&self) {
        let next = self.machine.state();
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            debug!(state = %next, "relay client state changed");
        }
    }
}

async fn dial_result<T>(dial: &mut Option<Dial<T>>) -> Result<T, TransportError> {
    match dial {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_event<T: Transport>(transport: &mut Option<T>) -> TransportEvent {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn timer_fired(timer: Option<(Instant, Timer)>) -> Timer {
    match timer {
        Some((deadline, timer)) => {
            tokio::time::sleep_until(deadline).await;
            timer
        }
        None => std::future::pending().await,
    }
}
