//! Connection and subscription layer.
//!
//! One `ConnectionManager` owns one `Transport` and multiplexes every
//! "watch this file at this revision pair" subscription over it:
//!
//! ```text
//!   subscribe(identity, cb) ──► interests[key] = identity ──► {"action":"watch",..}
//!                               subscribers[key] += cb
//!
//!   {"type":"fileUpdate","absolutePath":P}
//!        └──► every interest with filepath == P ──► its subscribers
//! ```
//!
//! State machine: Disconnected → Connecting → Connected → Disconnected.
//! Abnormal closes schedule a reconnect with exponential backoff; on every
//! successful open all interests are re-sent.

pub mod backoff;
pub mod ws;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::identity::FileIdentity;
use crate::listeners::{ListenerHandle, Listeners, Snapshot};
use crate::protocol::{ClientRequest, ServerMessage, UpdatePayload, CLOSE_NORMAL};

pub use backoff::{Backoff, BackoffPolicy, ReconnectTimer};
pub use ws::WsTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Something that happened on the transport. `attempt` is the value passed to
/// `Transport::open` for the connection that produced the event.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened { attempt: u64 },
    Message { attempt: u64, text: String },
    Closed { attempt: u64, code: u16 },
}

impl TransportEvent {
    pub fn attempt(&self) -> u64 {
        match self {
            TransportEvent::Opened { attempt }
            | TransportEvent::Message { attempt, .. }
            | TransportEvent::Closed { attempt, .. } => *attempt,
        }
    }
}

/// A message-based connection to the watch server.
///
/// Implementations report progress asynchronously as `TransportEvent`s; the
/// manager never blocks on them.
pub trait Transport {
    /// Begin opening a new connection, replacing any previous one
    fn open(&mut self, attempt: u64) -> anyhow::Result<()>;
    fn send(&mut self, text: String) -> anyhow::Result<()>;
    fn close(&mut self, code: u16);
}

/// Inbound event delivered to a subscriber, addressed by the subscriber's identity
#[derive(Debug, Clone, PartialEq)]
pub enum FileEvent {
    Updated {
        identity: FileIdentity,
        payload: UpdatePayload,
    },
    Removed {
        identity: FileIdentity,
    },
}

impl FileEvent {
    pub fn identity(&self) -> &FileIdentity {
        match self {
            FileEvent::Updated { identity, .. } | FileEvent::Removed { identity } => identity,
        }
    }
}

/// Manager-wide subscription id; never reused by the same manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Inner {
    transport: Box<dyn Transport>,
    status: ConnectionStatus,
    attempt: u64,
    shut_down: bool,
    interests: BTreeMap<String, FileIdentity>,
    subscribers: HashMap<String, Listeners<FileEvent>>,
    /// id -> (key, handle in that key's registry)
    subscriptions: HashMap<SubscriberId, (String, ListenerHandle)>,
    next_subscriber: u64,
    backoff: Backoff,
    reconnect: Option<ReconnectTimer>,
    connection_listeners: Listeners<bool>,
}

/// Callbacks collected under the borrow, invoked after it is released
enum Dispatch {
    Status(bool, Snapshot<bool>),
    Files(Vec<(FileEvent, Snapshot<FileEvent>)>),
}

impl Dispatch {
    fn run(self) {
        match self {
            Dispatch::Status(connected, listeners) => listeners.dispatch(&connected),
            Dispatch::Files(deliveries) => {
                for (event, subscribers) in deliveries {
                    subscribers.dispatch(&event);
                }
            }
        }
    }
}

impl Inner {
    fn send(&mut self, request: &ClientRequest) {
        let text = match serde_json::to_string(request) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode request");
                return;
            }
        };
        if let Err(e) = self.transport.send(text) {
            tracing::warn!(error = %e, "send failed");
        }
    }

    fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    fn start_attempt(&mut self, now: Instant) {
        self.attempt += 1;
        self.status = ConnectionStatus::Connecting;
        tracing::info!(attempt = self.attempt, "connecting");
        if let Err(e) = self.transport.open(self.attempt) {
            tracing::warn!(attempt = self.attempt, error = %e, "transport failed to start");
            self.status = ConnectionStatus::Disconnected;
            self.schedule_reconnect(now);
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        let delay = self.backoff.next_delay();
        tracing::info!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        self.reconnect = Some(ReconnectTimer::schedule(now, delay));
    }

    fn resubscribe_all(&mut self) {
        let requests: Vec<ClientRequest> = self
            .interests
            .values()
            .map(FileIdentity::to_watch_request)
            .collect();
        tracing::debug!(count = requests.len(), "resubscribing");
        for request in &requests {
            self.send(request);
        }
    }

    fn route(&self, message: &ServerMessage) -> Vec<(FileEvent, Snapshot<FileEvent>)> {
        let path = message.absolute_path();
        self.interests
            .values()
            .filter(|identity| identity.filepath() == path)
            .filter_map(|identity| {
                let subscribers = self.subscribers.get(identity.key())?;
                let event = match message {
                    ServerMessage::FileUpdate(update) => FileEvent::Updated {
                        identity: identity.clone(),
                        payload: UpdatePayload::from(update),
                    },
                    ServerMessage::FileRemoved { .. } => FileEvent::Removed {
                        identity: identity.clone(),
                    },
                };
                Some((event, subscribers.snapshot()))
            })
            .collect()
    }
}

/// Shared handle to the connection state. Clones refer to the same manager.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Rc<RefCell<Inner>>,
}

impl ConnectionManager {
    pub fn new(transport: Box<dyn Transport>, policy: BackoffPolicy) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                transport,
                status: ConnectionStatus::Disconnected,
                attempt: 0,
                shut_down: false,
                interests: BTreeMap::new(),
                subscribers: HashMap::new(),
                subscriptions: HashMap::new(),
                next_subscriber: 0,
                backoff: Backoff::new(policy),
                reconnect: None,
                connection_listeners: Listeners::new(),
            })),
        }
    }

    // ── Connection lifecycle ──

    /// Open the transport unless a connection is already being made or up.
    /// A pending reconnect timer is cancelled.
    pub fn connect(&self) {
        self.connect_at(Instant::now());
    }

    fn connect_at(&self, now: Instant) {
        let mut inner = self.inner.borrow_mut();
        if inner.shut_down {
            tracing::warn!("connect ignored: manager was disconnected");
            return;
        }
        if inner.status != ConnectionStatus::Disconnected {
            return;
        }
        inner.reconnect = None;
        inner.start_attempt(now);
    }

    /// Close with a normal-closure code and drop all state. The manager is
    /// unusable afterwards.
    pub fn disconnect(&self) {
        let dispatch = {
            let mut inner = self.inner.borrow_mut();
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            inner.reconnect = None;
            let was_connected = inner.is_connected();
            if inner.status != ConnectionStatus::Disconnected {
                inner.transport.close(CLOSE_NORMAL);
            }
            inner.status = ConnectionStatus::Disconnected;
            inner.interests.clear();
            inner.subscribers.clear();
            inner.subscriptions.clear();
            let listeners = inner.connection_listeners.snapshot();
            inner.connection_listeners.clear();
            tracing::info!("disconnected");
            was_connected.then_some(Dispatch::Status(false, listeners))
        };
        if let Some(dispatch) = dispatch {
            dispatch.run();
        }
    }

    pub fn handle_event(&self, event: TransportEvent) {
        self.handle_event_at(event, Instant::now());
    }

    fn handle_event_at(&self, event: TransportEvent, now: Instant) {
        let dispatch = {
            let mut inner = self.inner.borrow_mut();
            if inner.shut_down {
                return;
            }
            if event.attempt() != inner.attempt {
                tracing::debug!(
                    event_attempt = event.attempt(),
                    current = inner.attempt,
                    "ignoring event from superseded connection"
                );
                return;
            }
            match event {
                TransportEvent::Opened { .. } => {
                    if inner.status != ConnectionStatus::Connecting {
                        return;
                    }
                    inner.status = ConnectionStatus::Connected;
                    inner.backoff.reset();
                    inner.reconnect = None;
                    tracing::info!(attempt = inner.attempt, "connected");
                    inner.resubscribe_all();
                    Some(Dispatch::Status(true, inner.connection_listeners.snapshot()))
                }
                TransportEvent::Closed { code, .. } => {
                    if inner.status == ConnectionStatus::Disconnected {
                        return;
                    }
                    let was_connected = inner.is_connected();
                    inner.status = ConnectionStatus::Disconnected;
                    if code == CLOSE_NORMAL {
                        inner.reconnect = None;
                        tracing::info!("connection closed by server");
                    } else {
                        tracing::warn!(code, "connection lost");
                        inner.schedule_reconnect(now);
                    }
                    was_connected
                        .then(|| Dispatch::Status(false, inner.connection_listeners.snapshot()))
                }
                TransportEvent::Message { text, .. } => match ServerMessage::parse(&text) {
                    Ok(message) => {
                        let deliveries = inner.route(&message);
                        if deliveries.is_empty() {
                            tracing::debug!(path = message.absolute_path(), "no subscriber for message");
                        }
                        Some(Dispatch::Files(deliveries))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed message");
                        None
                    }
                },
            }
        };
        if let Some(dispatch) = dispatch {
            dispatch.run();
        }
    }

    /// Fire the reconnect timer if it is due
    pub fn poll_timers(&self, now: Instant) {
        let due = {
            let mut inner = self.inner.borrow_mut();
            match inner.reconnect {
                Some(timer) if timer.is_due(now) => {
                    inner.reconnect = None;
                    true
                }
                _ => false,
            }
        };
        if due {
            self.connect_at(now);
        }
    }

    // ── Subscriptions ──

    /// Register `callback` for `identity`. The first subscriber of a key adds
    /// an interest and sends a watch (deferred until connected). A later
    /// subscriber while connected re-requests the key so it receives the
    /// current state too. After `disconnect` the returned id is inert.
    pub fn subscribe(
        &self,
        identity: &FileIdentity,
        callback: impl Fn(&FileEvent) + 'static,
    ) -> SubscriberId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriberId(inner.next_subscriber);
        inner.next_subscriber += 1;
        if inner.shut_down {
            tracing::warn!(path = identity.filepath(), "subscribe ignored: manager was disconnected");
            return id;
        }

        let key = identity.key().to_string();
        let subscribers = inner.subscribers.entry(key.clone()).or_default();
        let handle = subscribers.add(callback);
        let count = subscribers.len();
        inner.subscriptions.insert(id, (key.clone(), handle));

        if !inner.interests.contains_key(&key) {
            inner.interests.insert(key, identity.clone());
            if inner.is_connected() {
                inner.send(&identity.to_watch_request());
            } else {
                tracing::debug!(path = identity.filepath(), "watch deferred until connected");
            }
        } else {
            tracing::debug!(path = identity.filepath(), subscribers = count, "additional subscriber");
            if inner.is_connected() {
                inner.send(&identity.to_watch_request());
            }
        }
        id
    }

    /// Remove one subscriber. Ids issued for another identity are ignored.
    /// The last subscriber of a key takes the interest with it; the unwatch
    /// is only sent while connected.
    pub fn unsubscribe(&self, identity: &FileIdentity, id: SubscriberId) {
        let mut inner = self.inner.borrow_mut();
        let key = identity.key();
        let handle = match inner.subscriptions.get(&id) {
            Some((owner, handle)) if owner == key => *handle,
            Some(_) => {
                tracing::debug!(path = identity.filepath(), ?id, "unsubscribe with id of another key");
                return;
            }
            None => return,
        };
        inner.subscriptions.remove(&id);

        let Some(subscribers) = inner.subscribers.get_mut(key) else {
            return;
        };
        subscribers.remove(handle);
        if !subscribers.is_empty() {
            return;
        }
        inner.subscribers.remove(key);
        if inner.interests.remove(key).is_some() && inner.is_connected() {
            inner.send(&identity.to_unwatch_request());
        }
    }

    /// Re-send watch requests for every interest so the server re-pushes state
    pub fn refresh(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.is_connected() {
            inner.resubscribe_all();
        }
    }

    pub fn refresh_for_key(&self, identity: &FileIdentity) {
        let mut inner = self.inner.borrow_mut();
        if inner.is_connected() && inner.interests.contains_key(identity.key()) {
            inner.send(&identity.to_watch_request());
        }
    }

    // ── Status observers ──

    /// The callback runs immediately with the current connected flag, then on
    /// every change of it.
    pub fn add_connection_listener(&self, callback: impl Fn(&bool) + 'static) -> ListenerHandle {
        let (handle, connected, current) = {
            let mut inner = self.inner.borrow_mut();
            let handle = inner.connection_listeners.add(callback);
            let current = inner.connection_listeners.get(handle);
            (handle, inner.is_connected(), current)
        };
        if let Some(current) = current {
            current.dispatch(&connected);
        }
        handle
    }

    pub fn remove_connection_listener(&self, handle: ListenerHandle) {
        self.inner.borrow_mut().connection_listeners.remove(handle);
    }

    // ── Accessors ──

    pub fn status(&self) -> ConnectionStatus {
        self.inner.borrow().status
    }

    pub fn is_connected(&self) -> bool {
        self.inner.borrow().is_connected()
    }

    /// Keys of all current interests, in resubscription order
    pub fn interest_keys(&self) -> Vec<String> {
        self.inner.borrow().interests.keys().cloned().collect()
    }

    pub fn subscriber_count(&self, identity: &FileIdentity) -> usize {
        self.inner
            .borrow()
            .subscribers
            .get(identity.key())
            .map_or(0, Listeners::len)
    }

    /// When the pending reconnect fires, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.borrow().reconnect.map(|t| t.deadline)
    }

    pub fn reconnect_in(&self, now: Instant) -> Option<Duration> {
        self.inner.borrow().reconnect.map(|t| t.remaining(now))
    }

    /// Delay the pending reconnect was scheduled with
    pub fn pending_reconnect_delay(&self) -> Option<Duration> {
        self.inner.borrow().reconnect.map(|t| t.delay)
    }
}
