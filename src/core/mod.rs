use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use log::*;
use tokio::select;
use tokio::sync::{mpsc::UnboundedReceiver, mpsc::UnboundedSender, watch};

use crate::client::{SessionConfig, SessionDelegate};
use crate::common::*;
use crate::error::*;
use crate::executor::Executor;
use crate::message::*;
use crate::serializer::*;
use crate::transport::*;

mod recv;
mod send;
#[cfg(test)]
mod tests;

pub use send::Request;

/// Where the session stands in its lifecycle. Only `Established` allows
/// issuing requests; `Aborted` is terminal for the connection attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    HelloSent,
    Challenged,
    Established,
    Closing,
    Aborted,
}

/// Outcome of one recv/request step of the event loop
pub(crate) enum Status {
    Ok,
    Ended(SessionEnd),
}

/// Why the connection ended
pub(crate) enum SessionEnd {
    /// A WAMP level reason uri (GOODBYE, ABORT, self abort)
    Reason(String),
    /// The transport failed
    Error(WampError),
    /// The peer closed the stream with neither a reason nor an error
    Closed,
}

impl SessionEnd {
    fn describe(&self) -> String {
        match self {
            SessionEnd::Reason(r) => r.clone(),
            SessionEnd::Error(e) => e.to_string(),
            SessionEnd::Closed => "Unknown error.".to_string(),
        }
    }
}

/// Hands out request ids for one session. Ids are session local and only
/// ever grow; the counter is pre-incremented so the first issued id is 2.
pub(crate) struct RequestIdAllocator {
    last: WampId,
}

impl RequestIdAllocator {
    pub fn new() -> Self {
        RequestIdAllocator { last: 1 }
    }

    pub fn next_id(&mut self) -> WampId {
        self.last += 1;
        self.last
    }
}

pub(crate) struct PendingCall {
    pub on_result: CallCallback,
    pub on_error: ErrorCallback,
    pub executor: Executor,
}

pub(crate) struct PendingSubscribe {
    pub topic: WampUri,
    pub handler: EventHandler,
    pub on_subscribed: SubscribeCallback,
    pub on_error: ErrorCallback,
    pub executor: Executor,
}

pub(crate) struct PendingUnsubscribe {
    pub subscription: WampId,
    pub on_done: AckCallback,
    pub on_error: ErrorCallback,
    pub executor: Executor,
}

pub(crate) struct PendingRegister {
    pub procedure: WampUri,
    pub handler: InvocationHandler,
    pub on_registered: RegisterCallback,
    pub on_error: ErrorCallback,
    pub executor: Executor,
}

pub(crate) struct PendingUnregister {
    pub registration: WampId,
    pub on_done: AckCallback,
    pub on_error: ErrorCallback,
    pub executor: Executor,
}

pub(crate) struct PendingPublish {
    pub on_published: PublishCallback,
    pub on_error: ErrorCallback,
    pub executor: Executor,
}

type SharedInvocationHandler = Arc<
    dyn Fn(
            WampDict,
            Option<WampArgs>,
            Option<WampKwArgs>,
        ) -> BoxFuture<'static, Result<Arg, WampError>>
        + Send
        + Sync,
>;

/// A live subscription as tracked by the core
pub(crate) struct SubscriptionRecord {
    pub topic: WampUri,
    pub handler: Arc<Mutex<EventHandler>>,
    pub executor: Executor,
    pub active: Arc<AtomicBool>,
}

/// A live registration as tracked by the core
pub(crate) struct RegistrationRecord {
    pub procedure: WampUri,
    pub handler: SharedInvocationHandler,
    pub executor: Executor,
    pub active: Arc<AtomicBool>,
}

/// The session core. Owns the transport, the serializer and every mutable
/// table; everything it holds is only ever touched from its event loop task.
pub struct Core {
    /// Generic transport
    sock: Box<dyn Transport + Send>,
    /// Generic serializer, bound when the transport connected
    serializer: Box<dyn SerializerImpl + Send>,

    uri: url::Url,
    realm: WampUri,
    config: SessionConfig,
    delegate: Arc<dyn SessionDelegate>,
    /// Queue the connected / session_ended hooks are delivered on
    delegate_executor: Executor,

    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    /// Present exactly while the realm is joined
    session_id: Option<WampId>,
    /// Roles the router advertised in WELCOME
    server_roles: HashSet<String>,
    request_ids: RequestIdAllocator,

    /// Channel invocation jobs and handles use to reach the event loop
    ctl_sender: UnboundedSender<Request>,
    /// Wrapped in an Option so the event loop can take ownership
    ctl_channel: Option<UnboundedReceiver<Request>>,

    pending_calls: HashMap<WampId, PendingCall>,
    pending_subscriptions: HashMap<WampId, PendingSubscribe>,
    pending_unsubscribes: HashMap<WampId, PendingUnsubscribe>,
    pending_registrations: HashMap<WampId, PendingRegister>,
    pending_unregisters: HashMap<WampId, PendingUnregister>,
    pending_publishes: HashMap<WampId, PendingPublish>,

    subscriptions: HashMap<WampId, SubscriptionRecord>,
    registrations: HashMap<WampId, RegistrationRecord>,
}

impl Core {
    /// Establishes a connection with a WAMP router
    pub(crate) async fn connect(
        uri: url::Url,
        realm: WampUri,
        config: SessionConfig,
        delegate: Arc<dyn SessionDelegate>,
        ctl_channel: (UnboundedSender<Request>, UnboundedReceiver<Request>),
        state_tx: watch::Sender<SessionState>,
    ) -> Result<Core, WampError> {
        let (sock, serializer_type) = ws::connect(&uri, &config).await?;
        Ok(Core::new(
            sock,
            serializer_type,
            uri,
            realm,
            config,
            delegate,
            ctl_channel,
            state_tx,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sock: Box<dyn Transport + Send>,
        serializer_type: SerializerType,
        uri: url::Url,
        realm: WampUri,
        config: SessionConfig,
        delegate: Arc<dyn SessionDelegate>,
        ctl_channel: (UnboundedSender<Request>, UnboundedReceiver<Request>),
        state_tx: watch::Sender<SessionState>,
    ) -> Core {
        Core {
            sock,
            serializer: new_serializer(serializer_type),
            uri,
            realm,
            config,
            delegate,
            delegate_executor: Executor::new(),
            state: SessionState::Disconnected,
            state_tx,
            session_id: None,
            server_roles: HashSet::new(),
            request_ids: RequestIdAllocator::new(),
            ctl_sender: ctl_channel.0,
            ctl_channel: Some(ctl_channel.1),
            pending_calls: HashMap::new(),
            pending_subscriptions: HashMap::new(),
            pending_unsubscribes: HashMap::new(),
            pending_registrations: HashMap::new(),
            pending_unregisters: HashMap::new(),
            pending_publishes: HashMap::new(),
            subscriptions: HashMap::new(),
            registrations: HashMap::new(),
        }
    }

    /// Event loop that drives the session until it ends (and reconnects if
    /// the caller asked for it). __This future must be spawned by the caller__
    pub async fn event_loop(mut self) -> Result<(), WampError> {
        let mut ctl_channel = self.ctl_channel.take().unwrap();

        loop {
            self.open_session().await?;
            let end = self.run(&mut ctl_channel).await;
            let state_at_end = self.state;

            self.end_session(&end);
            self.sock.close().await;
            if self.state != SessionState::Aborted {
                self.set_state(SessionState::Disconnected);
            }

            // A new connection starts a brand new session; nothing from the
            // previous one is replayed
            let retry = matches!(end, SessionEnd::Closed)
                && self.config.get_reconnect()
                && !matches!(
                    state_at_end,
                    SessionState::Closing | SessionState::Aborted
                );
            if !retry {
                break;
            }

            info!("Reconnecting to {}", self.uri);
            let (sock, serializer_type) = ws::connect(&self.uri, &self.config).await?;
            self.sock = sock;
            self.serializer = new_serializer(serializer_type);
            self.server_roles.clear();
            self.request_ids = RequestIdAllocator::new();
        }

        debug!("Event loop shutting down !");
        Ok(())
    }

    /// Announces ourselves to the router
    async fn open_session(&mut self) -> Result<(), WampError> {
        let msg = Msg::Hello {
            realm: self.realm.clone(),
            details: self.hello_details(),
        };
        self.send(&msg).await?;
        self.set_state(SessionState::HelloSent);
        Ok(())
    }

    fn hello_details(&self) -> WampDict {
        let mut details = WampDict::new();

        let mut roles = WampDict::new();
        for role in self.config.get_roles() {
            // Every role is advertised with an empty option map
            roles.insert(role.as_ref().to_string(), Arg::Dict(WampDict::new()));
        }
        details.insert("roles".to_string(), Arg::Dict(roles));

        if !self.config.get_agent().is_empty() {
            details.insert(
                "agent".to_string(),
                Arg::String(self.config.get_agent().to_string()),
            );
        }
        if !self.config.get_authmethods().is_empty() {
            details.insert(
                "authmethods".to_string(),
                Arg::List(
                    self.config
                        .get_authmethods()
                        .iter()
                        .map(|m| Arg::String(m.as_ref().to_string()))
                        .collect(),
                ),
            );
        }
        if let Some(authid) = self.config.get_authid() {
            details.insert("authid".to_string(), Arg::String(authid.to_string()));
        }
        if let Some(authrole) = self.config.get_authrole() {
            details.insert("authrole".to_string(), Arg::String(authrole.to_string()));
        }
        if let Some(authextra) = self.config.get_authextra() {
            details.insert("authextra".to_string(), Arg::Dict(authextra.clone()));
        }

        details
    }

    /// Multiplexes inbound frames and local requests until the session ends
    async fn run(&mut self, ctl_channel: &mut UnboundedReceiver<Request>) -> SessionEnd {
        loop {
            let ended = select! {
                // Peer sent us a frame
                payload = self.sock.recv() => match payload {
                    Ok(bytes) => match self.serializer.unpack(&bytes) {
                        Ok(msg) => match self.handle_peer_msg(msg).await {
                            Status::Ended(end) => Some(end),
                            Status::Ok => None,
                        },
                        // Frames we cannot decode are dropped, not fatal
                        Err(e) => {
                            warn!("Dropping undecodable frame : {}", e);
                            None
                        }
                    },
                    Err(TransportError::StreamClosed) => Some(SessionEnd::Closed),
                    Err(e) => Some(SessionEnd::Error(e.into())),
                },
                // A handle wants us to send something
                req = ctl_channel.recv() => match req {
                    Some(req) => match self.handle_local_request(req).await {
                        Status::Ended(end) => Some(end),
                        Status::Ok => None,
                    },
                    None => Some(SessionEnd::Error(WampError::ClientDied)),
                },
            };

            if let Some(end) = ended {
                return end;
            }
        }
    }

    /// Routes a decoded frame to its handler. Variants the router never
    /// sends to a client are dropped here.
    async fn handle_peer_msg(&mut self, msg: Msg) -> Status {
        match msg {
            Msg::Welcome { session, details } => recv::welcome(self, session, details).await,
            Msg::Challenge { authmethod, extra } => {
                recv::challenge(self, authmethod, extra).await
            }
            Msg::Abort { details, reason } => recv::abort(self, details, reason).await,
            Msg::Goodbye { details, reason } => recv::goodbye(self, details, reason).await,
            Msg::Result {
                request,
                details,
                arguments,
                arguments_kw,
            } => recv::call_result(self, request, details, arguments, arguments_kw),
            Msg::Error {
                typ,
                request,
                details,
                error,
                arguments,
                arguments_kw,
            } => recv::error(self, typ, request, details, error, arguments, arguments_kw),
            Msg::Subscribed {
                request,
                subscription,
            } => recv::subscribed(self, request, subscription),
            Msg::Unsubscribed { request } => recv::unsubscribed(self, request),
            Msg::Published {
                request,
                publication,
            } => recv::published(self, request, publication),
            Msg::Event {
                subscription,
                publication,
                details,
                arguments,
                arguments_kw,
            } => recv::event(
                self,
                subscription,
                publication,
                details,
                arguments,
                arguments_kw,
            ),
            Msg::Registered {
                request,
                registration,
            } => recv::registered(self, request, registration),
            Msg::Unregistered { request } => recv::unregistered(self, request),
            Msg::Invocation {
                request,
                registration,
                details,
                arguments,
                arguments_kw,
            } => recv::invocation(
                self,
                request,
                registration,
                details,
                arguments,
                arguments_kw,
            ),
            m => {
                warn!("Dropping {} frame, the router never sends those", m.name());
                Status::Ok
            }
        }
    }

    async fn handle_local_request(&mut self, req: Request) -> Status {
        match req {
            Request::Call {
                procedure,
                options,
                arguments,
                arguments_kw,
                executor,
                on_result,
                on_error,
            } => {
                send::call(
                    self,
                    procedure,
                    options,
                    arguments,
                    arguments_kw,
                    executor,
                    on_result,
                    on_error,
                )
                .await
            }
            Request::Subscribe {
                topic,
                options,
                executor,
                handler,
                on_subscribed,
                on_error,
            } => {
                send::subscribe(
                    self,
                    topic,
                    options,
                    executor,
                    handler,
                    on_subscribed,
                    on_error,
                )
                .await
            }
            Request::Unsubscribe {
                subscription,
                executor,
                on_done,
                on_error,
            } => send::unsubscribe(self, subscription, executor, on_done, on_error).await,
            Request::Publish {
                topic,
                options,
                arguments,
                arguments_kw,
                acknowledge,
            } => send::publish(self, topic, options, arguments, arguments_kw, acknowledge).await,
            Request::Register {
                procedure,
                options,
                executor,
                handler,
                on_registered,
                on_error,
            } => {
                send::register(
                    self,
                    procedure,
                    options,
                    executor,
                    handler,
                    on_registered,
                    on_error,
                )
                .await
            }
            Request::Unregister {
                registration,
                executor,
                on_done,
                on_error,
            } => send::unregister(self, registration, executor, on_done, on_error).await,
            Request::Yield { request, result } => {
                send::yield_result(self, request, result).await
            }
            Request::Leave { reason } => send::leave(self, reason).await,
            Request::Shutdown => {
                Status::Ended(SessionEnd::Reason("Client shutdown".to_string()))
            }
        }
    }

    /// Serializes a message and sends it on the transport
    pub(crate) async fn send(&mut self, msg: &Msg) -> Result<(), WampError> {
        let payload = self.serializer.pack(msg)?;

        match std::str::from_utf8(&payload) {
            Ok(v) => debug!("Send : {}", v),
            Err(_) => debug!("Send : {:?}", msg),
        };

        self.sock.send(&payload).await?;
        Ok(())
    }

    pub(crate) fn is_established(&self) -> bool {
        self.session_id.is_some()
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
        let _ = self.state_tx.send(state);
    }

    /// Allocates the request id for an outgoing message
    pub(crate) fn create_request(&mut self) -> WampId {
        self.request_ids.next_id()
    }

    /// Releases everything the session was holding and reports the end to
    /// the delegate, exactly once per connection
    fn end_session(&mut self, end: &SessionEnd) {
        let reason = end.describe();
        self.session_id = None;
        self.drain_pending();

        let delegate = self.delegate.clone();
        self.delegate_executor
            .submit_fn(move || delegate.session_ended(reason));
    }

    /// Completes every outstanding continuation with a synthetic cancellation
    /// error and invalidates the live handles
    fn drain_pending(&mut self) {
        for (_, p) in self.pending_calls.drain() {
            let on_error = p.on_error;
            p.executor
                .submit_fn(move || on_error(RequestError::transport_closed()));
        }
        for (_, p) in self.pending_subscriptions.drain() {
            let on_error = p.on_error;
            p.executor
                .submit_fn(move || on_error(RequestError::transport_closed()));
        }
        for (_, p) in self.pending_unsubscribes.drain() {
            let on_error = p.on_error;
            p.executor
                .submit_fn(move || on_error(RequestError::transport_closed()));
        }
        for (_, p) in self.pending_registrations.drain() {
            let on_error = p.on_error;
            p.executor
                .submit_fn(move || on_error(RequestError::transport_closed()));
        }
        for (_, p) in self.pending_unregisters.drain() {
            let on_error = p.on_error;
            p.executor
                .submit_fn(move || on_error(RequestError::transport_closed()));
        }
        for (_, p) in self.pending_publishes.drain() {
            let on_error = p.on_error;
            p.executor
                .submit_fn(move || on_error(RequestError::transport_closed()));
        }

        for (_, record) in self.subscriptions.drain() {
            record.active.store(false, Ordering::Release);
        }
        for (_, record) in self.registrations.drain() {
            record.active.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn request_ids_grow_from_two() {
        let mut ids = RequestIdAllocator::new();
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
        let mut last = 3;
        for _ in 0..100 {
            let id = ids.next_id();
            assert!(id > last);
            last = id;
        }
    }
}
