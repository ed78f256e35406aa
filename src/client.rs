use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use log::*;
use tokio::sync::{mpsc, mpsc::UnboundedSender, watch};
use url::Url;

pub use crate::common::*;
use crate::core::{Core, Request, SessionState};
use crate::error::*;
use crate::executor::Executor;
use crate::serializer::SerializerType;

/// Options one can set when connecting to a WAMP router
#[derive(Clone)]
pub struct SessionConfig {
    /// Replaces the default user agent string
    agent: String,
    /// Set of all the roles the client will advertise
    roles: HashSet<ClientRole>,
    /// Priority list of serializers to offer during the handshake
    serializers: Vec<SerializerType>,
    /// When using a secure transport, disables certificate validation
    ssl_verify: bool,
    /// Additional WebSocket headers sent on connection establishment
    websocket_headers: HashMap<String, String>,
    /// Authentication methods offered in HELLO
    authmethods: Vec<AuthenticationMethod>,
    authid: Option<String>,
    authrole: Option<String>,
    authextra: Option<WampDict>,
    /// Dial the router again when the connection dies without a reason
    reconnect: bool,
}

impl Default for SessionConfig {
    /// Creates a session config with reasonnable defaults
    ///
    /// Roles :
    /// - [ClientRole::Caller](enum.ClientRole.html#variant.Caller)
    /// - [ClientRole::Callee](enum.ClientRole.html#variant.Callee)
    /// - [ClientRole::Publisher](enum.ClientRole.html#variant.Publisher)
    /// - [ClientRole::Subscriber](enum.ClientRole.html#variant.Subscriber)
    ///
    /// Serializers :
    /// 1. [SerializerType::Json](enum.SerializerType.html#variant.Json)
    /// 2. [SerializerType::MsgPack](enum.SerializerType.html#variant.MsgPack)
    /// 3. [SerializerType::Cbor](enum.SerializerType.html#variant.Cbor)
    fn default() -> Self {
        SessionConfig {
            agent: String::from(DEFAULT_AGENT_STR),
            roles: [
                ClientRole::Caller,
                ClientRole::Callee,
                ClientRole::Publisher,
                ClientRole::Subscriber,
            ]
            .iter()
            .cloned()
            .collect(),
            serializers: vec![
                SerializerType::Json,
                SerializerType::MsgPack,
                SerializerType::Cbor,
            ],
            ssl_verify: true,
            websocket_headers: HashMap::new(),
            authmethods: Vec::new(),
            authid: None,
            authrole: None,
            authextra: None,
            reconnect: false,
        }
    }
}

impl SessionConfig {
    /// Replaces the default user agent string. Set to a zero length string to disable
    pub fn set_agent<T: AsRef<str>>(mut self, agent: T) -> Self {
        self.agent = String::from(agent.as_ref());
        self
    }
    /// Returns the currently set agent string
    pub fn get_agent(&self) -> &str {
        &self.agent
    }

    /// Sets the roles that are intended to be used by the client
    pub fn set_roles(mut self, roles: Vec<ClientRole>) -> Self {
        self.roles.drain();
        for role in roles {
            self.roles.insert(role);
        }
        self
    }
    pub fn get_roles(&self) -> &HashSet<ClientRole> {
        &self.roles
    }

    /// Sets the serializers that will be offered in order of preference
    pub fn set_serializers(mut self, serializers: Vec<SerializerType>) -> Self {
        self.serializers = serializers;
        self
    }
    /// Returns the priority list of serializers
    pub fn get_serializers(&self) -> &Vec<SerializerType> {
        &self.serializers
    }

    /// Enables (default) or disables TLS certificate validation
    pub fn set_ssl_verify(mut self, val: bool) -> Self {
        self.ssl_verify = val;
        self
    }
    /// Returns whether certificate validation is enabled
    pub fn get_ssl_verify(&self) -> bool {
        self.ssl_verify
    }

    pub fn add_websocket_header(mut self, key: String, val: String) -> Self {
        self.websocket_headers.insert(key, val);
        self
    }
    pub fn get_websocket_headers(&self) -> &HashMap<String, String> {
        &self.websocket_headers
    }

    /// Sets the authentication methods offered in HELLO
    pub fn set_authmethods(mut self, methods: Vec<AuthenticationMethod>) -> Self {
        self.authmethods = methods;
        self
    }
    pub fn get_authmethods(&self) -> &Vec<AuthenticationMethod> {
        &self.authmethods
    }

    /// Sets the authentication id (e.g. username) to announce
    pub fn set_authid<T: Into<String>>(mut self, authid: T) -> Self {
        self.authid = Some(authid.into());
        self
    }
    pub fn get_authid(&self) -> Option<&str> {
        self.authid.as_deref()
    }

    /// Sets the authentication role to request
    pub fn set_authrole<T: Into<String>>(mut self, authrole: T) -> Self {
        self.authrole = Some(authrole.into());
        self
    }
    pub fn get_authrole(&self) -> Option<&str> {
        self.authrole.as_deref()
    }

    /// Sets extra authentication data (e.g. a public key)
    pub fn set_authextra(mut self, authextra: WampDict) -> Self {
        self.authextra = Some(authextra);
        self
    }
    pub fn get_authextra(&self) -> Option<&WampDict> {
        self.authextra.as_ref()
    }

    /// Dial again after the connection dies with neither a reason nor an
    /// error. The new connection starts a fresh session : subscriptions and
    /// registrations are not replayed.
    pub fn set_reconnect(mut self, val: bool) -> Self {
        self.reconnect = val;
        self
    }
    pub fn get_reconnect(&self) -> bool {
        self.reconnect
    }
}

/// Hooks the application installs on a session.
///
/// `connected` and `session_ended` are delivered on a queue owned by the
/// session, never on the transport receive task.
#[async_trait]
pub trait SessionDelegate: Send + Sync {
    /// Computes the signature answering an authentication CHALLENGE.
    ///
    /// Returning `None` (the default) makes the session abort the join with
    /// `wamp.error.system_shutdown`.
    async fn handle_challenge(
        &self,
        authmethod: WampString,
        extra: WampDict,
    ) -> Option<WampString> {
        let _ = (authmethod, extra);
        None
    }

    /// The realm was joined; `session_id` is the router assigned id
    fn connected(&self, session_id: WampId) {
        let _ = session_id;
    }

    /// The session is over. `reason` is the WAMP reason uri when one was
    /// received, otherwise a description of what went wrong.
    fn session_ended(&self, reason: String) {
        let _ = reason;
    }
}

/// A delegate for sessions that need no hooks at all
pub struct NoopDelegate;
impl SessionDelegate for NoopDelegate {}

/// Allows interaction as a client with a WAMP router.
///
/// Every method hands the work to the session event loop and returns
/// immediately; outcomes are reported through the supplied callbacks, on the
/// supplied executor. Requests issued while no realm is joined are logged
/// and dropped without invoking any callback.
pub struct Session {
    /// Channel to send requests to the event loop
    ctl_channel: UnboundedSender<Request>,
    state_rx: watch::Receiver<SessionState>,
}

impl Session {
    /// Connects to a WAMP router and prepares to join `realm`.
    ///
    /// __Note__
    ///
    /// On success, this function returns :
    /// - Session : used to interact with the router
    /// - Main event loop future : __this MUST be spawned by the caller__
    ///   (e.g. using tokio::spawn()). The session opens once it runs.
    pub async fn connect<T: AsRef<str>, R: Into<WampUri>>(
        uri: T,
        realm: R,
        cfg: Option<SessionConfig>,
        delegate: Arc<dyn SessionDelegate>,
    ) -> Result<(Session, GenericFuture), WampError> {
        let uri = match Url::parse(uri.as_ref()) {
            Ok(u) => u,
            Err(e) => return Err(WampError::InvalidUri(e)),
        };
        if uri.host_str().is_none() {
            return Err(WampError::NoHostInUri);
        }

        let config = cfg.unwrap_or_default();
        let (ctl_sender, ctl_receiver) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        let ctl_channel = ctl_sender.clone();
        let core = Core::connect(
            uri,
            realm.into(),
            config,
            delegate,
            (ctl_sender, ctl_receiver),
            state_tx,
        )
        .await?;

        Ok((
            Session {
                ctl_channel,
                state_rx,
            },
            Box::pin(core.event_loop()),
        ))
    }

    /// Calls a procedure registered on the router.
    ///
    /// Exactly one of `on_result` / `on_error` eventually fires on `executor`.
    pub fn call<T, S, E>(
        &self,
        procedure: T,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
        executor: &Executor,
        on_result: S,
        on_error: E,
    ) where
        T: AsRef<str>,
        S: FnOnce(WampDict, Option<WampArgs>, Option<WampKwArgs>) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.forward(Request::Call {
            procedure: procedure.as_ref().to_string(),
            options,
            arguments,
            arguments_kw,
            executor: executor.clone(),
            on_result: Box::new(on_result),
            on_error: Box::new(on_error),
        });
    }

    /// Subscribes to events published on a topic.
    ///
    /// `handler` fires on `executor` for every event, in the order the
    /// router delivered them. On success, `on_subscribed` yields the
    /// [`Subscription`](crate::Subscription) handle used to unsubscribe.
    pub fn subscribe<T, H, S, E>(
        &self,
        topic: T,
        options: WampDict,
        executor: &Executor,
        handler: H,
        on_subscribed: S,
        on_error: E,
    ) where
        T: AsRef<str>,
        H: FnMut(WampDict, Option<WampArgs>, Option<WampKwArgs>) + Send + 'static,
        S: FnOnce(crate::handle::Subscription) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.forward(Request::Subscribe {
            topic: topic.as_ref().to_string(),
            options,
            executor: executor.clone(),
            handler: Box::new(handler),
            on_subscribed: Box::new(on_subscribed),
            on_error: Box::new(on_error),
        });
    }

    /// Publishes an event on a topic without asking for an acknowledgement
    pub fn publish<T: AsRef<str>>(
        &self,
        topic: T,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    ) {
        self.forward(Request::Publish {
            topic: topic.as_ref().to_string(),
            options,
            arguments,
            arguments_kw,
            acknowledge: None,
        });
    }

    /// Publishes an event and asks the router to acknowledge it.
    ///
    /// `on_published` fires with the publication id assigned by the router.
    pub fn publish_with_ack<T, S, E>(
        &self,
        topic: T,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
        executor: &Executor,
        on_published: S,
        on_error: E,
    ) where
        T: AsRef<str>,
        S: FnOnce(WampId) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.forward(Request::Publish {
            topic: topic.as_ref().to_string(),
            options,
            arguments,
            arguments_kw,
            acknowledge: Some((
                executor.clone(),
                Box::new(on_published),
                Box::new(on_error),
            )),
        });
    }

    /// Registers a procedure with the router.
    ///
    /// `handler` runs on `executor` for every invocation; its resolved value
    /// is shaped into the YIELD payload (a dict becomes keyword results, a
    /// list positional results, anything else a single positional result).
    /// On success, `on_registered` yields the
    /// [`Registration`](crate::Registration) handle used to unregister.
    pub fn register<T, H, Fut, S, E>(
        &self,
        procedure: T,
        options: WampDict,
        executor: &Executor,
        handler: H,
        on_registered: S,
        on_error: E,
    ) where
        T: AsRef<str>,
        H: Fn(WampDict, Option<WampArgs>, Option<WampKwArgs>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arg, WampError>> + Send + 'static,
        S: FnOnce(crate::handle::Registration) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.forward(Request::Register {
            procedure: procedure.as_ref().to_string(),
            options,
            executor: executor.clone(),
            handler: Box::new(move |details, arguments, arguments_kw| {
                Box::pin(handler(details, arguments, arguments_kw))
            }),
            on_registered: Box::new(on_registered),
            on_error: Box::new(on_error),
        });
    }

    /// Leaves the realm with the default `wamp.error.close_realm` reason.
    ///
    /// The router is expected to answer with its own GOODBYE, which
    /// terminates the connection.
    pub fn leave(&self) {
        self.leave_with_reason(uris::CLOSE_REALM);
    }

    /// Leaves the realm announcing a specific reason uri
    pub fn leave_with_reason<T: Into<WampUri>>(&self, reason: T) {
        self.forward(Request::Leave {
            reason: reason.into(),
        });
    }

    /// Tears the connection down without the GOODBYE exchange
    pub fn shutdown(&self) {
        self.forward(Request::Shutdown);
    }

    /// Where the session currently stands
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Returns whether a realm is currently joined
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Established
    }

    /// Resolves once the session has opened and then ended
    pub async fn block_until_disconnect(&mut self) -> SessionState {
        // Wait for the event loop to start opening the session
        while self.state() == SessionState::Disconnected {
            if self.state_rx.changed().await.is_err() {
                return self.state();
            }
        }
        // Then for the session to come back down
        loop {
            match self.state() {
                SessionState::Disconnected | SessionState::Aborted => return self.state(),
                _ => {
                    if self.state_rx.changed().await.is_err() {
                        return self.state();
                    }
                }
            }
        }
    }

    fn forward(&self, req: Request) {
        if self.ctl_channel.send(req).is_err() {
            warn!("Session event loop is gone, dropping the request");
        }
    }
}
