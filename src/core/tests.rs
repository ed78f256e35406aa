use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, mpsc::UnboundedReceiver, mpsc::UnboundedSender, watch};
use tokio::time::{sleep, timeout, Duration};

use crate::client::{SessionConfig, SessionDelegate};
use crate::common::*;
use crate::core::{Core, Request, SessionState};
use crate::error::WampError;
use crate::executor::Executor;
use crate::serializer::SerializerType;
use crate::transport::{Transport, TransportError};

/// Channel backed transport standing in for a websocket
struct MockTransport {
    rx: UnboundedReceiver<Vec<u8>>,
    tx: UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| TransportError::SendFailed)
    }
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv().await.ok_or(TransportError::StreamClosed)
    }
    async fn close(&mut self) {}
}

struct TestDelegate {
    challenge_response: Option<String>,
    connected_tx: UnboundedSender<WampId>,
    ended_tx: UnboundedSender<String>,
}

#[async_trait]
impl SessionDelegate for TestDelegate {
    async fn handle_challenge(
        &self,
        _authmethod: WampString,
        _extra: WampDict,
    ) -> Option<WampString> {
        self.challenge_response.clone()
    }
    fn connected(&self, session_id: WampId) {
        let _ = self.connected_tx.send(session_id);
    }
    fn session_ended(&self, reason: String) {
        let _ = self.ended_tx.send(reason);
    }
}

/// Drives the session core like a router would
struct Harness {
    to_session: UnboundedSender<Vec<u8>>,
    from_session: UnboundedReceiver<Vec<u8>>,
    ctl: UnboundedSender<Request>,
    state_rx: watch::Receiver<SessionState>,
    connected: UnboundedReceiver<WampId>,
    ended: UnboundedReceiver<String>,
}

impl Harness {
    fn start(config: SessionConfig, challenge_response: Option<String>) -> Harness {
        let (to_session, inbound) = mpsc::unbounded_channel();
        let (outbound, from_session) = mpsc::unbounded_channel();
        let (ctl_sender, ctl_receiver) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (connected_tx, connected) = mpsc::unbounded_channel();
        let (ended_tx, ended) = mpsc::unbounded_channel();

        let core = Core::new(
            Box::new(MockTransport {
                rx: inbound,
                tx: outbound,
            }),
            SerializerType::Json,
            url::Url::parse("ws://unit.test/ws").unwrap(),
            "realm1".to_string(),
            config,
            Arc::new(TestDelegate {
                challenge_response,
                connected_tx,
                ended_tx,
            }),
            (ctl_sender.clone(), ctl_receiver),
            state_tx,
        );
        tokio::spawn(core.event_loop());

        Harness {
            to_session,
            from_session,
            ctl: ctl_sender,
            state_rx,
            connected,
            ended,
        }
    }

    /// Next frame the session sent, decoded as json
    async fn next_frame(&mut self) -> Value {
        let bytes = timeout(Duration::from_secs(5), self.from_session.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("session closed the transport");
        serde_json::from_slice(&bytes).expect("session sent invalid json")
    }

    fn push(&self, frame: Value) {
        self.to_session
            .send(frame.to_string().into_bytes())
            .expect("session dropped the transport");
    }

    fn send(&self, req: Request) {
        if self.ctl.send(req).is_err() {
            panic!("session event loop is gone");
        }
    }

    /// Drops the inbound side, as if the peer closed the stream
    fn sever(&mut self) {
        self.to_session = mpsc::unbounded_channel().0;
    }

    async fn wait_state(&mut self, wanted: SessionState) {
        timeout(Duration::from_secs(5), async {
            while *self.state_rx.borrow() != wanted {
                self.state_rx.changed().await.expect("event loop died");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("session never reached {:?}", wanted));
    }

    /// Consumes the HELLO and answers with a WELCOME
    async fn establish(&mut self) -> Value {
        let hello = self.next_frame().await;
        assert_eq!(hello[0], 1);
        assert_eq!(hello[1], "realm1");
        self.push(json!([2, 12345, {"roles": {"dealer": {}, "broker": {}}}]));
        let id = recv(&mut self.connected).await;
        assert_eq!(id, 12345);
        hello
    }
}

async fn recv<T>(rx: &mut UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting on a callback")
        .expect("callback channel closed")
}

fn basic_roles() -> SessionConfig {
    SessionConfig::default().set_roles(vec![
        ClientRole::Caller,
        ClientRole::Subscriber,
        ClientRole::Publisher,
    ])
}

#[tokio::test]
async fn plain_connect() {
    let mut h = Harness::start(basic_roles(), None);

    let hello = h.next_frame().await;
    assert_eq!(hello[0], 1);
    assert_eq!(hello[1], "realm1");
    let details = &hello[2];
    assert!(details["agent"].as_str().map_or(false, |a| !a.is_empty()));
    assert_eq!(details["roles"], json!({"caller": {}, "subscriber": {}, "publisher": {}}));

    h.push(json!([2, 12345, {"roles": {"dealer": {}, "broker": {}}}]));
    assert_eq!(recv(&mut h.connected).await, 12345);
    h.wait_state(SessionState::Established).await;
}

#[tokio::test]
async fn challenge_response_round_trip() {
    let mut h = Harness::start(
        SessionConfig::default()
            .set_authmethods(vec![AuthenticationMethod::Ticket])
            .set_authid("user1"),
        Some("secret-xyz".to_string()),
    );

    let hello = h.next_frame().await;
    assert_eq!(hello[2]["authmethods"], json!(["ticket"]));
    assert_eq!(hello[2]["authid"], "user1");

    h.push(json!([4, "ticket", {}]));
    let authenticate = h.next_frame().await;
    assert_eq!(authenticate, json!([5, "secret-xyz", {}]));

    h.push(json!([2, 9, {"roles": {"dealer": {}}}]));
    assert_eq!(recv(&mut h.connected).await, 9);
}

#[tokio::test]
async fn challenge_without_delegate_aborts() {
    let mut h = Harness::start(SessionConfig::default(), None);

    let _hello = h.next_frame().await;
    h.push(json!([4, "ticket", {}]));

    let abort = h.next_frame().await;
    assert_eq!(abort[0], 3);
    assert_eq!(abort[2], "wamp.error.system_shutdown");
    assert_eq!(recv(&mut h.ended).await, "No challenge delegate found.");
    h.wait_state(SessionState::Aborted).await;
}

#[tokio::test]
async fn abort_during_join() {
    let mut h = Harness::start(SessionConfig::default(), None);

    let _hello = h.next_frame().await;
    h.push(json!([3, {"message": "no such realm"}, "wamp.error.no_such_realm"]));

    assert_eq!(recv(&mut h.ended).await, "wamp.error.no_such_realm");
    h.wait_state(SessionState::Aborted).await;
}

#[tokio::test]
async fn call_round_trip() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    let exec = Executor::new();
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    h.send(Request::Call {
            procedure: "com.example.add".to_string(),
            options: WampDict::new(),
            arguments: Some(vec![Arg::UnsignedInteger(2), Arg::UnsignedInteger(3)]),
            arguments_kw: None,
            executor: exec,
            on_result: Box::new(move |details, args, kwargs| {
                let _ = result_tx.send((details, args, kwargs));
            }),
            on_error: Box::new(|e| panic!("call failed : {}", e)),
        });

    // First request of the session gets id 2
    let call = h.next_frame().await;
    assert_eq!(call, json!([48, 2, {}, "com.example.add", [2, 3]]));

    h.push(json!([50, 2, {}, [5]]));
    let (details, args, kwargs) = recv(&mut result_rx).await;
    assert!(details.is_empty());
    assert_eq!(args, Some(vec![Arg::UnsignedInteger(5)]));
    assert_eq!(kwargs, None);
}

#[tokio::test]
async fn call_error_carries_payload() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    let exec = Executor::new();
    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    h.send(Request::Call {
            procedure: "com.example.divide".to_string(),
            options: WampDict::new(),
            arguments: Some(vec![Arg::UnsignedInteger(1), Arg::UnsignedInteger(0)]),
            arguments_kw: None,
            executor: exec,
            on_result: Box::new(|_, _, _| panic!("call should have failed")),
            on_error: Box::new(move |e| {
                let _ = err_tx.send(e);
            }),
        });

    let _call = h.next_frame().await;
    h.push(json!([8, 48, 2, {}, "wamp.error.invalid_argument", ["division by zero"]]));

    let err = recv(&mut err_rx).await;
    assert_eq!(err.error, "wamp.error.invalid_argument");
    assert_eq!(
        err.arguments,
        Some(vec![Arg::String("division by zero".to_string())])
    );
}

#[tokio::test]
async fn subscribe_event_and_unsubscribe() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    let exec = Executor::new();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel();
    let (sub_tx, mut sub_rx) = mpsc::unbounded_channel();
    h.send(Request::Subscribe {
            topic: "com.chan".to_string(),
            options: WampDict::new(),
            executor: exec,
            handler: Box::new(move |details, args, kwargs| {
                let _ = evt_tx.send((details, args, kwargs));
            }),
            on_subscribed: Box::new(move |sub| {
                let _ = sub_tx.send(sub);
            }),
            on_error: Box::new(|e| panic!("subscribe failed : {}", e)),
        });

    assert_eq!(h.next_frame().await, json!([32, 2, {}, "com.chan"]));
    h.push(json!([33, 2, 777]));

    let sub = recv(&mut sub_rx).await;
    assert_eq!(sub.id(), 777);
    assert_eq!(sub.topic(), "com.chan");
    assert!(sub.is_active());

    // Events are delivered in receive order, empty details stay untouched
    h.push(json!([36, 777, 1, {}, ["hi"]]));
    h.push(json!([36, 777, 2, {}, ["there"]]));
    let (details, args, kwargs) = recv(&mut evt_rx).await;
    assert!(details.is_empty());
    assert_eq!(args, Some(vec![Arg::String("hi".to_string())]));
    assert_eq!(kwargs, None);
    let (_, args, _) = recv(&mut evt_rx).await;
    assert_eq!(args, Some(vec![Arg::String("there".to_string())]));

    // Non-empty details get annotated with the topic
    h.push(json!([36, 777, 3, {"publisher": 11}, ["yo"]]));
    let (details, _, _) = recv(&mut evt_rx).await;
    assert_eq!(
        details.get("topic"),
        Some(&Arg::String("com.chan".to_string()))
    );
    assert_eq!(details.get("publisher"), Some(&Arg::UnsignedInteger(11)));

    // Unsubscribing through the handle invalidates it once acknowledged
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    sub.unsubscribe(
        move || {
            let _ = done_tx.send(());
        },
        |e| panic!("unsubscribe failed : {}", e),
    );
    assert_eq!(h.next_frame().await, json!([34, 3, 777]));
    h.push(json!([35, 3]));
    recv(&mut done_rx).await;
    assert!(!sub.is_active());

    // The handle is dead now : further unsubscribes are no-ops and events
    // for the old subscription id are dropped
    sub.unsubscribe(|| panic!("fired on a dead handle"), |_| {});
    h.push(json!([36, 777, 4, {}, ["ghost"]]));

    let (res_tx, mut res_rx) = mpsc::unbounded_channel();
    h.send(Request::Call {
            procedure: "com.example.noop".to_string(),
            options: WampDict::new(),
            arguments: None,
            arguments_kw: None,
            executor: Executor::new(),
            on_result: Box::new(move |_, _, _| {
                let _ = res_tx.send(());
            }),
            on_error: Box::new(|e| panic!("call failed : {}", e)),
        });
    // The next frame is the call, with the next request id : nothing was
    // sent for the dead handle
    assert_eq!(h.next_frame().await, json!([48, 4, {}, "com.example.noop"]));
    h.push(json!([50, 4, {}]));
    recv(&mut res_rx).await;
    assert!(evt_rx.try_recv().is_err());
}

#[tokio::test]
async fn acknowledged_publish_error() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    let exec = Executor::new();
    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    h.send(Request::Publish {
            topic: "com.x".to_string(),
            options: WampDict::new(),
            arguments: None,
            arguments_kw: None,
            acknowledge: Some((
                exec,
                Box::new(|_| panic!("publish should have failed")),
                Box::new(move |e| {
                    let _ = err_tx.send(e);
                }),
            )),
        });

    assert_eq!(
        h.next_frame().await,
        json!([16, 2, {"acknowledge": true}, "com.x"])
    );
    h.push(json!([8, 16, 2, {}, "wamp.error.not_authorized"]));

    let err = recv(&mut err_rx).await;
    assert!(err.details.is_empty());
    assert_eq!(err.error, "wamp.error.not_authorized");
}

#[tokio::test]
async fn acknowledged_publish_success() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    let exec = Executor::new();
    let (pub_tx, mut pub_rx) = mpsc::unbounded_channel();
    h.send(Request::Publish {
            topic: "com.x".to_string(),
            options: WampDict::new(),
            arguments: Some(vec![Arg::String("hello".to_string())]),
            arguments_kw: None,
            acknowledge: Some((
                exec,
                Box::new(move |publication| {
                    let _ = pub_tx.send(publication);
                }),
                Box::new(|e| panic!("publish failed : {}", e)),
            )),
        });

    assert_eq!(
        h.next_frame().await,
        json!([16, 2, {"acknowledge": true}, "com.x", ["hello"]])
    );
    h.push(json!([17, 2, 882]));
    assert_eq!(recv(&mut pub_rx).await, 882);
}

#[tokio::test]
async fn unacknowledged_publish_leaves_no_trace() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    h.send(Request::Publish {
            topic: "com.x".to_string(),
            options: WampDict::new(),
            arguments: Some(vec![Arg::UnsignedInteger(1)]),
            arguments_kw: None,
            acknowledge: None,
        });
    assert_eq!(h.next_frame().await, json!([16, 2, {}, "com.x", [1]]));

    // A stray PUBLISHED for it is an orphan and gets dropped
    h.push(json!([17, 2, 55]));
    // The session is still fine afterwards
    h.push(json!([6, {}, "wamp.error.system_shutdown"]));
    assert_eq!(
        h.next_frame().await,
        json!([6, {}, "wamp.error.goodbye_and_out"])
    );
}

fn shaping_handler(
    details: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
) -> futures::future::BoxFuture<'static, Result<Arg, WampError>> {
    let _ = details;
    Box::pin(async move {
        let shape = match arguments_kw.as_ref().and_then(|k| k.get("shape")) {
            Some(Arg::String(s)) => s.clone(),
            _ => "scalar".to_string(),
        };
        match shape.as_str() {
            "dict" => {
                let sum = arguments
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|a| match a {
                        Arg::UnsignedInteger(v) => Some(*v),
                        _ => None,
                    })
                    .sum::<u64>();
                let mut result = WampDict::new();
                result.insert("sum".to_string(), Arg::UnsignedInteger(sum));
                Ok(Arg::Dict(result))
            }
            "list" => Ok(Arg::List(arguments.unwrap_or_default())),
            "fail" => Err(WampError::UnknownError("boom".to_string())),
            _ => Ok(Arg::UnsignedInteger(7)),
        }
    })
}

#[tokio::test]
async fn invocation_return_shaping() {
    let mut h = Harness::start(SessionConfig::default(), None);
    h.establish().await;

    let exec = Executor::new();
    let (reg_tx, mut reg_rx) = mpsc::unbounded_channel();
    h.send(Request::Register {
            procedure: "com.example.adder".to_string(),
            options: WampDict::new(),
            executor: exec,
            handler: Box::new(shaping_handler),
            on_registered: Box::new(move |reg| {
                let _ = reg_tx.send(reg);
            }),
            on_error: Box::new(|e| panic!("register failed : {}", e)),
        });

    assert_eq!(
        h.next_frame().await,
        json!([64, 2, {}, "com.example.adder"])
    );
    h.push(json!([65, 2, 42]));
    let reg = recv(&mut reg_rx).await;
    assert_eq!(reg.id(), 42);
    assert_eq!(reg.procedure(), "com.example.adder");

    // A dict travels as keyword results, with an empty positional slot
    h.push(json!([68, 3, 42, {}, [1, 2], {"shape": "dict"}]));
    assert_eq!(h.next_frame().await, json!([70, 3, {}, [], {"sum": 3}]));

    // A list travels as positional results
    h.push(json!([68, 4, 42, {}, [1, 2], {"shape": "list"}]));
    assert_eq!(h.next_frame().await, json!([70, 4, {}, [1, 2]]));

    // Any other value travels as a single positional result
    h.push(json!([68, 5, 42, {}]));
    assert_eq!(h.next_frame().await, json!([70, 5, {}, [7]]));

    // A failed handler turns into an ERROR for the invocation
    h.push(json!([68, 6, 42, {}, [], {"shape": "fail"}]));
    let error = h.next_frame().await;
    assert_eq!(error[0], 8);
    assert_eq!(error[1], 68);
    assert_eq!(error[2], 6);
    assert_eq!(error[4], "wamp.session.rs.invocation.failed");
}

#[tokio::test]
async fn invocation_details_merge_and_unregister() {
    let mut h = Harness::start(SessionConfig::default(), None);
    h.establish().await;

    let exec = Executor::new();
    let (reg_tx, mut reg_rx) = mpsc::unbounded_channel();
    let (details_tx, mut details_rx) = mpsc::unbounded_channel();
    h.send(Request::Register {
            procedure: "com.example.probe".to_string(),
            options: WampDict::new(),
            executor: exec,
            handler: Box::new(move |details, _args, _kwargs| {
                let details_tx = details_tx.clone();
                Box::pin(async move {
                    let _ = details_tx.send(details);
                    Ok(Arg::None)
                })
            }),
            on_registered: Box::new(move |reg| {
                let _ = reg_tx.send(reg);
            }),
            on_error: Box::new(|e| panic!("register failed : {}", e)),
        });

    let _register = h.next_frame().await;
    h.push(json!([65, 2, 43]));
    let reg = recv(&mut reg_rx).await;

    // Empty details arrive untouched
    h.push(json!([68, 3, 43, {}]));
    let _yield = h.next_frame().await;
    assert!(recv(&mut details_rx).await.is_empty());

    // Non-empty details get annotated with the procedure
    h.push(json!([68, 4, 43, {"caller": 7}]));
    let _yield = h.next_frame().await;
    let details = recv(&mut details_rx).await;
    assert_eq!(
        details.get("procedure"),
        Some(&Arg::String("com.example.probe".to_string()))
    );
    assert_eq!(details.get("caller"), Some(&Arg::UnsignedInteger(7)));

    // Unregister through the handle
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    reg.unregister(
        move || {
            let _ = done_tx.send(());
        },
        |e| panic!("unregister failed : {}", e),
    );
    assert_eq!(h.next_frame().await, json!([66, 5, 43]));
    h.push(json!([67, 5]));
    recv(&mut done_rx).await;
    assert!(!reg.is_active());

    // Invocations for the dead registration are orphans now
    h.push(json!([68, 6, 43, {}]));
    h.push(json!([6, {}, "wamp.error.system_shutdown"]));
    assert_eq!(
        h.next_frame().await,
        json!([6, {}, "wamp.error.goodbye_and_out"])
    );
    assert!(details_rx.try_recv().is_err());
}

#[tokio::test]
async fn router_initiated_goodbye_is_acknowledged() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    h.push(json!([6, {"message": "shutting down"}, "wamp.error.system_shutdown"]));
    assert_eq!(
        h.next_frame().await,
        json!([6, {}, "wamp.error.goodbye_and_out"])
    );
    assert_eq!(recv(&mut h.ended).await, "wamp.error.system_shutdown");
    h.wait_state(SessionState::Disconnected).await;
}

#[tokio::test]
async fn leaving_waits_for_the_reciprocal_goodbye() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    h.send(Request::Leave {
            reason: uris::CLOSE_REALM.to_string(),
        });
    assert_eq!(
        h.next_frame().await,
        json!([6, {}, "wamp.error.close_realm"])
    );
    h.wait_state(SessionState::Closing).await;

    h.push(json!([6, {}, "wamp.error.goodbye_and_out"]));
    assert_eq!(recv(&mut h.ended).await, "wamp.error.goodbye_and_out");
    h.wait_state(SessionState::Disconnected).await;
}

#[tokio::test]
async fn transport_loss_drains_pending_requests() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    let exec = Executor::new();
    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    h.send(Request::Call {
            procedure: "com.example.slow".to_string(),
            options: WampDict::new(),
            arguments: None,
            arguments_kw: None,
            executor: exec,
            on_result: Box::new(|_, _, _| panic!("the router never answered this")),
            on_error: Box::new(move |e| {
                let _ = err_tx.send(e);
            }),
        });
    let _call = h.next_frame().await;

    h.sever();

    let err = recv(&mut err_rx).await;
    assert_eq!(err.error, "wamp.error.network_failure");
    assert_eq!(recv(&mut h.ended).await, "Unknown error.");
    h.wait_state(SessionState::Disconnected).await;
}

#[tokio::test]
async fn requests_before_welcome_are_dropped() {
    let mut h = Harness::start(basic_roles(), None);

    let _hello = h.next_frame().await;
    h.send(Request::Call {
            procedure: "com.example.early".to_string(),
            options: WampDict::new(),
            arguments: None,
            arguments_kw: None,
            executor: Executor::new(),
            on_result: Box::new(|_, _, _| panic!("dropped calls never complete")),
            on_error: Box::new(|_| panic!("dropped calls never fail either")),
        });
    // Give the event loop a chance to process (and drop) the early call
    sleep(Duration::from_millis(100)).await;

    h.push(json!([2, 12345, {"roles": {"dealer": {}}}]));
    recv(&mut h.connected).await;

    let (sub_tx, mut sub_rx) = mpsc::unbounded_channel();
    h.send(Request::Subscribe {
            topic: "com.chan".to_string(),
            options: WampDict::new(),
            executor: Executor::new(),
            handler: Box::new(|_, _, _| {}),
            on_subscribed: Box::new(move |sub| {
                let _ = sub_tx.send(sub);
            }),
            on_error: Box::new(|e| panic!("subscribe failed : {}", e)),
        });

    // The dropped call allocated no request id : the subscribe gets 2
    assert_eq!(h.next_frame().await, json!([32, 2, {}, "com.chan"]));
    h.push(json!([33, 2, 1]));
    let _sub = recv(&mut sub_rx).await;
}

#[tokio::test]
async fn orphan_and_client_bound_frames_are_dropped() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    // Orphan replies for requests that were never issued
    h.push(json!([50, 99, {}]));
    h.push(json!([33, 98, 1]));
    h.push(json!([35, 97]));
    h.push(json!([17, 96, 1]));
    h.push(json!([65, 95, 2]));
    h.push(json!([67, 94]));
    h.push(json!([36, 555, 1, {}]));
    h.push(json!([68, 5, 556, {}]));
    h.push(json!([8, 48, 93, {}, "wamp.error.canceled"]));
    // ERROR with a request type the client never sends
    h.push(json!([8, 36, 92, {}, "wamp.error.canceled"]));
    // Variants the router should never send to a client
    h.push(json!([1, "realm1", {}]));
    h.push(json!([5, "sig", {}]));
    h.push(json!([48, 91, {}, "com.x"]));
    h.push(json!([70, 90, {}]));
    // Garbage that does not decode at all
    h.to_session.send(b"not json".to_vec()).unwrap();
    h.push(json!([99999, 1, {}]));

    // None of that was fatal : a call still round-trips
    let exec = Executor::new();
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    h.send(Request::Call {
            procedure: "com.example.ping".to_string(),
            options: WampDict::new(),
            arguments: None,
            arguments_kw: None,
            executor: exec,
            on_result: Box::new(move |_, _, _| {
                let _ = result_tx.send(());
            }),
            on_error: Box::new(|e| panic!("call failed : {}", e)),
        });
    assert_eq!(h.next_frame().await, json!([48, 2, {}, "com.example.ping"]));
    h.push(json!([50, 2, {}]));
    recv(&mut result_rx).await;
}

#[tokio::test]
async fn request_ids_grow_across_request_kinds() {
    let mut h = Harness::start(basic_roles(), None);
    h.establish().await;

    let exec = Executor::new();
    h.send(Request::Subscribe {
            topic: "com.a".to_string(),
            options: WampDict::new(),
            executor: exec.clone(),
            handler: Box::new(|_, _, _| {}),
            on_subscribed: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
        });
    assert_eq!(h.next_frame().await[1], 2);

    h.send(Request::Call {
            procedure: "com.b".to_string(),
            options: WampDict::new(),
            arguments: None,
            arguments_kw: None,
            executor: exec.clone(),
            on_result: Box::new(|_, _, _| {}),
            on_error: Box::new(|_| {}),
        });
    assert_eq!(h.next_frame().await[1], 3);

    h.send(Request::Publish {
            topic: "com.c".to_string(),
            options: WampDict::new(),
            arguments: None,
            arguments_kw: None,
            acknowledge: Some((exec, Box::new(|_| {}), Box::new(|_| {}))),
        });
    assert_eq!(h.next_frame().await[1], 4);
}
