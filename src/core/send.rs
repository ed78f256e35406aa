use log::*;

use crate::common::*;
use crate::core::*;
use crate::executor::Executor;
use crate::message::*;

/// Requests posted by the session handle (or by handles and invocation jobs)
/// to the core event loop. All table mutation happens on the core task.
pub enum Request {
    Call {
        procedure: WampUri,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
        executor: Executor,
        on_result: CallCallback,
        on_error: ErrorCallback,
    },
    Subscribe {
        topic: WampUri,
        options: WampDict,
        executor: Executor,
        handler: EventHandler,
        on_subscribed: SubscribeCallback,
        on_error: ErrorCallback,
    },
    Unsubscribe {
        subscription: WampId,
        executor: Executor,
        on_done: AckCallback,
        on_error: ErrorCallback,
    },
    Publish {
        topic: WampUri,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
        /// Present when the caller wants the publication acknowledged
        acknowledge: Option<(Executor, PublishCallback, ErrorCallback)>,
    },
    Register {
        procedure: WampUri,
        options: WampDict,
        executor: Executor,
        handler: InvocationHandler,
        on_registered: RegisterCallback,
        on_error: ErrorCallback,
    },
    Unregister {
        registration: WampId,
        executor: Executor,
        on_done: AckCallback,
        on_error: ErrorCallback,
    },
    /// Outcome of an invocation handler, posted back from its executor
    Yield {
        request: WampId,
        result: Result<Arg, WampError>,
    },
    /// Announce leaving the realm with a GOODBYE
    Leave { reason: WampUri },
    /// Tear the connection down without the GOODBYE exchange
    Shutdown,
}

// Payload slots are elided on the wire when empty
fn scrub_args(arguments: Option<WampArgs>) -> Option<WampArgs> {
    arguments.filter(|a| !a.is_empty())
}
fn scrub_kwargs(arguments_kw: Option<WampKwArgs>) -> Option<WampKwArgs> {
    arguments_kw.filter(|k| !k.is_empty())
}

pub async fn call(
    core: &mut Core,
    procedure: WampUri,
    options: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
    executor: Executor,
    on_result: CallCallback,
    on_error: ErrorCallback,
) -> Status {
    if !core.is_established() {
        warn!("Dropping call to '{}' : not connected to a realm", procedure);
        return Status::Ok;
    }

    let request = core.create_request();
    let msg = Msg::Call {
        request,
        options,
        procedure,
        arguments: scrub_args(arguments),
        arguments_kw: scrub_kwargs(arguments_kw),
    };
    if let Err(e) = core.send(&msg).await {
        executor.submit_fn(move || on_error(RequestError::transport_closed()));
        return Status::Ended(SessionEnd::Error(e));
    }

    core.pending_calls.insert(
        request,
        PendingCall {
            on_result,
            on_error,
            executor,
        },
    );
    Status::Ok
}

pub async fn subscribe(
    core: &mut Core,
    topic: WampUri,
    options: WampDict,
    executor: Executor,
    handler: EventHandler,
    on_subscribed: SubscribeCallback,
    on_error: ErrorCallback,
) -> Status {
    if !core.is_established() {
        warn!(
            "Dropping subscribe to '{}' : not connected to a realm",
            topic
        );
        return Status::Ok;
    }

    let request = core.create_request();
    let msg = Msg::Subscribe {
        request,
        options,
        topic: topic.clone(),
    };
    if let Err(e) = core.send(&msg).await {
        executor.submit_fn(move || on_error(RequestError::transport_closed()));
        return Status::Ended(SessionEnd::Error(e));
    }

    core.pending_subscriptions.insert(
        request,
        PendingSubscribe {
            topic,
            handler,
            on_subscribed,
            on_error,
            executor,
        },
    );
    Status::Ok
}

pub async fn unsubscribe(
    core: &mut Core,
    subscription: WampId,
    executor: Executor,
    on_done: AckCallback,
    on_error: ErrorCallback,
) -> Status {
    if !core.is_established() {
        warn!(
            "Dropping unsubscribe of {} : not connected to a realm",
            subscription
        );
        return Status::Ok;
    }

    let request = core.create_request();
    let msg = Msg::Unsubscribe {
        request,
        subscription,
    };
    if let Err(e) = core.send(&msg).await {
        executor.submit_fn(move || on_error(RequestError::transport_closed()));
        return Status::Ended(SessionEnd::Error(e));
    }

    core.pending_unsubscribes.insert(
        request,
        PendingUnsubscribe {
            subscription,
            on_done,
            on_error,
            executor,
        },
    );
    Status::Ok
}

pub async fn publish(
    core: &mut Core,
    topic: WampUri,
    mut options: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
    acknowledge: Option<(Executor, PublishCallback, ErrorCallback)>,
) -> Status {
    if !core.is_established() {
        warn!("Dropping publish to '{}' : not connected to a realm", topic);
        return Status::Ok;
    }

    let request = core.create_request();
    if acknowledge.is_some() {
        options.insert("acknowledge".to_string(), Arg::Bool(true));
    }
    let msg = Msg::Publish {
        request,
        options,
        topic,
        arguments: scrub_args(arguments),
        arguments_kw: scrub_kwargs(arguments_kw),
    };
    if let Err(e) = core.send(&msg).await {
        if let Some((executor, _, on_error)) = acknowledge {
            executor.submit_fn(move || on_error(RequestError::transport_closed()));
        }
        return Status::Ended(SessionEnd::Error(e));
    }

    // Unacknowledged publishes leave no trace
    if let Some((executor, on_published, on_error)) = acknowledge {
        core.pending_publishes.insert(
            request,
            PendingPublish {
                on_published,
                on_error,
                executor,
            },
        );
    }
    Status::Ok
}

pub async fn register(
    core: &mut Core,
    procedure: WampUri,
    options: WampDict,
    executor: Executor,
    handler: InvocationHandler,
    on_registered: RegisterCallback,
    on_error: ErrorCallback,
) -> Status {
    if !core.is_established() {
        warn!(
            "Dropping register of '{}' : not connected to a realm",
            procedure
        );
        return Status::Ok;
    }

    let request = core.create_request();
    let msg = Msg::Register {
        request,
        options,
        procedure: procedure.clone(),
    };
    if let Err(e) = core.send(&msg).await {
        executor.submit_fn(move || on_error(RequestError::transport_closed()));
        return Status::Ended(SessionEnd::Error(e));
    }

    core.pending_registrations.insert(
        request,
        PendingRegister {
            procedure,
            handler,
            on_registered,
            on_error,
            executor,
        },
    );
    Status::Ok
}

pub async fn unregister(
    core: &mut Core,
    registration: WampId,
    executor: Executor,
    on_done: AckCallback,
    on_error: ErrorCallback,
) -> Status {
    if !core.is_established() {
        warn!(
            "Dropping unregister of {} : not connected to a realm",
            registration
        );
        return Status::Ok;
    }

    let request = core.create_request();
    let msg = Msg::Unregister {
        request,
        registration,
    };
    if let Err(e) = core.send(&msg).await {
        executor.submit_fn(move || on_error(RequestError::transport_closed()));
        return Status::Ended(SessionEnd::Error(e));
    }

    core.pending_unregisters.insert(
        request,
        PendingUnregister {
            registration,
            on_done,
            on_error,
            executor,
        },
    );
    Status::Ok
}

/// Shapes an invocation outcome into a YIELD, or an ERROR when the handler
/// failed : a dict travels as keyword results, a list as positional results
/// and any other value as a single positional result.
pub async fn yield_result(
    core: &mut Core,
    request: WampId,
    result: Result<Arg, WampError>,
) -> Status {
    if !core.is_established() {
        debug!(
            "Dropping the outcome of invocation {} : not connected to a realm",
            request
        );
        return Status::Ok;
    }

    let msg = match result {
        Ok(Arg::Dict(kwargs)) => Msg::Yield {
            request,
            options: WampDict::new(),
            arguments: None,
            arguments_kw: Some(kwargs),
        },
        Ok(Arg::List(args)) => Msg::Yield {
            request,
            options: WampDict::new(),
            arguments: Some(args),
            arguments_kw: None,
        },
        Ok(value) => Msg::Yield {
            request,
            options: WampDict::new(),
            arguments: Some(vec![value]),
            arguments_kw: None,
        },
        Err(e) => Msg::Error {
            typ: INVOCATION_ID,
            request,
            details: WampDict::new(),
            error: uris::INVOCATION_FAILED.to_string(),
            arguments: Some(vec![Arg::String(e.to_string())]),
            arguments_kw: None,
        },
    };

    if let Err(e) = core.send(&msg).await {
        return Status::Ended(SessionEnd::Error(e));
    }
    Status::Ok
}

pub async fn leave(core: &mut Core, reason: WampUri) -> Status {
    if !core.is_established() {
        warn!("Dropping GOODBYE : not connected to a realm");
        return Status::Ok;
    }

    let msg = Msg::Goodbye {
        details: WampDict::new(),
        reason,
    };
    if let Err(e) = core.send(&msg).await {
        return Status::Ended(SessionEnd::Error(e));
    }

    // The router is expected to answer with its own GOODBYE
    core.set_state(SessionState::Closing);
    Status::Ok
}
