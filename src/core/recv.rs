use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::*;

use crate::common::*;
use crate::core::*;
use crate::handle::{Registration, Subscription};
use crate::message::*;

pub async fn welcome(core: &mut Core, session: WampId, details: WampDict) -> Status {
    match core.state {
        SessionState::HelloSent | SessionState::Challenged => {}
        s => {
            warn!("Server sent WELCOME while the session is {:?}", s);
            return Status::Ok;
        }
    }

    core.session_id = Some(session);
    core.server_roles = match details.get("roles") {
        Some(Arg::Dict(roles)) => roles.keys().cloned().collect(),
        _ => {
            warn!("WELCOME details did not advertise any role");
            HashSet::new()
        }
    };
    core.set_state(SessionState::Established);
    debug!("Connected with session_id {} !", session);

    let delegate = core.delegate.clone();
    core.delegate_executor
        .submit_fn(move || delegate.connected(session));
    Status::Ok
}

pub async fn challenge(core: &mut Core, authmethod: WampString, extra: WampDict) -> Status {
    if core.state != SessionState::HelloSent {
        warn!(
            "Server sent a CHALLENGE while the session is {:?}",
            core.state
        );
        return Status::Ok;
    }
    core.set_state(SessionState::Challenged);

    let delegate = core.delegate.clone();
    match delegate.handle_challenge(authmethod, extra).await {
        Some(signature) => {
            let msg = Msg::Authenticate {
                signature,
                extra: WampDict::new(),
            };
            if let Err(e) = core.send(&msg).await {
                return Status::Ended(SessionEnd::Error(e));
            }
            Status::Ok
        }
        None => {
            let reason = "No challenge delegate found.";
            let mut details = WampDict::new();
            details.insert("message".to_string(), Arg::String(reason.to_string()));
            let msg = Msg::Abort {
                details,
                reason: uris::SYSTEM_SHUTDOWN.to_string(),
            };
            if let Err(e) = core.send(&msg).await {
                warn!("Failed to send ABORT : {}", e);
            }
            core.set_state(SessionState::Aborted);
            Status::Ended(SessionEnd::Reason(reason.to_string()))
        }
    }
}

pub async fn abort(core: &mut Core, details: WampDict, reason: WampUri) -> Status {
    match core.state {
        SessionState::HelloSent | SessionState::Challenged => {
            debug!("Server aborted the session : {} {:?}", reason, details);
            core.set_state(SessionState::Aborted);
            Status::Ended(SessionEnd::Reason(reason))
        }
        s => {
            warn!("Server sent ABORT while the session is {:?}", s);
            Status::Ok
        }
    }
}

pub async fn goodbye(core: &mut Core, details: WampDict, reason: WampUri) -> Status {
    match core.state {
        SessionState::Established | SessionState::Closing => {}
        s => {
            warn!("Server sent GOODBYE while the session is {:?}", s);
            return Status::Ok;
        }
    }

    // A router initiated GOODBYE must be acknowledged before closing
    if reason != uris::GOODBYE_AND_OUT {
        debug!("Server left the realm : {} {:?}", reason, details);
        let msg = Msg::Goodbye {
            details: WampDict::new(),
            reason: uris::GOODBYE_AND_OUT.to_string(),
        };
        if let Err(e) = core.send(&msg).await {
            warn!("Failed to acknowledge GOODBYE : {}", e);
        }
    }

    core.set_state(SessionState::Disconnected);
    Status::Ended(SessionEnd::Reason(reason))
}

pub fn call_result(
    core: &mut Core,
    request: WampId,
    details: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
) -> Status {
    let pending = match core.pending_calls.remove(&request) {
        Some(p) => p,
        None => {
            warn!("Server sent RESULT for an unknown request : {}", request);
            return Status::Ok;
        }
    };

    let on_result = pending.on_result;
    pending
        .executor
        .submit_fn(move || on_result(details, arguments, arguments_kw));
    Status::Ok
}

pub fn error(
    core: &mut Core,
    typ: WampId,
    request: WampId,
    details: WampDict,
    error: WampUri,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
) -> Status {
    macro_rules! reject {
        ($table:expr, $err:expr) => {
            match $table.remove(&request) {
                Some(pending) => {
                    let on_error = pending.on_error;
                    let err = $err;
                    pending.executor.submit_fn(move || on_error(err));
                }
                None => warn!(
                    "Server sent an ERROR for an unknown request : {} (type {})",
                    request, typ
                ),
            }
        };
    }

    match typ {
        // Only CALL errors carry a payload back to the application
        CALL_ID => reject!(
            core.pending_calls,
            RequestError {
                details,
                error,
                arguments,
                arguments_kw,
            }
        ),
        SUBSCRIBE_ID => reject!(
            core.pending_subscriptions,
            RequestError {
                details,
                error,
                arguments: None,
                arguments_kw: None,
            }
        ),
        UNSUBSCRIBE_ID => reject!(
            core.pending_unsubscribes,
            RequestError {
                details,
                error,
                arguments: None,
                arguments_kw: None,
            }
        ),
        PUBLISH_ID => reject!(
            core.pending_publishes,
            RequestError {
                details,
                error,
                arguments: None,
                arguments_kw: None,
            }
        ),
        REGISTER_ID => reject!(
            core.pending_registrations,
            RequestError {
                details,
                error,
                arguments: None,
                arguments_kw: None,
            }
        ),
        UNREGISTER_ID => reject!(
            core.pending_unregisters,
            RequestError {
                details,
                error,
                arguments: None,
                arguments_kw: None,
            }
        ),
        t => warn!("Server sent an ERROR for an unsupported request type : {}", t),
    }
    Status::Ok
}

pub fn subscribed(core: &mut Core, request: WampId, subscription: WampId) -> Status {
    let pending = match core.pending_subscriptions.remove(&request) {
        Some(p) => p,
        None => {
            warn!("Server sent SUBSCRIBED for an unknown request : {}", request);
            return Status::Ok;
        }
    };
    if core.subscriptions.contains_key(&subscription) {
        warn!(
            "Server sent SUBSCRIBED for an id already in use : {}",
            subscription
        );
        return Status::Ok;
    }

    let active = Arc::new(AtomicBool::new(true));
    core.subscriptions.insert(
        subscription,
        SubscriptionRecord {
            topic: pending.topic.clone(),
            handler: Arc::new(Mutex::new(pending.handler)),
            executor: pending.executor.clone(),
            active: active.clone(),
        },
    );

    let handle = Subscription::new(
        pending.topic,
        subscription,
        active,
        core.ctl_sender.clone(),
        pending.executor.clone(),
    );
    let on_subscribed = pending.on_subscribed;
    pending.executor.submit_fn(move || on_subscribed(handle));
    Status::Ok
}

pub fn unsubscribed(core: &mut Core, request: WampId) -> Status {
    let pending = match core.pending_unsubscribes.remove(&request) {
        Some(p) => p,
        None => {
            warn!(
                "Server sent UNSUBSCRIBED for an unknown request : {}",
                request
            );
            return Status::Ok;
        }
    };

    match core.subscriptions.remove(&pending.subscription) {
        Some(record) => record.active.store(false, Ordering::Release),
        None => warn!(
            "UNSUBSCRIBED for a subscription we no longer track : {}",
            pending.subscription
        ),
    }

    let on_done = pending.on_done;
    pending.executor.submit_fn(on_done);
    Status::Ok
}

pub fn published(core: &mut Core, request: WampId, publication: WampId) -> Status {
    let pending = match core.pending_publishes.remove(&request) {
        Some(p) => p,
        None => {
            warn!("Server sent PUBLISHED for an unknown request : {}", request);
            return Status::Ok;
        }
    };

    let on_published = pending.on_published;
    pending
        .executor
        .submit_fn(move || on_published(publication));
    Status::Ok
}

pub fn event(
    core: &mut Core,
    subscription: WampId,
    publication: WampId,
    details: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
) -> Status {
    let record = match core.subscriptions.get(&subscription) {
        Some(r) => r,
        None => {
            warn!(
                "Server sent EVENT {} for a subscription we do not hold : {}",
                publication, subscription
            );
            return Status::Ok;
        }
    };

    // Non-empty details are annotated with the topic the event belongs to
    let mut details = details;
    if !details.is_empty() {
        details.insert("topic".to_string(), Arg::String(record.topic.clone()));
    }

    let handler = record.handler.clone();
    record.executor.submit_fn(move || match handler.lock() {
        Ok(mut handler) => (*handler)(details, arguments, arguments_kw),
        Err(_) => warn!("Event handler poisoned by an earlier panic"),
    });
    Status::Ok
}

pub fn registered(core: &mut Core, request: WampId, registration: WampId) -> Status {
    let pending = match core.pending_registrations.remove(&request) {
        Some(p) => p,
        None => {
            warn!("Server sent REGISTERED for an unknown request : {}", request);
            return Status::Ok;
        }
    };
    if core.registrations.contains_key(&registration) {
        warn!(
            "Server sent REGISTERED for an id already in use : {}",
            registration
        );
        return Status::Ok;
    }

    let active = Arc::new(AtomicBool::new(true));
    core.registrations.insert(
        registration,
        RegistrationRecord {
            procedure: pending.procedure.clone(),
            handler: Arc::from(pending.handler),
            executor: pending.executor.clone(),
            active: active.clone(),
        },
    );

    let handle = Registration::new(
        pending.procedure,
        registration,
        active,
        core.ctl_sender.clone(),
        pending.executor.clone(),
    );
    let on_registered = pending.on_registered;
    pending.executor.submit_fn(move || on_registered(handle));
    Status::Ok
}

pub fn unregistered(core: &mut Core, request: WampId) -> Status {
    let pending = match core.pending_unregisters.remove(&request) {
        Some(p) => p,
        None => {
            warn!(
                "Server sent UNREGISTERED for an unknown request : {}",
                request
            );
            return Status::Ok;
        }
    };

    match core.registrations.remove(&pending.registration) {
        Some(record) => record.active.store(false, Ordering::Release),
        None => warn!(
            "UNREGISTERED for a registration we no longer track : {}",
            pending.registration
        ),
    }

    let on_done = pending.on_done;
    pending.executor.submit_fn(on_done);
    Status::Ok
}

pub fn invocation(
    core: &mut Core,
    request: WampId,
    registration: WampId,
    details: WampDict,
    arguments: Option<WampArgs>,
    arguments_kw: Option<WampKwArgs>,
) -> Status {
    let record = match core.registrations.get(&registration) {
        Some(r) => r,
        None => {
            warn!(
                "Server sent INVOCATION {} for a registration we do not hold : {}",
                request, registration
            );
            return Status::Ok;
        }
    };

    // Non-empty details are annotated with the procedure being invoked
    let mut details = details;
    if !details.is_empty() {
        details.insert(
            "procedure".to_string(),
            Arg::String(record.procedure.clone()),
        );
    }

    // The handler runs on the registration's executor and posts its outcome
    // back to the core, which turns it into a YIELD (or an ERROR)
    let handler = record.handler.clone();
    let ctl_channel = core.ctl_sender.clone();
    record.executor.submit(async move {
        let result = (*handler)(details, arguments, arguments_kw).await;
        if ctl_channel.send(Request::Yield { request, result }).is_err() {
            warn!(
                "Session is gone, dropping the outcome of invocation {}",
                request
            );
        }
    });
    Status::Ok
}
