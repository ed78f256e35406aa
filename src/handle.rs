use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::*;
use tokio::sync::mpsc::UnboundedSender;

use crate::common::*;
use crate::core::Request;
use crate::executor::Executor;

/// A live subscription, yielded by the subscribe success callback.
///
/// The handle observes the session without keeping it alive : once the
/// session is gone (or the router has confirmed removal) every operation on
/// the handle becomes a logged no-op.
pub struct Subscription {
    topic: WampUri,
    subscription_id: WampId,
    active: Arc<AtomicBool>,
    ctl_channel: UnboundedSender<Request>,
    executor: Executor,
}

impl Subscription {
    pub(crate) fn new(
        topic: WampUri,
        subscription_id: WampId,
        active: Arc<AtomicBool>,
        ctl_channel: UnboundedSender<Request>,
        executor: Executor,
    ) -> Self {
        Subscription {
            topic,
            subscription_id,
            active,
            ctl_channel,
            executor,
        }
    }

    /// Topic this subscription was created for
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscription ID assigned by the router
    pub fn id(&self) -> WampId {
        self.subscription_id
    }

    /// False once the router confirmed removal or the session ended
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Asks the router to stop delivering events for this subscription.
    ///
    /// Exactly one of the callbacks fires on this subscription's executor
    /// once the router answers.
    pub fn unsubscribe<S, E>(&self, on_done: S, on_error: E)
    where
        S: FnOnce() + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        if !self.is_active() {
            debug!(
                "unsubscribe on inactive subscription {} ({})",
                self.subscription_id, self.topic
            );
            return;
        }

        let req = Request::Unsubscribe {
            subscription: self.subscription_id,
            executor: self.executor.clone(),
            on_done: Box::new(on_done),
            on_error: Box::new(on_error),
        };
        if self.ctl_channel.send(req).is_err() {
            warn!(
                "Session is gone, cannot unsubscribe from '{}'",
                self.topic
            );
        }
    }
}

/// A live procedure registration, yielded by the register success callback.
pub struct Registration {
    procedure: WampUri,
    registration_id: WampId,
    active: Arc<AtomicBool>,
    ctl_channel: UnboundedSender<Request>,
    executor: Executor,
}

impl Registration {
    pub(crate) fn new(
        procedure: WampUri,
        registration_id: WampId,
        active: Arc<AtomicBool>,
        ctl_channel: UnboundedSender<Request>,
        executor: Executor,
    ) -> Self {
        Registration {
            procedure,
            registration_id,
            active,
            ctl_channel,
            executor,
        }
    }

    /// Procedure this registration serves
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Registration ID assigned by the router
    pub fn id(&self) -> WampId {
        self.registration_id
    }

    /// False once the router confirmed removal or the session ended
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Withdraws the procedure from the router.
    pub fn unregister<S, E>(&self, on_done: S, on_error: E)
    where
        S: FnOnce() + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        if !self.is_active() {
            debug!(
                "unregister on inactive registration {} ({})",
                self.registration_id, self.procedure
            );
            return;
        }

        let req = Request::Unregister {
            registration: self.registration_id,
            executor: self.executor.clone(),
            on_done: Box::new(on_done),
            on_error: Box::new(on_error),
        };
        if self.ctl_channel.send(req).is_err() {
            warn!(
                "Session is gone, cannot unregister '{}'",
                self.procedure
            );
        }
    }
}
