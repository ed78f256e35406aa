use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::*;

pub const HELLO_ID: WampId = 1;
pub const WELCOME_ID: WampId = 2;
pub const ABORT_ID: WampId = 3;
pub const CHALLENGE_ID: WampId = 4;
pub const AUTHENTICATE_ID: WampId = 5;
pub const GOODBYE_ID: WampId = 6;
pub const ERROR_ID: WampId = 8;
pub const PUBLISH_ID: WampId = 16;
pub const PUBLISHED_ID: WampId = 17;
pub const SUBSCRIBE_ID: WampId = 32;
pub const SUBSCRIBED_ID: WampId = 33;
pub const UNSUBSCRIBE_ID: WampId = 34;
pub const UNSUBSCRIBED_ID: WampId = 35;
pub const EVENT_ID: WampId = 36;
pub const CALL_ID: WampId = 48;
pub const RESULT_ID: WampId = 50;
pub const REGISTER_ID: WampId = 64;
pub const REGISTERED_ID: WampId = 65;
pub const UNREGISTER_ID: WampId = 66;
pub const UNREGISTERED_ID: WampId = 67;
pub const INVOCATION_ID: WampId = 68;
pub const YIELD_ID: WampId = 70;

/// A WAMP message as carried on the wire : `[type_code, ...fields]`
///
/// Trailing `arguments` / `arguments_kw` follow the WAMP elision rules :
/// a `None` kwargs is omitted, a `None` args with present kwargs is emitted
/// as the empty list, and both are omitted when both are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Sent by a client to initiate opening of a session to a realm
    Hello {
        realm: WampUri,
        details: WampDict,
    },
    /// Sent by the router to accept the client. The session is now open
    Welcome {
        session: WampId,
        details: WampDict,
    },
    /// Sent by a peer to abort the opening of a session. No response is expected
    Abort {
        details: WampDict,
        reason: WampUri,
    },
    /// Authentication challenge issued by the router in response to HELLO
    Challenge {
        authmethod: WampString,
        extra: WampDict,
    },
    /// The client's answer to a CHALLENGE
    Authenticate {
        signature: WampString,
        extra: WampDict,
    },
    /// Sent by a peer to close a previously opened session. Echoed by the receiver
    Goodbye {
        details: WampDict,
        reason: WampUri,
    },
    /// Error reply to a request, correlated by request type and id
    Error {
        typ: WampId,
        request: WampId,
        details: WampDict,
        error: WampUri,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Publish {
        request: WampId,
        options: WampDict,
        topic: WampUri,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Published {
        request: WampId,
        publication: WampId,
    },
    Subscribe {
        request: WampId,
        options: WampDict,
        topic: WampUri,
    },
    Subscribed {
        request: WampId,
        subscription: WampId,
    },
    Unsubscribe {
        request: WampId,
        subscription: WampId,
    },
    Unsubscribed {
        request: WampId,
    },
    Event {
        subscription: WampId,
        publication: WampId,
        details: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Call {
        request: WampId,
        options: WampDict,
        procedure: WampUri,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Result {
        request: WampId,
        details: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Register {
        request: WampId,
        options: WampDict,
        procedure: WampUri,
    },
    Registered {
        request: WampId,
        registration: WampId,
    },
    Unregister {
        request: WampId,
        registration: WampId,
    },
    Unregistered {
        request: WampId,
    },
    Invocation {
        request: WampId,
        registration: WampId,
        details: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
    Yield {
        request: WampId,
        options: WampDict,
        arguments: Option<WampArgs>,
        arguments_kw: Option<WampKwArgs>,
    },
}

impl Msg {
    /// Wire name, for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Msg::Hello { .. } => "HELLO",
            Msg::Welcome { .. } => "WELCOME",
            Msg::Abort { .. } => "ABORT",
            Msg::Challenge { .. } => "CHALLENGE",
            Msg::Authenticate { .. } => "AUTHENTICATE",
            Msg::Goodbye { .. } => "GOODBYE",
            Msg::Error { .. } => "ERROR",
            Msg::Publish { .. } => "PUBLISH",
            Msg::Published { .. } => "PUBLISHED",
            Msg::Subscribe { .. } => "SUBSCRIBE",
            Msg::Subscribed { .. } => "SUBSCRIBED",
            Msg::Unsubscribe { .. } => "UNSUBSCRIBE",
            Msg::Unsubscribed { .. } => "UNSUBSCRIBED",
            Msg::Event { .. } => "EVENT",
            Msg::Call { .. } => "CALL",
            Msg::Result { .. } => "RESULT",
            Msg::Register { .. } => "REGISTER",
            Msg::Registered { .. } => "REGISTERED",
            Msg::Unregister { .. } => "UNREGISTER",
            Msg::Unregistered { .. } => "UNREGISTERED",
            Msg::Invocation { .. } => "INVOCATION",
            Msg::Yield { .. } => "YIELD",
        }
    }
}

// Serializes the leading fields plus the optional trailing payload. An absent
// args slot must still be emitted as [] whenever kwargs are present.
macro_rules! ser_payload {
    ($serializer:expr, $args:expr, $kwargs:expr, $($field:expr),+) => {
        match ($args, $kwargs) {
            (Some(args), Some(kwargs)) => ($($field),+, args, kwargs).serialize($serializer),
            (None, Some(kwargs)) => ($($field),+, &WampList::new(), kwargs).serialize($serializer),
            (Some(args), None) => ($($field),+, args).serialize($serializer),
            (None, None) => ($($field),+).serialize($serializer),
        }
    };
}

impl Serialize for Msg {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Msg::Hello { realm, details } => (HELLO_ID, realm, details).serialize(serializer),
            Msg::Welcome { session, details } => {
                (WELCOME_ID, session, details).serialize(serializer)
            }
            Msg::Abort { details, reason } => (ABORT_ID, details, reason).serialize(serializer),
            Msg::Challenge { authmethod, extra } => {
                (CHALLENGE_ID, authmethod, extra).serialize(serializer)
            }
            Msg::Authenticate { signature, extra } => {
                (AUTHENTICATE_ID, signature, extra).serialize(serializer)
            }
            Msg::Goodbye { details, reason } => (GOODBYE_ID, details, reason).serialize(serializer),
            Msg::Error {
                typ,
                request,
                details,
                error,
                arguments,
                arguments_kw,
            } => ser_payload!(
                serializer,
                arguments,
                arguments_kw,
                ERROR_ID,
                typ,
                request,
                details,
                error
            ),
            Msg::Publish {
                request,
                options,
                topic,
                arguments,
                arguments_kw,
            } => ser_payload!(
                serializer,
                arguments,
                arguments_kw,
                PUBLISH_ID,
                request,
                options,
                topic
            ),
            Msg::Published {
                request,
                publication,
            } => (PUBLISHED_ID, request, publication).serialize(serializer),
            Msg::Subscribe {
                request,
                options,
                topic,
            } => (SUBSCRIBE_ID, request, options, topic).serialize(serializer),
            Msg::Subscribed {
                request,
                subscription,
            } => (SUBSCRIBED_ID, request, subscription).serialize(serializer),
            Msg::Unsubscribe {
                request,
                subscription,
            } => (UNSUBSCRIBE_ID, request, subscription).serialize(serializer),
            Msg::Unsubscribed { request } => (UNSUBSCRIBED_ID, request).serialize(serializer),
            Msg::Event {
                subscription,
                publication,
                details,
                arguments,
                arguments_kw,
            } => ser_payload!(
                serializer,
                arguments,
                arguments_kw,
                EVENT_ID,
                subscription,
                publication,
                details
            ),
            Msg::Call {
                request,
                options,
                procedure,
                arguments,
                arguments_kw,
            } => ser_payload!(
                serializer,
                arguments,
                arguments_kw,
                CALL_ID,
                request,
                options,
                procedure
            ),
            Msg::Result {
                request,
                details,
                arguments,
                arguments_kw,
            } => ser_payload!(
                serializer,
                arguments,
                arguments_kw,
                RESULT_ID,
                request,
                details
            ),
            Msg::Register {
                request,
                options,
                procedure,
            } => (REGISTER_ID, request, options, procedure).serialize(serializer),
            Msg::Registered {
                request,
                registration,
            } => (REGISTERED_ID, request, registration).serialize(serializer),
            Msg::Unregister {
                request,
                registration,
            } => (UNREGISTER_ID, request, registration).serialize(serializer),
            Msg::Unregistered { request } => (UNREGISTERED_ID, request).serialize(serializer),
            Msg::Invocation {
                request,
                registration,
                details,
                arguments,
                arguments_kw,
            } => ser_payload!(
                serializer,
                arguments,
                arguments_kw,
                INVOCATION_ID,
                request,
                registration,
                details
            ),
            Msg::Yield {
                request,
                options,
                arguments,
                arguments_kw,
            } => ser_payload!(
                serializer,
                arguments,
                arguments_kw,
                YIELD_ID,
                request,
                options
            ),
        }
    }
}

// Pulls the next required element out of the message array
macro_rules! elem {
    ($seq:expr, $what:expr) => {
        match $seq.next_element()? {
            Some(v) => v,
            None => return Err(de::Error::custom(concat!("message truncated before ", $what))),
        }
    };
}

struct MsgVisitor;

impl<'de> Visitor<'de> for MsgVisitor {
    type Value = Msg;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a WAMP message array")
    }

    fn visit_seq<V>(self, mut seq: V) -> Result<Msg, V::Error>
    where
        V: SeqAccess<'de>,
    {
        let typ: WampId = elem!(seq, "its type code");
        match typ {
            HELLO_ID => Ok(Msg::Hello {
                realm: elem!(seq, "the realm uri"),
                details: elem!(seq, "the details dict"),
            }),
            WELCOME_ID => Ok(Msg::Welcome {
                session: elem!(seq, "the session id"),
                details: elem!(seq, "the details dict"),
            }),
            ABORT_ID => Ok(Msg::Abort {
                details: elem!(seq, "the details dict"),
                reason: elem!(seq, "the reason uri"),
            }),
            CHALLENGE_ID => Ok(Msg::Challenge {
                authmethod: elem!(seq, "the authmethod"),
                extra: elem!(seq, "the extra dict"),
            }),
            AUTHENTICATE_ID => Ok(Msg::Authenticate {
                signature: elem!(seq, "the signature"),
                extra: elem!(seq, "the extra dict"),
            }),
            GOODBYE_ID => Ok(Msg::Goodbye {
                details: elem!(seq, "the details dict"),
                reason: elem!(seq, "the reason uri"),
            }),
            ERROR_ID => Ok(Msg::Error {
                typ: elem!(seq, "the request type"),
                request: elem!(seq, "the request id"),
                details: elem!(seq, "the details dict"),
                error: elem!(seq, "the error uri"),
                arguments: seq.next_element()?,
                arguments_kw: seq.next_element()?,
            }),
            PUBLISH_ID => Ok(Msg::Publish {
                request: elem!(seq, "the request id"),
                options: elem!(seq, "the options dict"),
                topic: elem!(seq, "the topic uri"),
                arguments: seq.next_element()?,
                arguments_kw: seq.next_element()?,
            }),
            PUBLISHED_ID => Ok(Msg::Published {
                request: elem!(seq, "the request id"),
                publication: elem!(seq, "the publication id"),
            }),
            SUBSCRIBE_ID => Ok(Msg::Subscribe {
                request: elem!(seq, "the request id"),
                options: elem!(seq, "the options dict"),
                topic: elem!(seq, "the topic uri"),
            }),
            SUBSCRIBED_ID => Ok(Msg::Subscribed {
                request: elem!(seq, "the request id"),
                subscription: elem!(seq, "the subscription id"),
            }),
            UNSUBSCRIBE_ID => Ok(Msg::Unsubscribe {
                request: elem!(seq, "the request id"),
                subscription: elem!(seq, "the subscription id"),
            }),
            UNSUBSCRIBED_ID => Ok(Msg::Unsubscribed {
                request: elem!(seq, "the request id"),
            }),
            EVENT_ID => Ok(Msg::Event {
                subscription: elem!(seq, "the subscription id"),
                publication: elem!(seq, "the publication id"),
                details: elem!(seq, "the details dict"),
                arguments: seq.next_element()?,
                arguments_kw: seq.next_element()?,
            }),
            CALL_ID => Ok(Msg::Call {
                request: elem!(seq, "the request id"),
                options: elem!(seq, "the options dict"),
                procedure: elem!(seq, "the procedure uri"),
                arguments: seq.next_element()?,
                arguments_kw: seq.next_element()?,
            }),
            RESULT_ID => Ok(Msg::Result {
                request: elem!(seq, "the request id"),
                details: elem!(seq, "the details dict"),
                arguments: seq.next_element()?,
                arguments_kw: seq.next_element()?,
            }),
            REGISTER_ID => Ok(Msg::Register {
                request: elem!(seq, "the request id"),
                options: elem!(seq, "the options dict"),
                procedure: elem!(seq, "the procedure uri"),
            }),
            REGISTERED_ID => Ok(Msg::Registered {
                request: elem!(seq, "the request id"),
                registration: elem!(seq, "the registration id"),
            }),
            UNREGISTER_ID => Ok(Msg::Unregister {
                request: elem!(seq, "the request id"),
                registration: elem!(seq, "the registration id"),
            }),
            UNREGISTERED_ID => Ok(Msg::Unregistered {
                request: elem!(seq, "the request id"),
            }),
            INVOCATION_ID => Ok(Msg::Invocation {
                request: elem!(seq, "the request id"),
                registration: elem!(seq, "the registration id"),
                details: elem!(seq, "the details dict"),
                arguments: seq.next_element()?,
                arguments_kw: seq.next_element()?,
            }),
            YIELD_ID => Ok(Msg::Yield {
                request: elem!(seq, "the request id"),
                options: elem!(seq, "the options dict"),
                arguments: seq.next_element()?,
                arguments_kw: seq.next_element()?,
            }),
            t => Err(de::Error::custom(format!("unknown message type {}", t))),
        }
    }
}

impl<'de> Deserialize<'de> for Msg {
    fn deserialize<D>(deserializer: D) -> Result<Msg, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(MsgVisitor)
    }
}
