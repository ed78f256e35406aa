use std::collections::HashMap;
use std::fmt;

use futures::future::BoxFuture;
use log::*;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WampError;
use crate::handle::{Registration, Subscription};
use crate::serializer::SerializerError;

/// wamp.2.* URI
pub type WampUri = String;
/// Integer ID issued by a peer (session, request, subscription, ...)
pub type WampId = u64;
/// Unicode string
pub type WampString = String;
/// Boolean value
pub type WampBool = bool;
/// String keyed map of values
pub type WampDict = HashMap<WampString, Arg>;
/// List of values
pub type WampList = Vec<Arg>;
/// Positional payload arguments
pub type WampArgs = WampList;
/// Keyword payload arguments
pub type WampKwArgs = WampDict;

/// Future returned by the session event loop, to be spawned by the caller
pub type GenericFuture = BoxFuture<'static, Result<(), WampError>>;

/// Agent string advertised in the HELLO details
pub const DEFAULT_AGENT_STR: &str = concat!("wamp_session-rs-", env!("CARGO_PKG_VERSION"));

/// Reserved URIs emitted by the session itself
pub mod uris {
    /// Default reason when the client leaves a realm
    pub const CLOSE_REALM: &str = "wamp.error.close_realm";
    /// Acknowledgement of a router initiated GOODBYE
    pub const GOODBYE_AND_OUT: &str = "wamp.error.goodbye_and_out";
    /// Self abort reason when a CHALLENGE cannot be answered
    pub const SYSTEM_SHUTDOWN: &str = "wamp.error.system_shutdown";
    /// Synthetic error used to cancel pending requests when the transport dies
    pub const NETWORK_FAILURE: &str = "wamp.error.network_failure";
    /// Error URI sent back when an invocation handler fails
    pub const INVOCATION_FAILED: &str = "wamp.session.rs.invocation.failed";
}

/// Roles a client can advertise in HELLO
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ClientRole {
    /// Issue CALL requests
    Caller,
    /// Register procedures and answer INVOCATIONs
    Callee,
    /// Publish events
    Publisher,
    /// Subscribe to topics
    Subscriber,
}

/// Authentication methods advertised in the HELLO details
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AuthenticationMethod {
    Anonymous,
    Ticket,
    Wampcra,
    CryptoSign,
}

/// Generic value carried in message payloads, details and options
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Negative integers. Non-negative values deserialize as `UnsignedInteger`
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    String(WampString),
    Bool(WampBool),
    List(WampList),
    Dict(WampDict),
    /// null / nil
    None,
}

impl Serialize for Arg {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Arg::Integer(v) => serializer.serialize_i64(*v),
            Arg::UnsignedInteger(v) => serializer.serialize_u64(*v),
            Arg::Float(v) => serializer.serialize_f64(*v),
            Arg::String(v) => serializer.serialize_str(v),
            Arg::Bool(v) => serializer.serialize_bool(*v),
            Arg::List(v) => v.serialize(serializer),
            Arg::Dict(v) => v.serialize(serializer),
            Arg::None => serializer.serialize_none(),
        }
    }
}

struct ArgVisitor;

impl<'de> Visitor<'de> for ArgVisitor {
    type Value = Arg;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a WAMP value")
    }

    #[inline]
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Arg, E> {
        Ok(Arg::Integer(v))
    }
    #[inline]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Arg, E> {
        Ok(Arg::UnsignedInteger(v))
    }
    #[inline]
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Arg, E> {
        Ok(Arg::Float(v))
    }
    #[inline]
    fn visit_str<E: de::Error>(self, v: &str) -> Result<Arg, E> {
        Ok(Arg::String(v.to_string()))
    }
    #[inline]
    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Arg, E> {
        Ok(Arg::Bool(v))
    }
    #[inline]
    fn visit_none<E: de::Error>(self) -> Result<Arg, E> {
        Ok(Arg::None)
    }
    #[inline]
    fn visit_unit<E: de::Error>(self) -> Result<Arg, E> {
        Ok(Arg::None)
    }

    fn visit_seq<V: de::SeqAccess<'de>>(self, mut seq: V) -> Result<Arg, V::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element()? {
            values.push(value);
        }
        Ok(Arg::List(values))
    }

    fn visit_map<V: de::MapAccess<'de>>(self, mut map: V) -> Result<Arg, V::Error> {
        let mut values = HashMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry()? {
            values.insert(key, value);
        }
        Ok(Arg::Dict(values))
    }
}

impl<'de> Deserialize<'de> for Arg {
    fn deserialize<D>(deserializer: D) -> Result<Arg, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ArgVisitor)
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Integer(v)
    }
}
impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Integer(v as i64)
    }
}
impl From<u64> for Arg {
    fn from(v: u64) -> Self {
        Arg::UnsignedInteger(v)
    }
}
impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::UnsignedInteger(v as u64)
    }
}
impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}
impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}
impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::String(v.to_string())
    }
}
impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::String(v)
    }
}
impl From<WampList> for Arg {
    fn from(v: WampList) -> Self {
        Arg::List(v)
    }
}
impl From<WampDict> for Arg {
    fn from(v: WampDict) -> Self {
        Arg::Dict(v)
    }
}

/// Converts any serializable value into an [`Arg`] payload value
pub fn try_into_arg<T: Serialize>(value: T) -> Result<Arg, WampError> {
    let json =
        serde_json::to_value(value).map_err(|e| SerializerError::Serialization(e.to_string()))?;
    Ok(json_to_arg(json))
}

/// Converts an [`Arg`] payload value back into a deserializable type
pub fn try_from_arg<T: for<'de> Deserialize<'de>>(value: Arg) -> Result<T, WampError> {
    serde_json::from_value(arg_to_json(value))
        .map_err(|e| SerializerError::Deserialization(e.to_string()).into())
}

fn json_to_arg(value: serde_json::Value) -> Arg {
    use serde_json::Value;
    match value {
        Value::Null => Arg::None,
        Value::Bool(v) => Arg::Bool(v),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Arg::UnsignedInteger(v)
            } else if let Some(v) = n.as_i64() {
                Arg::Integer(v)
            } else {
                Arg::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(v) => Arg::String(v),
        Value::Array(v) => Arg::List(v.into_iter().map(json_to_arg).collect()),
        Value::Object(v) => Arg::Dict(v.into_iter().map(|(k, v)| (k, json_to_arg(v))).collect()),
    }
}

fn arg_to_json(value: Arg) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Arg::None => Value::Null,
        Arg::Bool(v) => Value::Bool(v),
        Arg::Integer(v) => Value::from(v),
        Arg::UnsignedInteger(v) => Value::from(v),
        Arg::Float(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Arg::String(v) => Value::String(v),
        Arg::List(v) => Value::Array(v.into_iter().map(arg_to_json).collect()),
        Arg::Dict(v) => Value::Object(v.into_iter().map(|(k, v)| (k, arg_to_json(v))).collect()),
    }
}

/// Error reply correlated back to the request that caused it
#[derive(Debug)]
pub struct RequestError {
    /// Details dict from the ERROR message
    pub details: WampDict,
    /// Error URI
    pub error: WampUri,
    /// Positional error arguments (CALL errors only)
    pub arguments: Option<WampArgs>,
    /// Keyword error arguments (CALL errors only)
    pub arguments_kw: Option<WampKwArgs>,
}

impl RequestError {
    pub(crate) fn transport_closed() -> Self {
        let mut details = WampDict::new();
        details.insert(
            "message".to_string(),
            Arg::String("transport closed".to_string()),
        );
        RequestError {
            details,
            error: uris::NETWORK_FAILURE.to_string(),
            arguments: None,
            arguments_kw: None,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Callback invoked with the outcome of a CALL
pub type CallCallback = Box<dyn FnOnce(WampDict, Option<WampArgs>, Option<WampKwArgs>) + Send>;
/// Callback invoked when a request fails with an ERROR reply
pub type ErrorCallback = Box<dyn FnOnce(RequestError) + Send>;
/// Callback invoked with the new handle once a SUBSCRIBE is acknowledged
pub type SubscribeCallback = Box<dyn FnOnce(Subscription) + Send>;
/// Callback invoked with the new handle once a REGISTER is acknowledged
pub type RegisterCallback = Box<dyn FnOnce(Registration) + Send>;
/// Callback invoked with the publication ID of an acknowledged PUBLISH
pub type PublishCallback = Box<dyn FnOnce(WampId) + Send>;
/// Callback invoked once an UNSUBSCRIBE / UNREGISTER is acknowledged
pub type AckCallback = Box<dyn FnOnce() + Send>;
/// Handler invoked for every EVENT delivered on a subscription
pub type EventHandler = Box<dyn FnMut(WampDict, Option<WampArgs>, Option<WampKwArgs>) + Send>;
/// Handler invoked for every INVOCATION on a registration. The resolved value
/// is shaped into the YIELD payload: a dict becomes keyword results, a list
/// becomes positional results, anything else a single positional result.
pub type InvocationHandler = Box<
    dyn Fn(
            WampDict,
            Option<WampArgs>,
            Option<WampKwArgs>,
        ) -> BoxFuture<'static, Result<Arg, WampError>>
        + Send
        + Sync,
>;

/// Returns whether a uri is valid or not (using strict rules)
///
/// The session never enforces this on its own; it is available for
/// applications that want to validate topics and procedures up front.
pub fn is_valid_strict_uri<T: AsRef<str>>(in_uri: T) -> bool {
    let uri = in_uri.as_ref();
    if uri.is_empty() {
        return false;
    }
    if uri.starts_with("wamp.") {
        warn!("URI '{}' cannot start with 'wamp'", uri);
        return false;
    }

    for component in uri.split('.') {
        if component.is_empty() {
            warn!("URI '{}' contains a zero length component", uri);
            return false;
        }
        for c in component.chars() {
            if c != '_' && !c.is_ascii_lowercase() && !c.is_ascii_digit() {
                warn!("URI '{}' contains an invalid character '{}'", uri, c);
                return false;
            }
        }
    }

    true
}
