use std::str::FromStr;

use quick_error::*;

use crate::message::Msg;

pub mod cbor;
pub mod json;
pub mod msgpack;

/// Message serialization algorithms
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SerializerType {
    Json = 1,
    MsgPack = 2,
    Cbor = 3,
}

impl SerializerType {
    /// Returns the WAMP subprotocol string for the serializer
    pub fn to_str(&self) -> &'static str {
        match self {
            SerializerType::Json => "wamp.2.json",
            SerializerType::MsgPack => "wamp.2.msgpack",
            SerializerType::Cbor => "wamp.2.cbor",
        }
    }
}

impl FromStr for SerializerType {
    type Err = SerializerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wamp.2.json" => Ok(SerializerType::Json),
            "wamp.2.msgpack" => Ok(SerializerType::MsgPack),
            "wamp.2.cbor" => Ok(SerializerType::Cbor),
            other => Err(SerializerError::UnknownSerializer(other.to_string())),
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum SerializerError {
        Serialization(e: String) {
            display("Failed to serialize message : {}", e)
        }
        Deserialization(e: String) {
            display("Failed to deserialize message : {}", e)
        }
        UnknownSerializer(e: String) {
            display("Unknown WAMP serializer : {}", e)
        }
    }
}

/// Packs and unpacks whole messages to and from transport payloads
pub trait SerializerImpl {
    fn pack(&self, value: &Msg) -> Result<Vec<u8>, SerializerError>;
    fn unpack(&self, v: &[u8]) -> Result<Msg, SerializerError>;
}

/// Instantiates the serializer negotiated on the transport
pub fn new_serializer(typ: SerializerType) -> Box<dyn SerializerImpl + Send> {
    match typ {
        SerializerType::Json => Box::new(json::JsonSerializer {}),
        SerializerType::MsgPack => Box::new(msgpack::MsgPackSerializer {}),
        SerializerType::Cbor => Box::new(cbor::CborSerializer {}),
    }
}
