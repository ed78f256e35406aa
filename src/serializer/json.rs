use serde_json::{from_slice, to_vec};

use crate::message::Msg;
use crate::serializer::{SerializerError, SerializerImpl};

pub struct JsonSerializer {}

impl SerializerImpl for JsonSerializer {
    fn pack(&self, value: &Msg) -> Result<Vec<u8>, SerializerError> {
        to_vec(value).map_err(|e| SerializerError::Serialization(e.to_string()))
    }
    fn unpack(&self, v: &[u8]) -> Result<Msg, SerializerError> {
        from_slice(v).map_err(|e| SerializerError::Deserialization(e.to_string()))
    }
}
