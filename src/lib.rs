mod client;
mod common;
mod core;
mod error;
mod executor;
mod handle;
mod message;
mod serializer;
mod transport;

pub use client::{NoopDelegate, Session, SessionConfig, SessionDelegate};
pub use common::*;
pub use crate::core::SessionState;
pub use error::*;
pub use executor::Executor;
pub use handle::{Registration, Subscription};
pub use serializer::SerializerType;
