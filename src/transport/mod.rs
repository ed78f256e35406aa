use async_trait::async_trait;
use quick_error::*;

pub mod websocket;
pub use crate::transport::websocket as ws;

/// A framed, ordered, bidirectional byte transport toward the router
#[async_trait]
pub trait Transport {
    /// Sends a whole wamp message over the transport
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;
    /// Receives a whole wamp message from the transport
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError>;
    /// Closes the transport connection with the host
    async fn close(&mut self);
}

quick_error! {
    #[derive(Debug)]
    pub enum TransportError {
        ConnectionFailed(e: String) {
            display("Failed to establish a connection with the server : {}", e)
        }
        SerializerNotSupported(e: String) {
            display("The server accepted none of the offered serializers ({})", e)
        }
        UnexpectedResponse {
            display("Server responded with unexpected data")
        }
        SendFailed {
            display("Failed to send message to peer")
        }
        ReceiveFailed {
            display("Failed to receive message from peer")
        }
        /// The peer closed the stream without an error
        StreamClosed {
            display("The connection was closed by the peer")
        }
    }
}
