use quick_error::*;
use url::ParseError;

use crate::serializer::SerializerError;
use crate::transport::TransportError;

quick_error! {
    /// Types of errors a WAMP client can encounter
    #[derive(Debug)]
    pub enum WampError {
        UnknownError(e: String) {
            from()
            display("Unhandled error : {}", e)
        }
        /// Error with the connection
        ConnectionError(e: TransportError) {
            from()
            source(e)
            display("An error occured with the connection: ({})", e)
        }
        /// Error with serialization
        SerializationError(e: SerializerError) {
            from()
            source(e)
            display("An error occured while [de]serializing a message: ({})", e)
        }
        /// Server uri is invalid
        InvalidUri(e: ParseError) {
            source(e)
            display("The uri provided could not be parsed: {}", e)
        }
        /// Server uri has no host
        NoHostInUri {
            display("The uri provided did not contain a host address")
        }
        /// The session handle has been dropped while the event loop was running
        ClientDied {
            display("The session has exited without sending Shutdown")
        }
    }
}
