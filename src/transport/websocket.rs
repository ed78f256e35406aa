use std::str::FromStr;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::*;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    client_async,
    tungstenite::{handshake::client::Request, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::client::SessionConfig;
use crate::serializer::SerializerType;
use crate::transport::{Transport, TransportError};

struct WsTransport {
    /// MsgPack and CBOR frames travel as Binary, Json as Text
    is_bin: bool,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        trace!("Send[0x{:X}]", data.len());
        let msg = if self.is_bin {
            Message::Binary(data.to_vec())
        } else {
            match std::str::from_utf8(data) {
                Ok(s) => Message::Text(s.to_owned()),
                Err(_) => {
                    error!("Tried to send non utf8 payload on a text websocket");
                    return Err(TransportError::SendFailed);
                }
            }
        };

        if let Err(e) = self.stream.send(msg).await {
            error!("Failed to send on websocket : {:?}", e);
            return Err(TransportError::SendFailed);
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(m)) => m,
                Some(Err(e)) => {
                    error!("Failed to recv from websocket : {:?}", e);
                    return Err(TransportError::ReceiveFailed);
                }
                None => return Err(TransportError::StreamClosed),
            };

            match msg {
                Message::Text(s) if !self.is_bin => return Ok(s.into_bytes()),
                Message::Binary(b) if self.is_bin => return Ok(b),
                Message::Ping(d) => {
                    if let Err(e) = self.stream.send(Message::Pong(d)).await {
                        error!("Failed to respond to websocket Ping : {:?}", e);
                        return Err(TransportError::ReceiveFailed);
                    }
                }
                Message::Pong(_) => {}
                Message::Close(_) => return Err(TransportError::StreamClosed),
                m => {
                    error!("Unexpected websocket message type : {:?}", m);
                    return Err(TransportError::UnexpectedResponse);
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Performs the websocket handshake, negotiating a WAMP serializer through
/// the `Sec-WebSocket-Protocol` header.
pub async fn connect(
    url: &url::Url,
    config: &SessionConfig,
) -> Result<(Box<dyn Transport + Send>, SerializerType), TransportError> {
    let host = match url.host_str() {
        Some(h) => h.to_owned(),
        None => {
            return Err(TransportError::ConnectionFailed(
                "no host in uri".to_string(),
            ))
        }
    };
    let port = match url.port_or_known_default() {
        Some(p) => p,
        None => {
            return Err(TransportError::ConnectionFailed(
                "no port in uri".to_string(),
            ))
        }
    };

    let mut request = Request::builder().uri(url.as_ref());
    if !config.get_agent().is_empty() {
        request = request.header("User-Agent", config.get_agent());
    }
    let offered = config
        .get_serializers()
        .iter()
        .map(|s| s.to_str())
        .collect::<Vec<&str>>()
        .join(",");
    request = request.header("Sec-WebSocket-Protocol", offered.as_str());
    for (key, value) in config.get_websocket_headers() {
        request = request.header(key.as_str(), value.as_str());
    }
    let request = request
        .body(())
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

    let tcp = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

    let stream = match url.scheme() {
        "ws" => MaybeTlsStream::Plain(tcp),
        "wss" => {
            let mut builder = native_tls::TlsConnector::builder();
            if !config.get_ssl_verify() {
                builder
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true);
            }
            let connector = builder
                .build()
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tls = connector
                .connect(&host, tcp)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            MaybeTlsStream::NativeTls(tls)
        }
        s => {
            return Err(TransportError::ConnectionFailed(format!(
                "'{}' is not a websocket scheme",
                s
            )))
        }
    };

    let (ws, resp) = match client_async(request, stream).await {
        Ok(v) => v,
        Err(e) => {
            error!("Websocket failed to connect : {:?}", e);
            return Err(TransportError::ConnectionFailed(e.to_string()));
        }
    };

    // The server picks one of our offered subprotocols, which binds the serializer
    let mut negotiated = None;
    for (key, value) in resp.headers() {
        if !key.as_str().eq_ignore_ascii_case("sec-websocket-protocol") {
            continue;
        }
        if let Ok(v) = value.to_str() {
            if let Ok(s) = SerializerType::from_str(v) {
                negotiated = Some(s);
                break;
            }
        }
    }

    let serializer = match negotiated {
        Some(s) => s,
        None => return Err(TransportError::SerializerNotSupported(offered)),
    };
    debug!("Connected with serializer : {:?}", serializer);

    Ok((
        Box::new(WsTransport {
            is_bin: serializer != SerializerType::Json,
            stream: ws,
        }),
        serializer,
    ))
}
