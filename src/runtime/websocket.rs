//! WebSocket connector over plain TCP (`ws://` only).

use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tungstenite::http::Uri;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::{Error as WsError, Message, WebSocket};

use crate::error::TransportError;

use super::connector::{Connection, Connector, Frame};

/// Connects to `ws://` metrics endpoints with `tungstenite`.
///
/// Frames are read as bare JSON envelopes. The Eventara backend's `/ws`
/// endpoint speaks STOMP over SockJS and publishes on `/topic/metrics`, so
/// it needs a bridge (or a raw WebSocket route) that forwards the envelope
/// unframed; this connector does not negotiate STOMP.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_millis(100),
        }
    }
}

impl WebSocketConnector {
    /// Connector with default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// TCP connect timeout per resolved address.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How long one `recv` waits before reporting idle.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    fn open_tcp(&self, endpoint: &str) -> Result<TcpStream, TransportError> {
        let uri: Uri = endpoint.parse().map_err(|e| TransportError::ConnectionFailed {
            message: format!("invalid endpoint {endpoint}: {e}"),
        })?;
        if uri.scheme_str() != Some("ws") {
            return Err(TransportError::Protocol {
                message: format!("unsupported scheme in {endpoint}; only ws:// is supported"),
            });
        }
        let host = uri.host().ok_or_else(|| TransportError::ConnectionFailed {
            message: format!("missing host in {endpoint}"),
        })?;
        let port = uri.port_u16().unwrap_or(80);

        let addrs = (host, port).to_socket_addrs().map_err(|e| TransportError::ConnectionFailed {
            message: format!("resolve {host}:{port}: {e}"),
        })?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(TransportError::ConnectionFailed {
            message: match last_err {
                Some(e) => format!("connect {host}:{port}: {e}"),
                None => format!("no addresses for {host}:{port}"),
            },
        })
    }
}

impl Connector for WebSocketConnector {
    type Connection = WebSocketConnection;

    fn connect(&self, endpoint: &str) -> Result<Self::Connection, TransportError> {
        let stream = self.open_tcp(endpoint)?;
        let _ = stream.set_nodelay(true);

        let (socket, _response) = tungstenite::client(endpoint, stream).map_err(|e| TransportError::HandshakeFailed {
            message: e.to_string(),
        })?;

        // Set after the handshake so it runs fully blocking.
        socket
            .get_ref()
            .set_read_timeout(Some(self.read_timeout))
            .map_err(|e| TransportError::Io { message: e.to_string() })?;

        Ok(WebSocketConnection { socket })
    }
}

/// One live WebSocket connection.
#[derive(Debug)]
pub struct WebSocketConnection {
    socket: WebSocket<TcpStream>,
}

impl Connection for WebSocketConnection {
    fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(Frame::Text(text))),
            Ok(Message::Binary(bytes)) => Ok(Some(Frame::Binary(bytes))),
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => Ok(None),
            Ok(Message::Close(None)) | Err(WsError::ConnectionClosed) => Ok(Some(Frame::Closed)),
            Ok(Message::Close(Some(frame))) => {
                if frame.code == CloseCode::Normal {
                    Ok(Some(Frame::Closed))
                } else {
                    Err(TransportError::Closed {
                        code: Some(u16::from(frame.code)),
                        reason: frame.reason.to_string(),
                    })
                }
            }
            Err(WsError::Io(e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(WsError::AlreadyClosed) => Err(TransportError::Closed {
                code: None,
                reason: "already closed".to_string(),
            }),
            Err(e) => Err(TransportError::Io { message: e.to_string() }),
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{decode_text, Inbound};
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(frames: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            for frame in frames {
                ws.send(frame).unwrap();
            }
            ws.close(None).unwrap();
            while ws.read().is_ok() {}
        });
        format!("ws://{addr}/ws")
    }

    fn read_all(endpoint: &str) -> Vec<Frame> {
        let mut conn = WebSocketConnector::new()
            .with_read_timeout(Duration::from_millis(20))
            .connect(endpoint)
            .unwrap();
        let mut frames = Vec::new();
        for _ in 0..250 {
            match conn.recv().unwrap() {
                Some(Frame::Closed) => {
                    frames.push(Frame::Closed);
                    break;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }
        conn.close();
        frames
    }

    #[test]
    fn bare_envelopes_arrive_as_text_then_clean_close() {
        let envelope = r#"{"type":"METRICS_UPDATE","payload":{"summary":{"totalEvents":9}}}"#;
        let frames = read_all(&serve_once(vec![Message::Text(envelope.to_string())]));

        assert_eq!(frames.len(), 2);
        let Frame::Text(text) = &frames[0] else {
            panic!("expected text frame, got {:?}", frames[0]);
        };
        let Inbound::MetricsUpdate(snap) = decode_text(text).unwrap() else {
            panic!("expected metrics update");
        };
        assert_eq!(snap.total_events(), Some(9));
        assert_eq!(frames[1], Frame::Closed);
    }

    #[test]
    fn stomp_framed_messages_are_not_unwrapped() {
        let stomp = "MESSAGE\ndestination:/topic/metrics\n\n{\"type\":\"METRICS_UPDATE\",\"payload\":{}}\0";
        let frames = read_all(&serve_once(vec![Message::Text(stomp.to_string())]));

        let Frame::Text(text) = &frames[0] else {
            panic!("expected text frame, got {:?}", frames[0]);
        };
        assert!(decode_text(text).is_err());
    }

    #[test]
    fn only_plain_ws_is_supported() {
        let err = WebSocketConnector::new().connect("wss://example.test/ws").unwrap_err();
        assert!(matches!(err, TransportError::Protocol { .. }));
        assert!(!err.is_retryable());
    }
}
