use std::io;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tungstenite::handshake::client::ClientHandshake;
use tungstenite::handshake::{HandshakeError, MidHandshake};
use tungstenite::{Message, WebSocket};
use url::Url;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("no address found for {0}")]
    Unresolved(String),
    #[error("websocket handshake timed out")]
    HandshakeTimeout,
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("connection failed: {0}")]
    Failed(String),
    #[error("socket is closed")]
    Closed,
}

#[derive(Debug)]
pub enum SocketEvent {
    Opened,
    Frame(String),
    Error(TransportError),
    Closed,
}

/// One bidirectional channel. Polled once per frame; never blocks.
pub trait Socket {
    fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    fn poll(&mut self, events: &mut Vec<SocketEvent>);

    fn close(&mut self);
}

pub trait Connector {
    fn open(&mut self, url: &Url) -> Result<Box<dyn Socket>, TransportError>;
}

#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl WebSocketConnector {
    pub fn with_timeouts(connect_timeout: Duration, handshake_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            handshake_timeout,
        }
    }

    fn connect_tcp(&self, url: &Url) -> Result<TcpStream, TransportError> {
        let addrs = url.socket_addrs(|| None)?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    log::debug!("tcp connect to {} failed: {}", addr, err);
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) => Err(err.into()),
            None => Err(TransportError::Unresolved(url.to_string())),
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl Connector for WebSocketConnector {
    fn open(&mut self, url: &Url) -> Result<Box<dyn Socket>, TransportError> {
        // Built without a TLS backend.
        if url.scheme() != "ws" {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
        }

        let stream = self.connect_tcp(url)?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;

        let deadline = Instant::now() + self.handshake_timeout;
        let state = match tungstenite::client(url.as_str(), stream) {
            Ok((socket, response)) => {
                log::debug!("websocket handshake finished: {}", response.status());
                State::Ready(socket)
            }
            Err(HandshakeError::Interrupted(mid)) => State::Handshaking { mid, deadline },
            Err(HandshakeError::Failure(err)) => return Err(err.into()),
        };

        Ok(Box::new(WebSocketSocket { state }))
    }
}

enum State {
    Handshaking {
        mid: MidHandshake<ClientHandshake<TcpStream>>,
        deadline: Instant,
    },
    // Handshake done but `Opened` not reported yet.
    Ready(WebSocket<TcpStream>),
    Open(WebSocket<TcpStream>),
    Closed,
}

struct WebSocketSocket {
    state: State,
}

impl WebSocketSocket {
    fn advance_handshake(&mut self, events: &mut Vec<SocketEvent>) {
        let state = std::mem::replace(&mut self.state, State::Closed);
        self.state = match state {
            State::Handshaking { mid, deadline } => match mid.handshake() {
                Ok((socket, response)) => {
                    log::debug!("websocket handshake finished: {}", response.status());
                    events.push(SocketEvent::Opened);
                    State::Open(socket)
                }
                Err(HandshakeError::Interrupted(mid)) if Instant::now() < deadline => {
                    State::Handshaking { mid, deadline }
                }
                Err(HandshakeError::Interrupted(_)) => {
                    events.push(SocketEvent::Error(TransportError::HandshakeTimeout));
                    events.push(SocketEvent::Closed);
                    State::Closed
                }
                Err(HandshakeError::Failure(err)) => {
                    events.push(SocketEvent::Error(err.into()));
                    events.push(SocketEvent::Closed);
                    State::Closed
                }
            },
            State::Ready(socket) => {
                events.push(SocketEvent::Opened);
                State::Open(socket)
            }
            other => other,
        };
    }
}

impl Socket for WebSocketSocket {
    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        let State::Open(socket) = &mut self.state else {
            return Err(TransportError::Closed);
        };

        match socket.send(Message::Text(frame.to_string())) {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn poll(&mut self, events: &mut Vec<SocketEvent>) {
        self.advance_handshake(events);

        let State::Open(socket) = &mut self.state else {
            return;
        };

        loop {
            match socket.read() {
                Ok(Message::Text(text)) => events.push(SocketEvent::Frame(text)),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => events.push(SocketEvent::Frame(text)),
                    Err(_) => log::debug!("ignoring non-utf8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    log::info!("server closed the connection: {:?}", frame);
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    self.state = State::Closed;
                    events.push(SocketEvent::Closed);
                    return;
                }
                Err(e) => {
                    self.state = State::Closed;
                    events.push(SocketEvent::Error(e.into()));
                    events.push(SocketEvent::Closed);
                    return;
                }
            }
        }

        match socket.flush() {
            Ok(()) => {}
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => log::debug!("flush failed: {}", e),
        }
    }

    fn close(&mut self) {
        if let State::Open(socket) | State::Ready(socket) = &mut self.state {
            let _ = socket.close(None);
            let _ = socket.flush();
        }
        self.state = State::Closed;
    }
}
