use std::fmt;
use std::time::{Duration, Instant};

use url::Url;

use super::config::ConnectionConfig;
use super::stats::NetworkStats;
use super::transport::{Connector, Socket, SocketEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Frame(String),
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("an auth token is required to connect")]
    MissingToken,
}

pub trait FrameSink {
    /// Returns `false` when the frame was dropped.
    fn send_frame(&mut self, frame: String) -> bool;
}

pub struct Connection {
    url: Url,
    status: ConnectionStatus,
    retry_count: u32,
    socket: Box<dyn Socket>,
}

impl Connection {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("retry_count", &self.retry_count)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconnectTimer {
    deadline: Option<Instant>,
}

impl ReconnectTimer {
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

struct Credentials {
    base: Url,
    token: String,
}

pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    connection: Option<Connection>,
    credentials: Option<Credentials>,
    reconnect: ReconnectTimer,
    retry_count: u32,
    stats: NetworkStats,
    events: Vec<ConnectionEvent>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, connector: Box<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            connection: None,
            credentials: None,
            reconnect: ReconnectTimer::default(),
            retry_count: 0,
            stats: NetworkStats::default(),
            events: Vec::new(),
        }
    }

    pub fn connect(&mut self, url: &str, token: &str) -> Result<(), ConnectError> {
        self.connect_at(url, token, Instant::now())
    }

    pub fn connect_at(&mut self, url: &str, token: &str, now: Instant) -> Result<(), ConnectError> {
        if self.status() == ConnectionStatus::Open {
            return Ok(());
        }
        if token.is_empty() {
            return Err(ConnectError::MissingToken);
        }

        let base = Url::parse(url)?;
        self.close_socket();
        self.reconnect.cancel();
        self.retry_count = 0;
        self.credentials = Some(Credentials {
            base,
            token: token.to_string(),
        });
        self.open(now);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.reconnect.cancel();
        self.retry_count = 0;

        if self.credentials.take().is_some() {
            log::info!("disconnecting");
        }
        if self.close_socket() {
            self.events.push(ConnectionEvent::Closed);
        }
    }

    pub fn poll(&mut self) -> Vec<ConnectionEvent> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Vec<ConnectionEvent> {
        if self.reconnect.take_due(now) && self.credentials.is_some() {
            self.open(now);
        }

        let mut socket_events = Vec::new();
        if let Some(connection) = &mut self.connection {
            connection.socket.poll(&mut socket_events);
        }

        for event in socket_events {
            match event {
                SocketEvent::Opened => self.handle_open(),
                SocketEvent::Frame(frame) => {
                    self.stats.frames_received += 1;
                    self.stats.bytes_received += frame.len() as u64;
                    self.events.push(ConnectionEvent::Frame(frame));
                }
                SocketEvent::Error(err) => {
                    log::warn!("connection error: {}", err);
                    self.handle_close(now);
                    break;
                }
                SocketEvent::Closed => {
                    self.handle_close(now);
                    break;
                }
            }
        }

        std::mem::take(&mut self.events)
    }

    pub fn send(&mut self, frame: &str) -> bool {
        let Some(connection) = self
            .connection
            .as_mut()
            .filter(|connection| connection.status == ConnectionStatus::Open)
        else {
            log::trace!("dropping outbound frame while not connected");
            self.stats.frames_dropped += 1;
            return false;
        };

        match connection.socket.send(frame) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += frame.len() as u64;
                true
            }
            Err(err) => {
                log::warn!("send failed: {}", err);
                self.stats.frames_dropped += 1;
                false
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection
            .as_ref()
            .map_or(ConnectionStatus::Closed, |connection| connection.status)
    }

    pub fn is_open(&self) -> bool {
        self.status() == ConnectionStatus::Open
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn reconnect_timer(&self) -> &ReconnectTimer {
        &self.reconnect
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    fn open(&mut self, now: Instant) {
        let Some(credentials) = &self.credentials else {
            return;
        };

        let base = credentials.base.clone();
        let mut url = base.clone();
        url.query_pairs_mut()
            .append_pair(&self.config.token_param, &credentials.token);

        self.stats.connect_attempts += 1;
        log::info!("connecting to {} (attempt {})", base, self.retry_count + 1);

        match self.connector.open(&url) {
            Ok(socket) => {
                self.connection = Some(Connection {
                    url: base,
                    status: ConnectionStatus::Connecting,
                    retry_count: self.retry_count,
                    socket,
                });
            }
            Err(err) => {
                log::warn!("failed to connect to {}: {}", base, err);
                self.schedule_reconnect(now);
            }
        }
    }

    fn handle_open(&mut self) {
        if let Some(connection) = &mut self.connection {
            log::info!("connected to {}", connection.url);
            connection.status = ConnectionStatus::Open;
            self.retry_count = 0;
            self.events.push(ConnectionEvent::Opened);
        }
    }

    fn handle_close(&mut self, now: Instant) {
        if let Some(mut connection) = self.connection.take() {
            log::info!("connection to {} closed", connection.url);
            connection.status = ConnectionStatus::Closed;
            connection.socket.close();
            self.events.push(ConnectionEvent::Closed);
        }
        self.schedule_reconnect(now);
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if self.credentials.is_none() {
            return;
        }

        let attempt = self.retry_count + 1;
        match self.config.reconnect.delay_for(attempt) {
            Some(delay) => {
                self.retry_count = attempt;
                self.stats.reconnects_scheduled += 1;
                self.reconnect.schedule(now, delay);
                log::debug!("reconnect {} scheduled in {:?}", attempt, delay);
            }
            None => {
                log::error!("giving up after {} reconnect attempts", self.retry_count);
            }
        }
    }

    // Returns whether an open connection was torn down.
    fn close_socket(&mut self) -> bool {
        match self.connection.take() {
            Some(mut connection) => {
                let was_open = connection.status == ConnectionStatus::Open;
                connection.socket.close();
                was_open
            }
            None => false,
        }
    }
}

impl FrameSink for ConnectionManager {
    fn send_frame(&mut self, frame: String) -> bool {
        self.send(&frame)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection", &self.connection)
            .field("retry_count", &self.retry_count)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}
