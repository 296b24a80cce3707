mod config;
mod connection;
mod memory;
mod stats;
mod transport;

pub use config::{ConnectionConfig, ReconnectPolicy, DEFAULT_GAME_URL, DEFAULT_RECONNECT_DELAY_MS};
pub use connection::{
    ConnectError, Connection, ConnectionEvent, ConnectionManager, ConnectionStatus, FrameSink,
    ReconnectTimer,
};
pub use memory::{MemoryConnector, MemoryHub};
pub use stats::NetworkStats;
pub use transport::{
    Connector, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, Socket, SocketEvent,
    TransportError, WebSocketConnector,
};
