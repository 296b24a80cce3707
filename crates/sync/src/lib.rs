pub mod bus;
pub mod client;
pub mod input;
pub mod net;
pub mod protocol;
pub mod world;

pub use bus::{Dispatch, DispatchStats, MessageRouter, Subscribers, Subscription};
pub use client::{ClientConfig, SyncClient};
pub use input::{InputKeys, InputTracker};
pub use net::{
    ConnectError, Connection, ConnectionConfig, ConnectionEvent, ConnectionManager,
    ConnectionStatus, Connector, FrameSink, MemoryConnector, MemoryHub, NetworkStats,
    ReconnectPolicy, ReconnectTimer, Socket, SocketEvent, TransportError, WebSocketConnector,
    DEFAULT_GAME_URL,
};
pub use protocol::{
    ChatMessage, Envelope, EnvelopeError, GameStateInit, GameStateUpdate, Message, Ping,
    PlayerInput, PlayerJoined, PlayerLeft, PlayerState, PlayerStatePatch, Pong,
};
pub use world::{EntityInterpolator, EntityState, InterpolationConfig, RemoteEntity, wrap_angle};
