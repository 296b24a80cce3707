mod envelope;
mod messages;

pub use envelope::{Envelope, EnvelopeError};
pub use messages::{
    ChatMessage, GameStateInit, GameStateUpdate, Message, Ping, PlayerInput, PlayerJoined,
    PlayerLeft, PlayerState, PlayerStatePatch, Pong, kind,
};
