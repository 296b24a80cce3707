use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Binds a payload type to the message type string it travels under.
pub trait Message: Serialize + DeserializeOwned + 'static {
    const TYPE: &'static str;
}

pub mod kind {
    pub const GAME_STATE_INIT: &str = "GAME_STATE_INIT";
    pub const GAME_STATE_UPDATE: &str = "GAME_STATE_UPDATE";
    pub const PLAYER_JOINED: &str = "PLAYER_JOINED";
    pub const PLAYER_LEFT: &str = "PLAYER_LEFT";
    pub const CHAT_MESSAGE: &str = "CHAT_MESSAGE";
    pub const PLAYER_INPUT: &str = "PLAYER_INPUT";
    pub const PING: &str = "PING";
    pub const PONG: &str = "PONG";
}

/// Authoritative state of one ship as sent in a full snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub x: f32,
    pub z: f32,
    pub angle: f32,
    pub velocity: f32,
    pub delta: f32,
}

/// Partial state; absent fields keep their previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f32>,
}

impl PlayerStatePatch {
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.z.is_none()
            && self.angle.is_none()
            && self.velocity.is_none()
            && self.delta.is_none()
    }
}

impl From<PlayerState> for PlayerStatePatch {
    fn from(state: PlayerState) -> Self {
        Self {
            x: Some(state.x),
            z: Some(state.z),
            angle: Some(state.angle),
            velocity: Some(state.velocity),
            delta: Some(state.delta),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateInit {
    #[serde(default)]
    pub player_states: BTreeMap<String, PlayerState>,
}

impl Message for GameStateInit {
    const TYPE: &'static str = kind::GAME_STATE_INIT;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateUpdate {
    #[serde(default)]
    pub player_states: BTreeMap<String, PlayerStatePatch>,
}

impl Message for GameStateUpdate {
    const TYPE: &'static str = kind::GAME_STATE_UPDATE;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoined {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(flatten)]
    pub state: PlayerStatePatch,
}

impl Message for PlayerJoined {
    const TYPE: &'static str = kind::PLAYER_JOINED;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeft {
    pub username: String,
}

impl Message for PlayerLeft {
    const TYPE: &'static str = kind::PLAYER_LEFT;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
}

impl Message for ChatMessage {
    const TYPE: &'static str = kind::CHAT_MESSAGE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Message for PlayerInput {
    const TYPE: &'static str = kind::PLAYER_INPUT;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub timestamp: u64,
}

impl Message for Ping {
    const TYPE: &'static str = kind::PING;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: u64,
}

impl Message for Pong {
    const TYPE: &'static str = kind::PONG;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_join_with_inline_state() {
        let joined: PlayerJoined = serde_json::from_value(json!({
            "username": "alice",
            "playerId": "p-1",
            "x": 4,
            "z": -2.5
        }))
        .unwrap();

        assert_eq!(joined.username, "alice");
        assert_eq!(joined.player_id.as_deref(), Some("p-1"));
        assert_eq!(joined.state.x, Some(4.0));
        assert_eq!(joined.state.z, Some(-2.5));
        assert_eq!(joined.state.angle, None);
    }

    #[test]
    fn test_join_without_state() {
        let joined: PlayerJoined = serde_json::from_value(json!({"username": "bob"})).unwrap();
        assert!(joined.state.is_empty());
        assert!(joined.player_id.is_none());
    }

    #[test]
    fn test_snapshot_field_names() {
        let init: GameStateInit = serde_json::from_value(json!({
            "playerStates": {
                "testuser": {"x": 1.5, "z": 2.0, "angle": 0.3, "delta": 0.1, "width": 10}
            }
        }))
        .unwrap();

        let state = init.player_states["testuser"];
        assert_eq!(state.x, 1.5);
        assert_eq!(state.angle, 0.3);
        assert_eq!(state.velocity, 0.0);
    }

    #[test]
    fn test_patch_skips_absent_fields() {
        let patch = PlayerStatePatch {
            x: Some(10.0),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(patch).unwrap(), json!({"x": 10.0}));
    }
}
