//! Stand-in game server on the far side of a [`MemoryHub`], so the client can
//! run with nothing listening on the network.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use seaway::protocol::kind;
use seaway::{
    ChatMessage, Envelope, GameStateInit, GameStateUpdate, MemoryHub, Message, Ping, PlayerInput,
    PlayerState, PlayerStatePatch, Pong,
};

const BROADCAST_INTERVAL: f32 = 0.1;
const TURN_RATE: f32 = 1.2;
const ACCELERATION: f32 = 6.0;
const DRAG: f32 = 0.6;
const MAX_SPEED: f32 = 14.0;

#[derive(Debug, Clone, Copy, Default)]
struct Ship {
    x: f32,
    z: f32,
    angle: f32,
    velocity: f32,
}

impl Ship {
    fn state(&self, delta: f32) -> PlayerState {
        PlayerState {
            x: self.x,
            z: self.z,
            angle: self.angle,
            velocity: self.velocity,
            delta,
        }
    }

    fn sail(&mut self, input: PlayerInput, dt: f32) {
        if input.left {
            self.angle += TURN_RATE * dt;
        }
        if input.right {
            self.angle -= TURN_RATE * dt;
        }
        self.angle = seaway::wrap_angle(self.angle);

        let thrust = match (input.up, input.down) {
            (true, false) => ACCELERATION,
            (false, true) => -ACCELERATION,
            _ => 0.0,
        };
        self.velocity += (thrust - self.velocity * DRAG) * dt;
        self.velocity = self.velocity.clamp(-MAX_SPEED / 2.0, MAX_SPEED);

        self.x += self.angle.sin() * self.velocity * dt;
        self.z += self.angle.cos() * self.velocity * dt;
    }
}

#[derive(Debug, Clone, Copy)]
struct Patrol {
    radius: f32,
    period: f32,
    phase: f32,
}

impl Patrol {
    fn ship_at(&self, clock: f32) -> Ship {
        let theta = self.phase + clock / self.period * TAU;
        Ship {
            x: self.radius * theta.cos(),
            z: self.radius * theta.sin(),
            // Tangent to the circle, counter-clockwise.
            angle: seaway::wrap_angle(-theta),
            velocity: self.radius * TAU / self.period,
        }
    }
}

pub struct LoopbackServer {
    hub: MemoryHub,
    player: String,
    player_ship: Ship,
    input: PlayerInput,
    patrols: BTreeMap<String, Patrol>,
    session: usize,
    clock: f32,
    since_broadcast: f32,
}

impl LoopbackServer {
    pub fn new(hub: MemoryHub, player: &str) -> Self {
        let patrols = BTreeMap::from([
            (
                String::from("harbor-patrol"),
                Patrol {
                    radius: 40.0,
                    period: 30.0,
                    phase: 0.0,
                },
            ),
            (
                String::from("trader"),
                Patrol {
                    radius: 90.0,
                    period: 75.0,
                    phase: 2.0,
                },
            ),
        ]);

        Self {
            hub,
            player: player.to_string(),
            player_ship: Ship::default(),
            input: PlayerInput::default(),
            patrols,
            session: 0,
            clock: 0.0,
            since_broadcast: 0.0,
        }
    }

    pub fn step(&mut self, dt: f32) {
        if !self.hub.is_live() {
            return;
        }

        if self.hub.open_count() != self.session {
            self.session = self.hub.open_count();
            self.input = PlayerInput::default();
            self.push(&GameStateInit {
                player_states: self.player_states(0.0).collect(),
            });
            self.push(&ChatMessage {
                sender: String::from("system"),
                message: format!("welcome aboard, {}", self.player),
            });
        }

        for frame in self.hub.take_sent() {
            self.handle(&frame);
        }

        let dt = dt.max(0.0);
        self.clock += dt;
        self.player_ship.sail(self.input, dt);

        self.since_broadcast += dt;
        if self.since_broadcast >= BROADCAST_INTERVAL {
            let delta = self.since_broadcast;
            self.since_broadcast = 0.0;
            self.push(&GameStateUpdate {
                player_states: self
                    .player_states(delta)
                    .map(|(name, state)| (name, PlayerStatePatch::from(state)))
                    .collect(),
            });
        }
    }

    fn handle(&mut self, frame: &str) {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::warn!("loopback got a malformed frame: {}", err);
                return;
            }
        };

        match envelope.kind.as_str() {
            kind::PING => {
                if let Ok(ping) = envelope.payload_as::<Ping>() {
                    self.push(&Pong {
                        timestamp: ping.timestamp,
                    });
                }
            }
            kind::CHAT_MESSAGE => {
                if let Ok(chat) = envelope.payload_as::<ChatMessage>() {
                    self.push(&chat);
                }
            }
            kind::PLAYER_INPUT => {
                if let Ok(input) = envelope.payload_as::<PlayerInput>() {
                    self.input = input;
                }
            }
            other => log::debug!("loopback ignoring {}", other),
        }
    }

    fn player_states(&self, delta: f32) -> impl Iterator<Item = (String, PlayerState)> + '_ {
        let player = std::iter::once((self.player.clone(), self.player_ship.state(delta)));
        let patrols = self
            .patrols
            .iter()
            .map(move |(name, patrol)| (name.clone(), patrol.ship_at(self.clock).state(delta)));
        player.chain(patrols)
    }

    fn push<M: Message>(&self, message: &M) {
        match Envelope::from_message(message).and_then(|envelope| envelope.encode()) {
            Ok(frame) => self.hub.push_frame(frame),
            Err(err) => log::warn!("loopback failed to encode {}: {}", M::TYPE, err),
        }
    }
}
