use bitflags::bitflags;

use crate::protocol::PlayerInput;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputKeys: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

impl From<InputKeys> for PlayerInput {
    fn from(keys: InputKeys) -> Self {
        Self {
            up: keys.contains(InputKeys::UP),
            down: keys.contains(InputKeys::DOWN),
            left: keys.contains(InputKeys::LEFT),
            right: keys.contains(InputKeys::RIGHT),
        }
    }
}

impl From<PlayerInput> for InputKeys {
    fn from(input: PlayerInput) -> Self {
        let mut keys = InputKeys::empty();
        keys.set(InputKeys::UP, input.up);
        keys.set(InputKeys::DOWN, input.down);
        keys.set(InputKeys::LEFT, input.left);
        keys.set(InputKeys::RIGHT, input.right);
        keys
    }
}

/// Remembers the key set the server last received so unchanged input is not
/// re-sent every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputTracker {
    last_sent: Option<InputKeys>,
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `keys` differs from what was last sent. Before the first send
    /// any non-empty key set counts as a change.
    pub fn changed(&self, keys: InputKeys) -> bool {
        match self.last_sent {
            Some(last) => last != keys,
            None => !keys.is_empty(),
        }
    }

    pub fn commit(&mut self, keys: InputKeys) {
        self.last_sent = Some(keys);
    }

    /// Forgets the last sent state; the next non-empty input goes out again.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    pub fn last_sent(&self) -> Option<InputKeys> {
        self.last_sent
    }
}
