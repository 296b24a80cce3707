use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use seaway::InputKeys;

/// How long a key counts as held after its last press or repeat when the
/// terminal does not report releases.
pub const HOLD_TIMEOUT: Duration = Duration::from_millis(550);

pub fn steering_key(code: KeyCode) -> Option<InputKeys> {
    match code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Some(InputKeys::UP),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(InputKeys::DOWN),
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(InputKeys::LEFT),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some(InputKeys::RIGHT),
        _ => None,
    }
}

/// Steering keys currently held down.
///
/// With release events a key stays held until released. Without them every
/// press or autorepeat extends the hold by `HOLD_TIMEOUT`.
#[derive(Debug, Clone)]
pub struct HeldKeys {
    pressed: Vec<(InputKeys, Instant)>,
    timeout: Option<Duration>,
}

impl HeldKeys {
    pub fn new(release_events: bool) -> Self {
        Self {
            pressed: Vec::new(),
            timeout: (!release_events).then_some(HOLD_TIMEOUT),
        }
    }

    pub fn press(&mut self, key: InputKeys, now: Instant) {
        match self.pressed.iter_mut().find(|(held, _)| *held == key) {
            Some(entry) => entry.1 = now,
            None => self.pressed.push((key, now)),
        }
    }

    pub fn release(&mut self, key: InputKeys) {
        self.pressed.retain(|(held, _)| *held != key);
    }

    pub fn clear(&mut self) {
        self.pressed.clear();
    }

    pub fn keys(&mut self, now: Instant) -> InputKeys {
        if let Some(timeout) = self.timeout {
            self.pressed
                .retain(|(_, at)| now.saturating_duration_since(*at) < timeout);
        }

        self.pressed
            .iter()
            .fold(InputKeys::empty(), |keys, (key, _)| keys | *key)
    }
}
