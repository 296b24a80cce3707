use std::time::Duration;

pub const DEFAULT_GAME_URL: &str = "ws://localhost:8080/ws/game";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub delay_ms: u64,
    pub backoff_factor: f32,
    pub max_delay_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            backoff_factor: 1.0,
            max_delay_ms: 30_000,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once the
    /// attempt limit is exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_factor.max(1.0) as f64;
        let scaled = self.delay_ms as f64 * factor.powi(exponent);
        let ceiling = self.max_delay_ms.max(self.delay_ms) as f64;

        Some(Duration::from_millis(scaled.min(ceiling) as u64))
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub token_param: String,
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            token_param: String::from("token"),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
