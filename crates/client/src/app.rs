use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use seaway::{
    ChatMessage, ClientConfig, ConnectError, ConnectionStatus, InputKeys, MemoryHub, Subscription,
    SyncClient,
};

use crate::loopback::LoopbackServer;

const CHAT_HISTORY: usize = 200;
const FRAME_TIME: Duration = Duration::from_millis(16);
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub url: String,
    pub token: String,
    pub name: String,
    pub loopback: bool,
}

pub struct App {
    client: SyncClient,
    server: Option<LoopbackServer>,
    options: AppOptions,
    chat: Rc<RefCell<VecDeque<ChatMessage>>>,
    last_frame: Instant,
    _subscriptions: Vec<Subscription>,
}

impl App {
    pub fn new(options: AppOptions, config: ClientConfig) -> Self {
        let (mut client, server) = if options.loopback {
            let hub = MemoryHub::new();
            let server = LoopbackServer::new(hub.clone(), &options.name);
            (
                SyncClient::new(config, Box::new(hub.connector())),
                Some(server),
            )
        } else {
            (SyncClient::with_websocket(config), None)
        };

        let chat = Rc::new(RefCell::new(VecDeque::new()));
        let chat_sub = {
            let chat = Rc::clone(&chat);
            client.subscribe::<ChatMessage>(move |message| {
                let mut chat = chat.borrow_mut();
                if chat.len() == CHAT_HISTORY {
                    chat.pop_front();
                }
                chat.push_back(message.clone());
            })
        };
        let connectivity_sub = client.on_connectivity(|connected| {
            if *connected {
                log::info!("online");
            } else {
                log::info!("offline");
            }
        });

        Self {
            client,
            server,
            options,
            chat,
            last_frame: Instant::now(),
            _subscriptions: vec![chat_sub, connectivity_sub],
        }
    }

    pub fn connect(&mut self) -> Result<(), ConnectError> {
        self.client.connect(&self.options.url, &self.options.token)
    }

    pub fn toggle_connection(&mut self) -> Result<(), ConnectError> {
        if self.client.connection().has_credentials() {
            self.client.disconnect();
            Ok(())
        } else {
            self.connect()
        }
    }

    /// Runs one frame and returns its duration in seconds.
    pub fn frame(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if let Some(server) = &mut self.server {
            server.step(dt);
        }
        self.client.update_at(now, dt);
        dt
    }

    pub fn send_chat(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        match self.client.send_chat(&self.options.name, text) {
            Ok(true) => {}
            Ok(false) => log::warn!("chat not sent while offline"),
            Err(err) => log::warn!("failed to encode chat: {}", err),
        }
    }

    pub fn set_input(&mut self, keys: InputKeys) {
        self.client.set_input(keys);
    }

    pub fn client(&self) -> &SyncClient {
        &self.client
    }

    pub fn chat(&self) -> Ref<'_, VecDeque<ChatMessage>> {
        self.chat.borrow()
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }
}

/// Frame loop without a terminal UI. Prints the interpolated world as one JSON
/// line per second.
pub fn run_headless(app: &mut App, run_for: Option<Duration>) -> anyhow::Result<()> {
    let started = Instant::now();
    let mut last_snapshot = started;

    loop {
        app.frame();

        let now = Instant::now();
        if now.duration_since(last_snapshot) >= SNAPSHOT_INTERVAL {
            last_snapshot = now;
            print_snapshot(app)?;
        }

        if run_for.is_some_and(|limit| now.duration_since(started) >= limit) {
            break;
        }

        thread::sleep(FRAME_TIME);
    }

    let stats = app.client().stats();
    log::info!(
        "{} frames sent, {} received, {} dropped",
        stats.frames_sent,
        stats.frames_received,
        stats.frames_dropped
    );
    Ok(())
}

fn print_snapshot(app: &App) -> anyhow::Result<()> {
    let client = app.client();
    let world = client.world();
    let line = serde_json::json!({
        "connected": client.status() == ConnectionStatus::Open,
        "rtt_ms": client.stats().rtt_ms,
        "entities": world.sorted(),
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_app() -> App {
        App::new(
            AppOptions {
                url: String::from("ws://loopback/ws/game"),
                token: String::from("loopback"),
                name: String::from("captain"),
                loopback: true,
            },
            ClientConfig::default(),
        )
    }

    #[test]
    fn test_loopback_chat_lands_in_history() {
        let mut app = loopback_app();
        app.connect().unwrap();
        app.frame();
        app.frame();

        app.send_chat("  all hands  ");
        app.frame();
        app.frame();

        let chat = app.chat();
        let last = chat.back().unwrap();
        assert_eq!(last.sender, "captain");
        assert_eq!(last.message, "all hands");
    }

    #[test]
    fn test_toggle_connection() {
        let mut app = loopback_app();
        app.toggle_connection().unwrap();
        app.frame();
        assert!(app.client().is_connected());

        app.toggle_connection().unwrap();
        assert!(!app.client().is_connected());
        assert!(app.client().world().is_empty());
    }
}
