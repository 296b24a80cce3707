use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::bus::{DispatchStats, MessageRouter, Subscribers, Subscription};
use crate::input::{InputKeys, InputTracker};
use crate::net::{
    ConnectError, ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionStatus,
    Connector, NetworkStats, WebSocketConnector,
};
use crate::protocol::{ChatMessage, EnvelopeError, Message, Ping, PlayerInput, Pong};
use crate::world::{EntityInterpolator, InterpolationConfig, RemoteEntity};

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,
    pub interpolation: InterpolationConfig,
    /// Keepalive period; `None` disables `PING`.
    pub ping_interval: Option<Duration>,
}

pub struct SyncClient {
    config: ClientConfig,
    connection: ConnectionManager,
    router: MessageRouter,
    world: Rc<RefCell<EntityInterpolator>>,
    connectivity: Subscribers<bool>,
    connected: bool,
    input: InputTracker,
    keys: InputKeys,
    epoch: Instant,
    next_ping: Option<Instant>,
    ping_sent_at: Option<Instant>,
    last_pong: Rc<Cell<Option<u64>>>,
    _subscriptions: Vec<Subscription>,
}

impl SyncClient {
    pub fn new(config: ClientConfig, connector: Box<dyn Connector>) -> Self {
        let mut router = MessageRouter::new();
        let world = Rc::new(RefCell::new(EntityInterpolator::new(config.interpolation)));
        let mut subscriptions = EntityInterpolator::attach(&world, &mut router);

        let last_pong = Rc::new(Cell::new(None));
        {
            let last_pong = Rc::clone(&last_pong);
            subscriptions.push(router.subscribe::<Pong>(move |pong| {
                last_pong.set(Some(pong.timestamp));
            }));
        }

        Self {
            connection: ConnectionManager::new(config.connection.clone(), connector),
            config,
            router,
            world,
            connectivity: Subscribers::new(),
            connected: false,
            input: InputTracker::new(),
            keys: InputKeys::empty(),
            epoch: Instant::now(),
            next_ping: None,
            ping_sent_at: None,
            last_pong,
            _subscriptions: subscriptions,
        }
    }

    /// The TCP connect is bounded by a short timeout; the upgrade itself
    /// completes across later `update` calls.
    pub fn with_websocket(config: ClientConfig) -> Self {
        Self::new(config, Box::new(WebSocketConnector::default()))
    }

    pub fn connect(&mut self, url: &str, token: &str) -> Result<(), ConnectError> {
        self.connection.connect(url, token)
    }

    pub fn connect_at(&mut self, url: &str, token: &str, now: Instant) -> Result<(), ConnectError> {
        self.connection.connect_at(url, token, now)
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.world.borrow_mut().clear();
        self.input.reset();
        self.next_ping = None;
        self.ping_sent_at = None;
        self.set_connected(false);
    }

    pub fn update(&mut self, dt: f32) {
        self.update_at(Instant::now(), dt);
    }

    pub fn update_at(&mut self, now: Instant, dt: f32) {
        for event in self.connection.poll_at(now) {
            match event {
                ConnectionEvent::Opened => {
                    self.input.reset();
                    self.ping_sent_at = None;
                    self.next_ping = self.config.ping_interval.map(|interval| now + interval);
                    self.set_connected(true);
                }
                ConnectionEvent::Frame(frame) => {
                    self.router.dispatch(&frame);
                }
                ConnectionEvent::Closed => {
                    self.next_ping = None;
                    self.ping_sent_at = None;
                    self.set_connected(false);
                }
            }
        }

        self.record_pong(now);
        self.sync_input();
        self.send_ping_if_due(now);

        self.world.borrow_mut().tick(dt);
    }

    pub fn subscribe<M: Message>(&mut self, callback: impl FnMut(&M) + 'static) -> Subscription {
        self.router.subscribe::<M>(callback)
    }

    pub fn subscribe_raw(
        &mut self,
        kind: &str,
        callback: impl FnMut(&Value) + 'static,
    ) -> Subscription {
        self.router.subscribe_raw(kind, callback)
    }

    pub fn on_connectivity(&self, callback: impl FnMut(&bool) + 'static) -> Subscription {
        self.connectivity.subscribe(callback)
    }

    pub fn publish<M: Message>(&mut self, message: &M) -> Result<bool, EnvelopeError> {
        self.router.publish(&mut self.connection, message)
    }

    pub fn publish_raw(&mut self, kind: &str, payload: Value) -> Result<bool, EnvelopeError> {
        self.router.publish_raw(&mut self.connection, kind, payload)
    }

    pub fn send_chat(&mut self, sender: &str, message: &str) -> Result<bool, EnvelopeError> {
        self.publish(&ChatMessage {
            sender: sender.to_string(),
            message: message.to_string(),
        })
    }

    pub fn set_input(&mut self, keys: InputKeys) {
        self.keys = keys;
        self.sync_input();
    }

    pub fn input(&self) -> InputKeys {
        self.keys
    }

    pub fn world(&self) -> Ref<'_, EntityInterpolator> {
        self.world.borrow()
    }

    pub fn entity(&self, name: &str) -> Option<RemoteEntity> {
        self.world.borrow().get(name).cloned()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn stats(&self) -> &NetworkStats {
        self.connection.stats()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.router.stats()
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.connectivity.dispatch(&connected);
        }
    }

    fn sync_input(&mut self) {
        if !self.connection.is_open() || !self.input.changed(self.keys) {
            return;
        }

        match self.publish(&PlayerInput::from(self.keys)) {
            Ok(true) => self.input.commit(self.keys),
            Ok(false) => {}
            Err(err) => log::warn!("failed to encode input: {}", err),
        }
    }

    fn send_ping_if_due(&mut self, now: Instant) {
        let (Some(interval), Some(due)) = (self.config.ping_interval, self.next_ping) else {
            return;
        };
        if now < due {
            return;
        }

        let timestamp = self.millis_since_epoch(now);
        match self.publish(&Ping { timestamp }) {
            Ok(true) => self.ping_sent_at = Some(now),
            Ok(false) => {}
            Err(err) => log::warn!("failed to encode ping: {}", err),
        }
        self.next_ping = Some(now + interval);
    }

    // Servers may answer with their own clock, so RTT runs from when the
    // outstanding ping left.
    fn record_pong(&mut self, now: Instant) {
        let Some(timestamp) = self.last_pong.take() else {
            return;
        };
        let Some(sent_at) = self.ping_sent_at.take() else {
            log::trace!("ignoring unsolicited pong {}", timestamp);
            return;
        };

        let rtt = now.saturating_duration_since(sent_at).as_secs_f32() * 1000.0;
        self.connection.stats_mut().rtt_ms = Some(rtt);
        log::trace!("rtt {:.1} ms", rtt);
    }

    fn millis_since_epoch(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }
}
