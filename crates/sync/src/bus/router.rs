use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use super::subscribers::{Subscribers, Subscription};
use crate::net::FrameSink;
use crate::protocol::{Envelope, EnvelopeError, Message};

/// Outcome of routing one inbound frame. `Delivered` counts the subscribers
/// that actually received it; typed subscribers whose payload failed to
/// decode are left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Delivered(usize),
    Undecodable,
    Unrouted,
    Malformed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub undecodable: u64,
    pub unrouted: u64,
    pub malformed: u64,
}

#[derive(Debug, Default)]
pub struct MessageRouter {
    topics: HashMap<String, Subscribers<Value>>,
    decode_failures: Rc<Cell<usize>>,
    stats: DispatchStats,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_raw(
        &mut self,
        kind: &str,
        callback: impl FnMut(&Value) + 'static,
    ) -> Subscription {
        self.topics
            .entry(kind.to_string())
            .or_default()
            .subscribe(callback)
    }

    pub fn subscribe<M: Message>(
        &mut self,
        mut callback: impl FnMut(&M) + 'static,
    ) -> Subscription {
        let decode_failures = Rc::clone(&self.decode_failures);
        self.subscribe_raw(M::TYPE, move |payload| match M::deserialize(payload) {
            Ok(message) => callback(&message),
            Err(err) => {
                log::warn!("dropping undecodable {} payload: {}", M::TYPE, err);
                decode_failures.set(decode_failures.get() + 1);
            }
        })
    }

    pub fn dispatch(&mut self, frame: &str) -> Dispatch {
        match Envelope::decode(frame) {
            Ok(envelope) => self.dispatch_envelope(&envelope),
            Err(err) => {
                log::warn!("dropping malformed frame: {}", err);
                self.stats.malformed += 1;
                Dispatch::Malformed
            }
        }
    }

    pub fn dispatch_envelope(&mut self, envelope: &Envelope) -> Dispatch {
        let Some(subscribers) = self
            .topics
            .get(&envelope.kind)
            .filter(|subscribers| !subscribers.is_empty())
            .cloned()
        else {
            log::trace!("no subscribers for {}", envelope.kind);
            self.stats.unrouted += 1;
            return Dispatch::Unrouted;
        };

        let failures_before = self.decode_failures.get();
        let invoked = subscribers.dispatch(&envelope.payload);
        let rejected = self.decode_failures.get() - failures_before;

        let delivered = invoked.saturating_sub(rejected);
        if delivered == 0 && rejected > 0 {
            self.stats.undecodable += 1;
            return Dispatch::Undecodable;
        }

        self.stats.delivered += 1;
        Dispatch::Delivered(delivered)
    }

    pub fn encode<M: Message>(&self, message: &M) -> Result<String, EnvelopeError> {
        Envelope::from_message(message)?.encode()
    }

    pub fn publish<M: Message>(
        &self,
        sink: &mut impl FrameSink,
        message: &M,
    ) -> Result<bool, EnvelopeError> {
        let frame = self.encode(message)?;
        Ok(sink.send_frame(frame))
    }

    pub fn publish_raw(
        &self,
        sink: &mut impl FrameSink,
        kind: &str,
        payload: Value,
    ) -> Result<bool, EnvelopeError> {
        let frame = Envelope::new(kind, payload).encode()?;
        Ok(sink.send_frame(frame))
    }

    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.topics.get(kind).map_or(0, Subscribers::len)
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
