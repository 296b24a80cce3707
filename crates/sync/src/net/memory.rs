//! In-process transport. Frames never leave the process, which makes it the
//! transport of choice for tests and for running the client without a server.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use url::Url;

use super::transport::{Connector, Socket, SocketEvent, TransportError};

#[derive(Debug, Default)]
struct HubState {
    echo: bool,
    refuse: Option<String>,
    generation: u64,
    live: bool,
    opened: Vec<Url>,
    inbound: VecDeque<String>,
    sent: Vec<String>,
    pending_error: Option<String>,
    pending_close: bool,
}

/// Controls the far side of every socket opened through its connectors.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    state: Rc<RefCell<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echo() -> Self {
        let hub = Self::new();
        hub.state.borrow_mut().echo = true;
        hub
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector { hub: self.clone() }
    }

    pub fn push_frame(&self, frame: impl Into<String>) {
        self.state.borrow_mut().inbound.push_back(frame.into());
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.borrow().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    pub fn refuse_connections(&self, reason: Option<&str>) {
        self.state.borrow_mut().refuse = reason.map(str::to_string);
    }

    pub fn drop_connection(&self) {
        self.state.borrow_mut().pending_close = true;
    }

    pub fn fail_connection(&self, reason: &str) {
        self.state.borrow_mut().pending_error = Some(reason.to_string());
    }

    pub fn is_live(&self) -> bool {
        self.state.borrow().live
    }

    pub fn open_count(&self) -> usize {
        self.state.borrow().opened.len()
    }

    pub fn last_url(&self) -> Option<Url> {
        self.state.borrow().opened.last().cloned()
    }
}

#[derive(Debug, Clone)]
pub struct MemoryConnector {
    hub: MemoryHub,
}

impl Connector for MemoryConnector {
    fn open(&mut self, url: &Url) -> Result<Box<dyn Socket>, TransportError> {
        let mut state = self.hub.state.borrow_mut();
        if let Some(reason) = &state.refuse {
            return Err(TransportError::Refused(reason.clone()));
        }

        state.generation += 1;
        state.live = true;
        state.opened.push(url.clone());
        state.pending_close = false;
        state.pending_error = None;
        // Frames pushed with no socket live belong to no session.
        state.inbound.clear();

        Ok(Box::new(MemorySocket {
            hub: self.hub.clone(),
            generation: state.generation,
            announced: false,
            closed: false,
        }))
    }
}

struct MemorySocket {
    hub: MemoryHub,
    generation: u64,
    announced: bool,
    closed: bool,
}

impl MemorySocket {
    fn is_current(&self, state: &HubState) -> bool {
        state.generation == self.generation && state.live
    }
}

impl Socket for MemorySocket {
    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        let mut state = self.hub.state.borrow_mut();
        if self.closed || !self.is_current(&state) {
            return Err(TransportError::Closed);
        }

        state.sent.push(frame.to_string());
        if state.echo {
            state.inbound.push_back(frame.to_string());
        }
        Ok(())
    }

    fn poll(&mut self, events: &mut Vec<SocketEvent>) {
        if self.closed {
            return;
        }

        let mut state = self.hub.state.borrow_mut();
        if !self.is_current(&state) {
            self.closed = true;
            events.push(SocketEvent::Closed);
            return;
        }

        if !self.announced {
            self.announced = true;
            events.push(SocketEvent::Opened);
        }

        events.extend(state.inbound.drain(..).map(SocketEvent::Frame));

        if let Some(reason) = state.pending_error.take() {
            events.push(SocketEvent::Error(TransportError::Failed(reason)));
            state.pending_close = true;
        }
        if state.pending_close {
            state.pending_close = false;
            state.live = false;
            self.closed = true;
            events.push(SocketEvent::Closed);
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.hub.state.borrow_mut();
        if self.is_current(&state) {
            state.live = false;
        }
    }
}
