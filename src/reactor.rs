//! Single-threaded readiness demultiplexer.
//!
//! A `Reactor` owns no handler lifetime: registrations are [`Weak`]
//! references, so a handler that is dropped without calling
//! [`Reactor::del_handler`] simply stops receiving events rather than being
//! kept alive.
use std::collections::HashMap;
use std::rc::Weak;
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};

use crate::error::{Error, ErrorKind, Result};

/// Registered with a [`Reactor`] to receive readiness notifications.
pub trait EventHandler {
    /// The OS-level descriptor to poll, already registered into the source
    /// passed to [`Reactor::add_handler`].
    fn on_receive(&self, readable: bool, writable: bool);
}

pub struct Reactor {
    poll: Poll,
    handlers: HashMap<Token, Weak<dyn EventHandler>>,
    next_token: usize,
}

impl Reactor {
    pub fn new() -> Result<Self> {
        Ok(Reactor {
            poll: Poll::new().map_err(Error::from)?,
            handlers: HashMap::new(),
            next_token: 0,
        })
    }

    /// Register `source` for readiness events, dispatched to `handler`.
    /// Returns the [`Token`] to pass to [`Reactor::del_handler`].
    pub fn add_handler<S>(
        &mut self,
        source: &mut S,
        handler: Weak<dyn EventHandler>,
        interest: Interest,
    ) -> Result<Token>
    where
        S: mio::event::Source,
    {
        let token = Token(self.next_token);
        self.next_token += 1;
        self.poll
            .registry()
            .register(source, token, interest)
            .map_err(Error::from)?;
        self.handlers.insert(token, handler);
        Ok(token)
    }

    /// Unregister `token`. Must be called before the handler's destruction.
    pub fn del_handler<S>(&mut self, source: &mut S, token: Token) -> Result<()>
    where
        S: mio::event::Source,
    {
        self.handlers.remove(&token);
        self.poll.registry().deregister(source).map_err(Error::from)
    }

    /// Block until at least one registered descriptor is ready, or
    /// `timeout_ms` elapses (`None` blocks indefinitely, matching the
    /// socket-layer convention that 0 polls once).
    pub fn run_once(&mut self, timeout_ms: Option<u64>) -> Result<()> {
        let mut events = Events::with_capacity(128);
        let timeout = timeout_ms.map(Duration::from_millis);
        self.poll.poll(&mut events, timeout).map_err(Error::from)?;

        for event in events.iter() {
            if let Some(handler) = self.handlers.get(&event.token()) {
                if let Some(handler) = handler.upgrade() {
                    handler.on_receive(event.is_readable(), event.is_writable());
                }
            }
        }
        if events.is_empty() && timeout_ms.is_some() {
            return Err(Error::new(ErrorKind::TimedOut, "reactor wait timed out"));
        }
        Ok(())
    }
}
