use std::net::SocketAddr;

use croak_msg::{Id, Token};

/// Who & what an [`Event`] is about.
///
/// Every event carries the peer address, and whichever of message id,
/// token and user tag were known at the point of firing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventContext {
  /// Peer IP address
  pub host: Option<std::net::IpAddr>,
  /// Peer port
  pub port: Option<u16>,
  /// Message id, when the event concerns a single message
  pub id: Option<Id>,
  /// Exchange token
  pub token: Option<Token>,
  /// User-assigned tag for the exchange (see `tag`ging in the
  /// blocking server)
  pub tag: Option<String>,
}

impl EventContext {
  pub(crate) fn of_peer(addr: SocketAddr) -> Self {
    EventContext { host: Some(addr.ip()),
                   port: Some(addr.port()),
                   ..Default::default() }
  }

  pub(crate) fn with_id(mut self, id: Id) -> Self {
    self.id = Some(id);
    self
  }

  pub(crate) fn with_token(mut self, token: Token) -> Self {
    self.token = Some(token);
    self
  }

  pub(crate) fn with_tag(mut self, tag: Option<String>) -> Self {
    self.tag = tag;
    self
  }
}

/// A notable state transition in the runtime.
///
/// Fired through the [`Sink`] installed on the endpoint; the default
/// sink forwards to the `log` facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  /// An exchange with a peer came into existence
  ConnectionStarted,
  /// An exchange with a peer was torn down
  ConnectionEnded,
  /// A datagram was handed to the socket
  DataSent {
    /// datagram size in bytes
    size: usize,
  },
  /// A datagram arrived from the socket
  DataReceived {
    /// datagram size in bytes
    size: usize,
  },
  /// One block of a block-wise transfer went out
  BlockSent {
    /// payload bytes in this block
    size: usize,
    /// block number
    num: u32,
    /// whether further blocks follow
    more: bool,
  },
  /// One block of a block-wise transfer arrived
  BlockReceived {
    /// payload bytes in this block
    size: usize,
    /// block number
    num: u32,
    /// whether further blocks follow
    more: bool,
  },
  /// An unacked message was retransmitted
  Retried {
    /// datagram size in bytes
    size: usize,
    /// retransmissions left before the exchange gives up
    remaining_retries: u16,
  },
  /// A reliable transmission ran out of retries
  TimedOut,
}

/// A thing that consumes runtime [`Event`]s.
///
/// Implementations must be cheap and non-blocking; they are invoked
/// from the endpoint & exchange threads.
pub trait Sink: Send + Sync {
  /// Consume one event
  fn fire(&self, ctx: &EventContext, ev: &Event);
}

/// [`Sink`] forwarding every event to the `log` facade.
///
/// Traffic events log at DEBUG, lifecycle at TRACE, failures at WARN.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
  fn fire(&self, ctx: &EventContext, ev: &Event) {
    use Event::*;

    let level = match ev {
      | ConnectionStarted | ConnectionEnded => log::Level::Trace,
      | TimedOut => log::Level::Warn,
      | _ => log::Level::Debug,
    };

    log::log!(target: "croak", level, "{:?} {:?}", ev, ctx);
  }
}

/// [`Sink`] that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl Sink for NoopSink {
  fn fire(&self, _: &EventContext, _: &Event) {}
}

#[cfg(test)]
pub(crate) mod test_sink {
  use std::sync::{Arc, Mutex};

  use super::*;

  /// Sink recording everything it sees, for assertions
  #[derive(Debug, Clone, Default)]
  pub(crate) struct RecordingSink {
    pub(crate) events: Arc<Mutex<Vec<(EventContext, Event)>>>,
  }

  impl Sink for RecordingSink {
    fn fire(&self, ctx: &EventContext, ev: &Event) {
      self.events.lock().unwrap().push((ctx.clone(), *ev));
    }
  }

  impl RecordingSink {
    pub(crate) fn new() -> Self {
      Self::default()
    }

    pub(crate) fn snapshot(&self) -> Vec<Event> {
      self.events.lock().unwrap().iter().map(|(_, e)| *e).collect()
    }
  }
}
