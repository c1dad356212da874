use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use croak_msg::{CodeKind, Id, Message, Token, TryFromBytes, TryIntoBytes, Type};

use crate::config::Config;
use crate::error::Error;
use crate::event::{Event, EventContext, Sink};
use crate::exchange::{self, ExchangeHandle, Input, Key, RrEvent};
use crate::logging::msg_summary;
use crate::net::Addrd;
use crate::socket::{self, AdapterCmd, AdapterEvent, AdapterHandle, CloseReason, SocketAdapter};

/// Everything that can land in an endpoint's mailbox: datagrams and
/// lifecycle notices from the socket adapter, outbound traffic and
/// terminations from exchanges, and control messages from the
/// client/server facades.
pub(crate) enum EndpointMsg {
  Datagram(Addrd<Vec<u8>>),
  AdapterClosed(CloseReason),
  Tx(Key, Addrd<Message>),
  Notify(Key, Event),
  ExchangeEnded(Key),
  /// Hand an input to the exchange with this key, if it is live
  ToExchange(Key, Input),
  Connect {
    host: String,
    port: u16,
    token: Token,
    tag: Option<String>,
    cfg: Config,
    rr: Sender<(Key, RrEvent)>,
    reply: Sender<Result<(ExchangeHandle, Key), Error>>,
  },
  Tag(Key, String),
  Shutdown,
}

/// Whether unknown inbound traffic may create exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
  /// Exchanges are pre-created by whoever sends requests; traffic for
  /// unknown keys is dropped with a warning
  Client,
  /// Any inbound request may create an exchange on demand
  Server,
}

/// Mailbox handle to a running endpoint task
#[derive(Debug, Clone)]
pub(crate) struct EndpointHandle {
  pub(crate) tx: Sender<EndpointMsg>,
  pub(crate) local: SocketAddr,
}

/// Bind a socket through `adapter` and start the endpoint task:
/// one thread owning the socket handle and the table of live
/// exchanges, routing every inbound datagram by `(peer, token)`.
pub(crate) fn spawn(bind: SocketAddr,
                    mode: Mode,
                    adapter: Arc<dyn SocketAdapter>,
                    cfg: Config,
                    server_rr: Option<Sender<(Key, RrEvent)>>,
                    sink: Arc<dyn Sink>)
                    -> Result<EndpointHandle, Error> {
  let (tx, rx) = mpsc::channel();

  let adapter_handle = start_adapter(&*adapter, bind, tx.clone())?;
  let local = adapter_handle.local;

  let endpoint = Endpoint { bind,
                            mode,
                            cfg,
                            adapter_factory: adapter,
                            adapter: Some(adapter_handle),
                            self_tx: tx.clone(),
                            exchanges: HashMap::new(),
                            mids: HashMap::new(),
                            tags: HashMap::new(),
                            server_rr,
                            sink };

  std::thread::Builder::new().name(format!("croak-endpoint-{}", local))
                             .spawn(move || endpoint.run(rx))
                             .map_err(|e| Error::Socket(e.to_string()))?;

  Ok(EndpointHandle { tx, local })
}

/// Start the adapter and a monitor thread translating its events into
/// endpoint mailbox messages. The monitor is what notices the adapter
/// going away; the endpoint is never linked to the adapter's fate.
fn start_adapter(adapter: &dyn SocketAdapter,
                 bind: SocketAddr,
                 tx: Sender<EndpointMsg>)
                 -> Result<AdapterHandle, Error> {
  let (ev_tx, ev_rx) = mpsc::channel();
  let handle = adapter.start(bind, ev_tx)?;

  std::thread::Builder::new().name("croak-sock-monitor".into())
                             .spawn(move || loop {
                               match ev_rx.recv() {
                                 | Ok(AdapterEvent::Recv(dgram)) => {
                                   if tx.send(EndpointMsg::Datagram(dgram)).is_err() {
                                     break;
                                   }
                                 },
                                 | Ok(AdapterEvent::Closed(reason)) => {
                                   let _ = tx.send(EndpointMsg::AdapterClosed(reason));
                                   break;
                                 },
                                 | Err(_) => {
                                   let _ = tx.send(EndpointMsg::AdapterClosed(CloseReason::Error("adapter task vanished".into())));
                                   break;
                                 },
                               }
                             })
                             .map_err(|e| Error::Socket(e.to_string()))?;

  Ok(handle)
}

struct Endpoint {
  bind: SocketAddr,
  mode: Mode,
  cfg: Config,
  adapter_factory: Arc<dyn SocketAdapter>,
  adapter: Option<AdapterHandle>,
  self_tx: Sender<EndpointMsg>,
  exchanges: HashMap<Key, ExchangeHandle>,
  mids: HashMap<(SocketAddr, Id), Key>,
  tags: HashMap<Key, String>,
  server_rr: Option<Sender<(Key, RrEvent)>>,
  sink: Arc<dyn Sink>,
}

impl Endpoint {
  fn run(mut self, rx: mpsc::Receiver<EndpointMsg>) {
    while let Ok(msg) = rx.recv() {
      match msg {
        | EndpointMsg::Datagram(dgram) => self.on_datagram(dgram),
        | EndpointMsg::Tx(key, msg) => self.on_tx(key, msg),
        | EndpointMsg::Notify(key, ev) => self.fire(&key, None, ev),
        | EndpointMsg::AdapterClosed(reason) => self.on_adapter_closed(reason),
        | EndpointMsg::ExchangeEnded(key) => {
          if self.exchanges.remove(&key).is_some() {
            self.fire(&key, None, Event::ConnectionEnded);
          }
          self.mids.retain(|_, k| k != &key);
          self.tags.remove(&key);
        },
        | EndpointMsg::ToExchange(key, input) => {
          if let Some(exchange) = self.exchanges.get(&key) {
            let _ = exchange.tx.send(input);
          }
        },
        | EndpointMsg::Connect { host,
                                 port,
                                 token,
                                 tag,
                                 cfg,
                                 rr,
                                 reply, } => {
          let _ = reply.send(self.on_connect(host, port, token, tag, cfg, rr));
        },
        | EndpointMsg::Tag(key, tag) => {
          self.tags.insert(key, tag);
        },
        | EndpointMsg::Shutdown => {
          if let Some(adapter) = &self.adapter {
            let _ = adapter.cmd.send(AdapterCmd::Close);
          }
          break;
        },
      }
    }
  }

  fn fire(&self, key: &Key, id: Option<Id>, ev: Event) {
    let mut ctx = EventContext::of_peer(key.addr).with_token(key.token)
                                                 .with_tag(self.tags.get(key).cloned());
    if let Some(id) = id {
      ctx = ctx.with_id(id);
    }

    self.sink.fire(&ctx, &ev);
  }

  fn on_datagram(&mut self, dgram: Addrd<Vec<u8>>) {
    self.sink.fire(&EventContext::of_peer(dgram.addr()),
                   &Event::DataReceived { size: dgram.data().len() });

    match Message::try_from_bytes(dgram.data()) {
      | Ok(msg) => self.route(Addrd(msg, dgram.addr())),
      | Err(e) => {
        log::warn!(target: "croak",
                   "dropping malformed {} byte datagram from {}: {:?}",
                   dgram.data().len(),
                   dgram.addr(),
                   e);
      },
    }
  }

  fn route(&mut self, msg: Addrd<Message>) {
    let key = Key { addr: msg.addr(),
                    token: msg.data().token };

    if let Some(exchange) = self.exchanges.get(&key) {
      if exchange.tx.send(Input::Recv(msg)).is_ok() {
        return;
      }

      // found it dead before its termination notice arrived
      self.exchanges.remove(&key);
      return;
    }

    match msg.data().ty {
      // empty acks & resets carry no token; find their exchange by
      // the id of the message they answer
      | Type::Ack | Type::Reset => {
        let found = self.mids
                        .get(&(msg.addr(), msg.data().id))
                        .and_then(|key| self.exchanges.get(key));

        match found {
          | Some(exchange) => {
            let _ = exchange.tx.send(Input::Recv(msg));
          },
          | None => {
            log::warn!(target: "croak",
                       "dropping stray {:?} (id {:?}) from {}",
                       msg.data().ty,
                       msg.data().id,
                       msg.addr());
          },
        }
      },

      // an empty CON is a ping; prove liveness with a reset
      | Type::Con if msg.data().code.kind() == CodeKind::Empty => {
        self.send_raw(key, msg.data().reset(), msg.addr());
      },

      | _ if self.mode == Mode::Server && msg.data().code.kind() == CodeKind::Request => {
        if let Some(rr) = self.server_rr.clone() {
          let cfg = self.cfg;
          let exchange = self.create_exchange(key.clone(), rr, cfg);
          let _ = exchange.tx.send(Input::Recv(msg));
          self.exchanges.insert(key, exchange);
        }
      },

      | _ => {
        log::warn!(target: "croak",
                   "dropping from {}: no exchange wants {}",
                   msg.addr(),
                   msg_summary(msg.data()));
      },
    }
  }

  fn create_exchange(&mut self, key: Key, rr: Sender<(Key, RrEvent)>, cfg: Config) -> ExchangeHandle {
    let (mail_tx, mail_rx) = mpsc::channel();

    let handle = exchange::spawn(key.clone(),
                                 cfg,
                                 mail_rx,
                                 mail_tx,
                                 self.self_tx.clone(),
                                 rr,
                                 rand::random());

    self.fire(&key, None, Event::ConnectionStarted);
    handle
  }

  fn on_connect(&mut self,
                host: String,
                port: u16,
                token: Token,
                tag: Option<String>,
                cfg: Config,
                rr: Sender<(Key, RrEvent)>)
                -> Result<(ExchangeHandle, Key), Error> {
    if self.adapter.is_none() {
      return Err(Error::Socket("socket closed and could not be reopened".into()));
    }

    let addr = socket::resolve(&host, port)?;
    let key = Key { addr, token };

    if let Some(tag) = tag {
      self.tags.insert(key.clone(), tag);
    }

    let handle = self.create_exchange(key.clone(), rr, cfg);
    self.exchanges.insert(key.clone(), handle.clone());
    Ok((handle, key))
  }

  fn on_tx(&mut self, key: Key, msg: Addrd<Message>) {
    let bytes = match msg.data().try_into_bytes() {
      | Ok(bytes) => bytes,
      | Err(e) => {
        log::error!(target: "croak",
                    "could not serialize {}: {:?}",
                    msg_summary(msg.data()),
                    e);
        return;
      },
    };

    // remember outbound ids so tokenless acks & resets route back
    if matches!(msg.data().ty, Type::Con | Type::Non) {
      self.mids.insert((msg.addr(), msg.data().id), key.clone());
    }

    self.fire(&key, Some(msg.data().id), Event::DataSent { size: bytes.len() });

    match &self.adapter {
      | Some(adapter) => {
        let _ = adapter.cmd.send(AdapterCmd::Send(Addrd(bytes, msg.addr())));
      },
      | None => {
        if let Some(exchange) = self.exchanges.get(&key) {
          let _ = exchange.tx
                          .send(Input::SocketDown("socket closed and could not be reopened".into()));
        }
      },
    }
  }

  fn send_raw(&self, key: Key, msg: Message, to: SocketAddr) {
    let bytes = match (&msg).try_into_bytes() {
      | Ok(bytes) => bytes,
      | Err(_) => return,
    };

    if let Some(adapter) = &self.adapter {
      self.fire(&key, Some(msg.id), Event::DataSent { size: bytes.len() });
      let _ = adapter.cmd.send(AdapterCmd::Send(Addrd(bytes, to)));
    }
  }

  fn on_adapter_closed(&mut self, reason: CloseReason) {
    log::info!(target: "croak", "socket adapter exited: {:?}", reason);
    self.adapter = None;

    // an adapter we closed on purpose stays closed
    if reason == CloseReason::Commanded {
      return;
    }

    match start_adapter(&*self.adapter_factory, self.bind, self.self_tx.clone()) {
      | Ok(handle) => {
        log::info!(target: "croak", "socket reopened on {}", handle.local);
        self.adapter = Some(handle);
      },
      | Err(e) => {
        let why = format!("{:?}, reopen failed: {}", reason, e);
        for exchange in self.exchanges.values() {
          let _ = exchange.tx.send(Input::SocketDown(why.clone()));
        }
      },
    }
  }
}
