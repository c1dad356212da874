use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use croak_msg::{Block, CodeKind, Id, Message, Payload};

use crate::block::{Assembler, Multipart, Segments};
use crate::config::Config;
use crate::endpoint::{self, EndpointHandle, EndpointMsg, Mode};
use crate::error::Error;
use crate::event::{Event, EventContext, LogSink, Sink};
use crate::exchange::{Cmd, Input, Key, RrEvent};
use crate::net::Addrd;
use crate::req::Req;
use crate::resp::{code, Resp};
use crate::socket::UdpAdapter;

enum ServerMsg {
  Rr(Key, RrEvent),
  Respond {
    key: Key,
    resp: Resp,
    preferred_block: Option<u16>,
  },
}

/// The handle a [`Handler`] answers through.
///
/// Answering inside the handler produces a piggybacked response;
/// holding onto the Reply and answering later (it is `Send + 'static`)
/// produces a separate response after the runtime's automatic empty
/// ack.
#[derive(Debug)]
pub struct Reply {
  key: Key,
  preferred_block: Option<u16>,
  tx: Sender<ServerMsg>,
  endpoint: Sender<EndpointMsg>,
}

impl Reply {
  /// Send the answer for the request this Reply was created for
  pub fn send(&self, resp: Resp) -> Result<(), Error> {
    self.tx
        .send(ServerMsg::Respond { key: self.key.clone(),
                                   resp,
                                   preferred_block: self.preferred_block })
        .map_err(|_| Error::Shutdown)
  }

  /// Tag this exchange; the tag rides along on every observability
  /// event about it
  pub fn tag(&self, tag: impl Into<String>) {
    let _ = self.endpoint.send(EndpointMsg::Tag(self.key.clone(), tag.into()));
  }

  /// Address of the requesting peer
  pub fn peer(&self) -> SocketAddr {
    self.key.addr
  }
}

/// Something that answers requests.
///
/// Implemented for closures, so the simplest server is
/// `Server::new(addr)?.run(|req, reply| { ... })`.
pub trait Handler: Send {
  /// Answer one request, now (piggybacked) or later (separate
  /// response) via `reply`
  fn handle(&mut self, req: Addrd<Req>, reply: Reply);
}

impl<F> Handler for F where F: FnMut(Addrd<Req>, Reply) + Send
{
  fn handle(&mut self, req: Addrd<Req>, reply: Reply) {
    self(req, reply)
  }
}

/// A blocking CoAP server.
///
/// ```no_run
/// use croak::blocking::Server;
/// use croak::resp::{code, Resp};
///
/// let server = Server::new("0.0.0.0:5683".parse().unwrap()).unwrap();
/// server.run_fn(|req| {
///         let mut resp = Resp::for_request(req.data()).unwrap();
///         resp.set_code(code::CONTENT);
///         resp.set_payload(b"ribbit".to_vec());
///         resp
///       })
///       .unwrap();
/// ```
pub struct Server {
  endpoint: EndpointHandle,
  mailbox: Receiver<ServerMsg>,
  mailbox_tx: Sender<ServerMsg>,
  cfg: Config,
  sink: Arc<dyn Sink>,
}

impl core::fmt::Debug for Server {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Server")
     .field("local", &self.endpoint.local)
     .field("cfg", &self.cfg)
     .finish()
  }
}

impl Server {
  /// Bind a UDP server endpoint with default config, logging events
  /// through the `log` facade
  pub fn new(addr: SocketAddr) -> Result<Self, Error> {
    Self::new_with(addr, Config::default(), Arc::new(LogSink))
  }

  /// Bind with explicit config and event sink
  pub fn new_with(addr: SocketAddr, cfg: Config, sink: Arc<dyn Sink>) -> Result<Self, Error> {
    let (mailbox_tx, mailbox) = mpsc::channel();
    let (rr_tx, rr_rx) = mpsc::channel();

    let endpoint = endpoint::spawn(addr,
                                   Mode::Server,
                                   Arc::new(UdpAdapter),
                                   cfg,
                                   Some(rr_tx),
                                   sink.clone())?;

    let into_mailbox = mailbox_tx.clone();
    std::thread::Builder::new().name("croak-server-rr".into())
                               .spawn(move || {
                                 while let Ok((key, ev)) = rr_rx.recv() {
                                   if into_mailbox.send(ServerMsg::Rr(key, ev)).is_err() {
                                     break;
                                   }
                                 }
                               })
                               .map_err(|e| Error::Socket(e.to_string()))?;

    Ok(Self { endpoint,
              mailbox,
              mailbox_tx,
              cfg,
              sink })
  }

  /// The address this server is listening on
  pub fn local_addr(&self) -> SocketAddr {
    self.endpoint.local
  }

  /// Serve forever with a synchronous handler: one request in, one
  /// response out.
  pub fn run_fn<F>(self, mut f: F) -> Result<(), Error>
    where F: FnMut(Addrd<Req>) -> Resp + Send
  {
    self.run(move |req: Addrd<Req>, reply: Reply| {
          let resp = f(req);
          let _ = reply.send(resp);
        })
  }

  /// Serve forever.
  ///
  /// Runs the handler for every complete inbound request (block-wise
  /// uploads are reassembled first), sends its answers, segments
  /// oversized response payloads, and answers each follow-up block
  /// fetch from the segment store.
  pub fn run<H>(self, mut handler: H) -> Result<(), Error>
    where H: Handler
  {
    let mut uploads: HashMap<Key, Assembler> = HashMap::new();
    let mut serving: HashMap<Key, (Resp, Segments)> = HashMap::new();
    let mut last_mid: HashMap<Key, Id> = HashMap::new();

    loop {
      match self.mailbox.recv().map_err(|_| Error::Shutdown)? {
        | ServerMsg::Rr(key, RrEvent::Rx(msg)) => {
          self.on_request(key,
                          msg,
                          &mut handler,
                          &mut uploads,
                          &mut serving,
                          &mut last_mid);
        },
        | ServerMsg::Rr(key, RrEvent::Fail(id, reason)) => {
          log::warn!(target: "croak",
                     "response to {:?} (id {:?}) was never taken: {:?}",
                     key.addr,
                     id,
                     reason);
        },
        | ServerMsg::Rr(_, RrEvent::Socket(reason)) => {
          return Err(Error::Socket(reason));
        },
        | ServerMsg::Respond { key,
                               resp,
                               preferred_block, } => {
          self.on_respond(key, resp, preferred_block, &mut serving);
        },
      }
    }
  }

  fn ctx(&self, key: &Key) -> EventContext {
    EventContext::of_peer(key.addr).with_token(key.token)
  }

  fn deliver(&self, key: &Key, resp: Resp) {
    let _ = self.endpoint
                .tx
                .send(EndpointMsg::ToExchange(key.clone(),
                                              Input::Cmd(Cmd::Respond(resp.into()))));
  }

  fn on_request<H>(&self,
                   key: Key,
                   msg: Addrd<Message>,
                   handler: &mut H,
                   uploads: &mut HashMap<Key, Assembler>,
                   serving: &mut HashMap<Key, (Resp, Segments)>,
                   last_mid: &mut HashMap<Key, Id>)
    where H: Handler
  {
    let addr = msg.addr();
    let mut req_msg = msg.unwrap();

    // acks & resets answering our separate responses also land here
    if req_msg.code.kind() != CodeKind::Request {
      return;
    }

    // a retransmitted request we already answered
    if last_mid.get(&key) == Some(&req_msg.id) {
      return;
    }
    if last_mid.len() > 4096 {
      last_mid.clear();
    }
    last_mid.insert(key.clone(), req_msg.id);

    // follow-up fetch of a segmented response we are serving
    if let Some(ctrl) = Multipart::of(&req_msg).control.filter(|b| b.num() > 0) {
      if let Some((template, segs)) = serving.get_mut(&key) {
        segs.set_size(ctrl.size());

        match segs.segment(ctrl.num()) {
          | Some((chunk, desc)) => {
            let mut resp = template.clone();
            resp.set_payload(chunk.clone());
            resp.msg_mut().set_block2(desc);

            self.sink.fire(&self.ctx(&key),
                           &Event::BlockSent { size: chunk.len(),
                                               num: desc.num(),
                                               more: desc.more() });

            if !desc.more() {
              serving.remove(&key);
            }
            self.deliver(&key, resp);
          },
          | None => {
            let mut resp = Resp::from(req_msg.ack());
            resp.set_code(code::BAD_OPTION);
            self.deliver(&key, resp);
          },
        }

        return;
      }
    }

    // one block of an upload
    if let Some(desc) = Multipart::of(&req_msg).description {
      if desc.more() || uploads.contains_key(&key) {
        self.sink.fire(&self.ctx(&key),
                       &Event::BlockReceived { size: req_msg.payload.0.len(),
                                               num: desc.num(),
                                               more: desc.more() });

        let asm = uploads.entry(key.clone()).or_default();

        match asm.push(desc, req_msg.payload.as_bytes()) {
          | Ok(None) => {
            let mut cont = Resp::from(req_msg.ack());
            cont.set_code(code::CONTINUE);
            cont.msg_mut()
                .set_block1(Block::new(desc.size().min(self.cfg.block_size), desc.num(), true));
            self.deliver(&key, cont);
            return;
          },
          | Ok(Some(full)) => {
            uploads.remove(&key);
            req_msg.payload = Payload(full);
          },
          | Err(e) => {
            uploads.remove(&key);
            log::warn!(target: "croak", "upload from {} failed: {:?}", addr, e);

            let mut fail = Resp::from(req_msg.ack());
            fail.set_code(code::REQUEST_ENTITY_INCOMPLETE);
            self.deliver(&key, fail);
            return;
          },
        }
      }
    }

    let preferred_block = Multipart::of(&req_msg).control.map(|b| b.size());

    let req = Req::from(req_msg);
    let reply = Reply { key: key.clone(),
                        preferred_block,
                        tx: self.mailbox_tx.clone(),
                        endpoint: self.endpoint.tx.clone() };

    let outcome =
      catch_unwind(AssertUnwindSafe(|| handler.handle(Addrd(req.clone(), addr), reply)));

    if outcome.is_err() {
      log::error!(target: "croak", "handler panicked on request from {}", addr);

      if let Some(mut resp) = Resp::for_request(&req) {
        resp.set_code(code::INTERNAL_SERVER_ERROR);
        self.deliver(&key, resp);
      }
    }
  }

  fn on_respond(&self,
                key: Key,
                resp: Resp,
                preferred_block: Option<u16>,
                serving: &mut HashMap<Key, (Resp, Segments)>) {
    let limit = preferred_block.unwrap_or(self.cfg.block_size)
                               .min(self.cfg.block_size);

    if resp.payload().len() <= limit as usize {
      self.deliver(&key, resp);
      return;
    }

    let total = resp.payload().len();
    let segs = Segments::new(resp.payload().to_vec(), limit);

    let (chunk, desc) = match segs.segment(0) {
      | Some(first) => first,
      | None => {
        self.deliver(&key, resp);
        return;
      },
    };

    let mut template = resp;
    template.set_payload(vec![]);

    let mut first = template.clone();
    first.set_payload(chunk.clone());
    first.msg_mut().set_block2(desc);
    first.msg_mut().set_size2(total as u64);

    self.sink.fire(&self.ctx(&key),
                   &Event::BlockSent { size: chunk.len(),
                                       num: 0,
                                       more: desc.more() });

    serving.insert(key.clone(), (template, segs));
    self.deliver(&key, first);
  }
}

impl Drop for Server {
  fn drop(&mut self) {
    let _ = self.endpoint.tx.send(EndpointMsg::Shutdown);
  }
}
