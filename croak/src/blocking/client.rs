use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use croak_msg::{Block, Code, CodeKind, Message, Payload, Token, Type};

use crate::block::{Assembler, Multipart, Segments};
use crate::blocking::{parse_url, timeout_millis, SendOptions};
use crate::config::Config;
use crate::endpoint::{self, EndpointHandle, EndpointMsg, Mode};
use crate::error::Error;
use crate::event::{Event, EventContext, LogSink, Sink};
use crate::exchange::{Cmd, ExchangeHandle, FailReason, Input, Key, RrEvent};
use crate::req::{Method, Req};
use crate::resp::{code, Resp};
use crate::socket::UdpAdapter;

/// A blocking CoAP client.
///
/// Sockets are bound lazily, one endpoint per URL scheme; every
/// request runs on its own exchange keyed by a fresh random token.
///
/// ```no_run
/// use croak::blocking::Client;
///
/// let mut client = Client::new();
/// let resp = client.get("coap://coap.me/hello").unwrap();
/// println!("{}: {}", resp.status(), resp.payload_string().unwrap());
/// ```
pub struct Client {
  cfg: Config,
  sink: Arc<dyn Sink>,
  endpoints: HashMap<String, EndpointHandle>,
}

impl Default for Client {
  fn default() -> Self {
    Self::new()
  }
}

impl core::fmt::Debug for Client {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Client")
     .field("cfg", &self.cfg)
     .field("endpoints", &self.endpoints.keys())
     .finish()
  }
}

impl Client {
  /// Create a client with default config, logging its events through
  /// the `log` facade
  pub fn new() -> Self {
    Self::new_with(Config::default(), Arc::new(LogSink))
  }

  /// Create a client with explicit config and event sink
  pub fn new_with(cfg: Config, sink: Arc<dyn Sink>) -> Self {
    Self { cfg,
           sink,
           endpoints: HashMap::new() }
  }

  /// Send a GET request
  pub fn get(&mut self, url: &str) -> Result<Resp, Error> {
    self.request(Method::GET, url, vec![], SendOptions::from_config(&self.cfg))
  }

  /// Send a POST request
  pub fn post(&mut self, url: &str, payload: Vec<u8>) -> Result<Resp, Error> {
    self.request(Method::POST, url, payload, SendOptions::from_config(&self.cfg))
  }

  /// Send a PUT request
  pub fn put(&mut self, url: &str, payload: Vec<u8>) -> Result<Resp, Error> {
    self.request(Method::PUT, url, payload, SendOptions::from_config(&self.cfg))
  }

  /// Send a DELETE request
  pub fn delete(&mut self, url: &str) -> Result<Resp, Error> {
    self.request(Method::DELETE, url, vec![], SendOptions::from_config(&self.cfg))
  }

  /// Check a peer for liveness with a CoAP ping (an empty CON, which
  /// any live peer answers with a reset).
  pub fn ping(&mut self, host: &str, port: u16) -> Result<(), Error> {
    let opts = SendOptions::from_config(&self.cfg);
    let endpoint = self.endpoint_for("coap", &opts)?;

    let (exchange, _key, rr) =
      connect(&endpoint, host.to_string(), port, Token::default(), &opts, &self.cfg)?;

    let ping = Message::new(Type::Con, Code::EMPTY, croak_msg::Id(0), Token::default());
    exchange.tx
            .send(Input::Cmd(Cmd::ReliableSend(ping)))
            .map_err(|_| Error::Shutdown)?;

    let deadline = Instant::now() + Duration::from_millis(timeout_millis(opts.timeout).0);

    loop {
      match recv_deadline(&rr, deadline)? {
        // a reset is exactly what a ping wants to see
        | RrEvent::Fail(_, FailReason::Reset) => return Ok(()),
        | RrEvent::Fail(_, FailReason::Timeout) => return Err(Error::Timeout),
        | RrEvent::Socket(reason) => return Err(Error::Socket(reason)),
        | RrEvent::Rx(_) => continue,
      }
    }
  }

  /// Send a request built by hand.
  ///
  /// This is the full-surface call: method & URL, payload, and every
  /// per-request option. Block-wise transfer in both directions is
  /// orchestrated automatically when payloads exceed
  /// [`SendOptions::block_size`].
  pub fn request(&mut self,
                 method: Method,
                 url: &str,
                 payload: Vec<u8>,
                 opts: SendOptions)
                 -> Result<Resp, Error> {
    let mut req = Req::new(method, "");
    req.set_payload(payload);
    self.send(req, url, opts)
  }

  /// Send a pre-built [`Req`] to a URL.
  ///
  /// The URL supplies routing (and any path/query/host options the
  /// request does not already carry); everything else on the request
  /// is taken as-is.
  pub fn send(&mut self, mut req: Req, url: &str, opts: SendOptions) -> Result<Resp, Error> {
    let parsed = parse_url(url)?;
    let endpoint = self.endpoint_for(&parsed.scheme, &opts)?;

    req.set_confirmable(opts.confirmable);

    let token = Token::from_bytes(&rand::random::<[u8; 4]>());
    req.msg_mut().token = token;

    if req.msg().count(croak_msg::opt::known::repeat::PATH) == 0 {
      req.msg_mut().set_path(&parsed.path).ok();
    }

    match (&opts.uri_host, parsed.host_is_literal) {
      | (Some(host), _) => req.msg_mut().set_host(host),
      | (None, false) => req.msg_mut().set_host(&parsed.host),
      | (None, true) => (),
    }

    let port = opts.uri_port.unwrap_or(parsed.port);
    req.msg_mut().set_port(port);

    for q in &parsed.query {
      req.msg_mut().add_query(q).ok();
    }

    let (exchange, key, rr) =
      connect(&endpoint, parsed.host.clone(), port, token, &opts, &self.cfg)?;

    let ctx = EventContext::of_peer(key.addr).with_token(token)
                                             .with_tag(opts.tag.clone());

    let payload = core::mem::take(&mut req.msg_mut().payload).0;

    // the block-less request message; block2 follow-ups re-derive
    // from this
    let template: Message = req.msg().clone();

    let deadline = Instant::now() + Duration::from_millis(timeout_millis(opts.timeout).0);

    let resp = if payload.len() > opts.block_size as usize {
      self.send_blockwise(&exchange, &rr, &template, payload, &opts, &ctx, deadline)?
    } else {
      let mut m = template.clone();
      m.payload = Payload(payload);
      send_one(&exchange, m, opts.confirmable)?;
      self.await_response(&exchange, &rr, token, deadline)?
    };

    let resp = self.fetch_remaining_blocks(&exchange, &rr, &template, resp, &ctx, deadline)?;

    Ok(Resp::from(resp))
  }

  /// Drive an oversized request payload out one Block1 at a time,
  /// waiting for 2.31 Continue between blocks and honoring block-size
  /// pushback from the server.
  #[allow(clippy::too_many_arguments)]
  fn send_blockwise(&self,
                    exchange: &ExchangeHandle,
                    rr: &Receiver<(Key, RrEvent)>,
                    template: &Message,
                    payload: Vec<u8>,
                    opts: &SendOptions,
                    ctx: &EventContext,
                    deadline: Instant)
                    -> Result<Message, Error> {
    let total = payload.len() as u64;
    let token = template.token;
    let mut segs = Segments::new(payload, opts.block_size);

    while let Some((chunk, desc)) = segs.next_segment() {
      let chunk_len = chunk.len();

      let mut m = template.clone();
      m.payload = Payload(chunk);
      m.set_block1(desc);
      if desc.num() == 0 {
        m.set_size1(total);
      }

      send_one(exchange, m, true)?;
      self.sink.fire(ctx,
                     &Event::BlockSent { size: chunk_len,
                                         num: desc.num(),
                                         more: desc.more() });

      let reply = self.await_response(exchange, rr, token, deadline)?;

      if !desc.more() {
        return Ok(reply);
      }

      // mid-transfer the server controls the block size going forward
      if let Some(ctrl) = Multipart::of(&reply).control {
        segs.set_size(ctrl.size());
      }

      if reply.code != code::CONTINUE {
        // early final (or error) response ends the upload
        return Ok(reply);
      }
    }

    Err(Error::Timeout)
  }

  /// If the response is one block of many, keep requesting follow-up
  /// blocks until the reassembled payload is complete.
  fn fetch_remaining_blocks(&self,
                            exchange: &ExchangeHandle,
                            rr: &Receiver<(Key, RrEvent)>,
                            template: &Message,
                            mut resp: Message,
                            ctx: &EventContext,
                            deadline: Instant)
                            -> Result<Message, Error> {
    let desc = match Multipart::of(&resp).description {
      | Some(desc) if desc.more() || desc.num() > 0 => desc,
      | _ => return Ok(resp),
    };

    let token = template.token;
    let mut asm = Assembler::new();

    self.sink.fire(ctx,
                   &Event::BlockReceived { size: resp.payload.0.len(),
                                           num: desc.num(),
                                           more: desc.more() });

    let mut assembled = asm.push(desc, resp.payload.as_bytes())?;
    let mut size = desc.size();
    let mut next_num = desc.num() + 1;

    while assembled.is_none() {
      let mut m = template.clone();
      m.set_block2(Block::new(size, next_num, false));

      send_one(exchange, m, true)?;

      let reply = self.await_response(exchange, rr, token, deadline)?;

      if reply.code.kind() != CodeKind::Response || reply.code.class != 2 {
        return Ok(reply);
      }

      let desc = reply.block2().unwrap_or(Block::new(size, next_num, false));
      self.sink.fire(ctx,
                     &Event::BlockReceived { size: reply.payload.0.len(),
                                             num: desc.num(),
                                             more: desc.more() });

      assembled = asm.push(desc, reply.payload.as_bytes())?;
      size = desc.size();
      next_num = desc.num() + 1;
    }

    resp.payload = Payload(assembled.unwrap_or_default());
    Ok(resp)
  }

  /// Wait for the response correlated with `token`: a piggybacked ack,
  /// a non-confirmable reply, or (after an empty ack) a separate CON
  /// which is automatically acked.
  fn await_response(&self,
                    exchange: &ExchangeHandle,
                    rr: &Receiver<(Key, RrEvent)>,
                    token: Token,
                    deadline: Instant)
                    -> Result<Message, Error> {
    loop {
      match recv_deadline(rr, deadline)? {
        | RrEvent::Fail(_, FailReason::Reset) => return Err(Error::Reset),
        | RrEvent::Fail(_, FailReason::Timeout) => return Err(Error::Timeout),
        | RrEvent::Socket(reason) => return Err(Error::Socket(reason)),
        | RrEvent::Rx(msg) => {
          let msg = msg.unwrap();

          match msg.ty {
            // empty ack: the real answer will arrive separately
            | Type::Ack if msg.code.kind() == CodeKind::Empty => continue,
            | Type::Ack if msg.token == token => return Ok(msg),
            | Type::Non if msg.token == token => return Ok(msg),
            | Type::Con if msg.token == token => {
              let _ = exchange.tx.send(Input::Cmd(Cmd::Accept(msg.ack())));
              return Ok(msg);
            },
            // not ours; this layer only speaks for one token
            | _ => continue,
          }
        },
      }
    }
  }

  fn endpoint_for(&mut self, scheme: &str, opts: &SendOptions) -> Result<EndpointHandle, Error> {
    if let Some(handle) = self.endpoints.get(scheme) {
      return Ok(handle.clone());
    }

    let adapter: Arc<dyn crate::socket::SocketAdapter> = match (scheme, &opts.socket_adapter) {
      | (_, Some(adapter)) => adapter.clone(),
      | ("coap", None) => Arc::new(UdpAdapter),
      | (other, None) => return Err(Error::UnsupportedScheme(other.to_string())),
    };

    let handle = endpoint::spawn("0.0.0.0:0".parse().unwrap(),
                                 Mode::Client,
                                 adapter,
                                 self.cfg,
                                 None,
                                 self.sink.clone())?;

    self.endpoints.insert(scheme.to_string(), handle.clone());
    Ok(handle)
  }
}

impl Drop for Client {
  fn drop(&mut self) {
    for endpoint in self.endpoints.values() {
      let _ = endpoint.tx.send(EndpointMsg::Shutdown);
    }
  }
}

fn send_one(exchange: &ExchangeHandle, m: Message, confirmable: bool) -> Result<(), Error> {
  let cmd = if confirmable {
    Cmd::ReliableSend(m)
  } else {
    Cmd::UnreliableSend(m)
  };

  exchange.tx.send(Input::Cmd(cmd)).map_err(|_| Error::Shutdown)
}

fn recv_deadline(rr: &Receiver<(Key, RrEvent)>, deadline: Instant) -> Result<RrEvent, Error> {
  let remaining = deadline.saturating_duration_since(Instant::now());

  if remaining.is_zero() {
    return Err(Error::Timeout);
  }

  match rr.recv_timeout(remaining) {
    | Ok((_, ev)) => Ok(ev),
    | Err(RecvTimeoutError::Timeout) => Err(Error::Timeout),
    | Err(RecvTimeoutError::Disconnected) => Err(Error::Shutdown),
  }
}

/// Resolve & register a fresh exchange with the endpoint, returning
/// its mailbox, key and the channel its responses arrive on.
fn connect(endpoint: &EndpointHandle,
           host: String,
           port: u16,
           token: Token,
           opts: &SendOptions,
           base_cfg: &Config)
           -> Result<(ExchangeHandle, Key, Receiver<(Key, RrEvent)>), Error> {
  let (rr_tx, rr_rx) = mpsc::channel();
  let (reply_tx, reply_rx) = mpsc::channel();

  endpoint.tx
          .send(EndpointMsg::Connect { host,
                                       port,
                                       token,
                                       tag: opts.tag.clone(),
                                       cfg: opts.exchange_config(base_cfg),
                                       rr: rr_tx,
                                       reply: reply_tx })
          .map_err(|_| Error::Shutdown)?;

  let (exchange, key) = reply_rx.recv().map_err(|_| Error::Shutdown)??;
  Ok((exchange, key, rr_rx))
}
