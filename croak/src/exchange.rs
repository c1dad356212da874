use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use croak_msg::{Id, Message, Token, Type};
use embedded_time::Clock as _;
use embedded_time::Instant;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::Config;
use crate::endpoint::EndpointMsg;
use crate::event::Event;
use crate::net::Addrd;
use crate::retry::{RetryTimer, YouShould};
use crate::time::{millis_between, Clock, Millis, SystemClock};

/// What uniquely identifies one conversation with a peer:
/// the peer's address and the message token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Key {
  pub(crate) addr: SocketAddr,
  pub(crate) token: Token,
}

/// Commands from the layers above
#[derive(Debug, Clone)]
pub(crate) enum Cmd {
  /// Transmit a CON, retransmitting until acked, reset,
  /// cancelled or out of retries
  ReliableSend(Message),
  /// Transmit a NON, fire-and-forget
  UnreliableSend(Message),
  /// Transmit an ack built by the application for a CON we received
  Accept(Message),
  /// Answer the CON or NON we received, however is appropriate right
  /// now: piggybacked on the pending ack, or as a fresh message once
  /// the empty ack has gone out
  Respond(Message),
  /// Abort the reliable transmission of the message with this id;
  /// no failure is reported and no further retransmission happens
  #[allow(dead_code)]
  Cancel(Id),
}

/// Things that can happen to an exchange
#[derive(Debug, Clone)]
pub(crate) enum Input {
  Cmd(Cmd),
  Recv(Addrd<Message>),
  /// The socket under us went away and could not be reopened
  SocketDown(String),
}

/// Why a reliable transmission failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailReason {
  /// Peer explicitly refused the message
  Reset,
  /// Out of retransmissions and the ack window lapsed
  Timeout,
}

/// Events the exchange reports up to whoever is coordinating
/// requests & responses
#[derive(Debug, Clone)]
pub(crate) enum RrEvent {
  /// A message arrived for this exchange
  Rx(Addrd<Message>),
  /// Reliable transmission of the message with this id failed
  Fail(Id, FailReason),
  /// The transport died
  Socket(String),
}

/// Things the state machine wants done, returned from every
/// transition so the caller (thread wrapper or test) performs all IO
#[derive(Debug, Clone)]
pub(crate) enum Effect {
  Tx(Addrd<Message>),
  Rr(RrEvent),
  Notify(Event),
  Stop,
}

enum State<C: Clock> {
  /// Nothing in flight
  Closed,
  /// We sent a CON and are retransmitting until something comes back
  ReliableTx {
    msg: Addrd<Message>,
    retry: RetryTimer<C>,
  },
  /// Peer sent us a CON; the application has until the processing
  /// delay lapses to answer before we ack with an empty message
  AckPending {
    rx: Addrd<Message>,
    since: Instant<C>,
  },
}

impl<C: Clock> core::fmt::Debug for State<C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | State::Closed => write!(f, "Closed"),
      | State::ReliableTx { msg, .. } => {
        write!(f, "ReliableTx(id {:?})", msg.data().id)
      },
      | State::AckPending { rx, .. } => write!(f, "AckPending(id {:?})", rx.data().id),
    }
  }
}

/// The per-exchange message-layer state machine.
///
/// Owns the retransmission timer, the postponed-event queue and the
/// outbound message-id counter. Pure in the sense that all IO is
/// returned as [`Effect`]s and time & randomness come in from outside,
/// so tests can drive it deterministically.
pub(crate) struct Fsm<C: Clock> {
  peer: SocketAddr,
  cfg: Config,
  state: State<C>,
  deferred: VecDeque<Input>,
  next_id: Id,
  rng: ChaCha8Rng,
}

impl<C: Clock> core::fmt::Debug for Fsm<C> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Fsm")
     .field("peer", &self.peer)
     .field("state", &self.state)
     .field("deferred", &self.deferred.len())
     .field("next_id", &self.next_id)
     .finish()
  }
}

impl<C: Clock> Fsm<C> {
  pub(crate) fn new(peer: SocketAddr, cfg: Config, seed: u64) -> Self {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let next_id = Id(rng.gen_range(1..=u16::MAX));

    Self { peer,
           cfg,
           state: State::Closed,
           deferred: VecDeque::new(),
           next_id,
           rng }
  }

  /// Feed one input through the machine. Any postponed inputs are
  /// replayed, oldest first, whenever the machine settles back into
  /// its idle state.
  pub(crate) fn handle(&mut self, input: Input, now: Instant<C>, effects: &mut Vec<Effect>) {
    self.dispatch(input, now, effects);
    self.drain_deferred(now, effects);
  }

  /// Let timers run: retransmissions and the empty-ack deadline.
  pub(crate) fn poll(&mut self, now: Instant<C>, effects: &mut Vec<Effect>) {
    let state = core::mem::replace(&mut self.state, State::Closed);

    self.state = match state {
      | State::ReliableTx { msg, mut retry } => match retry.what_should_i_do(now) {
        | Ok(YouShould::Retry) => {
          effects.push(Effect::Tx(msg.clone()));
          effects.push(Effect::Notify(Event::Retried { size: msg.data().wire_size(),
                                                       remaining_retries:
                                                         retry.retries_remaining() }));
          State::ReliableTx { msg, retry }
        },
        | Ok(YouShould::Cry) => {
          effects.push(Effect::Rr(RrEvent::Fail(msg.data().id, FailReason::Timeout)));
          effects.push(Effect::Notify(Event::TimedOut));
          State::Closed
        },
        | Err(_) => State::ReliableTx { msg, retry },
      },
      | State::AckPending { rx, since }
        if millis_between(since, now) >= self.cfg.processing_delay.0 =>
      {
        effects.push(Effect::Tx(Addrd(rx.data().ack(), self.peer)));
        State::Closed
      },
      | s => s,
    };

    self.drain_deferred(now, effects);
  }

  /// Milliseconds until the machine next wants [`Fsm::poll`]ed,
  /// None when no timer is armed.
  pub(crate) fn next_wake(&self, now: Instant<C>) -> Option<Millis> {
    match &self.state {
      | State::Closed => None,
      | State::ReliableTx { retry, .. } => Some(retry.time_until_due(now)),
      | State::AckPending { since, .. } => {
        Some(embedded_time::duration::Milliseconds(self.cfg
                                                       .processing_delay
                                                       .0
                                                       .saturating_sub(millis_between(*since,
                                                                                      now))))
      },
    }
  }

  fn fresh_id(&mut self) -> Id {
    let id = self.next_id;
    self.next_id = id.next();
    id
  }

  fn start_reliable(&mut self,
                    mut m: Message,
                    now: Instant<C>,
                    effects: &mut Vec<Effect>)
                    -> State<C> {
    m.ty = Type::Con;
    m.id = self.fresh_id();

    let retry = RetryTimer::jittered(now,
                                     self.cfg.ack_timeout,
                                     self.cfg.ack_timeout_max(),
                                     &mut self.rng,
                                     self.cfg.max_retransmit);

    let msg = Addrd(m, self.peer);
    effects.push(Effect::Tx(msg.clone()));
    State::ReliableTx { msg, retry }
  }

  fn dispatch(&mut self, input: Input, now: Instant<C>, effects: &mut Vec<Effect>) {
    match input {
      | Input::SocketDown(reason) => {
        self.state = State::Closed;
        effects.push(Effect::Rr(RrEvent::Socket(reason)));
        effects.push(Effect::Stop);
      },
      | Input::Cmd(cmd) => self.dispatch_cmd(cmd, now, effects),
      | Input::Recv(msg) => self.dispatch_recv(msg, now, effects),
    }
  }

  fn dispatch_cmd(&mut self, cmd: Cmd, now: Instant<C>, effects: &mut Vec<Effect>) {
    let state = core::mem::replace(&mut self.state, State::Closed);

    self.state = match (state, cmd) {
      | (State::Closed, Cmd::ReliableSend(m)) => self.start_reliable(m, now, effects),

      | (State::Closed, Cmd::UnreliableSend(mut m)) => {
        m.id = self.fresh_id();
        effects.push(Effect::Tx(Addrd(m, self.peer)));
        State::Closed
      },

      | (State::Closed, Cmd::Accept(m)) => {
        effects.push(Effect::Tx(Addrd(m, self.peer)));
        State::Closed
      },

      | (State::Closed, Cmd::Respond(m)) if m.ty == Type::Non => {
        let mut m = m;
        m.id = self.fresh_id();
        effects.push(Effect::Tx(Addrd(m, self.peer)));
        State::Closed
      },

      // the empty ack already went out; the answer travels as a new
      // CON correlated by token
      | (State::Closed, Cmd::Respond(m)) => self.start_reliable(m, now, effects),

      | (State::Closed, Cmd::Cancel(_)) => State::Closed,

      | (State::ReliableTx { msg, .. }, Cmd::Cancel(id)) if msg.data().id == id => State::Closed,

      | (s @ State::ReliableTx { .. }, Cmd::Cancel(_)) => s,

      | (s @ State::ReliableTx { .. }, Cmd::UnreliableSend(mut m)) => {
        m.id = self.fresh_id();
        effects.push(Effect::Tx(Addrd(m, self.peer)));
        s
      },

      | (s @ State::ReliableTx { .. }, cmd) => {
        self.deferred.push_back(Input::Cmd(cmd));
        s
      },

      | (State::AckPending { .. }, Cmd::Accept(m)) => {
        effects.push(Effect::Tx(Addrd(m, self.peer)));
        State::Closed
      },

      | (State::AckPending { rx, .. }, Cmd::Respond(m)) => {
        effects.push(Effect::Tx(Addrd(piggyback(rx.data(), m), self.peer)));
        State::Closed
      },

      | (s @ State::AckPending { .. }, cmd) => {
        self.deferred.push_back(Input::Cmd(cmd));
        s
      },
    };
  }

  fn dispatch_recv(&mut self, msg: Addrd<Message>, now: Instant<C>, effects: &mut Vec<Effect>) {
    let state = core::mem::replace(&mut self.state, State::Closed);

    self.state = match state {
      | State::Closed => match msg.data().ty {
        | Type::Con => {
          effects.push(Effect::Rr(RrEvent::Rx(msg.clone())));
          State::AckPending { rx: msg, since: now }
        },
        | Type::Non => {
          effects.push(Effect::Rr(RrEvent::Rx(msg)));
          State::Closed
        },
        // an ack or reset nothing is waiting for: stale duplicate
        | Type::Ack | Type::Reset => State::Closed,
      },

      | State::ReliableTx { msg: sent, retry } => {
        let matches_mid = msg.data().id == sent.data().id;

        match msg.data().ty {
          | Type::Ack | Type::Non if matches_mid => {
            effects.push(Effect::Rr(RrEvent::Rx(msg)));
            State::Closed
          },
          | Type::Reset if matches_mid => {
            effects.push(Effect::Rr(RrEvent::Fail(sent.data().id, FailReason::Reset)));
            State::Closed
          },
          | _ => {
            self.deferred.push_back(Input::Recv(msg));
            State::ReliableTx { msg: sent, retry }
          },
        }
      },

      | s @ State::AckPending { .. } => {
        self.deferred.push_back(Input::Recv(msg));
        s
      },
    };
  }

  fn drain_deferred(&mut self, now: Instant<C>, effects: &mut Vec<Effect>) {
    loop {
      if !matches!(self.state, State::Closed) {
        break;
      }

      match self.deferred.pop_front() {
        | Some(input) => self.dispatch(input, now, effects),
        | None => break,
      }
    }
  }
}

/// Piggyback an application response onto the ack for the CON
/// it answers: the ack echoes the CON's id & token and carries the
/// response's code, options and payload.
fn piggyback(rx: &Message, m: Message) -> Message {
  Message { id: rx.id,
            ty: Type::Ack,
            ver: m.ver,
            token: rx.token,
            code: m.code,
            opts: m.opts,
            payload: m.payload }
}

/// Mailbox handle to a running exchange task
#[derive(Debug, Clone)]
pub(crate) struct ExchangeHandle {
  pub(crate) tx: Sender<Input>,
}

/// Run an exchange on its own thread: a mailbox loop around [`Fsm`],
/// waking for retransmissions and tearing itself down after the
/// configured lifetime of inactivity.
pub(crate) fn spawn(key: Key,
                    cfg: Config,
                    mailbox: Receiver<Input>,
                    handle_tx: Sender<Input>,
                    out: Sender<EndpointMsg>,
                    rr: Sender<(Key, RrEvent)>,
                    seed: u64)
                    -> ExchangeHandle {
  let handle = ExchangeHandle { tx: handle_tx };

  let builder = std::thread::Builder::new().name(format!("croak-xchg-{}", key.addr));
  let spawned = builder.spawn(move || {
                         let clock = SystemClock::new();
                         let now = || clock.try_now().unwrap_or(Instant::new(0));

                         let mut fsm = Fsm::<SystemClock>::new(key.addr, cfg, seed);
                         let mut effects: Vec<Effect> = Vec::new();
                         let mut last_activity = now();

                         'run: loop {
                           for effect in effects.drain(..) {
                             match effect {
                               | Effect::Tx(msg) => {
                                 if out.send(EndpointMsg::Tx(key.clone(), msg)).is_err() {
                                   break 'run;
                                 }
                               },
                               | Effect::Rr(ev) => {
                                 let _ = rr.send((key.clone(), ev));
                               },
                               | Effect::Notify(ev) => {
                                 let _ = out.send(EndpointMsg::Notify(key.clone(), ev));
                               },
                               | Effect::Stop => break 'run,
                             }
                           }

                           let t = now();

                           let idle = millis_between(last_activity, t);
                           if idle >= cfg.exchange_lifetime.0 {
                             break 'run;
                           }
                           let idle_left = cfg.exchange_lifetime.0 - idle;

                           let wake = fsm.next_wake(t)
                                         .map(|embedded_time::duration::Milliseconds(ms)| ms)
                                         .unwrap_or(u64::MAX)
                                         .min(idle_left)
                                         // stay responsive to handle drops
                                         .min(10_000);

                           match mailbox.recv_timeout(Duration::from_millis(wake.max(1))) {
                             | Ok(input) => {
                               last_activity = now();
                               fsm.handle(input, last_activity, &mut effects);
                             },
                             | Err(RecvTimeoutError::Timeout) => {
                               fsm.poll(now(), &mut effects);
                             },
                             | Err(RecvTimeoutError::Disconnected) => break 'run,
                           }
                         }

                         let _ = out.send(EndpointMsg::ExchangeEnded(key));
                       });

  if let Err(e) = spawned {
    log::error!(target: "croak", "failed to spawn exchange thread: {:?}", e);
  }

  handle
}

#[cfg(test)]
mod tests {
  use std::net::{Ipv4Addr, SocketAddrV4};

  use croak_msg::{Code, Payload};
  use embedded_time::duration::Milliseconds;

  use super::*;
  use crate::retry::Attempts;
  use crate::test::ClockMock;

  fn peer() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 1), 5683))
  }

  fn cfg_no_jitter(ack_timeout: u64, max_retransmit: u16) -> Config {
    Config { ack_timeout: Milliseconds(ack_timeout),
             ack_random_factor: 1.0,
             max_retransmit: Attempts(max_retransmit),
             ..Config::default() }
  }

  fn con(code: Code) -> Message {
    Message::new(Type::Con, code, Id(0), Token::from_bytes(&[1, 2, 3, 4]))
  }

  fn txs(effects: &[Effect]) -> Vec<&Message> {
    effects.iter()
           .filter_map(|e| match e {
             | Effect::Tx(m) => Some(m.data()),
             | _ => None,
           })
           .collect()
  }

  struct Harness {
    clock: ClockMock,
    fsm: Fsm<ClockMock>,
    effects: Vec<Effect>,
  }

  impl Harness {
    fn new(cfg: Config) -> Self {
      Self { clock: ClockMock::new(),
             fsm: Fsm::new(peer(), cfg, 0),
             effects: Vec::new() }
    }

    fn at(&mut self, ms: u64) -> Instant<ClockMock> {
      self.clock.set(ms);
      self.clock.instant()
    }

    fn handle(&mut self, ms: u64, input: Input) -> Vec<Effect> {
      let now = self.at(ms);
      self.effects.clear();
      self.fsm.handle(input, now, &mut self.effects);
      self.effects.clone()
    }

    fn poll(&mut self, ms: u64) -> Vec<Effect> {
      let now = self.at(ms);
      self.effects.clear();
      self.fsm.poll(now, &mut self.effects);
      self.effects.clone()
    }
  }

  #[test]
  fn reliable_send_retransmits_then_times_out() {
    let mut h = Harness::new(cfg_no_jitter(100, 2));

    let fx = h.handle(0, Input::Cmd(Cmd::ReliableSend(con(Code::GET))));
    assert_eq!(txs(&fx).len(), 1);
    let mid = txs(&fx)[0].id;

    assert!(txs(&h.poll(99)).is_empty());

    let fx = h.poll(100);
    assert_eq!(txs(&fx).len(), 1);
    assert_eq!(txs(&fx)[0].id, mid);

    let fx = h.poll(200);
    assert_eq!(txs(&fx).len(), 1);
    assert_eq!(txs(&fx)[0].id, mid);

    // retransmissions exhausted, ack window still open
    assert!(h.poll(400).is_empty());

    let fx = h.poll(700);
    assert!(txs(&fx).is_empty());
    assert!(matches!(fx.as_slice(),
                     [Effect::Rr(RrEvent::Fail(id, FailReason::Timeout)),
                      Effect::Notify(Event::TimedOut)] if *id == mid));
  }

  #[test]
  fn matching_ack_closes_and_stops_retransmission() {
    let mut h = Harness::new(cfg_no_jitter(100, 4));

    let fx = h.handle(0, Input::Cmd(Cmd::ReliableSend(con(Code::GET))));
    let mid = txs(&fx)[0].id;

    let mut ack = Message::new(Type::Ack, Code::new(2, 5), mid, Token::from_bytes(&[1, 2, 3, 4]));
    ack.payload = Payload(b"hello".to_vec());

    let fx = h.handle(50, Input::Recv(Addrd(ack.clone(), peer())));
    assert!(matches!(&fx[..], [Effect::Rr(RrEvent::Rx(m))] if m.data().id == mid));

    // no transmission ever again for this id
    for ms in [100, 200, 400, 800, 10_000] {
      assert!(txs(&h.poll(ms)).is_empty());
    }

    // duplicate of the same ack is a no-op
    assert!(h.handle(60, Input::Recv(Addrd(ack, peer()))).is_empty());
  }

  #[test]
  fn mismatched_ack_is_deferred_not_consumed() {
    let mut h = Harness::new(cfg_no_jitter(100, 4));

    let fx = h.handle(0, Input::Cmd(Cmd::ReliableSend(con(Code::GET))));
    let mid = txs(&fx)[0].id;

    let stray = Message::new(Type::Ack, Code::EMPTY, Id(mid.0.wrapping_add(9)), Token::default());
    assert!(h.handle(10, Input::Recv(Addrd(stray, peer()))).is_empty());

    // matching ack still lands
    let ack = Message::new(Type::Ack, Code::EMPTY, mid, Token::default());
    let fx = h.handle(20, Input::Recv(Addrd(ack, peer())));
    assert!(fx.iter()
              .any(|e| matches!(e, Effect::Rr(RrEvent::Rx(m)) if m.data().id == mid)));
  }

  #[test]
  fn reset_fails_the_transmission() {
    let mut h = Harness::new(cfg_no_jitter(100, 4));

    let fx = h.handle(0, Input::Cmd(Cmd::ReliableSend(con(Code::GET))));
    let mid = txs(&fx)[0].id;

    let rst = Message::new(Type::Reset, Code::EMPTY, mid, Token::default());
    let fx = h.handle(10, Input::Recv(Addrd(rst, peer())));
    assert!(matches!(&fx[..],
                     [Effect::Rr(RrEvent::Fail(id, FailReason::Reset))] if *id == mid));

    assert!(h.poll(100).is_empty());
  }

  #[test]
  fn cancel_closes_silently() {
    let mut h = Harness::new(cfg_no_jitter(100, 4));

    let fx = h.handle(0, Input::Cmd(Cmd::ReliableSend(con(Code::GET))));
    let mid = txs(&fx)[0].id;

    // mismatched cancel ignored
    assert!(h.handle(5, Input::Cmd(Cmd::Cancel(Id(mid.0.wrapping_add(1))))).is_empty());
    let fx = h.poll(100);
    assert_eq!(txs(&fx).len(), 1);

    assert!(h.handle(110, Input::Cmd(Cmd::Cancel(mid))).is_empty());
    assert!(h.poll(200).is_empty());
    assert!(h.poll(10_000).is_empty());
  }

  #[test]
  fn second_reliable_send_is_postponed_until_closed() {
    let mut h = Harness::new(cfg_no_jitter(100, 4));

    let fx = h.handle(0, Input::Cmd(Cmd::ReliableSend(con(Code::GET))));
    let first_mid = txs(&fx)[0].id;

    assert!(h.handle(1, Input::Cmd(Cmd::ReliableSend(con(Code::POST)))).is_empty());

    let ack = Message::new(Type::Ack, Code::new(2, 5), first_mid, Token::default());
    let fx = h.handle(10, Input::Recv(Addrd(ack, peer())));

    // ack delivered AND the deferred send went out, with the next id
    let sent = txs(&fx);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].code, Code::POST);
    assert_eq!(sent[0].id, first_mid.next());
  }

  #[test]
  fn inbound_con_acks_empty_after_processing_delay() {
    let mut h = Harness::new(Config { processing_delay: Milliseconds(1_000),
                                      ..Config::default() });

    let mut req = con(Code::GET);
    req.id = Id(41);

    let fx = h.handle(0, Input::Recv(Addrd(req, peer())));
    assert!(matches!(&fx[..], [Effect::Rr(RrEvent::Rx(_))]));

    assert!(h.poll(999).is_empty());

    let fx = h.poll(1_000);
    let sent = txs(&fx);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ty, Type::Ack);
    assert_eq!(sent[0].id, Id(41));
    assert_eq!(sent[0].code, Code::EMPTY);
  }

  #[test]
  fn respond_before_processing_delay_piggybacks() {
    let mut h = Harness::new(Config::default());

    let mut req = con(Code::GET);
    req.id = Id(7);

    h.handle(0, Input::Recv(Addrd(req, peer())));

    let mut answer = Message::new(Type::Ack, Code::new(2, 5), Id(0), Token::default());
    answer.payload = Payload(b"hello".to_vec());

    let fx = h.handle(100, Input::Cmd(Cmd::Respond(answer)));
    let sent = txs(&fx);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ty, Type::Ack);
    assert_eq!(sent[0].id, Id(7));
    assert_eq!(sent[0].token, Token::from_bytes(&[1, 2, 3, 4]));
    assert_eq!(sent[0].code, Code::new(2, 5));
    assert_eq!(sent[0].payload.as_bytes(), b"hello");

    // nothing further scheduled
    assert!(h.poll(10_000).is_empty());
  }

  #[test]
  fn respond_after_empty_ack_goes_out_as_con() {
    let mut h = Harness::new(Config { processing_delay: Milliseconds(100),
                                      ..Config::default() });

    let mut req = con(Code::GET);
    req.id = Id(7);
    h.handle(0, Input::Recv(Addrd(req, peer())));

    // empty ack fires
    let fx = h.poll(100);
    assert_eq!(txs(&fx)[0].code, Code::EMPTY);

    let mut answer = Message::new(Type::Ack, Code::new(2, 5), Id(0), Token::from_bytes(&[1, 2, 3, 4]));
    answer.payload = Payload(b"hello".to_vec());

    let fx = h.handle(200, Input::Cmd(Cmd::Respond(answer)));
    let sent = txs(&fx);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ty, Type::Con);
    assert_ne!(sent[0].id, Id(7));
    assert_eq!(sent[0].token, Token::from_bytes(&[1, 2, 3, 4]));
  }

  #[test]
  fn inbound_while_ack_pending_is_postponed() {
    let mut h = Harness::new(Config::default());

    let mut first = con(Code::GET);
    first.id = Id(1);
    let fx = h.handle(0, Input::Recv(Addrd(first, peer())));
    assert_eq!(fx.len(), 1);

    let mut second = con(Code::PUT);
    second.id = Id(2);
    second.token = Token::from_bytes(&[9]);
    assert!(h.handle(1, Input::Recv(Addrd(second, peer()))).is_empty());

    // accepting the first releases the second
    let ack = Message::new(Type::Ack, Code::new(2, 5), Id(1), Token::from_bytes(&[1, 2, 3, 4]));
    let fx = h.handle(2, Input::Cmd(Cmd::Accept(ack)));

    assert!(fx.iter()
              .any(|e| matches!(e, Effect::Rr(RrEvent::Rx(m)) if m.data().id == Id(2))));
  }

  #[test]
  fn outbound_ids_count_up_and_wrap_to_one() {
    let mut h = Harness::new(Config::default());

    let fx = h.handle(0, Input::Cmd(Cmd::UnreliableSend(Message::new(Type::Non,
                                                                     Code::GET,
                                                                     Id(0),
                                                                     Token::default()))));
    let first = txs(&fx)[0].id;

    let fx = h.handle(1, Input::Cmd(Cmd::UnreliableSend(Message::new(Type::Non,
                                                                     Code::GET,
                                                                     Id(0),
                                                                     Token::default()))));
    assert_eq!(txs(&fx)[0].id, first.next());

    assert_eq!(Id(u16::MAX).next(), Id(1));
  }

  #[test]
  fn socket_down_reports_and_stops() {
    let mut h = Harness::new(Config::default());

    h.handle(0, Input::Cmd(Cmd::ReliableSend(con(Code::GET))));
    let fx = h.handle(1, Input::SocketDown("simulated".into()));

    assert!(fx.iter()
              .any(|e| matches!(e, Effect::Rr(RrEvent::Socket(r)) if r == "simulated")));
    assert!(fx.iter().any(|e| matches!(e, Effect::Stop)));
  }

  #[test]
  fn total_failure_time_stays_in_the_retransmit_envelope() {
    // ack_random_factor 1.5 allows failure anywhere in
    // [ack_timeout, ack_timeout * 1.5] * (2^(max+1) - 1)
    for seed in 0..20 {
      let cfg = Config { ack_timeout: Milliseconds(100),
                         ack_random_factor: 1.5,
                         max_retransmit: Attempts(2),
                         ..Config::default() };

      let clock = ClockMock::new();
      let mut fsm = Fsm::<ClockMock>::new(peer(), cfg, seed);
      let mut effects = Vec::new();

      clock.set(0);
      fsm.handle(Input::Cmd(Cmd::ReliableSend(con(Code::GET))),
                 clock.instant(),
                 &mut effects);

      let mut failed_at = None;
      for ms in 0..=2_000 {
        clock.set(ms);
        effects.clear();
        fsm.poll(clock.instant(), &mut effects);
        if effects.iter()
                  .any(|e| matches!(e, Effect::Rr(RrEvent::Fail(_, FailReason::Timeout))))
        {
          failed_at = Some(ms);
          break;
        }
      }

      let failed_at = failed_at.expect("never failed");
      assert!((700..=1_050).contains(&failed_at), "failed at {}", failed_at);
    }
  }
}
