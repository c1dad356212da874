#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, OnceLock};

use embedded_time::rate::Fraction;
use embedded_time::Instant;

use crate::net::{Addrd, Socket};

/// A clock whose time is whatever the test last set it to.
#[derive(Debug, Default)]
pub(crate) struct ClockMock(std::cell::Cell<u64>);

impl ClockMock {
  pub(crate) fn new() -> Self {
    Self(std::cell::Cell::new(0))
  }

  pub(crate) fn set(&self, ms: u64) {
    self.0.set(ms);
  }

  pub(crate) fn instant(&self) -> Instant<Self> {
    Instant::new(self.0.get())
  }
}

impl embedded_time::Clock for ClockMock {
  type T = u64;

  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000);

  fn try_now(&self) -> Result<Instant<Self>, embedded_time::clock::Error> {
    Ok(self.instant())
  }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SockMockState {
  pub(crate) inbound: Arc<Mutex<VecDeque<Addrd<Vec<u8>>>>>,
  pub(crate) outbound: Arc<Mutex<Vec<Addrd<Vec<u8>>>>>,
}

impl SockMockState {
  pub(crate) fn push_inbound(&self, dgram: Addrd<Vec<u8>>) {
    self.inbound.lock().unwrap().push_back(dgram);
  }

  pub(crate) fn sent(&self) -> Vec<Addrd<Vec<u8>>> {
    self.outbound.lock().unwrap().clone()
  }
}

fn registry() -> &'static Mutex<HashMap<SocketAddr, SockMockState>> {
  static REGISTRY: OnceLock<Mutex<HashMap<SocketAddr, SockMockState>>> = OnceLock::new();
  REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// An in-memory [`Socket`] double.
///
/// Distinct test sockets are distinguished by the address they bind;
/// [`SockMock::state`] fetches the queues behind a bound address so a
/// test can feed inbound datagrams and inspect outbound ones.
#[derive(Debug)]
pub(crate) struct SockMock {
  addr: SocketAddr,
  state: SockMockState,
}

impl SockMock {
  /// The shared queues behind the socket bound to `addr` (creating
  /// them if nothing bound yet).
  pub(crate) fn state(addr: SocketAddr) -> SockMockState {
    registry().lock().unwrap().entry(addr).or_default().clone()
  }
}

impl Socket for SockMock {
  type Error = std::io::Error;

  fn local_addr(&self) -> std::io::Result<SocketAddr> {
    Ok(self.addr)
  }

  fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error> {
    let addr = addr.to_socket_addrs()?.next().expect("no address");
    Ok(Self { addr,
              state: Self::state(addr) })
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.state
        .outbound
        .lock()
        .unwrap()
        .push(Addrd(msg.data().to_vec(), msg.addr()));
    Ok(())
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    match self.state.inbound.lock().unwrap().pop_front() {
      | Some(dgram) => {
        let n = dgram.data().len().min(buffer.len());
        buffer[..n].copy_from_slice(&dgram.data()[..n]);
        Ok(Addrd(n, dgram.addr()))
      },
      | None => Err(nb::Error::WouldBlock),
    }
  }

  fn join_multicast(&self, _: std::net::IpAddr) -> Result<(), Self::Error> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc;
  use std::time::Duration;

  use super::*;
  use crate::socket::{start_with_socket, AdapterCmd, AdapterEvent};

  #[test]
  fn adapter_runs_over_mock_socket() {
    let addr: SocketAddr = "127.0.0.1:16001".parse().unwrap();
    let peer: SocketAddr = "127.0.0.1:16002".parse().unwrap();
    let state = SockMock::state(addr);

    let (ev_tx, ev_rx) = mpsc::channel();
    let handle = start_with_socket::<SockMock>(addr, ev_tx).unwrap();

    handle.cmd
          .send(AdapterCmd::Send(Addrd(b"out".to_vec(), peer)))
          .unwrap();

    state.push_inbound(Addrd(b"in".to_vec(), peer));

    match ev_rx.recv_timeout(Duration::from_secs(1)).unwrap() {
      | AdapterEvent::Recv(dgram) => {
        assert_eq!(dgram.data(), b"in");
        assert_eq!(dgram.addr(), peer);
      },
      | other => panic!("expected recv, got {:?}", other),
    }

    // outbound reached the wire
    for _ in 0..100 {
      if !state.sent().is_empty() {
        break;
      }
      std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(state.sent(), vec![Addrd(b"out".to_vec(), peer)]);

    handle.cmd.send(AdapterCmd::Close).unwrap();
  }
}
