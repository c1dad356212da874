use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::net::{Addrd, Socket};

/// How long an adapter sits without any datagram IO before it
/// terminates itself.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Commands accepted by a running adapter task
#[derive(Debug)]
pub enum AdapterCmd {
  /// Write a datagram to the wire
  Send(Addrd<Vec<u8>>),
  /// Shut the adapter down
  Close,
}

/// Why an adapter task went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
  /// No IO for [`IDLE_TIMEOUT`]
  Idle,
  /// [`AdapterCmd::Close`] was received
  Commanded,
  /// The underlying socket failed
  Error(String),
}

/// Events an adapter task reports to whoever owns it.
///
/// The owner monitors the adapter through these; the adapter never
/// takes its owner down with it.
#[derive(Debug)]
pub enum AdapterEvent {
  /// A datagram arrived
  Recv(Addrd<Vec<u8>>),
  /// The adapter task exited
  Closed(CloseReason),
}

/// Mailbox handle to a running adapter task
#[derive(Debug, Clone)]
pub struct AdapterHandle {
  /// Command mailbox
  pub cmd: Sender<AdapterCmd>,
  /// The local address the adapter bound
  pub local: SocketAddr,
}

/// A pluggable datagram transport.
///
/// `start` binds, spawns the adapter task and returns its command
/// mailbox; the task emits [`AdapterEvent`]s (received datagrams and
/// its own exit) to the channel it was given. `coap://` URLs use
/// [`UdpAdapter`]; `coaps://` requires the caller to bring an adapter
/// that owns the security layer, since this runtime only transports
/// opaque datagrams.
pub trait SocketAdapter: core::fmt::Debug + Send + Sync {
  /// Bind to `bind` and start the adapter task
  fn start(&self, bind: SocketAddr, events: Sender<AdapterEvent>) -> Result<AdapterHandle, Error>;
}

/// [`SocketAdapter`] over plain [`std::net::UdpSocket`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpAdapter;

impl SocketAdapter for UdpAdapter {
  fn start(&self, bind: SocketAddr, events: Sender<AdapterEvent>) -> Result<AdapterHandle, Error> {
    start_with_socket::<UdpSocket>(bind, events)
  }
}

/// Bind any [`Socket`] implementation and run the adapter task over it.
pub fn start_with_socket<S: Socket>(bind: SocketAddr,
                                    events: Sender<AdapterEvent>)
                                    -> Result<AdapterHandle, Error> {
  let sock = S::bind(bind).map_err(|e| Error::Socket(format!("{:?}", e)))?;

  let local = sock.local_addr()
                  .map_err(|e| Error::Socket(e.to_string()))?;

  let (cmd_tx, cmd_rx) = mpsc::channel();

  let builder = std::thread::Builder::new().name(format!("croak-sock-{}", local));
  builder.spawn(move || run(sock, cmd_rx, events))
         .map_err(|e| Error::Socket(e.to_string()))?;

  Ok(AdapterHandle { cmd: cmd_tx,
                     local })
}

fn run<S: Socket>(sock: S, cmd: Receiver<AdapterCmd>, events: Sender<AdapterEvent>) {
  let mut last_io = Instant::now();

  let close = |reason: CloseReason| {
    let _ = events.send(AdapterEvent::Closed(reason));
  };

  loop {
    match cmd.recv_timeout(Duration::from_millis(1)) {
      | Ok(AdapterCmd::Send(dgram)) => {
        let to_wire = Addrd(dgram.data().as_slice(), dgram.addr());
        match nb::block!(sock.send(to_wire)) {
          | Ok(()) => last_io = Instant::now(),
          | Err(e) => {
            close(CloseReason::Error(format!("{:?}", e)));
            return;
          },
        }
      },
      | Ok(AdapterCmd::Close) => {
        close(CloseReason::Commanded);
        return;
      },
      | Err(RecvTimeoutError::Timeout) => (),
      | Err(RecvTimeoutError::Disconnected) => return,
    }

    loop {
      match sock.poll() {
        | Ok(Some(dgram)) => {
          last_io = Instant::now();
          if events.send(AdapterEvent::Recv(dgram)).is_err() {
            return;
          }
        },
        | Ok(None) => break,
        | Err(e) => {
          close(CloseReason::Error(format!("{:?}", e)));
          return;
        },
      }
    }

    if last_io.elapsed() >= IDLE_TIMEOUT {
      close(CloseReason::Idle);
      return;
    }
  }
}

/// Resolve a host (DNS name or IP literal) and port to a socket
/// address, once. The result is pinned for the lifetime of whatever
/// exchange it was resolved for.
pub(crate) fn resolve(host: &str, port: u16) -> Result<SocketAddr, Error> {
  (host, port).to_socket_addrs()
              .map_err(|e| Error::Socket(format!("resolving {}: {}", host, e)))?
              .next()
              .ok_or_else(|| Error::Socket(format!("{} did not resolve to any address", host)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn udp_adapter_round_trip() {
    let (a_events_tx, _a_events) = mpsc::channel();
    let (b_events_tx, b_events) = mpsc::channel();

    let a = UdpAdapter.start("127.0.0.1:0".parse().unwrap(), a_events_tx)
                      .unwrap();
    let b = UdpAdapter.start("127.0.0.1:0".parse().unwrap(), b_events_tx)
                      .unwrap();

    a.cmd
     .send(AdapterCmd::Send(Addrd(b"ribbit".to_vec(), b.local)))
     .unwrap();

    match b_events.recv_timeout(Duration::from_secs(1)).unwrap() {
      | AdapterEvent::Recv(dgram) => {
        assert_eq!(dgram.data(), b"ribbit");
        assert_eq!(dgram.addr(), a.local);
      },
      | other => panic!("expected a datagram, got {:?}", other),
    }

    a.cmd.send(AdapterCmd::Close).unwrap();
  }

  #[test]
  fn close_command_reports_commanded_exit() {
    let (events_tx, events) = mpsc::channel();
    let handle = UdpAdapter.start("127.0.0.1:0".parse().unwrap(), events_tx)
                           .unwrap();

    handle.cmd.send(AdapterCmd::Close).unwrap();

    match events.recv_timeout(Duration::from_secs(1)).unwrap() {
      | AdapterEvent::Closed(CloseReason::Commanded) => (),
      | other => panic!("expected commanded close, got {:?}", other),
    }
  }

  #[test]
  fn resolve_literal_ip() {
    assert_eq!(resolve("127.0.0.1", 5683).unwrap(),
               "127.0.0.1:5683".parse::<SocketAddr>().unwrap());
    assert!(resolve("host.invalid.croak.test.", 5683).is_err());
  }
}
