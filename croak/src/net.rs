use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// Data that came from or is destined for a network socket
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the socket address and get the data in this Addressed
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Mutably borrow the contents of the addressed item
  pub fn data_mut(&mut self) -> &mut T {
    &mut self.0
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

impl<T> AsMut<T> for Addrd<T> {
  fn as_mut(&mut self) -> &mut T {
    &mut self.0
  }
}

/// A CoAP network socket
///
/// This mirrors the UDP socket traits in embedded-nal, but allows us to
/// implement them for foreign types (like [`std::net::UdpSocket`]) and
/// for in-memory test doubles.
///
/// All operations are non-blocking; "nothing to do right now" is
/// [`nb::Error::WouldBlock`].
pub trait Socket: Sized + Send + 'static {
  /// The error yielded by socket operations
  type Error: core::fmt::Debug;

  /// Get the local address this socket was bound to
  fn local_addr(&self) -> io::Result<SocketAddr>;

  /// Bind the socket to an address, yielding a socket in a
  /// non-blocking state.
  ///
  /// Implementors should bind to the first address if `addr` yields
  /// multiple addresses, and join the multicast group when the address
  /// is a multicast address.
  fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error>;

  /// Send a datagram to a remote address
  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Pull a buffered datagram from the socket, along with the address
  /// of the sender.
  ///
  /// It is expected that (like [`std::net::UdpSocket`]) if the message
  /// is larger than the buffer, the excess bytes are dropped and not
  /// considered an error condition.
  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error>;

  /// Join a multicast group
  fn join_multicast(&self, addr: std::net::IpAddr) -> Result<(), Self::Error>;

  /// Pull one datagram from the socket if one is buffered.
  fn poll(&self) -> Result<Option<Addrd<Vec<u8>>>, Self::Error> {
    // 1152 = default CoAP message size bound (RFC7252 4.6)
    let mut buf = [0u8; 1152];

    match self.recv(&mut buf) {
      | Ok(Addrd(n, addr)) => Ok(Some(Addrd(buf[..n].to_vec(), addr))),
      | Err(nb::Error::WouldBlock) => Ok(None),
      | Err(nb::Error::Other(e)) => Err(e),
    }
  }
}

fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

impl Socket for UdpSocket {
  type Error = io::Error;

  fn local_addr(&self) -> io::Result<SocketAddr> {
    UdpSocket::local_addr(self)
  }

  fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, Self::Error> {
    let addr = addr.to_socket_addrs()?
                   .next()
                   .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable,
                                                 "no address to bind to"))?;

    let sock = UdpSocket::bind(addr)?;
    sock.set_nonblocking(true)?;

    if addr.ip().is_multicast() {
      sock.join_multicast(addr.ip())?;
    }

    Ok(sock)
  }

  fn send(&self, msg: Addrd<&[u8]>) -> nb::Result<(), Self::Error> {
    self.send_to(msg.data(), msg.addr())
        .map(|_| ())
        .map_err(io_to_nb)
  }

  fn recv(&self, buffer: &mut [u8]) -> nb::Result<Addrd<usize>, Self::Error> {
    self.recv_from(buffer)
        .map(|(n, addr)| Addrd(n, addr))
        .map_err(io_to_nb)
  }

  fn join_multicast(&self, addr: std::net::IpAddr) -> Result<(), Self::Error> {
    match addr {
      | std::net::IpAddr::V4(addr) => {
        self.join_multicast_v4(&addr, &std::net::Ipv4Addr::UNSPECIFIED)
      },
      | std::net::IpAddr::V6(addr) => self.join_multicast_v6(&addr, 0),
    }
  }
}

/// Helper constants and functions for creating multicast addresses
pub mod multicast {
  use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

  /// IPv4 "All CoAP devices" multicast address.
  ///
  /// If using multicast to discover devices, it's recommended
  /// that you use this address with a port specific to your application.
  pub const ALL_COAP_DEVICES_IP: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 187);

  /// Create a SocketAddr (IP + port) with the [`ALL_COAP_DEVICES_IP`] address
  pub const fn all_coap_devices(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(ALL_COAP_DEVICES_IP, port))
  }
}
