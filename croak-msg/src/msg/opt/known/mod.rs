/// Content-Format values
pub mod content_format;
pub use content_format::*;

/// Block
pub mod block;
pub use block::*;

macro_rules! opt {
  (#[doc = $doc:expr] $name:ident = $n:literal) => {
    #[doc = $doc]
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: crate::OptNumber = crate::OptNumber($n);
  };
}

pub(crate) use opt;

/// Non-repeatable options
pub mod no_repeat {
  use super::opt;

  opt!(#[doc = "Uri-Host ([RFC7252 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1))"]
       HOST = 3);
  opt!(#[doc = "If-None-Match ([RFC7252 5.10.8.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.2))"]
       IF_NONE_MATCH = 5);
  opt!(#[doc = "Observe ([RFC7641 2](https://www.rfc-editor.org/rfc/rfc7641#section-2)). Carried opaquely; no subscription lifecycle is implemented."]
       OBSERVE = 6);
  opt!(#[doc = "Uri-Port, see [`HOST`]"]
       PORT = 7);
  opt!(#[doc = "Content-Format ([RFC7252 5.10.3](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.3))"]
       CONTENT_FORMAT = 12);
  opt!(#[doc = "Max-Age ([RFC7252 5.10.5](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.5))"]
       MAX_AGE = 14);
  opt!(#[doc = "Accept ([RFC7252 5.10.4](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.4))"]
       ACCEPT = 17);
  opt!(#[doc = "Block2: block-wise descriptor for the response body ([RFC7959 2.2](https://www.rfc-editor.org/rfc/rfc7959#section-2.2))"]
       BLOCK2 = 23);
  opt!(#[doc = "Block1: block-wise descriptor for the request body ([RFC7959 2.2](https://www.rfc-editor.org/rfc/rfc7959#section-2.2))"]
       BLOCK1 = 27);
  opt!(#[doc = "Size2: size of the response body ([RFC7959 4](https://www.rfc-editor.org/rfc/rfc7959#section-4))"]
       SIZE2 = 28);
  opt!(#[doc = "Proxy-Uri ([RFC7252 5.10.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.2))"]
       PROXY_URI = 35);
  opt!(#[doc = "See [`PROXY_URI`]"]
       PROXY_SCHEME = 39);
  opt!(#[doc = "Size1: size of the request body ([RFC7252 5.10.9](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.9))"]
       SIZE1 = 60);
}

/// Repeatable options; their values form an ordered sequence
/// preserving wire order.
pub mod repeat {
  use super::opt;

  opt!(#[doc = "If-Match ([RFC7252 5.10.8.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.1))"]
       IF_MATCH = 1);
  opt!(#[doc = "ETag ([RFC7252 5.10.6](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.6))"]
       ETAG = 4);
  opt!(#[doc = "Location-Path ([RFC7252 5.10.7](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.7))"]
       LOCATION_PATH = 8);
  opt!(#[doc = "Uri-Path, see [`super::no_repeat::HOST`]"]
       PATH = 11);
  opt!(#[doc = "Uri-Query, see [`super::no_repeat::HOST`]"]
       QUERY = 15);
  opt!(#[doc = "Location-Query, see [`LOCATION_PATH`]"]
       LOCATION_QUERY = 20);
}

/// The shape of values a known option number carries.
///
/// The codec stores every value as opaque bytes; this drives the typed
/// accessors and encode-time validation. Unknown numbers are `Opaque`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
  /// Opaque byte string
  Opaque,
  /// Shortest-big-endian unsigned integer
  Uint,
  /// Block descriptor (see [`Block`])
  Block,
  /// Boolean marker; present-and-empty means true
  Flag,
}

/// The [`ValueKind`] carried by an option number.
pub fn value_kind(n: crate::OptNumber) -> ValueKind {
  use self::no_repeat::*;

  match n {
    | PORT | MAX_AGE | ACCEPT | SIZE1 | SIZE2 | OBSERVE | CONTENT_FORMAT => ValueKind::Uint,
    | BLOCK1 | BLOCK2 => ValueKind::Block,
    | IF_NONE_MATCH => ValueKind::Flag,
    | _ => ValueKind::Opaque,
  }
}

/// Whether an option number may occur more than once in a message.
pub fn repeatable(n: crate::OptNumber) -> bool {
  use self::repeat::*;

  matches!(n, IF_MATCH | ETAG | LOCATION_PATH | PATH | QUERY | LOCATION_QUERY)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds() {
    assert_eq!(value_kind(no_repeat::CONTENT_FORMAT), ValueKind::Uint);
    assert_eq!(value_kind(no_repeat::BLOCK1), ValueKind::Block);
    assert_eq!(value_kind(no_repeat::IF_NONE_MATCH), ValueKind::Flag);
    assert_eq!(value_kind(repeat::PATH), ValueKind::Opaque);
    assert_eq!(value_kind(crate::OptNumber(1234)), ValueKind::Opaque);
  }

  #[test]
  fn repeatables() {
    assert!(repeatable(repeat::PATH));
    assert!(repeatable(repeat::ETAG));
    assert!(!repeatable(no_repeat::HOST));
  }
}
