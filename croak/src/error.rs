use croak_msg::to_bytes::MessageToBytesError;

use crate::block::BlockError;

/// Errors surfaced by the user-facing client & server APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
  /// The peer explicitly refused our message with a reset
  Reset,

  /// No response arrived in time; either the reliable transmission ran
  /// out of retries or the overall wait for a response lapsed
  Timeout,

  /// The transport under the exchange failed and could not be reopened
  Socket(String),

  /// A block-wise transfer went wrong (conflicting or missing blocks)
  Block(BlockError),

  /// The URL scheme has no socket adapter
  /// (`coaps` parses, but needs an adapter supplied by the caller)
  UnsupportedScheme(String),

  /// The URL could not be parsed as `coap://host[:port]/path[?query]`
  InvalidUrl(String),

  /// The method string is not one of GET, POST, PUT, DELETE
  InvalidMethod,

  /// A message could not be serialized
  Encode(MessageToBytesError),

  /// The runtime shut down underneath this call
  Shutdown,
}

impl From<BlockError> for Error {
  fn from(e: BlockError) -> Self {
    Error::Block(e)
  }
}

impl From<MessageToBytesError> for Error {
  fn from(e: MessageToBytesError) -> Self {
    Error::Encode(e)
  }
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Error::Reset => write!(f, "peer reset the exchange"),
      | Error::Timeout => write!(f, "timed out awaiting response"),
      | Error::Socket(reason) => write!(f, "socket error: {}", reason),
      | Error::Block(e) => write!(f, "block-wise transfer failed: {:?}", e),
      | Error::UnsupportedScheme(s) => write!(f, "no socket adapter for scheme '{}'", s),
      | Error::InvalidUrl(s) => write!(f, "invalid CoAP URL: {}", s),
      | Error::InvalidMethod => write!(f, "invalid method"),
      | Error::Encode(e) => write!(f, "could not serialize message: {:?}", e),
      | Error::Shutdown => write!(f, "runtime shut down"),
    }
  }
}

impl std::error::Error for Error {}
