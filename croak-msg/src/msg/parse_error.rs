/// Errors encounterable while parsing a message from bytes
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub enum MessageParseError {
  /// The datagram ended before the fixed header, token or message id
  /// were complete
  ShortHeader,

  /// Token length nibble was > 8 (reserved by RFC7252)
  BadTokenLength(u8),

  /// The message type is invalid (see [`Type`](crate::Type) for valid values)
  InvalidType(u8),

  /// A payload marker (0xFF) was present but not followed by
  /// at least one payload byte
  TrailingPayloadMarker,

  /// Error parsing option
  Opt(super::opt::parse_error::OptParseError),
}

impl From<super::opt::parse_error::OptParseError> for MessageParseError {
  fn from(e: super::opt::parse_error::OptParseError) -> Self {
    Self::Opt(e)
  }
}
