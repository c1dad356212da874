use tinyvec::ArrayVec;

/// # Message Token
///
/// Opaque value of 0-8 bytes correlating a request with its response,
/// even when the response arrives out-of-band in a later exchange
/// (CoAP "separate response").
///
/// The all-important difference from [`Id`](crate::Id): the Id matches
/// a datagram to its ack/reset and is re-used on retransmission; the
/// Token survives across message ids for as long as the request is
/// outstanding.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Construct a token from up to 8 bytes, truncating any extra.
  ///
  /// ```
  /// use croak_msg::Token;
  ///
  /// let token = Token::from_bytes(&[0xDE, 0xAD, 0xBE, 0xEF]);
  /// assert_eq!(token.as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);
  /// ```
  pub fn from_bytes(bytes: &[u8]) -> Self {
    let mut buf = ArrayVec::new();
    for b in bytes.iter().copied().take(8) {
      buf.push(b);
    }
    Token(buf)
  }

  /// Borrow the token bytes
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}
