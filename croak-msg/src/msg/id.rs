use super::MessageParseError;
use crate::cursor::Cursor;
use crate::from_bytes::TryConsumeBytes;

/// # Message ID
///
/// 16-bit unsigned integer in network byte order.  Used to
/// detect message duplication and to match messages of type
/// Acknowledgement/Reset to messages of type Confirmable/Non-
/// confirmable.
///
/// Not to be confused with [`Token`](crate::Token), which correlates a
/// request with its (possibly much later) response; the Id only pairs a
/// single datagram with its ack or reset.
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Debug, Eq, Ord)]
pub struct Id(pub u16);

impl Id {
  /// Create an Id from a big-endian 2-byte unsigned int
  pub fn from_be_bytes(bs: [u8; 2]) -> Self {
    Self(u16::from_be_bytes(bs))
  }

  /// The Id following this one.
  ///
  /// Wraps to 1 (not 0) past the u16 maximum, so that a freshly wrapped
  /// counter never collides with the all-zeroes empty-message Id.
  ///
  /// ```
  /// use croak_msg::Id;
  ///
  /// assert_eq!(Id(41).next(), Id(42));
  /// assert_eq!(Id(u16::MAX).next(), Id(1));
  /// ```
  pub fn next(&self) -> Self {
    match self.0.wrapping_add(1) {
      | 0 => Id(1),
      | n => Id(n),
    }
  }
}

impl From<Id> for [u8; 2] {
  fn from(id: Id) -> [u8; 2] {
    id.0.to_be_bytes()
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Id {
  type Error = MessageParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    match bytes.take_exact(2) {
      | Some(&[a, b]) => Ok(Id::from_be_bytes([a, b])),
      | _ => Err(MessageParseError::ShortHeader),
    }
  }
}
