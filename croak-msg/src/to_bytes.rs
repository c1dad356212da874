use tinyvec::ArrayVec;

use crate::*;

/// Trait allowing fallible conversion into wire bytes
pub trait TryIntoBytes {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to convert into the encoded byte representation
  ///
  /// ```
  /// use croak_msg::{Code, Id, Message, Token, TryIntoBytes, Type};
  ///
  /// let msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
  /// let bytes: Vec<u8> = msg.try_into_bytes().unwrap();
  /// ```
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// The gap between this option number and the previous one cannot be
  /// expressed by the 16-bit-extended delta encoding
  OptionDeltaTooLarge(OptNumber),

  /// An option value is longer than the 16-bit-extended length
  /// encoding can express (65804 bytes)
  OptionValueTooLong(OptNumber, usize),

  /// If-None-Match is a boolean marker; a value was attached to it
  IfNoneMatchValue,
}

/// Largest value expressible by a nibble + 16-bit extension.
const EXT_MAX: usize = 65535 + 269;

impl TryIntoBytes for &Message {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    let mut bytes = Vec::with_capacity(self.wire_size());

    let byte1: u8 = Byte1 { tkl: self.token.0.len() as u8,
                            ver: self.ver,
                            ty: self.ty }.into();
    let code: u8 = self.code.into();
    let id: [u8; 2] = self.id.into();

    bytes.push(byte1);
    bytes.push(code);
    bytes.extend(id);
    bytes.extend(self.token.0);

    let mut prev = OptNumber(0);
    for (num, values) in &self.opts {
      for value in values {
        if *num == known::no_repeat::IF_NONE_MATCH && !value.0.is_empty() {
          return Err(MessageToBytesError::IfNoneMatchValue);
        }

        let delta = (num.0 - prev.0) as usize;
        if delta > EXT_MAX {
          return Err(MessageToBytesError::OptionDeltaTooLarge(*num));
        }

        if value.0.len() > EXT_MAX {
          return Err(MessageToBytesError::OptionValueTooLong(*num, value.0.len()));
        }

        Opt { delta: OptDelta(delta as u16),
              value: value.clone() }.extend_bytes(&mut bytes);
        prev = *num;
      }
    }

    if !self.payload.0.is_empty() {
      bytes.push(0b1111_1111);
      bytes.extend(self.payload.0.iter().copied());
    }

    Ok(bytes)
  }
}

impl TryIntoBytes for Message {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    (&self).try_into_bytes()
  }
}

pub(crate) fn opt_len_or_delta(val: u16) -> (u8, Option<ArrayVec<[u8; 2]>>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend((n - 269).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n as u8) - 13);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}
