use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use crate::cursor::Cursor;

/// Option parsing error
pub mod parse_error;
pub use parse_error::*;

/// Well-known options
pub mod known;
pub use known::*;

/// The map of options in a message, keyed by option number.
///
/// Repeatable options (e.g. Uri-Path) hold one [`OptValue`] per
/// occurrence, in wire order.
pub type OptionMap = BTreeMap<OptNumber, Vec<OptValue>>;

/// The "Option Delta" is the difference between this Option's Number
/// and the previous Option's number.
///
/// This is just used to compute the Option Number, identifying which
/// Option is being set (e.g. Content-Format has a Number of 12)
///
/// # Related
/// - [RFC7252#section-3.1 Option Format](https://datatracker.ietf.org/doc/html/rfc7252#section-3.1)
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug, Default)]
pub struct OptDelta(pub u16);

/// Identifies which option is being set
/// (e.g. Uri-Path is number 11, Content-Format is number 12).
///
/// # Related
/// - [RFC7252#section-12.2 Core CoAP Option Numbers](https://datatracker.ietf.org/doc/html/rfc7252#section-12.2)
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

impl Add for OptNumber {
  type Output = OptNumber;

  fn add(self, rhs: Self) -> Self::Output {
    Self(self.0 + rhs.0)
  }
}

impl Sub for OptNumber {
  type Output = OptNumber;

  fn sub(self, rhs: Self) -> Self::Output {
    Self(self.0 - rhs.0)
  }
}

impl OptNumber {
  /// Whether a server may ignore this option (elective) or
  /// must reject messages carrying it unprocessed (critical).
  ///
  /// Critical options have an odd number.
  pub fn is_critical(&self) -> bool {
    self.0 & 0b1 == 1
  }
}

/// The value of a single option occurrence; an opaque byte string
/// on the wire.
///
/// Unsigned-integer options (Uri-Port, Content-Format, ...) use the
/// shortest big-endian representation, with zero encoded as the empty
/// string; see [`OptValue::uint`] / [`OptValue::as_uint`].
#[derive(Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug, Default)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Borrow the value bytes
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// Encode an unsigned integer as the shortest big-endian
  /// byte string (empty for zero).
  ///
  /// ```
  /// use croak_msg::OptValue;
  ///
  /// assert_eq!(OptValue::uint(0).as_bytes(), &[] as &[u8]);
  /// assert_eq!(OptValue::uint(60).as_bytes(), &[60]);
  /// assert_eq!(OptValue::uint(5683).as_bytes(), &[0x16, 0x33]);
  /// ```
  pub fn uint(n: u64) -> Self {
    let bytes = n.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    Self(bytes[skip..].to_vec())
  }

  /// Interpret the value bytes as a big-endian unsigned integer.
  ///
  /// Yields `None` when the value is longer than 8 bytes.
  pub fn as_uint(&self) -> Option<u64> {
    if self.0.len() > 8 {
      return None;
    }

    Some(self.0.iter().fold(0u64, |n, b| (n << 8) | *b as u64))
  }

  /// Interpret the value bytes as a UTF-8 string.
  pub fn as_str(&self) -> Result<&str, core::str::Utf8Error> {
    core::str::from_utf8(&self.0)
  }
}

impl From<&str> for OptValue {
  fn from(s: &str) -> Self {
    Self(s.as_bytes().to_vec())
  }
}

impl From<&[u8]> for OptValue {
  fn from(bytes: &[u8]) -> Self {
    Self(bytes.to_vec())
  }
}

impl FromIterator<u8> for OptValue {
  fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// Low-level representation of a single CoAP Option occurrence,
/// closely mirroring the byte layout of message options.
///
/// Notably, this doesn't include the Number (key, e.g. "Content-Format"
/// or "Uri-Path"); on the wire the number is implied by the running sum
/// of deltas.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Opt {
  /// See [`OptDelta`]
  pub delta: OptDelta,
  /// See [`OptValue`]
  pub value: OptValue,
}

impl Opt {
  /// Given a collection to [`Extend`] and an Opt, add that Opt's bytes to the collection.
  pub fn extend_bytes(&self, bytes: &mut impl Extend<u8>) {
    let (del, del_bytes) = crate::to_bytes::opt_len_or_delta(self.delta.0);
    let (len, len_bytes) = crate::to_bytes::opt_len_or_delta(self.value.0.len() as u16);
    let header = (del << 4) | len;

    bytes.extend(Some(header));

    if let Some(bs) = del_bytes {
      bytes.extend(bs);
    }

    if let Some(bs) = len_bytes {
      bytes.extend(bs);
    }

    bytes.extend(self.value.0.iter().copied());
  }
}

/// Wire size of one encoded occurrence: header byte, delta & length
/// extensions, value.
pub(crate) fn opt_wire_size(delta: u16, value_len: usize) -> usize {
  let ext = |n: usize| match n {
    | n if n >= 269 => 2,
    | n if n >= 13 => 1,
    | _ => 0,
  };

  1 + ext(delta as usize) + ext(value_len) + value_len
}

pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(head: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u16, OptParseError> {
  match head {
    | 13 => match bytes.next() {
      | Some(n) => Ok((n as u16) + 13),
      | None => Err(reserved_err),
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => Ok(u16::from_be_bytes([a, b]) + 269),
      | _ => Err(reserved_err),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(head as u16),
  }
}

/// Parse the options region of a message.
///
/// Stops at the payload marker (0xFF) or the end of the datagram;
/// the returned flag is whether a marker was consumed.
///
/// NOTE: Delta **MUST** be consumed before Value, the extension bytes
/// are laid out in that order.
pub(crate) fn try_consume_options<A: AsRef<[u8]>>(bytes: &mut Cursor<A>)
                                                  -> Result<(OptionMap, bool), OptParseError> {
  let mut map = OptionMap::new();
  let mut number = OptNumber(0);

  loop {
    let byte1 = match bytes.next() {
      | None => return Ok((map, false)),
      | Some(0b1111_1111) => return Ok((map, true)),
      | Some(b) => b,
    };

    let delta = parse_opt_len_or_delta(byte1 >> 4, bytes, OptParseError::BadDelta)?;
    let len = parse_opt_len_or_delta(byte1 & 0b0000_1111, bytes, OptParseError::BadLength)? as usize;

    let value = bytes.take_exact(len)
                     .map(|bs| OptValue(bs.to_vec()))
                     .ok_or_else(OptParseError::eof)?;

    number = number + OptNumber(delta as u32);
    map.entry(number).or_default().push(value);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(bytes: &[u8]) -> Result<(OptionMap, bool), OptParseError> {
    try_consume_options(&mut Cursor::new(bytes))
  }

  #[test]
  fn parse_opt() {
    let (map, marker) = parse(&[0b0001_0001, 0b0000_0001]).unwrap();
    assert_eq!(map,
               OptionMap::from([(OptNumber(1), vec![OptValue(vec![1])])]));
    assert!(!marker);

    // 8-bit delta extension: 13 + 1 = 14
    let (map, _) = parse(&[0b1101_0001, 0b0000_0001, 0b0000_0001]).unwrap();
    assert_eq!(map,
               OptionMap::from([(OptNumber(14), vec![OptValue(vec![1])])]));

    // 16-bit delta extension: 269 + 1 = 270
    let (map, _) = parse(&[0b1110_0001, 0b0000_0000, 0b0000_0001, 0b0000_0001]).unwrap();
    assert_eq!(map,
               OptionMap::from([(OptNumber(270), vec![OptValue(vec![1])])]));
  }

  #[test]
  fn parse_accumulates_deltas() {
    let (map, marker) =
      parse(&[0b0000_0001, 0b0000_0001, 0b0001_0001, 0b0000_0011, 0b1111_1111]).unwrap();
    assert_eq!(map,
               OptionMap::from([(OptNumber(0), vec![OptValue(vec![1])]),
                                (OptNumber(1), vec![OptValue(vec![3])])]));
    assert!(marker);
  }

  #[test]
  fn parse_repeated_preserves_order() {
    // Uri-Path "b" then "a": same number, order must survive
    let (map, _) = parse(&[0b1011_0001, b'b', 0b0000_0001, b'a']).unwrap();
    assert_eq!(map.get(&OptNumber(11)).unwrap(),
               &vec![OptValue(vec![b'b']), OptValue(vec![b'a'])]);
  }

  #[test]
  fn parse_reserved_nibbles() {
    assert_eq!(parse(&[0b1111_0001, 1]), Err(OptParseError::BadDelta));
    assert_eq!(parse(&[0b0001_1111, 1]), Err(OptParseError::BadLength));

    // extension byte announced but missing
    assert_eq!(parse(&[0b1101_0000]), Err(OptParseError::BadDelta));
    assert_eq!(parse(&[0b0001_1101]), Err(OptParseError::BadLength));
  }

  #[test]
  fn parse_truncated_value() {
    assert_eq!(parse(&[0b0001_0010, 1]),
               Err(OptParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn uint_round_trip() {
    for n in [0u64, 1, 12, 255, 256, 5683, u32::MAX as u64, u64::MAX] {
      assert_eq!(OptValue::uint(n).as_uint(), Some(n));
    }

    assert_eq!(OptValue(vec![1; 9]).as_uint(), None);
  }

  #[test]
  fn criticality() {
    assert!(OptNumber(1).is_critical());
    assert!(OptNumber(11).is_critical());
    assert!(!OptNumber(4).is_critical());
    assert!(!OptNumber(60).is_critical());
  }
}
