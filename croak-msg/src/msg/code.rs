/// # Message Code
///
/// The code is a 3-bit class and 5-bit detail, written `c.dd`
/// (e.g. `4.04`). Class 0 marks requests, classes 2-5 mark responses,
/// and `0.00` is the empty message used for acks, resets and pings.
///
/// ```
/// use croak_msg::Code;
///
/// assert_eq!(Code { class: 2,
///                   detail: 5 }.to_string(),
///            "2.05".to_string());
/// ```
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  ///
  /// Will always be `0` for requests.
  pub detail: u8,
}

/// Whether a code is for a request, response, or empty message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeKind {
  /// A request code (0.xx)
  Request,
  /// A response code ([2-5].xx)
  Response,
  /// EMPTY (0.00)
  Empty,
}

impl Code {
  /// Create a new Code
  ///
  /// ```
  /// use croak_msg::Code;
  ///
  /// let content = Code::new(2, 05);
  /// ```
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  /// Get the human string representation of a message code
  ///
  /// ```
  /// use croak_msg::Code;
  ///
  /// let code = Code { class: 2,
  ///                   detail: 5 };
  /// assert_eq!(String::from_iter(code.to_human()), "2.05".to_string());
  /// ```
  pub fn to_human(&self) -> [char; 4] {
    let to_char = |d: u8| char::from_digit(d.into(), 10).unwrap_or('?');
    [to_char(self.class),
     '.',
     to_char(self.detail / 10),
     to_char(self.detail % 10)]
  }

  /// The conventional decimal rendering of the code, `class * 100 + detail`.
  ///
  /// ```
  /// use croak_msg::Code;
  ///
  /// assert_eq!(Code::new(4, 4).status(), 404);
  /// assert_eq!(Code::new(2, 31).status(), 231);
  /// ```
  pub fn status(&self) -> u16 {
    self.class as u16 * 100 + self.detail as u16
  }

  /// Get whether this code is for a request, response, or empty message
  ///
  /// ```
  /// use croak_msg::{Code, CodeKind};
  ///
  /// assert_eq!(Code::new(0, 0).kind(), CodeKind::Empty);
  /// assert_eq!(Code::new(0, 1).kind(), CodeKind::Request);
  /// assert_eq!(Code::new(2, 5).kind(), CodeKind::Response);
  /// ```
  pub fn kind(&self) -> CodeKind {
    match (self.class, self.detail) {
      | (0, 0) => CodeKind::Empty,
      | (0, _) => CodeKind::Request,
      | _ => CodeKind::Response,
    }
  }

  /// The empty code, `0.00`. Used by acks, resets and pings.
  pub const EMPTY: Self = Self::new(0, 0);

  /// GET, `0.01`
  pub const GET: Self = Self::new(0, 1);

  /// POST, `0.02`
  pub const POST: Self = Self::new(0, 2);

  /// PUT, `0.03`
  pub const PUT: Self = Self::new(0, 3);

  /// DELETE, `0.04`
  pub const DELETE: Self = Self::new(0, 4);
}

impl core::fmt::Display for Code {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    for c in self.to_human() {
      write!(f, "{}", c)?;
    }
    Ok(())
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    // xxxyyyyy
    let class = b >> 5;
    let detail = b & 0b00011111;

    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = (code.class << 5) & 0b11100000;
    let detail = code.detail & 0b00011111;

    class | detail
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_code() {
    let byte = 0b01000101_u8;
    let code = Code::from(byte);
    assert_eq!(code,
               Code { class: 2,
                      detail: 5 })
  }

  #[test]
  fn serialize_code() {
    let code = Code { class: 2,
                      detail: 5 };
    let actual: u8 = code.into();
    assert_eq!(actual, 0b01000101_u8)
  }

  #[test]
  fn method_codes_match_rfc7252_table() {
    assert_eq!(u8::from(Code::GET), 0b000_00001);
    assert_eq!(u8::from(Code::POST), 0b000_00010);
    assert_eq!(u8::from(Code::PUT), 0b000_00011);
    assert_eq!(u8::from(Code::DELETE), 0b000_00100);
  }
}
