use croak_msg::Code;

use crate::error::Error;

/// A request method: the code of a class-0 message.
///
/// ```
/// use croak::req::Method;
///
/// assert_eq!("GET".parse::<Method>().unwrap(), Method::GET);
/// assert_eq!(Method::PUT.to_string(), "PUT");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Method(pub Code);

impl Method {
  /// GET
  pub const GET: Method = Method(Code::GET);
  /// POST
  pub const POST: Method = Method(Code::POST);
  /// PUT
  pub const PUT: Method = Method(Code::PUT);
  /// DELETE
  pub const DELETE: Method = Method(Code::DELETE);

  /// The code this method puts on the wire
  pub fn code(&self) -> Code {
    self.0
  }
}

impl core::str::FromStr for Method {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      | "GET" => Ok(Method::GET),
      | "POST" => Ok(Method::POST),
      | "PUT" => Ok(Method::PUT),
      | "DELETE" => Ok(Method::DELETE),
      | _ => Err(Error::InvalidMethod),
    }
  }
}

impl core::fmt::Display for Method {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match *self {
      | Method::GET => write!(f, "GET"),
      | Method::POST => write!(f, "POST"),
      | Method::PUT => write!(f, "PUT"),
      | Method::DELETE => write!(f, "DELETE"),
      | Method(code) => write!(f, "{}", code),
    }
  }
}
