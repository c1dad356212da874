use croak_msg::{Id, Message, Payload, Token, Type};

/// Request methods
pub mod method;

#[doc(inline)]
pub use method::Method;

/// Request builder
pub mod builder;

#[doc(inline)]
pub use builder::ReqBuilder;

/// A CoAP request
///
/// ```
/// use croak::req::{Method, Req};
///
/// let mut req = Req::post("frogs/42/feed");
/// req.set_payload(b"two flies".to_vec());
///
/// assert_eq!(req.method(), Method::POST);
/// assert_eq!(req.payload_str().unwrap(), "two flies");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Req(Message);

impl Req {
  /// Create a request
  pub fn new(method: Method, path: impl AsRef<str>) -> Self {
    let mut msg = Message::new(Type::Con, method.code(), Id(0), Token::default());
    msg.set_path(path.as_ref()).ok();
    Self(msg)
  }

  /// Create a GET request
  pub fn get(path: impl AsRef<str>) -> Self {
    Self::new(Method::GET, path)
  }

  /// Create a POST request
  pub fn post(path: impl AsRef<str>) -> Self {
    Self::new(Method::POST, path)
  }

  /// Create a PUT request
  pub fn put(path: impl AsRef<str>) -> Self {
    Self::new(Method::PUT, path)
  }

  /// Create a DELETE request
  pub fn delete(path: impl AsRef<str>) -> Self {
    Self::new(Method::DELETE, path)
  }

  /// Get the request method
  pub fn method(&self) -> Method {
    Method(self.0.code)
  }

  /// Get the request type (confirmable, non-confirmable)
  pub fn msg_type(&self) -> Type {
    self.0.ty
  }

  /// Make this request confirmable or not
  pub fn set_confirmable(&mut self, confirmable: bool) {
    self.0.ty = if confirmable { Type::Con } else { Type::Non };
  }

  /// Replace the payload
  pub fn set_payload(&mut self, payload: Vec<u8>) {
    self.0.payload = Payload(payload);
  }

  /// Borrow the payload bytes
  pub fn payload(&self) -> &[u8] {
    self.0.payload.as_bytes()
  }

  /// Read the payload as a UTF-8 string
  pub fn payload_str(&self) -> Result<&str, core::str::Utf8Error> {
    core::str::from_utf8(self.payload())
  }

  /// Get the request path (Uri-Path segments joined with '/')
  pub fn path(&self) -> Result<String, core::str::Utf8Error> {
    self.0.path_string()
  }

  /// Obtain a reference to the inner message
  pub fn msg(&self) -> &Message {
    &self.0
  }

  /// Obtain a mutable reference to the inner message
  pub fn msg_mut(&mut self) -> &mut Message {
    &mut self.0
  }
}

impl From<Message> for Req {
  fn from(msg: Message) -> Self {
    Self(msg)
  }
}

impl From<Req> for Message {
  fn from(req: Req) -> Self {
    req.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_request_is_confirmable_with_path() {
    let req = Req::get("a/b");
    assert_eq!(req.msg_type(), Type::Con);
    assert_eq!(req.path().unwrap(), "a/b");

    let mut req = req;
    req.set_confirmable(false);
    assert_eq!(req.msg_type(), Type::Non);
  }
}
