use croak_msg::{Code, Id, Message, Payload, Type};

use crate::req::Req;

/// Response codes
pub mod code;

/// A CoAP response
///
/// ```
/// use croak::req::Req;
/// use croak::resp::{code, Resp};
///
/// let req = Req::get("frogs/42");
/// let mut resp = Resp::for_request(&req).unwrap();
///
/// resp.set_code(code::CONTENT);
/// resp.set_payload(b"bullfrog".to_vec());
///
/// assert_eq!(resp.status(), 205);
/// assert_eq!(resp.payload_string().unwrap(), "bullfrog".to_string());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Resp(Message);

impl Resp {
  /// Create a new response for a given request.
  ///
  /// If the request is CONfirmable, this returns Some(ACK) echoing the
  /// request's id & token, ready to carry a piggybacked response.
  ///
  /// If the request is NONconfirmable, this returns Some(NON)
  /// correlated by token only.
  ///
  /// If the "request" is an ACK or RESET, this returns None.
  pub fn for_request(req: &Req) -> Option<Self> {
    let req = req.msg();

    let ty = match req.ty {
      | Type::Con => Type::Ack,
      | Type::Non => Type::Non,
      | _ => return None,
    };

    let id = match ty {
      | Type::Ack => req.id,
      // a fresh id is assigned when the exchange transmits
      | _ => Id(0),
    };

    Some(Self(Message::new(ty, code::CONTENT, id, req.token)))
  }

  /// Get the response code
  pub fn code(&self) -> Code {
    self.0.code
  }

  /// Set the response code
  pub fn set_code(&mut self, code: Code) {
    self.0.code = code;
  }

  /// The conventional decimal status (2.05 => 205, 4.04 => 404)
  pub fn status(&self) -> u16 {
    self.0.code.status()
  }

  /// Whether the code is a 2.xx success
  pub fn is_ok(&self) -> bool {
    self.0.code.class == 2
  }

  /// Replace the payload
  pub fn set_payload(&mut self, payload: Vec<u8>) {
    self.0.payload = Payload(payload);
  }

  /// Borrow the payload bytes
  pub fn payload(&self) -> &[u8] {
    self.0.payload.as_bytes()
  }

  /// Copy the payload into a UTF-8 string
  pub fn payload_string(&self) -> Result<String, core::str::Utf8Error> {
    core::str::from_utf8(self.payload()).map(String::from)
  }

  /// Get the message type (ack for piggybacked, con/non for separate)
  pub fn msg_type(&self) -> Type {
    self.0.ty
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

impl From<Message> for Resp {
  fn from(msg: Message) -> Self {
    Self(msg)
  }
}

impl From<Resp> for Message {
  fn from(resp: Resp) -> Self {
    resp.0
  }
}
