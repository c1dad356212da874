use croak_msg::{ContentFormat, OptNumber, OptValue};

use crate::blocking::{Client, SendOptions};
use crate::error::Error;
use crate::req::{Method, Req};
use crate::resp::Resp;
use crate::retry::Attempts;
use crate::time::{Millis, Timeout};

/// Fluent request construction.
///
/// ```no_run
/// use croak::blocking::Client;
/// use croak::req::ReqBuilder;
/// use croak_msg::ContentFormat;
///
/// let mut client = Client::new();
/// let resp = ReqBuilder::post("coap://coap.me/frogs")
///                       .payload(b"{\"name\": \"jeremiah\"}".to_vec())
///                       .content_format(ContentFormat::Json)
///                       .accept(ContentFormat::Json)
///                       .send(&mut client)
///                       .unwrap();
/// ```
#[derive(Debug)]
pub struct ReqBuilder {
  req: Req,
  url: String,
  opts: SendOptions,
}

impl ReqBuilder {
  /// Start a request with an arbitrary method
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self { req: Req::new(method, ""),
           url: url.into(),
           opts: SendOptions::default() }
  }

  /// Start a GET request
  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::GET, url)
  }

  /// Start a POST request
  pub fn post(url: impl Into<String>) -> Self {
    Self::new(Method::POST, url)
  }

  /// Start a PUT request
  pub fn put(url: impl Into<String>) -> Self {
    Self::new(Method::PUT, url)
  }

  /// Start a DELETE request
  pub fn delete(url: impl Into<String>) -> Self {
    Self::new(Method::DELETE, url)
  }

  /// Attach a payload
  pub fn payload(mut self, payload: Vec<u8>) -> Self {
    self.req.set_payload(payload);
    self
  }

  /// Set the Content-Format of the payload
  pub fn content_format(mut self, format: ContentFormat) -> Self {
    self.req.msg_mut().set_content_format(format);
    self
  }

  /// Tell the server which Content-Format we'd like back
  pub fn accept(mut self, format: ContentFormat) -> Self {
    self.req.msg_mut().set_accept(format);
    self
  }

  /// Add any option by number
  pub fn option(mut self, number: OptNumber, value: OptValue) -> Self {
    self.req.msg_mut().add(number, value).ok();
    self
  }

  /// Send a NON instead of a CON
  pub fn non_confirmable(mut self) -> Self {
    self.opts.confirmable = false;
    self
  }

  /// Overall wait for the response
  pub fn timeout(mut self, timeout: Timeout) -> Self {
    self.opts.timeout = timeout;
    self
  }

  /// Initial retransmission window lower bound
  pub fn ack_timeout(mut self, ack_timeout: Millis) -> Self {
    self.opts.ack_timeout = ack_timeout;
    self
  }

  /// Retransmission limit
  pub fn max_retransmit(mut self, attempts: Attempts) -> Self {
    self.opts.max_retransmit = attempts;
    self
  }

  /// Preferred block size for block-wise transfers
  pub fn block_size(mut self, size: u16) -> Self {
    self.opts.block_size = size;
    self
  }

  /// Tag carried on every observability event about this exchange
  pub fn tag(mut self, tag: impl Into<String>) -> Self {
    self.opts.tag = Some(tag.into());
    self
  }

  /// Fire the request and block for its response
  pub fn send(self, client: &mut Client) -> Result<Resp, Error> {
    client.send(self.req, &self.url, self.opts)
  }
}

#[cfg(test)]
mod tests {
  use croak_msg::Type;

  use super::*;

  #[test]
  fn builder_accumulates_options() {
    let b = ReqBuilder::get("coap://h/x").accept(ContentFormat::Json)
                                         .tag("basement-sensor")
                                         .non_confirmable();

    assert_eq!(b.req.msg().accept(), Some(ContentFormat::Json));
    assert_eq!(b.opts.tag.as_deref(), Some("basement-sensor"));
    assert!(!b.opts.confirmable);
    // confirmability is applied at send time
    assert_eq!(b.req.msg_type(), Type::Con);
  }
}
