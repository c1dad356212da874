//! Low-level representation of CoAP messages.
//!
//! The most notable item in `croak_msg` is [`Message`]: a CoAP message
//! very close to the actual byte layout, together with the full wire
//! codec for the RFC 7252 message & option format and the RFC 7959
//! block descriptor.
//!
//! This crate explicitly does **not** know or care about how messages
//! are sent and received; it is just concerned with the data structures
//! involved on the machines having a CoAP conversation. For a runtime
//! that uses this library, see the sibling `croak` crate.
//!
//! ## Wire format
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Ver| T |  TKL  |      Code     |          Message ID           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Token (if any, TKL bytes) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Options (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |1 1 1 1 1 1 1 1|    Payload (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

#![doc(html_root_url = "https://docs.rs/croak-msg/0.1.0")]
#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![deny(missing_docs)]

pub(crate) mod cursor;

#[doc(hidden)]
pub mod from_bytes;

/// Message structs
pub mod msg;

#[doc(hidden)]
pub mod to_bytes;

#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::TryIntoBytes;

#[cfg(test)]
pub(crate) fn test_msg() -> (Message, Vec<u8>) {
  let header: [u8; 4] = 0b0100_0001_0100_0101_0000_0000_0000_0001_u32.to_be_bytes();
  let token: [u8; 1] = [254u8];
  let content_format: &[u8] = b"application/json";
  // delta 12, length 16 (13 + extension byte 3)
  let options: Vec<u8> = [&[0b1100_1101u8, 0b0000_0011u8] as &[u8], content_format].concat();
  let payload: &[u8] = b"hello, world!";
  let bytes = [&header as &[u8],
               &token,
               &options,
               &[0b1111_1111],
               payload].concat();

  let mut msg = Message::new(Type::Con,
                             Code::new(2, 5),
                             Id(1),
                             Token(tinyvec::array_vec!([u8; 8] => 254)));
  msg.add(opt::known::no_repeat::CONTENT_FORMAT,
          OptValue(content_format.to_vec()))
     .unwrap();
  msg.payload = Payload(payload.to_vec());

  (msg, bytes)
}
