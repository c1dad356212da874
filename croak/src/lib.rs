//! `croak` is a Rust CoAP client & server runtime built on
//! lightweight reliability over UDP.
//!
//! ## CoAP
//! CoAP is an application-level network protocol that copies the
//! semantics of HTTP to an environment conducive to **constrained**
//! devices (weak hardware, small battery capacity, etc.).
//!
//! This means that you can write and run two-way RESTful communication
//! between devices very similarly to the networking semantics you are
//! most likely very familiar with.
//!
//! ### Similarities to HTTP
//! - GET, POST, PUT, DELETE
//! - Headers (renamed to [Options](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10))
//! - Data format independent (via the [Content-Format](https://datatracker.ietf.org/doc/html/rfc7252#section-12.3) Option)
//! - [Response status codes](https://datatracker.ietf.org/doc/html/rfc7252#section-5.9)
//!
//! ### Differences from HTTP
//! - CoAP sits on top of UDP, so the transport guarantees nothing;
//!   the message layer implemented here adds optional reliability
//!   (confirmable messages, retransmission with binary exponential
//!   backoff, deduplication by message id).
//! - Responses may be *piggybacked* on the acknowledgement of the
//!   request, or arrive later as a *separate response* correlated by
//!   token.
//! - Large payloads travel as a sequence of
//!   [block-wise](https://www.rfc-editor.org/rfc/rfc7959) messages.
//!
//! ## Shape of the runtime
//! Every socket is owned by an endpoint task, every conversation with
//! a peer by an exchange task keyed by `(peer address, token)`; they
//! talk over mailboxes and never share state. The blocking [`Client`]
//! and [`Server`](blocking::Server) in [`blocking`] are facades over
//! these tasks.
//!
//! ```no_run
//! use croak::blocking::Client;
//!
//! let mut client = Client::new();
//! let resp = client.get("coap://coap.me/hello").unwrap();
//! println!("{} {}", resp.status(), resp.payload_string().unwrap());
//! ```

#![doc(html_root_url = "https://docs.rs/croak/0.1.0")]
// style
#![allow(clippy::unused_unit)]
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]

#[cfg(test)]
pub(crate) mod test;

pub(crate) mod logging;

/// Blocking rust CoAP client & server
pub mod blocking;

/// Block-wise transfer: segmentation & reassembly
pub mod block;

/// Configuring runtime behavior
pub mod config;

/// Errors surfaced to users
pub mod error;

/// Observability events
pub mod event;

/// Network abstractions
pub mod net;

/// Requests
pub mod req;

/// Responses
pub mod resp;

/// Customizable retrying of unacknowledged transmissions
pub mod retry;

/// Socket-adapter tasks
pub mod socket;

/// Time abstractions
pub mod time;

mod endpoint;
mod exchange;

#[doc(inline)]
pub use blocking::Client;
#[doc(inline)]
pub use error::Error;

macro_rules! code {
  ($(#[$meta:meta])+ $name:ident = $c:literal * $d:literal) => {
    $(#[$meta])+
    #[allow(clippy::zero_prefixed_literal)]
    pub const $name: croak_msg::Code = croak_msg::Code::new($c, $d);
  };
}

pub(crate) use code;
