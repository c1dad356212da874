use std::sync::Arc;

use embedded_time::duration::Milliseconds;
use url::Url;

use crate::config::{Config, DEFAULT_PORT};
use crate::error::Error;
use crate::retry::Attempts;
use crate::socket::SocketAdapter;
use crate::time::{Millis, Timeout};

/// Blocking CoAP client
pub mod client;

/// Blocking CoAP server
pub mod server;

#[doc(inline)]
pub use client::Client;
#[doc(inline)]
pub use server::{Handler, Reply, Server};

/// Per-request knobs, all defaulted from [`Config`].
#[derive(Debug, Clone)]
pub struct SendOptions {
  /// Initial retransmission window lower bound (see [`Config::ack_timeout`])
  pub ack_timeout: Millis,
  /// Retransmission window jitter factor (see [`Config::ack_random_factor`])
  pub ack_random_factor: f32,
  /// Retransmission limit (see [`Config::max_retransmit`])
  pub max_retransmit: Attempts,
  /// Send a CON when true, a NON otherwise
  pub confirmable: bool,
  /// Overall wait for the response, empty acks not included
  pub timeout: Timeout,
  /// Preferred block size for block-wise transfers
  pub block_size: u16,
  /// Overrides the Uri-Host option (normally taken from the URL and
  /// suppressed when the URL host is a literal IP)
  pub uri_host: Option<String>,
  /// Overrides the Uri-Port option (normally taken from the URL,
  /// defaulting to 5683)
  pub uri_port: Option<u16>,
  /// Tag carried by every observability event about this exchange
  pub tag: Option<String>,
  /// Bring-your-own transport; required for `coaps://` URLs, where the
  /// adapter owns the security layer
  pub socket_adapter: Option<Arc<dyn SocketAdapter>>,
}

impl Default for SendOptions {
  fn default() -> Self {
    Self::from_config(&Config::default())
  }
}

impl SendOptions {
  /// Options seeded from a runtime config
  pub fn from_config(cfg: &Config) -> Self {
    SendOptions { ack_timeout: cfg.ack_timeout,
                  ack_random_factor: cfg.ack_random_factor,
                  max_retransmit: cfg.max_retransmit,
                  confirmable: true,
                  timeout: Timeout::Millis(5_000),
                  block_size: cfg.block_size,
                  uri_host: None,
                  uri_port: None,
                  tag: None,
                  socket_adapter: None }
  }

  pub(crate) fn exchange_config(&self, base: &Config) -> Config {
    Config { ack_timeout: self.ack_timeout,
             ack_random_factor: self.ack_random_factor,
             max_retransmit: self.max_retransmit,
             block_size: self.block_size,
             ..*base }
  }
}

/// The pieces of a `coap://host[:port]/path[?query]` URL the
/// request builder needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedUrl {
  pub(crate) scheme: String,
  pub(crate) host: String,
  pub(crate) host_is_literal: bool,
  pub(crate) port: u16,
  pub(crate) path: String,
  pub(crate) query: Vec<String>,
}

pub(crate) fn parse_url(url: &str) -> Result<ParsedUrl, Error> {
  let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;

  match parsed.scheme() {
    | "coap" | "coaps" => (),
    | other => return Err(Error::UnsupportedScheme(other.to_string())),
  }

  // `coap` is not one of the URL standard's special schemes, so an
  // IPv4 host comes back as an opaque Host::Domain; sniff it ourselves
  let (host, host_is_literal) = match parsed.host() {
    | Some(url::Host::Domain(d)) => {
      (d.to_string(), d.parse::<std::net::IpAddr>().is_ok())
    },
    | Some(url::Host::Ipv4(ip)) => (ip.to_string(), true),
    | Some(url::Host::Ipv6(ip)) => (ip.to_string(), true),
    | None => return Err(Error::InvalidUrl(format!("{}: missing host", url))),
  };

  let query = parsed.query()
                    .map(|q| q.split('&').filter(|s| !s.is_empty()).map(String::from).collect())
                    .unwrap_or_default();

  Ok(ParsedUrl { scheme: parsed.scheme().to_string(),
                 host,
                 host_is_literal,
                 port: parsed.port().unwrap_or(DEFAULT_PORT),
                 path: parsed.path().to_string(),
                 query })
}

pub(crate) fn timeout_millis(t: Timeout) -> Millis {
  match t {
    | Timeout::Millis(ms) => Milliseconds(ms),
    // 30 days; not forever, but longer than any sane exchange
    | Timeout::Never => Milliseconds(30 * 24 * 60 * 60 * 1_000),
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_full_url() {
    let parsed = parse_url("coap://coap.me:1234/large/create?first=1&second=2").unwrap();
    assert_eq!(parsed.scheme, "coap");
    assert_eq!(parsed.host, "coap.me");
    assert!(!parsed.host_is_literal);
    assert_eq!(parsed.port, 1234);
    assert_eq!(parsed.path, "/large/create");
    assert_eq!(parsed.query, vec!["first=1", "second=2"]);
  }

  #[test]
  fn port_defaults_to_5683() {
    assert_eq!(parse_url("coap://10.0.0.1/x").unwrap().port, DEFAULT_PORT);
  }

  #[test]
  fn literal_hosts_are_flagged() {
    assert!(parse_url("coap://127.0.0.1/x").unwrap().host_is_literal);
    assert!(parse_url("coap://[::1]/x").unwrap().host_is_literal);
    assert!(!parse_url("coap://coap.me/x").unwrap().host_is_literal);
  }

  #[test]
  fn coaps_parses_http_does_not() {
    assert_eq!(parse_url("coaps://coap.me/x").unwrap().scheme, "coaps");
    assert_eq!(parse_url("http://coap.me/x"),
               Err(Error::UnsupportedScheme("http".to_string())));
    assert!(matches!(parse_url("not a url"), Err(Error::InvalidUrl(_))));
  }

  #[test]
  fn empty_query_is_empty() {
    assert!(parse_url("coap://h/x").unwrap().query.is_empty());
    assert!(parse_url("coap://h/x?").unwrap().query.is_empty());
  }
}
