use embedded_time::duration::Milliseconds;

use crate::retry::Attempts;
use crate::time::Millis;

/// Default CoAP UDP port
pub const DEFAULT_PORT: u16 = 5683;

/// Runtime config
///
/// Field defaults follow RFC7252 section 4.8.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
  /// Lower bound of the initial retransmission window for
  /// outbound CON messages.
  ///
  /// ```
  /// use croak::config::Config;
  /// use embedded_time::duration::Milliseconds;
  ///
  /// assert_eq!(Config::default().ack_timeout, Milliseconds(2_000u64));
  /// ```
  pub ack_timeout: Millis,

  /// Upper bound of the initial retransmission window, as a factor of
  /// [`Config::ack_timeout`]. Must be >= 1.0.
  ///
  /// ```
  /// use croak::config::Config;
  ///
  /// assert_eq!(Config::default().ack_random_factor, 1.5);
  /// ```
  pub ack_random_factor: f32,

  /// Number of times we are allowed to resend an unacked CON message
  /// before giving up.
  ///
  /// ```
  /// use croak::config::Config;
  /// use croak::retry::Attempts;
  ///
  /// assert_eq!(Config::default().max_retransmit, Attempts(4));
  /// ```
  pub max_retransmit: Attempts,

  /// Bound on how long the application may take to answer an inbound
  /// CON before an empty ack is sent on its behalf, switching the
  /// exchange to separate-response mode.
  ///
  /// ```
  /// use croak::config::Config;
  /// use embedded_time::duration::Milliseconds;
  ///
  /// assert_eq!(Config::default().processing_delay, Milliseconds(1_000u64));
  /// ```
  pub processing_delay: Millis,

  /// An exchange that has seen no traffic for this long is torn down.
  ///
  /// ```
  /// use croak::config::Config;
  /// use embedded_time::duration::Milliseconds;
  ///
  /// assert_eq!(Config::default().exchange_lifetime, Milliseconds(300_000u64));
  /// ```
  pub exchange_lifetime: Millis,

  /// Preferred block size for block-wise transfers, in bytes.
  /// One of {16, 32, 64, 128, 256, 512, 1024}.
  ///
  /// ```
  /// use croak::config::Config;
  ///
  /// assert_eq!(Config::default().block_size, 512);
  /// ```
  pub block_size: u16,
}

impl Default for Config {
  fn default() -> Self {
    Config { ack_timeout: Milliseconds(2_000),
             ack_random_factor: 1.5,
             max_retransmit: Attempts(4),
             processing_delay: Milliseconds(1_000),
             exchange_lifetime: Milliseconds(300_000),
             block_size: 512 }
  }
}

impl Config {
  /// Upper bound of the initial retransmission window, in milliseconds.
  pub(crate) fn ack_timeout_max(&self) -> Millis {
    let factor = self.ack_random_factor.max(1.0);
    Milliseconds((self.ack_timeout.0 as f32 * factor).round() as u64)
  }

  /// Upper bound on the total lifetime of one reliable transmission:
  /// `ack_timeout * (2^(max_retransmit + 1) - 1) * ack_random_factor`.
  ///
  /// ```
  /// use croak::config::Config;
  /// use embedded_time::duration::Milliseconds;
  ///
  /// assert_eq!(Config::default().max_transmit_wait(), Milliseconds(93_000u64));
  /// ```
  pub fn max_transmit_wait(&self) -> Millis {
    let factor = self.ack_random_factor.max(1.0);
    let spans = 2u64.pow(self.max_retransmit.0 as u32 + 1) - 1;
    Milliseconds((self.ack_timeout.0 as f32 * spans as f32 * factor).round() as u64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn max_transmit_wait_matches_rfc_example() {
    // RFC7252 4.8.2: defaults give MAX_TRANSMIT_WAIT of 93 seconds
    assert_eq!(Config::default().max_transmit_wait(), Milliseconds(93_000u64));
  }

  #[test]
  fn random_factor_below_one_is_clamped() {
    let cfg = Config { ack_random_factor: 0.5,
                       ..Config::default() };
    assert_eq!(cfg.ack_timeout_max(), cfg.ack_timeout);
  }
}
