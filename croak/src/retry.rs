use embedded_time::duration::Milliseconds;
use embedded_time::Instant;
use rand::Rng;

use crate::time::{millis_between, Clock, Millis};

/// A number of transmission attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

/// Result of [`RetryTimer::what_should_i_do`].
///
/// This tells you if a retry should be attempted or not.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Attempts have been exhausted, the give-up deadline has passed,
  /// and the work being retried should be considered poisoned.
  Cry,
  /// A retry should be performed
  Retry,
}

/// A non-blocking retransmission timer living alongside one
/// unacknowledged message.
///
/// The first transmission happens before the timer is consulted; the
/// n-th retransmission becomes due once `init * 2^(n-1)` milliseconds
/// have passed since the first. When all retransmissions are spent the
/// timer keeps the caller waiting until `init * (2^(max+1) - 1)` before
/// telling it to give up, so an ack that is merely slow still has its
/// window.
///
/// ```
/// use croak::retry::{Attempts, RetryTimer, YouShould};
/// use croak::time::SystemClock;
/// use embedded_time::duration::Milliseconds;
/// use embedded_time::Clock;
///
/// let clock = SystemClock::new();
/// let mut retry =
///   RetryTimer::new(clock.try_now().unwrap(), Milliseconds(1u64), Attempts(1));
///
/// std::thread::sleep(std::time::Duration::from_millis(5));
/// assert_eq!(nb::block!(retry.what_should_i_do(clock.try_now().unwrap())),
///            Ok(YouShould::Retry));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer<C: Clock> {
  start: Instant<C>,
  init: Millis,
  attempts: Attempts,
  max_retransmit: Attempts,
}

impl<C: Clock> RetryTimer<C> {
  /// Create a new retrier with a fixed initial window
  pub fn new(start: Instant<C>, init: Millis, max_retransmit: Attempts) -> Self {
    Self { start,
           init: Milliseconds(init.0.max(1)),
           attempts: Attempts(1),
           max_retransmit }
  }

  /// Create a new retrier whose initial window is drawn uniformly
  /// from `[min, max]`
  pub fn jittered(start: Instant<C>,
                  min: Millis,
                  max: Millis,
                  rng: &mut impl Rng,
                  max_retransmit: Attempts)
                  -> Self {
    let init = if min >= max {
      min
    } else {
      Milliseconds(rng.gen_range(min.0..=max.0))
    };

    Self::new(start, init, max_retransmit)
  }

  /// When the thing we keep trying fails to be acknowledged, invoke
  /// this to ask "it hasn't happened yet! what do I do??"
  ///
  /// Returns `nb::Error::WouldBlock` when we have not yet
  /// waited the appropriate amount of time to retry or give up.
  pub fn what_should_i_do(&mut self,
                          now: Instant<C>)
                          -> nb::Result<YouShould, core::convert::Infallible> {
    let elapsed = millis_between(self.start, now);

    if self.attempts > self.max_retransmit {
      if elapsed >= self.give_up_after() {
        Ok(YouShould::Cry)
      } else {
        Err(nb::Error::WouldBlock)
      }
    } else if elapsed >= self.nth_retry_after(self.attempts.0) {
      self.attempts.0 += 1;
      Ok(YouShould::Retry)
    } else {
      Err(nb::Error::WouldBlock)
    }
  }

  /// Milliseconds until the next retransmission (or the give-up
  /// deadline) is due; zero when due now.
  pub fn time_until_due(&self, now: Instant<C>) -> Millis {
    let elapsed = millis_between(self.start, now);

    let due_at = if self.attempts > self.max_retransmit {
      self.give_up_after()
    } else {
      self.nth_retry_after(self.attempts.0)
    };

    Milliseconds(due_at.saturating_sub(elapsed))
  }

  /// Number of retransmissions left before this timer starts
  /// waiting out the give-up deadline.
  pub fn retries_remaining(&self) -> u16 {
    (self.max_retransmit.0 + 1).saturating_sub(self.attempts.0)
  }

  // elapsed-since-start threshold for the nth retransmission
  fn nth_retry_after(&self, n: u16) -> u64 {
    self.init.0 * 2u64.pow((n - 1) as u32)
  }

  fn give_up_after(&self) -> u64 {
    self.init.0 * (2u64.pow(self.max_retransmit.0 as u32 + 1) - 1)
  }
}
