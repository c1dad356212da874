use embedded_time::rate::Fraction;

/// A duration, in milliseconds
pub type Millis = embedded_time::duration::Milliseconds<u64>;

/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64
pub trait Clock: embedded_time::Clock<T = u64> {}
impl<C: embedded_time::Clock<T = u64>> Clock for C {}

/// Timeout configuration allowing for "never time out" as an option
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum Timeout {
  /// Time out after some number of milliseconds has elapsed
  Millis(u64),
  /// Never time out
  Never,
}

/// Milliseconds elapsed between two instants of the same clock,
/// saturating at zero when `b` is not after `a`.
pub(crate) fn millis_between<C: Clock>(a: embedded_time::Instant<C>,
                                       b: embedded_time::Instant<C>)
                                       -> u64 {
  use embedded_time::duration::Milliseconds;

  b.checked_duration_since(&a)
   .and_then(|d| Milliseconds::<u64>::try_from(d).ok())
   .map(|Milliseconds(ms)| ms)
   .unwrap_or(0)
}

/// Implement [`embedded_time::Clock`] using [`std::time`] primitives,
/// ticking in milliseconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock(std::time::Instant);

impl Default for SystemClock {
  fn default() -> Self {
    Self::new()
  }
}

impl SystemClock {
  /// Create a new clock
  pub fn new() -> Self {
    Self(std::time::Instant::now())
  }
}

impl embedded_time::Clock for SystemClock {
  type T = u64;

  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    let elapsed = std::time::Instant::now().duration_since(self.0);
    Ok(embedded_time::Instant::new(elapsed.as_millis() as u64))
  }
}

#[cfg(test)]
mod tests {
  use embedded_time::Clock as _;

  use super::*;

  #[test]
  fn system_clock_ticks_millis() {
    let clock = SystemClock::new();
    let a = clock.try_now().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let b = clock.try_now().unwrap();
    assert!(millis_between(a, b) >= 5);
    assert_eq!(millis_between(b, a), 0);
  }
}
