use core::time::Duration;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{Error, Result};

/// Custom epoch: Thursday, January 1, 2015 00:00:00 UTC
///
/// 41 bits of milliseconds counted from here last until the year 2084.
pub const CUSTOM_EPOCH: Duration = Duration::from_millis(1_420_070_400_000);

/// A trait for time sources that return a wall-clock timestamp.
///
/// This abstraction allows you to plug in the real system clock or a mocked
/// time source in tests.
///
/// The unit is expected to be **milliseconds** relative to a configurable
/// origin.
///
/// # Example
///
/// ```
/// use sequencer::{Result, TimeSource};
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> Result<u64> {
///         Ok(1234)
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_millis(), Ok(1234));
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the configured epoch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockBeforeEpoch`] if the clock reads earlier than
    /// the epoch, since no non-negative timestamp describes that instant.
    fn current_millis(&self) -> Result<u64>;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_millis(&self) -> Result<u64> {
        (**self).current_millis()
    }
}

/// A wall-clock time source offset from a user-defined epoch.
///
/// Every call reads `SystemTime::now()`, so adjustments to the host clock
/// (including backward NTP steps) are visible to the caller. The sequencer
/// relies on that to detect regressions instead of masking them.
///
/// Readings earlier than the epoch are reported as
/// [`Error::ClockBeforeEpoch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemClock {
    epoch_millis: u64,
}

impl Default for SystemClock {
    /// Constructs a clock aligned to the default [`CUSTOM_EPOCH`].
    fn default() -> Self {
        Self::with_epoch(CUSTOM_EPOCH)
    }
}

impl SystemClock {
    /// Constructs a clock using `epoch` (a [`Duration`] since 1970-01-01 UTC)
    /// as the origin (t = 0).
    ///
    /// # Example
    ///
    /// ```
    /// use core::time::Duration;
    /// use sequencer::{SystemClock, TimeSource};
    ///
    /// let unix = SystemClock::with_epoch(Duration::ZERO);
    /// let custom = SystemClock::default();
    ///
    /// assert!(unix.current_millis().unwrap() > custom.current_millis().unwrap());
    /// ```
    pub fn with_epoch(epoch: Duration) -> Self {
        Self {
            epoch_millis: u64::try_from(epoch.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Milliseconds between the Unix epoch and this clock's origin.
    pub const fn epoch_millis(&self) -> u64 {
        self.epoch_millis
    }
}

impl TimeSource for SystemClock {
    fn current_millis(&self) -> Result<u64> {
        let before_epoch = Error::ClockBeforeEpoch {
            epoch_millis: self.epoch_millis,
        };
        let unix_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .map_err(|_| before_epoch.clone())?;
        unix_millis.checked_sub(self.epoch_millis).ok_or(before_epoch)
    }
}
