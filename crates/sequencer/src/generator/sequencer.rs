use core::{cmp::Ordering, time::Duration};
use std::thread;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, HostInterfaces, InterfaceSource, NodeIdResolver, Result, SequencerId, SystemClock,
    TimeSource, generator::IdGenerator, generator::Mutex, validate_node_id,
};

/// Pause between clock reads while waiting out an exhausted millisecond.
pub const SPIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct State {
    /// `None` until the first ID is issued, which sorts below every valid
    /// timestamp.
    last_timestamp: Option<u64>,
    sequence: u64,
}

/// A lock-based Snowflake ID sequencer shared by every caller in a process.
///
/// The last issued timestamp and the sequence counter live behind a single
/// [`Mutex`], and the whole read-clock, decide, mutate, compose step of
/// [`Sequencer::next_id`] runs while holding it. The two fields are only ever
/// read and written together.
///
/// The node ID is fixed at construction.
///
/// ## Features
/// - ✅ Thread-safe (share it through an `Arc`)
/// - ✅ Strictly increasing IDs while the clock does not go backward
/// - ❌ Does not correct clock regressions; they are reported as
///   [`Error::ClockRegression`]
pub struct Sequencer<T = SystemClock>
where
    T: TimeSource,
{
    node_id: u64,
    state: Mutex<State>,
    time: T,
}

impl Sequencer<SystemClock> {
    /// Creates a sequencer on the system clock whose node ID is derived from
    /// the host's network interfaces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InterfaceEnumeration`] if the interfaces cannot be
    /// listed.
    pub fn new() -> Result<Self> {
        Self::from_resolver(&NodeIdResolver::<HostInterfaces>::default(), SystemClock::default())
    }
}

impl<T> Sequencer<T>
where
    T: TimeSource,
{
    /// Creates a sequencer with an explicit node ID.
    ///
    /// # Parameters
    ///
    /// - `node_id`: must lie in `0..=SequencerId::max_node_id()`.
    /// - `time`: A [`TimeSource`] implementation (e.g., [`SystemClock`]) that
    ///   determines how timestamps are generated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNodeId`] if `node_id` is out of range.
    ///
    /// # Example
    /// ```
    /// use sequencer::{Error, Sequencer, SystemClock};
    ///
    /// assert!(Sequencer::with_node_id(1023, SystemClock::default()).is_ok());
    /// assert!(matches!(
    ///     Sequencer::with_node_id(1024, SystemClock::default()),
    ///     Err(Error::InvalidNodeId { .. })
    /// ));
    /// ```
    pub fn with_node_id(node_id: i64, time: T) -> Result<Self> {
        let node_id = validate_node_id(node_id)?;
        Ok(Self::from_parts(node_id, time))
    }

    /// Creates a sequencer whose node ID comes from `resolver`.
    ///
    /// # Errors
    ///
    /// Propagates the resolver's error.
    pub fn from_resolver<S>(resolver: &NodeIdResolver<S>, time: T) -> Result<Self>
    where
        S: InterfaceSource,
    {
        let node_id = resolver.resolve()?;
        Ok(Self::from_parts(node_id, time))
    }

    fn from_parts(node_id: u64, time: T) -> Self {
        debug_assert!(node_id <= SequencerId::max_node_id(), "node_id overflow");
        Self {
            node_id,
            state: Mutex::new(State {
                last_timestamp: None,
                sequence: 0,
            }),
            time,
        }
    }

    /// The node ID embedded in every issued ID.
    pub const fn node_id(&self) -> u64 {
        self.node_id
    }

    /// Issues the next ID.
    ///
    /// Within one millisecond the sequence counts up from zero. Once all
    /// `SequencerId::max_sequence() + 1` values are used, the call sleeps in
    /// [`SPIN_INTERVAL`] steps, still holding the lock, until the clock
    /// reaches the next millisecond. The wrapped sequence (zero) is then used
    /// with the new timestamp.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockRegression`] if the clock reads earlier than the last
    ///   issued timestamp.
    /// - [`Error::TimestampOverflow`] if the clock is past the 41-bit range.
    /// - [`Error::ClockBeforeEpoch`] if the clock reads earlier than its
    ///   epoch.
    /// - [`Error::LockPoisoned`] if another caller panicked while holding the
    ///   lock (not with the `parking-lot` feature).
    ///
    /// The state is left untouched on error.
    ///
    /// # Example
    /// ```
    /// use sequencer::{Sequencer, SystemClock};
    ///
    /// let sequencer = Sequencer::with_node_id(7, SystemClock::default()).unwrap();
    ///
    /// let id = sequencer.next_id().unwrap();
    /// assert_eq!(id.node_id(), 7);
    /// ```
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self), fields(node_id = self.node_id))
    )]
    pub fn next_id(&self) -> Result<SequencerId> {
        let mut state = {
            #[cfg(feature = "parking-lot")]
            {
                self.state.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.state.lock()?
            }
        };

        let mut now = self.time.current_millis()?;
        let sequence = match state.last_timestamp.map(|last| (last, now.cmp(&last))) {
            Some((last, Ordering::Less)) => return Err(Self::cold_clock_behind(last, now)),
            Some((last, Ordering::Equal)) => {
                let sequence = (state.sequence + 1) & SequencerId::max_sequence();
                if sequence == 0 {
                    now = self.wait_next_millis(last)?;
                }
                sequence
            }
            Some((_, Ordering::Greater)) | None => 0,
        };

        if now > SequencerId::max_timestamp() {
            return Err(Error::TimestampOverflow {
                timestamp: now,
                max: SequencerId::max_timestamp(),
            });
        }

        state.last_timestamp = Some(now);
        state.sequence = sequence;

        Ok(SequencerId::from_components(now, self.node_id, sequence))
    }

    /// Polls the clock until it reads past `last`. A failed reading ends the
    /// wait with that error.
    #[cold]
    fn wait_next_millis(&self, last: u64) -> Result<u64> {
        #[cfg(feature = "tracing")]
        tracing::debug!(last, "sequence exhausted, waiting for the next millisecond");

        loop {
            thread::sleep(SPIN_INTERVAL);
            let now = self.time.current_millis()?;
            if now > last {
                break Ok(now);
            }
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(last: u64, now: u64) -> Error {
        #[cfg(feature = "tracing")]
        tracing::warn!(last, now, behind_ms = last - now, "clock moved backwards");

        Error::ClockRegression { last, now }
    }
}

impl<T> IdGenerator for Sequencer<T>
where
    T: TimeSource,
{
    fn node_id(&self) -> u64 {
        self.node_id()
    }

    fn next_id(&self) -> Result<SequencerId> {
        self.next_id()
    }
}
