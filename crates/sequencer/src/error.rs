#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `sequencer` can emit.
///
/// Startup errors ([`Error::InvalidNodeId`], [`Error::InterfaceEnumeration`])
/// are meant to abort process initialization. The remaining variants are
/// per-call failures of [`Sequencer::next_id`]; none of them mutate the
/// sequencer, so the next call may simply be retried.
///
/// [`Sequencer::next_id`]: crate::Sequencer::next_id
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The wall clock was observed behind the timestamp of the last issued
    /// ID. Issuing now could repeat a `(timestamp, sequence)` pair.
    #[error("clock moved backwards: last issued at {last} ms, clock reads {now} ms")]
    ClockRegression {
        /// Epoch-relative timestamp of the last issued ID.
        last: u64,
        /// Epoch-relative timestamp that was just read.
        now: u64,
    },

    /// An explicitly supplied node ID does not fit the layout.
    #[error("node id {node_id} is out of range, must be between 0 and {max}")]
    InvalidNodeId {
        /// The rejected value.
        node_id: i64,
        /// Largest accepted node ID.
        max: u64,
    },

    /// The host's network interfaces could not be listed.
    #[error("failed to enumerate network interfaces: {0}")]
    InterfaceEnumeration(String),

    /// The clock is past the last millisecond the timestamp field can hold.
    #[error("timestamp {timestamp} ms exceeds the encodable maximum of {max} ms")]
    TimestampOverflow {
        /// Epoch-relative timestamp that was just read.
        timestamp: u64,
        /// Largest encodable timestamp.
        max: u64,
    },

    /// The clock reads earlier than its epoch. No valid timestamp exists
    /// until the host clock is corrected.
    #[error("system clock reads earlier than the epoch at {epoch_millis} ms after 1970-01-01")]
    ClockBeforeEpoch {
        /// The clock's epoch, in milliseconds since the Unix epoch.
        epoch_millis: u64,
    },

    /// The operation failed because the lock was **poisoned**.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, mutexes do **not** poison, so this
    /// variant is not available.
    #[cfg(not(feature = "parking-lot"))]
    #[error("sequencer lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Short, stable name of the variant, suitable for logs and metric
    /// attributes.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ClockRegression { .. } => "clock_regression",
            Self::InvalidNodeId { .. } => "invalid_node_id",
            Self::InterfaceEnumeration(_) => "interface_enumeration",
            Self::TimestampOverflow { .. } => "timestamp_overflow",
            Self::ClockBeforeEpoch { .. } => "clock_before_epoch",
            #[cfg(not(feature = "parking-lot"))]
            Self::LockPoisoned => "lock_poisoned",
        }
    }
}

#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
