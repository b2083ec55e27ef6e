use crate::{Result, SequencerId};

/// A minimal interface for issuing [`SequencerId`]s.
///
/// Request handlers hold a generator behind this trait so they do not depend
/// on the concrete [`TimeSource`] the [`Sequencer`] was built with.
///
/// [`TimeSource`]: crate::TimeSource
/// [`Sequencer`]: crate::Sequencer
pub trait IdGenerator {
    /// The node ID embedded in every issued ID.
    fn node_id(&self) -> u64;

    /// Issues the next ID.
    ///
    /// # Errors
    ///
    /// See [`Sequencer::next_id`](crate::Sequencer::next_id).
    fn next_id(&self) -> Result<SequencerId>;
}
