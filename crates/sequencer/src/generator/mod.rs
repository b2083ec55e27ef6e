mod interface;
mod mutex;
mod sequencer;

pub use interface::*;
pub use mutex::*;
pub use sequencer::*;
