//! armada-core: primitives for managing eventually-consistent remote resources.
//!
//! Two independent components:
//! - [`waiter`]: polls a status source until a target state, a failure
//!   state, or a timeout is reached.
//! - [`diff`]: computes the minimal add/remove plan between two unordered
//!   record collections.

pub mod diff;
pub mod waiter;

pub use diff::{diff_records, RecordDiff};
pub use waiter::{Probe, WaitError, WaitSpec};
