//! Lifecycle drivers for remote resources.
//!
//! Each provisioner issues a mutating call, then blocks on the state waiter
//! with a refresh closure that re-fetches status from the control plane.
//! Reconciliation plans are applied entry by entry; there is no
//! cross-resource rollback.

pub mod build;
pub mod fleet;
pub mod peering;

use thiserror::Error;

use crate::control_plane::ControlPlaneError;
use crate::types::AccessRule;

/// Outcome of applying a reconciliation plan where some entries failed.
///
/// The plan is not transactional: entries already applied stay applied, and
/// the caller learns exactly which entries did not go through.
#[derive(Debug, Error)]
#[error("applied {applied} of {total} access rule changes ({} failed)", failed.len())]
pub struct PartialApplyError {
    pub applied: usize,
    pub total: usize,
    pub failed: Vec<(AccessRule, ControlPlaneError)>,
}
