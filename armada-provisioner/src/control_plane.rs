//! Seam to the remote control plane.
//!
//! The control plane is a long-lived remote service; it is passed into each
//! provisioner as `Arc<dyn ControlPlane>` rather than held as ambient
//! global state, so tests can substitute a fake without process-wide
//! fixtures.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    AccessRule, Build, BuildSpec, Fleet, FleetConfig, Peering, PeeringAuth, PeeringAuthSpec,
    PeeringSpec,
};

/// Errors reported by the remote control plane.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflict with existing resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request was rejected as invalid.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// Remote-side error.
    #[error("remote error: {0}")]
    Remote(String),
}

/// Result type for control-plane operations.
pub type Result<T> = std::result::Result<T, ControlPlaneError>;

/// Remote control plane operations used by the provisioners.
///
/// Create and delete only initiate a lifecycle transition; the resource
/// converges asynchronously and callers poll the describe/list operations
/// to observe progress. Access-rule mutation is incremental (one rule per
/// call); there is no replace-the-set operation.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    // Fleets
    async fn create_fleet(&self, config: &FleetConfig) -> Result<Fleet>;
    async fn describe_fleet(&self, fleet_id: &str) -> Result<Fleet>;
    async fn list_fleets(&self) -> Result<Vec<Fleet>>;
    async fn delete_fleet(&self, fleet_id: &str) -> Result<()>;

    // Access rules
    async fn list_access_rules(&self, fleet_id: &str) -> Result<Vec<AccessRule>>;
    async fn authorize_access(&self, fleet_id: &str, rule: &AccessRule) -> Result<()>;
    async fn revoke_access(&self, fleet_id: &str, rule: &AccessRule) -> Result<()>;

    // Builds
    async fn create_build(&self, spec: &BuildSpec) -> Result<Build>;
    async fn describe_build(&self, build_id: &str) -> Result<Build>;
    async fn list_builds(&self) -> Result<Vec<Build>>;
    async fn delete_build(&self, build_id: &str) -> Result<()>;

    // VPC peering connections
    async fn create_peering(&self, spec: &PeeringSpec) -> Result<Peering>;
    async fn list_peerings(&self, fleet_id: &str) -> Result<Vec<Peering>>;
    async fn delete_peering(&self, fleet_id: &str, peering_id: &str) -> Result<()>;

    // Peering authorizations
    async fn create_peering_auth(&self, spec: &PeeringAuthSpec) -> Result<PeeringAuth>;
    async fn list_peering_auths(&self) -> Result<Vec<PeeringAuth>>;
    async fn delete_peering_auth(&self, account_id: &str, peer_vpc_id: &str) -> Result<()>;
}
