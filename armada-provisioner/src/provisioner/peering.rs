//! VPC peering lifecycle: authorizations take effect immediately, peering
//! connections converge asynchronously and are waited on.
//!
//! Peering statuses use the remote side's lowercase vocabulary, which is
//! why the waiter takes its status sets per call site instead of
//! hard-coding them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use armada_core::{Probe, WaitError, WaitSpec};
use tracing::info;

use crate::control_plane::ControlPlane;
use crate::types::{Peering, PeeringAuth, PeeringAuthSpec, PeeringSpec};

pub const PEERING_PROVISIONING: &str = "provisioning";
pub const PEERING_PENDING_ACCEPTANCE: &str = "pending-acceptance";
pub const PEERING_ACTIVE: &str = "active";
pub const PEERING_DELETED: &str = "deleted";
pub const PEERING_FAILED: &str = "failed";

/// Drives peering lifecycles against the control plane.
pub struct PeeringProvisioner {
    control_plane: Arc<dyn ControlPlane>,
    timeout: Duration,
    poll_interval: Duration,
}

impl PeeringProvisioner {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            control_plane,
            timeout,
            poll_interval,
        }
    }

    /// Authorize peering for an account/VPC pair.
    pub async fn authorize(&self, spec: &PeeringAuthSpec) -> Result<PeeringAuth> {
        let auth = self.control_plane.create_peering_auth(spec).await?;
        info!(
            account_id = %auth.account_id,
            peer_vpc_id = %auth.peer_vpc_id,
            "Created peering authorization"
        );
        Ok(auth)
    }

    /// Remove a peering authorization.
    pub async fn deauthorize(&self, account_id: &str, peer_vpc_id: &str) -> Result<()> {
        self.control_plane
            .delete_peering_auth(account_id, peer_vpc_id)
            .await?;
        info!(account_id, peer_vpc_id, "Deleted peering authorization");
        Ok(())
    }

    /// Create a peering connection and block until it is active.
    pub async fn create(&self, spec: &PeeringSpec) -> Result<Peering> {
        self.control_plane.create_peering(spec).await?;
        info!(
            fleet_id = %spec.fleet_id,
            peer_vpc_id = %spec.peer_vpc_id,
            "Created peering connection, waiting for active"
        );

        // The connection may not be visible yet right after create; an
        // absent probe reports an empty label, which keeps the wait
        // polling.
        let peering = self
            .wait_for_status(
                &spec.fleet_id,
                &spec.peer_vpc_id,
                &[PEERING_PROVISIONING, PEERING_PENDING_ACCEPTANCE, PEERING_DELETED],
                PEERING_ACTIVE,
                "",
            )
            .await?
            .context("peering connection disappeared while provisioning")?;
        Ok(peering)
    }

    /// Delete a peering connection and block until it is gone. A
    /// connection that is already absent counts as deleted.
    pub async fn delete(&self, fleet_id: &str, peer_vpc_id: &str) -> Result<()> {
        let peerings = self.control_plane.list_peerings(fleet_id).await?;
        let Some(peering) = peerings.iter().find(|p| p.peer_vpc_id == peer_vpc_id) else {
            info!(fleet_id, peer_vpc_id, "Peering connection already gone");
            return Ok(());
        };
        self.control_plane
            .delete_peering(fleet_id, &peering.id)
            .await?;
        info!(fleet_id, peer_vpc_id, "Deleting peering connection, waiting for removal");

        self.wait_for_status(
            fleet_id,
            peer_vpc_id,
            &[PEERING_ACTIVE, PEERING_PENDING_ACCEPTANCE, PEERING_PROVISIONING],
            PEERING_DELETED,
            PEERING_DELETED,
        )
        .await?;
        Ok(())
    }

    /// Find the peering connection for a fleet/VPC pair.
    pub async fn find(&self, fleet_id: &str, peer_vpc_id: &str) -> Result<Option<Peering>> {
        let peerings = self.control_plane.list_peerings(fleet_id).await?;
        Ok(peerings.into_iter().find(|p| p.peer_vpc_id == peer_vpc_id))
    }

    /// Wait on the connection for `peer_vpc_id`; `absent_status` is the
    /// label reported when the connection is not in the list (empty while
    /// creating, `deleted` while deleting).
    async fn wait_for_status(
        &self,
        fleet_id: &str,
        peer_vpc_id: &str,
        pending: &[&str],
        target: &str,
        absent_status: &str,
    ) -> Result<Option<Peering>, WaitError> {
        let control_plane = Arc::clone(&self.control_plane);
        let fleet_id = fleet_id.to_string();
        let peer_vpc_id = peer_vpc_id.to_string();
        let absent = absent_status.to_string();
        WaitSpec {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: vec![target.to_string()],
            failure: vec![PEERING_FAILED.to_string()],
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            refresh: move || {
                let control_plane = Arc::clone(&control_plane);
                let fleet_id = fleet_id.clone();
                let peer_vpc_id = peer_vpc_id.clone();
                let absent = absent.clone();
                async move {
                    let peerings = control_plane.list_peerings(&fleet_id).await?;
                    match peerings.into_iter().find(|p| p.peer_vpc_id == peer_vpc_id) {
                        Some(peering) => {
                            let status = peering.status.clone();
                            let detail = peering.status_message.clone();
                            let mut probe = Probe::new(peering, status);
                            if let Some(detail) = detail {
                                probe = probe.with_detail(detail);
                            }
                            Ok(probe)
                        }
                        None => Ok(Probe::new(None, absent)),
                    }
                }
            },
        }
        .wait_for_state()
        .await
    }
}
