//! Fleet lifecycle: create and wait for activation, reconcile access
//! rules, delete and wait until the fleet is gone.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use armada_core::{diff_records, Probe, WaitError, WaitSpec};
use tracing::{info, warn};

use super::PartialApplyError;
use crate::control_plane::{ControlPlane, ControlPlaneError};
use crate::types::{AccessRule, Fleet, FleetConfig, FleetSpec};

pub const FLEET_NEW: &str = "NEW";
pub const FLEET_DOWNLOADING: &str = "DOWNLOADING";
pub const FLEET_VALIDATING: &str = "VALIDATING";
pub const FLEET_BUILDING: &str = "BUILDING";
pub const FLEET_ACTIVATING: &str = "ACTIVATING";
pub const FLEET_ACTIVE: &str = "ACTIVE";
pub const FLEET_DELETING: &str = "DELETING";
pub const FLEET_TERMINATED: &str = "TERMINATED";
pub const FLEET_ERROR: &str = "ERROR";

/// Statuses a fleet passes through while activating.
pub const FLEET_ACTIVATION_PENDING: &[&str] = &[
    FLEET_NEW,
    FLEET_DOWNLOADING,
    FLEET_VALIDATING,
    FLEET_BUILDING,
    FLEET_ACTIVATING,
];

/// Drives fleet lifecycles against the control plane.
pub struct FleetProvisioner {
    control_plane: Arc<dyn ControlPlane>,
    timeout: Duration,
    poll_interval: Duration,
}

impl FleetProvisioner {
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

    /// Create a fleet, block until it activates, then authorize the
    /// declared access rules.
    pub async fn create(&self, spec: &FleetSpec, build_id: &str) -> Result<Fleet> {
        let config = FleetConfig {
            name: spec.name.clone(),
            build_id: build_id.to_string(),
            instance_type: spec.instance_type.clone(),
            description: spec.description.clone(),
        };
        let fleet = self.control_plane.create_fleet(&config).await?;
        info!(fleet_id = %fleet.id, name = %fleet.name, "Created fleet, waiting for activation");

        let fleet = self
            .wait_for_status(
                &fleet.id,
                FLEET_ACTIVATION_PENDING,
                FLEET_ACTIVE,
                &[FLEET_ERROR, FLEET_TERMINATED],
            )
            .await?
            .context("fleet disappeared while activating")?;

        if !spec.access_rules.is_empty() {
            self.update_access_rules(&fleet.id, &spec.access_rules)
                .await?;
        }
        Ok(fleet)
    }

    /// Reconcile the fleet's live access rules to `desired`, touching only
    /// rules that changed.
    ///
    /// The plan is applied one rule at a time. Entries that fail are
    /// collected into [`PartialApplyError`]; successful entries are never
    /// rolled back.
    pub async fn update_access_rules(
        &self,
        fleet_id: &str,
        desired: &[AccessRule],
    ) -> Result<()> {
        let current = self.control_plane.list_access_rules(fleet_id).await?;
        let plan = diff_records(&current, desired);
        if plan.is_empty() {
            info!(fleet_id, "Access rules already converged");
            return Ok(());
        }
        info!(
            fleet_id,
            add = plan.to_add.len(),
            remove = plan.to_remove.len(),
            "Applying access rule changes"
        );

        let total = plan.len();
        let mut applied = 0usize;
        let mut failed = Vec::new();

        for rule in &plan.to_add {
            match self.control_plane.authorize_access(fleet_id, rule).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(fleet_id, error = %e, "Failed to authorize access rule");
                    failed.push((rule.clone(), e));
                }
            }
        }
        for rule in &plan.to_remove {
            match self.control_plane.revoke_access(fleet_id, rule).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(fleet_id, error = %e, "Failed to revoke access rule");
                    failed.push((rule.clone(), e));
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(PartialApplyError {
                applied,
                total,
                failed,
            }
            .into())
        }
    }

    /// Delete a fleet and block until the control plane reports it gone.
    /// Deleting a fleet that is already gone succeeds.
    pub async fn delete(&self, fleet_id: &str) -> Result<()> {
        match self.control_plane.delete_fleet(fleet_id).await {
            Ok(()) => {}
            Err(ControlPlaneError::NotFound(_)) => {
                info!(fleet_id, "Fleet already gone");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        info!(fleet_id, "Deleting fleet, waiting for termination");
        self.wait_for_status(
            fleet_id,
            &[FLEET_ACTIVE, FLEET_DELETING],
            FLEET_TERMINATED,
            &[FLEET_ERROR],
        )
        .await?;
        Ok(())
    }

    /// Find a live fleet by name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Fleet>> {
        let fleets = self.control_plane.list_fleets().await?;
        Ok(fleets
            .into_iter()
            .find(|f| f.name == name && f.status != FLEET_TERMINATED))
    }

    async fn wait_for_status(
        &self,
        fleet_id: &str,
        pending: &[&str],
        target: &str,
        failure: &[&str],
    ) -> Result<Option<Fleet>, WaitError> {
        let control_plane = Arc::clone(&self.control_plane);
        let id = fleet_id.to_string();
        WaitSpec {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: vec![target.to_string()],
            failure: failure.iter().map(|s| s.to_string()).collect(),
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            refresh: move || {
                let control_plane = Arc::clone(&control_plane);
                let id = id.clone();
                async move {
                    match control_plane.describe_fleet(&id).await {
                        Ok(fleet) => {
                            let status = fleet.status.clone();
                            let detail = fleet.status_message.clone();
                            let mut probe = Probe::new(fleet, status);
                            if let Some(detail) = detail {
                                probe = probe.with_detail(detail);
                            }
                            Ok(probe)
                        }
                        // A fleet the control plane no longer knows is
                        // terminal; the delete wait treats this as success.
                        Err(ControlPlaneError::NotFound(_)) => {
                            Ok(Probe::new(None, FLEET_TERMINATED))
                        }
                        Err(e) => Err(e.into()),
                    }
                }
            },
        }
        .wait_for_state()
        .await
    }
}
