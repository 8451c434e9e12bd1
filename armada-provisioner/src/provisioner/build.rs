//! Build lifecycle: register an uploaded server archive and wait until the
//! control plane has validated it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use armada_core::{Probe, WaitSpec};
use tracing::info;

use crate::control_plane::ControlPlane;
use crate::types::{Build, BuildRef, BuildSpec};

pub const BUILD_INITIALIZED: &str = "INITIALIZED";
pub const BUILD_READY: &str = "READY";
pub const BUILD_FAILED: &str = "FAILED";

/// Drives build lifecycles against the control plane.
pub struct BuildProvisioner {
    control_plane: Arc<dyn ControlPlane>,
    timeout: Duration,
    poll_interval: Duration,
}

impl BuildProvisioner {
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

    /// Register a build and block until validation finishes.
    pub async fn create(&self, spec: &BuildSpec) -> Result<Build> {
        let build = self.control_plane.create_build(spec).await?;
        info!(build_id = %build.id, name = %build.name, "Registered build, waiting for validation");

        let control_plane = Arc::clone(&self.control_plane);
        let id = build.id.clone();
        let build = WaitSpec {
            pending: vec![BUILD_INITIALIZED.to_string()],
            target: vec![BUILD_READY.to_string()],
            failure: vec![BUILD_FAILED.to_string()],
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            refresh: move || {
                let control_plane = Arc::clone(&control_plane);
                let id = id.clone();
                async move {
                    let build = control_plane.describe_build(&id).await?;
                    let status = build.status.clone();
                    Ok(Probe::new(build, status))
                }
            },
        }
        .wait_for_state()
        .await?
        .context("build disappeared while validating")?;

        Ok(build)
    }

    /// Resolve a `name:version` build reference. Without a version, the
    /// most recently created READY build with that name wins.
    pub async fn resolve(&self, build_ref: &BuildRef) -> Result<Build> {
        let mut candidates: Vec<Build> = self
            .control_plane
            .list_builds()
            .await?
            .into_iter()
            .filter(|b| b.name == build_ref.name)
            .collect();

        match &build_ref.version {
            Some(version) => candidates.retain(|b| &b.version == version),
            None => {
                candidates.retain(|b| b.status == BUILD_READY);
                candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            }
        }

        candidates
            .pop()
            .ok_or_else(|| anyhow!("no build matches reference {build_ref}"))
    }

    /// Delete a build. Deletion is synchronous on the remote side.
    pub async fn delete(&self, build_id: &str) -> Result<()> {
        self.control_plane.delete_build(build_id).await?;
        info!(build_id, "Deleted build");
        Ok(())
    }
}
