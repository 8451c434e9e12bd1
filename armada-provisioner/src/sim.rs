//! In-memory control plane used by the CLI and the integration tests.
//!
//! Resources advance one step along a scripted status pipeline each time
//! they are observed (describe for fleets and builds, list for peerings,
//! matching what the provisioners poll), which is enough to exercise every
//! waiter path without a real remote.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::control_plane::{ControlPlane, ControlPlaneError, Result};
use crate::provisioner::build::{BUILD_FAILED, BUILD_INITIALIZED, BUILD_READY};
use crate::provisioner::fleet::{
    FLEET_ACTIVATING, FLEET_ACTIVE, FLEET_BUILDING, FLEET_DELETING, FLEET_DOWNLOADING,
    FLEET_ERROR, FLEET_NEW, FLEET_TERMINATED, FLEET_VALIDATING,
};
use crate::provisioner::peering::{
    PEERING_ACTIVE, PEERING_DELETED, PEERING_FAILED, PEERING_PENDING_ACCEPTANCE,
    PEERING_PROVISIONING,
};
use crate::types::{
    AccessRule, Build, BuildSpec, Fleet, FleetConfig, Peering, PeeringAuth, PeeringAuthSpec,
    PeeringSpec,
};

/// CIDR block the simulator assigns to activated peering connections.
const SIM_PEERING_CIDR: &str = "172.31.0.0/16";

/// Counters for mutating calls, so tests can assert that unchanged rules
/// are never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpCounters {
    pub authorize_access: usize,
    pub revoke_access: usize,
}

struct SimResource<T> {
    record: T,
    pipeline: VecDeque<String>,
    /// Message surfaced once the pipeline reaches a failure status.
    failure_message: Option<String>,
}

impl<T> SimResource<T> {
    fn new(record: T, pipeline: &[&str]) -> Self {
        Self {
            record,
            pipeline: pipeline.iter().map(|s| s.to_string()).collect(),
            failure_message: None,
        }
    }

    fn with_failure_message(mut self, message: String) -> Self {
        self.failure_message = Some(message);
        self
    }
}

#[derive(Default)]
struct SimState {
    fleets: HashMap<String, SimResource<Fleet>>,
    builds: HashMap<String, SimResource<Build>>,
    peerings: HashMap<String, SimResource<Peering>>,
    access_rules: HashMap<String, Vec<AccessRule>>,
    auths: Vec<PeeringAuth>,
    fail_activation: HashSet<String>,
    counters: OpCounters,
}

/// Simulated control plane with in-memory state.
#[derive(Clone)]
pub struct SimControlPlane {
    state: Arc<RwLock<SimState>>,
}

impl SimControlPlane {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SimState::default())),
        }
    }

    /// Script the next fleet created with `name` to fail activation.
    pub async fn fail_fleet_activation(&self, name: &str) {
        self.state
            .write()
            .await
            .fail_activation
            .insert(name.to_string());
    }

    pub async fn op_counters(&self) -> OpCounters {
        self.state.read().await.counters.clone()
    }
}

impl Default for SimControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

#[async_trait]
impl ControlPlane for SimControlPlane {
    async fn create_fleet(&self, config: &FleetConfig) -> Result<Fleet> {
        let mut state = self.state.write().await;
        if state
            .fleets
            .values()
            .any(|f| f.record.name == config.name && f.record.status != FLEET_TERMINATED)
        {
            return Err(ControlPlaneError::Conflict(format!(
                "fleet {} already exists",
                config.name
            )));
        }
        if !state.builds.values().any(|b| b.record.id == config.build_id) {
            return Err(ControlPlaneError::InvalidSpec(format!(
                "unknown build {}",
                config.build_id
            )));
        }

        let fleet = Fleet {
            id: format!("fleet-{}", Uuid::new_v4()),
            name: config.name.clone(),
            build_id: config.build_id.clone(),
            instance_type: config.instance_type.clone(),
            status: FLEET_NEW.to_string(),
            status_message: None,
            created_at: now(),
        };

        let resource = if state.fail_activation.remove(&config.name) {
            SimResource::new(
                fleet.clone(),
                &[FLEET_DOWNLOADING, FLEET_VALIDATING, FLEET_ERROR],
            )
            .with_failure_message("server process exited during validation".to_string())
        } else {
            SimResource::new(
                fleet.clone(),
                &[
                    FLEET_DOWNLOADING,
                    FLEET_VALIDATING,
                    FLEET_BUILDING,
                    FLEET_ACTIVATING,
                    FLEET_ACTIVE,
                ],
            )
        };
        state.access_rules.insert(fleet.id.clone(), Vec::new());
        state.fleets.insert(fleet.id.clone(), resource);
        Ok(fleet)
    }

    async fn describe_fleet(&self, fleet_id: &str) -> Result<Fleet> {
        let mut state = self.state.write().await;
        let resource = state
            .fleets
            .get_mut(fleet_id)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("fleet {fleet_id}")))?;
        if let Some(next) = resource.pipeline.pop_front() {
            resource.record.status = next;
            if resource.record.status == FLEET_ERROR {
                resource.record.status_message = resource.failure_message.take();
            }
        }
        let record = resource.record.clone();
        if record.status == FLEET_TERMINATED {
            state.fleets.remove(fleet_id);
            state.access_rules.remove(fleet_id);
        }
        Ok(record)
    }

    async fn list_fleets(&self) -> Result<Vec<Fleet>> {
        let state = self.state.read().await;
        Ok(state.fleets.values().map(|f| f.record.clone()).collect())
    }

    async fn delete_fleet(&self, fleet_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let resource = state
            .fleets
            .get_mut(fleet_id)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("fleet {fleet_id}")))?;
        resource.pipeline =
            VecDeque::from([FLEET_DELETING.to_string(), FLEET_TERMINATED.to_string()]);
        Ok(())
    }

    async fn list_access_rules(&self, fleet_id: &str) -> Result<Vec<AccessRule>> {
        let state = self.state.read().await;
        state
            .access_rules
            .get(fleet_id)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(format!("fleet {fleet_id}")))
    }

    async fn authorize_access(&self, fleet_id: &str, rule: &AccessRule) -> Result<()> {
        let mut state = self.state.write().await;
        state.counters.authorize_access += 1;
        let rules = state
            .access_rules
            .get_mut(fleet_id)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("fleet {fleet_id}")))?;
        if rules.contains(rule) {
            return Err(ControlPlaneError::Conflict(format!(
                "rule already authorized: {rule:?}"
            )));
        }
        rules.push(rule.clone());
        Ok(())
    }

    async fn revoke_access(&self, fleet_id: &str, rule: &AccessRule) -> Result<()> {
        let mut state = self.state.write().await;
        state.counters.revoke_access += 1;
        let rules = state
            .access_rules
            .get_mut(fleet_id)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("fleet {fleet_id}")))?;
        match rules.iter().position(|r| r == rule) {
            Some(i) => {
                rules.remove(i);
                Ok(())
            }
            None => Err(ControlPlaneError::NotFound(format!(
                "rule not authorized: {rule:?}"
            ))),
        }
    }

    async fn create_build(&self, spec: &BuildSpec) -> Result<Build> {
        let mut state = self.state.write().await;
        if state
            .builds
            .values()
            .any(|b| b.record.name == spec.name && b.record.version == spec.version)
        {
            return Err(ControlPlaneError::Conflict(format!(
                "build {}:{} already exists",
                spec.name, spec.version
            )));
        }

        let build = Build {
            id: format!("build-{}", Uuid::new_v4()),
            name: spec.name.clone(),
            version: spec.version.clone(),
            status: BUILD_INITIALIZED.to_string(),
            created_at: now(),
        };
        // Validation only accepts zip archives.
        let pipeline: &[&str] = if spec.location.ends_with(".zip") {
            &[BUILD_READY]
        } else {
            &[BUILD_FAILED]
        };
        state
            .builds
            .insert(build.id.clone(), SimResource::new(build.clone(), pipeline));
        Ok(build)
    }

    async fn describe_build(&self, build_id: &str) -> Result<Build> {
        let mut state = self.state.write().await;
        let resource = state
            .builds
            .get_mut(build_id)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("build {build_id}")))?;
        if let Some(next) = resource.pipeline.pop_front() {
            resource.record.status = next;
        }
        Ok(resource.record.clone())
    }

    async fn list_builds(&self) -> Result<Vec<Build>> {
        let state = self.state.read().await;
        Ok(state.builds.values().map(|b| b.record.clone()).collect())
    }

    async fn delete_build(&self, build_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .fleets
            .values()
            .any(|f| f.record.build_id == build_id && f.record.status != FLEET_TERMINATED)
        {
            return Err(ControlPlaneError::Conflict(format!(
                "build {build_id} is referenced by a fleet"
            )));
        }
        state
            .builds
            .remove(build_id)
            .map(|_| ())
            .ok_or_else(|| ControlPlaneError::NotFound(format!("build {build_id}")))
    }

    async fn create_peering(&self, spec: &PeeringSpec) -> Result<Peering> {
        let mut state = self.state.write().await;
        if !state.fleets.contains_key(&spec.fleet_id) {
            return Err(ControlPlaneError::NotFound(format!(
                "fleet {}",
                spec.fleet_id
            )));
        }

        let authorized = state
            .auths
            .iter()
            .any(|a| a.account_id == spec.peer_account_id && a.peer_vpc_id == spec.peer_vpc_id);

        let peering = Peering {
            id: format!("pcx-{}", Uuid::new_v4()),
            fleet_id: spec.fleet_id.clone(),
            peer_vpc_id: spec.peer_vpc_id.clone(),
            status: PEERING_PROVISIONING.to_string(),
            status_message: None,
            cidr_block: None,
        };

        let resource = if authorized {
            SimResource::new(
                peering.clone(),
                &[PEERING_PENDING_ACCEPTANCE, PEERING_ACTIVE],
            )
        } else {
            SimResource::new(peering.clone(), &[PEERING_FAILED]).with_failure_message(format!(
                "no peering authorization for account {} and vpc {}",
                spec.peer_account_id, spec.peer_vpc_id
            ))
        };
        state.peerings.insert(peering.id.clone(), resource);
        Ok(peering)
    }

    async fn list_peerings(&self, fleet_id: &str) -> Result<Vec<Peering>> {
        let mut state = self.state.write().await;
        let mut out = Vec::new();
        let mut gone = Vec::new();
        for (id, resource) in state.peerings.iter_mut() {
            if resource.record.fleet_id != fleet_id {
                continue;
            }
            if let Some(next) = resource.pipeline.pop_front() {
                resource.record.status = next;
                if resource.record.status == PEERING_FAILED {
                    resource.record.status_message = resource.failure_message.take();
                }
                if resource.record.status == PEERING_ACTIVE {
                    resource.record.cidr_block = Some(SIM_PEERING_CIDR.to_string());
                }
            }
            out.push(resource.record.clone());
            if resource.record.status == PEERING_DELETED {
                gone.push(id.clone());
            }
        }
        for id in gone {
            state.peerings.remove(&id);
        }
        Ok(out)
    }

    async fn delete_peering(&self, fleet_id: &str, peering_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let resource = state
            .peerings
            .get_mut(peering_id)
            .filter(|p| p.record.fleet_id == fleet_id)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("peering {peering_id}")))?;
        resource.pipeline = VecDeque::from([PEERING_DELETED.to_string()]);
        Ok(())
    }

    async fn create_peering_auth(&self, spec: &PeeringAuthSpec) -> Result<PeeringAuth> {
        let mut state = self.state.write().await;
        if state
            .auths
            .iter()
            .any(|a| a.account_id == spec.account_id && a.peer_vpc_id == spec.peer_vpc_id)
        {
            return Err(ControlPlaneError::Conflict(format!(
                "authorization for {}/{} already exists",
                spec.account_id, spec.peer_vpc_id
            )));
        }
        let auth = PeeringAuth {
            account_id: spec.account_id.clone(),
            peer_vpc_id: spec.peer_vpc_id.clone(),
            created_at: now(),
        };
        state.auths.push(auth.clone());
        Ok(auth)
    }

    async fn list_peering_auths(&self) -> Result<Vec<PeeringAuth>> {
        let state = self.state.read().await;
        Ok(state.auths.clone())
    }

    async fn delete_peering_auth(&self, account_id: &str, peer_vpc_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        match state
            .auths
            .iter()
            .position(|a| a.account_id == account_id && a.peer_vpc_id == peer_vpc_id)
        {
            Some(i) => {
                state.auths.remove(i);
                Ok(())
            }
            None => Err(ControlPlaneError::NotFound(format!(
                "authorization for {account_id}/{peer_vpc_id}"
            ))),
        }
    }
}
