//! Declarative specs and control-plane records.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Transport protocol for an access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Inbound access rule attached to a fleet.
///
/// Two rules are equal iff all fields are equal; rules carry no identity
/// beyond their field values, so reconciliation is pure set difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    pub protocol: Protocol,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr: String,
}

/// Desired state of a fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSpec {
    pub name: String,
    /// Compound `name:version` build reference, resolved before creation.
    pub build_ref: String,
    pub instance_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub access_rules: Vec<AccessRule>,
}

/// Create request for a fleet, with the build reference already resolved.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub name: String,
    pub build_id: String,
    pub instance_type: String,
    pub description: Option<String>,
}

/// Fleet as reported by the control plane. `status` is the raw label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fleet {
    pub id: String,
    pub name: String,
    pub build_id: String,
    pub instance_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub created_at: String,
}

/// Desired state of a build: a named, versioned server archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    pub name: String,
    pub version: String,
    /// Storage location of the uploaded archive.
    pub location: String,
}

/// Build as reported by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: String,
    pub created_at: String,
}

/// Reference to a build by compound `name:version` identifier. The version
/// may be omitted, in which case the newest usable build wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRef {
    pub name: String,
    pub version: Option<String>,
}

impl FromStr for BuildRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = match s.split_once(':') {
            Some((name, version)) => {
                if version.is_empty() {
                    bail!("build reference {s:?} has an empty version");
                }
                (name, Some(version.to_string()))
            }
            None => (s, None),
        };
        if name.is_empty() {
            bail!("build reference {s:?} has an empty name");
        }
        Ok(BuildRef {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Desired state of a VPC peering connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeeringSpec {
    pub fleet_id: String,
    pub peer_account_id: String,
    pub peer_vpc_id: String,
}

/// Peering connection as reported by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peering {
    pub id: String,
    pub fleet_id: String,
    pub peer_vpc_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
}

/// Desired state of a peering authorization. Authorizations take effect
/// synchronously on the remote side; there is nothing to wait on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeeringAuthSpec {
    pub account_id: String,
    pub peer_vpc_id: String,
}

/// Peering authorization as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeeringAuth {
    pub account_id: String,
    pub peer_vpc_id: String,
    pub created_at: String,
}

/// Top-level document consumed by `armada run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub build: BuildSpec,
    pub fleet: FleetSpec,
}

/// Load a JSON spec file.
pub fn load_spec<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spec file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid spec file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_build_ref() {
        let r: BuildRef = "gomoku:1.2.0".parse().unwrap();
        assert_eq!(r.name, "gomoku");
        assert_eq!(r.version.as_deref(), Some("1.2.0"));
        assert_eq!(r.to_string(), "gomoku:1.2.0");
    }

    #[test]
    fn parses_versionless_build_ref() {
        let r: BuildRef = "gomoku".parse().unwrap();
        assert_eq!(r.name, "gomoku");
        assert_eq!(r.version, None);
    }

    #[test]
    fn rejects_malformed_build_refs() {
        assert!("gomoku:".parse::<BuildRef>().is_err());
        assert!(":1.2.0".parse::<BuildRef>().is_err());
        assert!("".parse::<BuildRef>().is_err());
    }

    #[test]
    fn fleet_spec_deserializes_camel_case() {
        let raw = r#"{
            "name": "web",
            "buildRef": "gomoku:1.0.0",
            "instanceType": "c5.large",
            "accessRules": [
                {"protocol": "TCP", "fromPort": 8443, "toPort": 8443, "cidr": "192.168.0.0/24"}
            ]
        }"#;
        let spec: FleetSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(spec.name, "web");
        assert_eq!(spec.description, None);
        assert_eq!(spec.access_rules.len(), 1);
        assert_eq!(spec.access_rules[0].protocol, Protocol::Tcp);
        assert_eq!(spec.access_rules[0].from_port, 8443);
    }
}
