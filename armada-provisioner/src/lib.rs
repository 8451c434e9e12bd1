//! armada-provisioner: resource lifecycle management on top of armada-core.
//!
//! Maps declarative specs into control-plane requests, blocks on state
//! waits until resources converge, and reconciles declared access-rule
//! collections against live ones. The remote control plane is reached only
//! through the [`control_plane::ControlPlane`] trait; [`sim`] provides an
//! in-memory implementation for tests and the CLI.

pub mod control_plane;
pub mod provisioner;
pub mod sim;
pub mod types;
