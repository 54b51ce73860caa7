//! Builds Kubernetes pod manifests for application instances and submits them.
//!
//! A `DeploymentRequest` goes through `workload::builder::WorkloadBuilder`, which
//! resolves the quota, names the workload and attaches the defaults every
//! instance runs with. The resulting `WorkloadDescriptor` is handed to
//! `controllers::gateway::OrchestratorGateway`.

pub mod controllers;
pub mod models;
pub mod utils;
pub mod workload;
