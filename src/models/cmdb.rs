//! Records served by the CMDB. Timestamps are kept as the RFC 3339 strings the
//! CMDB emits; nothing in this crate does arithmetic on them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Audit columns shared by most CMDB tables.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct AuditFields {
    #[serde(default)]
    pub insert_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
    #[serde(default)]
    pub insert_by: String,
    #[serde(default)]
    pub update_by: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct App {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub app_type: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub developer_names: String,
    #[serde(default)]
    pub tester: String,
    #[serde(default)]
    pub tester_names: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub department_code: String,
    pub cmdb_app_id: String,
    #[serde(default)]
    pub enable_ha: bool,
    #[serde(default)]
    pub env_url_map: HashMap<String, String>,
    #[serde(default)]
    pub insert_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Environment {
    pub id: i64,
    pub cmdb_env_id: i64,
    pub name: String,
    #[serde(default)]
    pub nginx: String,
    /// Nameserver pods in this environment should use, empty for the node default.
    #[serde(default)]
    pub dns: String,
    #[serde(default)]
    pub docker_yard: String,
    #[serde(default)]
    pub is_in_use: bool,
    #[serde(default)]
    pub enable_ha: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub insert_time: Option<String>,
}

/// Machine size offered by the CMDB. `cpu` is in cores, `memory` in GiB.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct InstanceSpec {
    pub id: i64,
    pub name: String,
    pub cpu: f32,
    pub memory: f32,
    #[serde(default)]
    pub disk: f32,
}

/// How many instances of which spec an app may run in one environment.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct AppQuota {
    pub id: i64,
    pub app_id: String,
    pub app_name: String,
    pub env_id: i64,
    #[serde(default)]
    pub org_id: i64,
    #[serde(default)]
    pub org_name: String,
    pub env_name: String,
    pub spec_type_id: i64,
    #[serde(default)]
    pub spec_type_name: String,
    pub number: i64,
    #[serde(flatten)]
    pub audit: AuditFields,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub org_code: String,
    #[serde(default)]
    pub parent_org_id: i64,
    #[serde(default)]
    pub user_worker_number: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub work_number: String,
    #[serde(default)]
    pub real_name: String,
    pub username: String,
    #[serde(default)]
    pub org_id: i64,
    #[serde(default)]
    pub org: Organization,
    #[serde(default, rename = "rules")]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub extensions: HashMap<String, String>,
    #[serde(default)]
    pub last_visit_at: Option<String>,
    #[serde(flatten)]
    pub audit: AuditFields,
}

/// A cluster zone inside an environment.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Zone {
    pub id: i64,
    pub name: String,
    pub env_id: i64,
    pub env_name: String,
    /// Api server endpoint of the zone's cluster.
    #[serde(default)]
    pub k8s: String,
    #[serde(default)]
    pub k8s_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub audit: AuditFields,
}
