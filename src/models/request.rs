use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::quota::{ResourceQuota, StaticQuota};

/// Resource policy class of the target environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentTier {
    Production,
    NonProduction,
}

impl EnvironmentTier {
    /// Only an environment literally named `production` (any case) is production.
    pub fn from_environment_name(environment: &str) -> Self {
        if environment.eq_ignore_ascii_case("production") {
            EnvironmentTier::Production
        } else {
            EnvironmentTier::NonProduction
        }
    }
}

/// Everything the caller knows about one deployment attempt.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRequest {
    pub app_id: String,
    pub app_name: String,
    pub image: String,
    pub quota: Option<Arc<dyn ResourceQuota>>,

    /// Overrides the namespace of the deployment context.
    pub namespace: Option<String>,

    pub dns_override: Option<String>,

    /// Comma separated `key=value` kernel parameters.
    pub sysctl_spec: Option<String>,

    /// JSON object of extra environment variables.
    pub env_json: Option<String>,

    pub oversubscribe_memory: bool,

    pub pod_name: String,
    pub pod_ip: String,

    /// Appended to the quota's JVM options.
    pub java_opts: Option<String>,
}

/// Serialized form of a `DeploymentRequest`, as submitted by the service layer.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestManifest {
    #[serde(rename = "appID")]
    pub app_id: String,
    pub app_name: String,
    pub image: String,
    pub quota: Option<StaticQuota>,
    pub namespace: Option<String>,
    pub dns_override: Option<String>,
    pub sysctl_spec: Option<String>,
    pub env_json: Option<String>,
    #[serde(default)]
    pub oversubscribe_memory: bool,
    pub pod_name: String,
    #[serde(rename = "podIP", default)]
    pub pod_ip: String,
    pub java_opts: Option<String>,
}

impl From<RequestManifest> for DeploymentRequest {
    fn from(manifest: RequestManifest) -> Self {
        DeploymentRequest {
            app_id: manifest.app_id,
            app_name: manifest.app_name,
            image: manifest.image,
            quota: manifest
                .quota
                .map(|quota| Arc::new(quota) as Arc<dyn ResourceQuota>),
            namespace: manifest.namespace,
            dns_override: manifest.dns_override,
            sysctl_spec: manifest.sysctl_spec,
            env_json: manifest.env_json,
            oversubscribe_memory: manifest.oversubscribe_memory,
            pod_name: manifest.pod_name,
            pod_ip: manifest.pod_ip,
            java_opts: manifest.java_opts,
        }
    }
}
