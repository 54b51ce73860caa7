use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::cmdb::InstanceSpec;

/// Capability exposed by anything that can back a workload with resources.
pub trait ResourceQuota: Debug + Send + Sync {
    fn request_cpu(&self) -> Quantity;

    fn request_memory(&self) -> Quantity;

    fn limit_cpu(&self) -> Quantity;

    fn limit_memory(&self) -> Quantity;

    /// Priority class the resources are charged against.
    fn scope(&self) -> String;

    fn java_opts(&self) -> String;
}

/// Quota given directly as orchestrator quantity strings, e.g. `500m` / `1Gi`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaticQuota {
    pub request_cpu: String,
    pub request_memory: String,
    pub limit_cpu: String,
    pub limit_memory: String,
    pub scope: String,
    #[serde(default)]
    pub java_opts: String,
}

impl ResourceQuota for StaticQuota {
    fn request_cpu(&self) -> Quantity {
        Quantity(self.request_cpu.clone())
    }

    fn request_memory(&self) -> Quantity {
        Quantity(self.request_memory.clone())
    }

    fn limit_cpu(&self) -> Quantity {
        Quantity(self.limit_cpu.clone())
    }

    fn limit_memory(&self) -> Quantity {
        Quantity(self.limit_memory.clone())
    }

    fn scope(&self) -> String {
        self.scope.clone()
    }

    fn java_opts(&self) -> String {
        self.java_opts.clone()
    }
}

/// Quota derived from a CMDB instance spec. The spec sizes the limits
/// (CPU in cores, memory in GiB); requests are the limits scaled by `request_ratio`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceQuota {
    spec: InstanceSpec,
    scope: String,
    java_opts: String,
    request_ratio: f32,
}

impl InstanceQuota {
    pub fn new(spec: InstanceSpec, scope: &str, java_opts: &str) -> Self {
        InstanceQuota {
            spec,
            scope: scope.to_owned(),
            java_opts: java_opts.to_owned(),
            request_ratio: 1.0,
        }
    }

    /// Ratio is clamped to `(0, 1]`; anything else keeps request == limit.
    pub fn with_request_ratio(mut self, request_ratio: f32) -> Self {
        if request_ratio > 0.0 && request_ratio <= 1.0 {
            self.request_ratio = request_ratio;
        }
        self
    }

    fn millicores(cores: f32) -> Quantity {
        Quantity(format!("{}m", (cores * 1000.0).round() as i64))
    }

    fn mebibytes(gibibytes: f32) -> Quantity {
        Quantity(format!("{}Mi", (gibibytes * 1024.0).round() as i64))
    }
}

impl ResourceQuota for InstanceQuota {
    fn request_cpu(&self) -> Quantity {
        Self::millicores(self.spec.cpu * self.request_ratio)
    }

    fn request_memory(&self) -> Quantity {
        Self::mebibytes(self.spec.memory * self.request_ratio)
    }

    fn limit_cpu(&self) -> Quantity {
        Self::millicores(self.spec.cpu)
    }

    fn limit_memory(&self) -> Quantity {
        Self::mebibytes(self.spec.memory)
    }

    fn scope(&self) -> String {
        self.scope.clone()
    }

    fn java_opts(&self) -> String {
        self.java_opts.clone()
    }
}
