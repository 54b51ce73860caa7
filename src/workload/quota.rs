use k8s_openapi::api::core::v1::ResourceRequirements;
use std::collections::BTreeMap;

use crate::models::quota::ResourceQuota;
use crate::models::request::EnvironmentTier;

/// Turns a quota into container resource requirements.
///
/// Limits and the CPU request come straight from the quota in every tier.
/// Production reserves the full memory limit unless `oversubscribe_memory` is
/// set; other tiers always request the quota's memory request.
pub fn resolve(
    quota: &dyn ResourceQuota,
    tier: EnvironmentTier,
    oversubscribe_memory: bool,
) -> ResourceRequirements {
    let mut limits = BTreeMap::new();
    limits.insert("cpu".to_owned(), quota.limit_cpu());
    limits.insert("memory".to_owned(), quota.limit_memory());

    let request_memory = match tier {
        EnvironmentTier::Production if !oversubscribe_memory => quota.limit_memory(),
        _ => quota.request_memory(),
    };

    let mut requests = BTreeMap::new();
    requests.insert("cpu".to_owned(), quota.request_cpu());
    requests.insert("memory".to_owned(), request_memory);

    ResourceRequirements {
        limits: Some(limits),
        requests: Some(requests),
    }
}
