use k8s_openapi::api::core::v1::{
    Container, EnvVar, LocalObjectReference, Pod, PodDNSConfig, PodSecurityContext, PodSpec,
};
use kube::api::ObjectMeta;
use log::{debug, warn};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::quota::ResourceQuota;
use crate::models::request::{DeploymentRequest, EnvironmentTier};
use crate::utils::config::DeploymentContext;
use crate::utils::error::{Error, PartialParseWarning};
use crate::workload::defaults;
use crate::workload::naming;
use crate::workload::quota::resolve as resolve_quota;
use crate::workload::sysctl::SysctlParser;

const JAVA_TOOLS_OPTIONS: &str = "JAVA_TOOLS_OPTIONS";
const RESERVED_ENV: [&str; 8] = [
    "APP_ID",
    "APP_NAME",
    "INSTANCE_NAME",
    "ENV",
    "TZ",
    "LANG",
    "LC_ALL",
    JAVA_TOOLS_OPTIONS,
];
const ENV_NAME_PATTERN: &str = r"^[-._a-zA-Z][-._a-zA-Z0-9]*$";

const IMAGE_PULL_POLICY: &str = "IfNotPresent";
const RESTART_POLICY: &str = "Always";

/// A complete Pod manifest for one deployment attempt. Built once, never
/// mutated, and handed to the gateway by value.
#[derive(Debug, PartialEq)]
pub struct WorkloadDescriptor {
    pod: Pod,
    warnings: Vec<PartialParseWarning>,
}

impl WorkloadDescriptor {
    pub fn pod(&self) -> &Pod {
        &self.pod
    }

    pub fn name(&self) -> &str {
        self.pod.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.pod.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Optional inputs that were dropped while building.
    pub fn warnings(&self) -> &[PartialParseWarning] {
        &self.warnings
    }

    pub fn into_pod(self) -> Pod {
        self.pod
    }
}

/// Composes naming, quota resolution and the default attachments into a
/// `WorkloadDescriptor`. Holds no mutable state and may be shared freely.
#[derive(Debug, Clone)]
pub struct WorkloadBuilder {
    context: DeploymentContext,
    sysctl_parser: SysctlParser,
    env_name_pattern: Regex,
}

impl WorkloadBuilder {
    pub fn new(context: DeploymentContext) -> Result<Self, Error> {
        Ok(WorkloadBuilder {
            context,
            sysctl_parser: SysctlParser::new()?,
            env_name_pattern: Regex::new(ENV_NAME_PATTERN)?,
        })
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    /// Builds the Pod for `request`, failing on the first missing required field.
    pub fn build(&self, request: &DeploymentRequest) -> Result<WorkloadDescriptor, Error> {
        let quota = validate(request)?;
        debug!(
            "Building workload {} for app {} ({})",
            request.pod_name, request.app_name, request.app_id
        );

        let mut warnings = Vec::new();

        let sysctls = match request.sysctl_spec.as_deref() {
            Some(spec) => {
                let (sysctls, mut dropped) = self.sysctl_parser.parse(spec);
                warnings.append(&mut dropped);
                sysctls
            }
            None => Vec::new(),
        };

        let mut env = self.environment_variables(request, quota);
        if let Some(env_json) = request.env_json.as_deref() {
            let (mut extra, mut dropped) = parse_extra_env(env_json, &self.env_name_pattern)?;
            env.append(&mut extra);
            warnings.append(&mut dropped);
        }

        let tier = EnvironmentTier::from_environment_name(&self.context.environment);
        let (volumes, volume_mounts) = defaults::default_volumes_and_mounts();

        let container = Container {
            name: naming::container_name(&request.app_name),
            image: Some(request.image.clone()),
            image_pull_policy: Some(IMAGE_PULL_POLICY.to_owned()),
            env: Some(env),
            resources: Some(resolve_quota(quota, tier, request.oversubscribe_memory)),
            volume_mounts: Some(volume_mounts),
            readiness_probe: Some(defaults::default_readiness_probe()),
            ..Container::default()
        };

        let (dns_policy, dns_config) = match request.dns_override.as_deref().map(str::trim) {
            Some(nameserver) if !nameserver.is_empty() => (
                "None",
                Some(PodDNSConfig {
                    nameservers: Some(vec![nameserver.to_owned()]),
                    ..PodDNSConfig::default()
                }),
            ),
            _ => ("Default", None),
        };

        let host_aliases = if self.context.legacy_host_aliases {
            defaults::legacy_host_aliases()
        } else {
            defaults::default_host_aliases()
        };

        let scope = quota.scope();
        let spec = PodSpec {
            hostname: Some(naming::hostname(&request.pod_name)),
            priority_class_name: if scope.is_empty() { None } else { Some(scope) },
            dns_policy: Some(dns_policy.to_owned()),
            dns_config,
            volumes: Some(volumes),
            image_pull_secrets: Some(vec![LocalObjectReference {
                name: Some(self.context.image_pull_secret.clone()),
            }]),
            containers: vec![container],
            restart_policy: Some(RESTART_POLICY.to_owned()),
            security_context: if sysctls.is_empty() {
                None
            } else {
                Some(PodSecurityContext {
                    sysctls: Some(sysctls),
                    ..PodSecurityContext::default()
                })
            },
            host_aliases: Some(host_aliases),
            ..PodSpec::default()
        };

        let namespace = request
            .namespace
            .clone()
            .filter(|namespace| !namespace.is_empty())
            .unwrap_or_else(|| self.context.namespace.clone());

        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(request.pod_name.clone()),
                namespace: Some(namespace),
                labels: Some(labels(request)),
                ..ObjectMeta::default()
            },
            spec: Some(spec),
            status: None,
        };

        Ok(WorkloadDescriptor { pod, warnings })
    }

    fn environment_variables(
        &self,
        request: &DeploymentRequest,
        quota: &dyn ResourceQuota,
    ) -> Vec<EnvVar> {
        let mut env = vec![
            env_var("APP_ID", &request.app_id),
            env_var("APP_NAME", &request.app_name),
            env_var("INSTANCE_NAME", &request.pod_name),
            env_var("ENV", &naming::environment_label(&self.context.environment)),
        ];
        env.append(&mut defaults::default_locale_env());

        let quota_opts = quota.java_opts();
        let request_opts = request.java_opts.as_deref().unwrap_or_default();
        let java_opts: Vec<&str> = vec![quota_opts.trim(), request_opts.trim()]
            .into_iter()
            .filter(|opts| !opts.is_empty())
            .collect();
        if !java_opts.is_empty() {
            env.push(env_var(JAVA_TOOLS_OPTIONS, &java_opts.join(" ")));
        }

        env
    }
}

fn validate(request: &DeploymentRequest) -> Result<&dyn ResourceQuota, Error> {
    let required = [
        ("appID", &request.app_id),
        ("appName", &request.app_name),
        ("image", &request.image),
        ("podName", &request.pod_name),
    ];
    for (field, value) in required.iter() {
        if value.trim().is_empty() {
            return Err(Error::ValidationError(format!("{} must not be empty", field)));
        }
    }

    let quota = match request.quota.as_deref() {
        Some(quota) => quota,
        None => return Err(Error::ValidationError("quota is required".to_owned())),
    };

    let quantities = [
        ("requestCPU", quota.request_cpu()),
        ("requestMemory", quota.request_memory()),
        ("limitCPU", quota.limit_cpu()),
        ("limitMemory", quota.limit_memory()),
    ];
    for (field, quantity) in quantities.iter() {
        if quantity.0.trim().is_empty() {
            return Err(Error::QuotaResolutionError(format!(
                "{} of the {} quota is empty",
                field,
                quota.scope()
            )));
        }
    }

    Ok(quota)
}

fn labels(request: &DeploymentRequest) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_owned(), request.app_name.clone());
    labels.insert("appid".to_owned(), request.app_id.clone());
    labels.insert("instance".to_owned(), request.pod_name.clone());
    labels.insert("ip".to_owned(), request.pod_ip.clone());
    labels
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value: Some(value.to_owned()),
        value_from: None,
    }
}

/// Extra variables from a JSON object, in key order. Reserved or invalid names
/// and non-scalar values are dropped with a warning.
fn parse_extra_env(
    env_json: &str,
    name_pattern: &Regex,
) -> Result<(Vec<EnvVar>, Vec<PartialParseWarning>), Error> {
    if env_json.trim().is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let object: BTreeMap<String, Value> = match serde_json::from_str::<Value>(env_json) {
        Ok(Value::Object(object)) => object.into_iter().collect(),
        Ok(_) => {
            return Err(Error::ValidationError(
                "envJson must be a JSON object".to_owned(),
            ))
        }
        Err(err) => {
            return Err(Error::ValidationError(format!(
                "envJson is not valid JSON: {}",
                err
            )))
        }
    };

    let mut env = Vec::new();
    let mut warnings = Vec::new();

    for (name, value) in object.iter() {
        let value = match value {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        };

        let reason = if RESERVED_ENV.contains(&name.as_str()) {
            "name is reserved"
        } else if !name_pattern.is_match(name) {
            "invalid variable name"
        } else if let Some(value) = value {
            env.push(env_var(name, &value));
            continue;
        } else {
            "value must be a string, number or boolean"
        };

        let warning = PartialParseWarning::new("envJson", name, reason);
        warn!("{}", warning);
        warnings.push(warning);
    }

    Ok((env, warnings))
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::sync::Arc;

    use super::{WorkloadBuilder, WorkloadDescriptor};
    use crate::models::quota::StaticQuota;
    use crate::models::request::DeploymentRequest;
    use crate::utils::config::DeploymentContext;
    use crate::utils::error::Error;

    fn quota(java_opts: &str) -> StaticQuota {
        StaticQuota {
            request_cpu: "500m".to_string(),
            request_memory: "1Gi".to_string(),
            limit_cpu: "2".to_string(),
            limit_memory: "4Gi".to_string(),
            scope: "high-priority".to_string(),
            java_opts: java_opts.to_string(),
        }
    }

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            app_id: "100234".to_string(),
            app_name: "order\\.service".to_string(),
            image: "registry.local/order:1.4.2".to_string(),
            quota: Some(Arc::new(quota("-Xmx3g"))),
            pod_name: "order\\.service-0".to_string(),
            pod_ip: "10.2.3.4".to_string(),
            ..DeploymentRequest::default()
        }
    }

    fn build(environment: &str, request: &DeploymentRequest) -> Result<WorkloadDescriptor, Error> {
        WorkloadBuilder::new(DeploymentContext::new(environment))
            .unwrap()
            .build(request)
    }

    fn env_of(pod: &Pod) -> Vec<(String, String)> {
        pod.spec.as_ref().unwrap().containers[0]
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn can_build_descriptor() {
        let descriptor = build("fat2", &request()).unwrap();
        let pod = descriptor.pod();
        let spec = pod.spec.as_ref().unwrap();
        let labels = pod.metadata.labels.as_ref().unwrap();

        assert_eq!(descriptor.name(), "order\\.service-0");
        assert_eq!(descriptor.namespace(), "default");
        assert_eq!(labels["instance"], descriptor.name());
        assert_eq!(labels["appid"], "100234");
        assert_eq!(labels["ip"], "10.2.3.4");
        assert_eq!(spec.hostname, Some("orderservice-0".to_string()));
        assert_eq!(spec.priority_class_name, Some("high-priority".to_string()));
        assert_eq!(spec.restart_policy, Some("Always".to_string()));
        assert_eq!(spec.containers.len(), 1);
        assert_eq!(spec.volumes.as_ref().unwrap().len(), 7);
        assert_eq!(
            spec.image_pull_secrets.as_ref().unwrap()[0].name,
            Some("dockeryardkey".to_string())
        );

        let container = &spec.containers[0];
        assert_eq!(container.name, "order-service");
        assert_eq!(container.image_pull_policy, Some("IfNotPresent".to_string()));
        assert_eq!(container.volume_mounts.as_ref().unwrap().len(), 7);
        assert_eq!(container.readiness_probe.is_some(), true);
    }

    #[test]
    fn env_follows_fixed_order() {
        let descriptor = build("fat2", &request()).unwrap();

        assert_eq!(
            env_of(descriptor.pod()),
            vec![
                ("APP_ID".to_string(), "100234".to_string()),
                ("APP_NAME".to_string(), "order\\.service".to_string()),
                ("INSTANCE_NAME".to_string(), "order\\.service-0".to_string()),
                ("ENV".to_string(), "fat".to_string()),
                ("TZ".to_string(), "Asia/Shanghai".to_string()),
                ("LANG".to_string(), "en_US.UTF-8".to_string()),
                ("LC_ALL".to_string(), "en_US.UTF-8".to_string()),
                ("JAVA_TOOLS_OPTIONS".to_string(), "-Xmx3g".to_string()),
            ]
        );
    }

    #[test]
    fn java_options_are_omitted_when_empty() {
        let mut request = request();
        request.quota = Some(Arc::new(quota("")));

        let descriptor = build("uat", &request).unwrap();
        let env = env_of(descriptor.pod());

        assert_eq!(env.len(), 7);
        assert_eq!(env[3], ("ENV".to_string(), "uat".to_string()));
    }

    #[test]
    fn request_java_options_are_appended() {
        let mut request = request();
        request.java_opts = Some("-XX:+UseG1GC".to_string());

        let descriptor = build("uat", &request).unwrap();
        let env = env_of(descriptor.pod());

        assert_eq!(
            env[7],
            ("JAVA_TOOLS_OPTIONS".to_string(), "-Xmx3g -XX:+UseG1GC".to_string())
        );
    }

    #[test]
    fn production_requests_full_memory() {
        let descriptor = build("production", &request()).unwrap();
        let resources = descriptor.pod().spec.as_ref().unwrap().containers[0]
            .resources
            .clone()
            .unwrap();

        assert_eq!(resources.requests.unwrap()["memory"], Quantity("4Gi".to_string()));
    }

    #[test]
    fn dns_override_switches_policy() {
        let mut request = request();
        let descriptor = build("uat", &request).unwrap();
        let spec = descriptor.pod().spec.clone().unwrap();
        assert_eq!(spec.dns_policy, Some("Default".to_string()));
        assert_eq!(spec.dns_config, None);

        request.dns_override = Some("10.0.0.53".to_string());
        let descriptor = build("uat", &request).unwrap();
        let spec = descriptor.pod().spec.clone().unwrap();
        assert_eq!(spec.dns_policy, Some("None".to_string()));
        assert_eq!(
            spec.dns_config.unwrap().nameservers,
            Some(vec!["10.0.0.53".to_string()])
        );
    }

    #[test]
    fn malformed_sysctls_are_reported_not_fatal() {
        let mut request = request();
        request.sysctl_spec = Some("net.core.x = 1, malformed, net.ipv4.y=2".to_string());

        let descriptor = build("uat", &request).unwrap();
        let sysctls = descriptor
            .pod()
            .spec
            .clone()
            .unwrap()
            .security_context
            .unwrap()
            .sysctls
            .unwrap();

        assert_eq!(sysctls.len(), 2);
        assert_eq!(descriptor.warnings().len(), 1);
    }

    #[test]
    fn blank_required_fields_fail_validation() {
        let blanks = ["", " "];
        let fields = ["appID", "appName", "image", "podName"];

        for field in fields.iter() {
            for blank in blanks.iter() {
                let mut request = request();
                let value = match *field {
                    "appID" => &mut request.app_id,
                    "appName" => &mut request.app_name,
                    "image" => &mut request.image,
                    _ => &mut request.pod_name,
                };
                *value = blank.to_string();

                match build("uat", &request) {
                    Err(Error::ValidationError(message)) => {
                        assert_eq!(message, format!("{} must not be empty", field))
                    }
                    other => panic!("{} = {:?} was accepted: {:?}", field, blank, other),
                }
            }
        }
    }

    #[test]
    fn missing_quota_fails_validation() {
        let mut request = request();
        request.quota = None;

        assert!(matches!(build("uat", &request), Err(Error::ValidationError(_))));
    }

    #[test]
    fn empty_quota_quantity_fails_resolution() {
        let mut request = request();
        let mut empty = quota("");
        empty.limit_memory = String::new();
        request.quota = Some(Arc::new(empty));

        assert!(matches!(
            build("uat", &request),
            Err(Error::QuotaResolutionError(_))
        ));
    }

    #[test]
    fn extra_env_is_appended_in_key_order() {
        let mut request = request();
        request.env_json = Some(
            r#"{ "SPRING_PROFILE": "uat", "APP_ID": "x", "POOL": 8, "TAGS": ["a"] }"#.to_string(),
        );

        let descriptor = build("uat", &request).unwrap();
        let env = env_of(descriptor.pod());

        assert_eq!(env[8], ("POOL".to_string(), "8".to_string()));
        assert_eq!(env[9], ("SPRING_PROFILE".to_string(), "uat".to_string()));
        assert_eq!(env.len(), 10);
        assert_eq!(descriptor.warnings().len(), 2);
        assert_eq!(descriptor.warnings()[0].entry, "APP_ID");
        assert_eq!(descriptor.warnings()[1].entry, "TAGS");
    }

    #[test]
    fn extra_env_order_ignores_document_order() {
        let mut request = request();
        request.env_json = Some(r#"{ "ZONE": "b", "ALPHA": "1", "MIDDLE": "m" }"#.to_string());

        let descriptor = build("uat", &request).unwrap();
        let names: Vec<String> = env_of(descriptor.pod())
            .into_iter()
            .skip(8)
            .map(|(name, _)| name)
            .collect();

        assert_eq!(names, vec!["ALPHA", "MIDDLE", "ZONE"]);
    }

    #[test]
    fn env_json_must_be_an_object() {
        let mut request = request();
        request.env_json = Some("[1, 2]".to_string());

        assert!(matches!(build("uat", &request), Err(Error::ValidationError(_))));
    }

    #[test]
    fn legacy_host_aliases_can_be_selected() {
        let mut context = DeploymentContext::new("uat");
        context.legacy_host_aliases = true;

        let descriptor = WorkloadBuilder::new(context)
            .unwrap()
            .build(&request())
            .unwrap();
        let aliases = descriptor.pod().spec.clone().unwrap().host_aliases.unwrap();

        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases[1].ip, Some("127.0.0.1".to_string()));
        assert_eq!(aliases[1].hostnames, None);
    }

    #[test]
    fn builds_are_deterministic() {
        let mut request = request();
        request.sysctl_spec = Some("net.core.somaxconn=1024".to_string());
        request.env_json = Some(r#"{ "B": "2", "A": "1" }"#.to_string());

        assert_eq!(build("uat", &request).unwrap(), build("uat", &request).unwrap());
    }
}
