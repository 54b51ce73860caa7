use k8s_openapi::api::core::v1::Pod;
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::controllers::cmdb::Cmdb;
use crate::controllers::gateway::{OrchestratorGateway, LOG_LIMIT_BYTES, LOG_TAIL_LINES};
use crate::models::cmdb::App;
use crate::models::quota::{InstanceQuota, ResourceQuota};
use crate::models::request::DeploymentRequest;
use crate::utils::error::Error;
use crate::workload::builder::WorkloadBuilder;

/// Where and how one instance of an app should run.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancePlacement {
    pub app_id: String,
    pub image: String,
    pub pod_name: String,
    pub pod_ip: String,
    /// Priority class the instance is charged against.
    pub scope: String,
    pub java_opts: String,
    pub oversubscribe_memory: bool,
}

pub struct DeploymentController<C: Cmdb> {
    cmdb: C,
    builder: WorkloadBuilder,
    gateway: OrchestratorGateway,
}

impl<C: Cmdb> DeploymentController<C> {
    pub fn new(cmdb: C, builder: WorkloadBuilder, gateway: OrchestratorGateway) -> Self {
        DeploymentController {
            cmdb,
            builder,
            gateway,
        }
    }

    /// Builds a fresh descriptor for `request` and submits it. Retrying means
    /// calling this again; descriptors are never reused.
    ///
    /// # Arguments
    /// - `request` - The deployment request. Without a DNS override the
    /// nameserver of the environment's CMDB record is used, if it has one.
    pub async fn deploy(&self, mut request: DeploymentRequest) -> Result<Pod, Error> {
        if request.dns_override.is_none() {
            request.dns_override =
                environment_dns(&self.cmdb, &self.builder.context().environment).await?;
        }

        let descriptor = self.builder.build(&request)?;
        if !descriptor.warnings().is_empty() {
            info!(
                "Deploying {} with {} ignored input entries",
                descriptor.name(),
                descriptor.warnings().len()
            );
        }

        self.gateway.create(descriptor).await
    }

    /// Looks the app and its quota up in the CMDB and deploys one instance.
    pub async fn deploy_app(&self, placement: &InstancePlacement) -> Result<Pod, Error> {
        let app = match self.cmdb.fetch_app_by_app_id(&placement.app_id).await? {
            Some(app) => app,
            None => return Err(Error::NotFound(format!("app {}", placement.app_id))),
        };

        let quota = resolve_app_quota(
            &self.cmdb,
            &placement.app_id,
            &self.builder.context().environment,
            &placement.scope,
            &placement.java_opts,
        )
        .await?;

        self.deploy(request_for(&app, placement, Arc::new(quota)))
            .await
    }

    /// Removes an instance.
    ///
    /// # Arguments
    /// - `namespace` - Namespace the instance lives in
    /// - `pod_name` - Name of the instance
    /// - `graceful` - `false` kills the pod without a termination grace period
    pub async fn undeploy(&self, namespace: &str, pod_name: &str, graceful: bool) -> Result<(), Error> {
        self.gateway.delete(namespace, pod_name, graceful).await
    }

    /// Every instance of `app_name` in `namespace`.
    pub async fn app_instances(&self, namespace: &str, app_name: &str) -> Result<Vec<Pod>, Error> {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_owned(), app_name.to_owned());
        self.gateway.list(namespace, &labels).await
    }

    /// The instance's log, up to the standard line and byte caps.
    pub async fn instance_logs(&self, namespace: &str, pod_name: &str) -> Result<String, Error> {
        self.gateway
            .get_logs(namespace, pod_name, LOG_TAIL_LINES, LOG_LIMIT_BYTES)
            .await
    }
}

/// Quota for `app_id` in `environment`, sized by the instance spec the CMDB
/// assigns it. A missing quota row or spec is a validation failure, not a
/// transport one.
pub async fn resolve_app_quota<C: Cmdb + ?Sized>(
    cmdb: &C,
    app_id: &str,
    environment: &str,
    scope: &str,
    java_opts: &str,
) -> Result<InstanceQuota, Error> {
    let quotas = cmdb
        .fetch_app_quotas_by_app_and_env(app_id, environment)
        .await?;
    let quota = match quotas.into_iter().next() {
        Some(quota) => quota,
        None => {
            return Err(Error::ValidationError(format!(
                "app {} has no quota in {}",
                app_id, environment
            )))
        }
    };
    debug!(
        "App {} uses instance spec {} in {}",
        app_id, quota.spec_type_id, environment
    );

    let specs = cmdb.fetch_instance_specs().await?;
    let spec = match specs.into_iter().find(|spec| spec.id == quota.spec_type_id) {
        Some(spec) => spec,
        None => {
            return Err(Error::ValidationError(format!(
                "quota of app {} references unknown instance spec {}",
                app_id, quota.spec_type_id
            )))
        }
    };

    let sizes = [("cpu", spec.cpu), ("memory", spec.memory)];
    for (field, size) in sizes.iter() {
        if !size.is_finite() || *size <= 0.0 {
            return Err(Error::ValidationError(format!(
                "instance spec {} has unusable {} size {}",
                spec.id, field, size
            )));
        }
    }

    Ok(InstanceQuota::new(spec, scope, java_opts))
}

/// Nameserver configured for `environment`, if any.
pub async fn environment_dns<C: Cmdb + ?Sized>(
    cmdb: &C,
    environment: &str,
) -> Result<Option<String>, Error> {
    let environments = cmdb.fetch_environments().await?;
    Ok(environments
        .into_iter()
        .find(|env| env.name == environment)
        .map(|env| env.dns)
        .filter(|dns| !dns.trim().is_empty()))
}

fn request_for(
    app: &App,
    placement: &InstancePlacement,
    quota: Arc<dyn ResourceQuota>,
) -> DeploymentRequest {
    DeploymentRequest {
        app_id: placement.app_id.clone(),
        app_name: app.name.clone(),
        image: placement.image.clone(),
        quota: Some(quota),
        oversubscribe_memory: placement.oversubscribe_memory,
        pod_name: placement.pod_name.clone(),
        pod_ip: placement.pod_ip.clone(),
        ..DeploymentRequest::default()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::{environment_dns, request_for, resolve_app_quota, InstancePlacement};
    use crate::controllers::cmdb::Cmdb;
    use crate::models::cmdb::{
        App, AppQuota, AuditFields, Environment, InstanceSpec, Organization, User, Zone,
    };
    use crate::models::quota::ResourceQuota;
    use crate::utils::error::Error;

    struct FakeCmdb {
        quotas: Vec<AppQuota>,
        specs: Vec<InstanceSpec>,
        environments: Vec<Environment>,
    }

    #[async_trait]
    impl Cmdb for FakeCmdb {
        async fn fetch_all_apps(&self) -> Result<Vec<App>, Error> {
            Ok(Vec::new())
        }

        async fn fetch_apps_by_user_name(&self, _user_name: &str) -> Result<Vec<App>, Error> {
            Ok(Vec::new())
        }

        async fn fetch_instance_specs(&self) -> Result<Vec<InstanceSpec>, Error> {
            Ok(self.specs.clone())
        }

        async fn fetch_app_quotas_by_app_and_env(
            &self,
            app_id: &str,
            env: &str,
        ) -> Result<Vec<AppQuota>, Error> {
            Ok(self
                .quotas
                .iter()
                .filter(|quota| quota.app_id == app_id && quota.env_name == env)
                .cloned()
                .collect())
        }

        async fn fetch_environments(&self) -> Result<Vec<Environment>, Error> {
            Ok(self.environments.clone())
        }

        async fn fetch_organizations(&self) -> Result<Vec<Organization>, Error> {
            Ok(Vec::new())
        }

        async fn fetch_app_by_app_id(&self, _app_id: &str) -> Result<Option<App>, Error> {
            Ok(None)
        }

        async fn search_users_by_user_name(&self, _user_name: &str) -> Result<Vec<User>, Error> {
            Ok(Vec::new())
        }

        async fn update_app_member(
            &self,
            _app_id: &str,
            _developers: &str,
            _testers: &str,
        ) -> Result<bool, Error> {
            Ok(false)
        }

        async fn fetch_zones_by_env(&self, _env: &str) -> Result<Vec<Zone>, Error> {
            Ok(Vec::new())
        }

        async fn fetch_all_zones(&self) -> Result<Vec<Zone>, Error> {
            Ok(Vec::new())
        }
    }

    fn app_quota(spec_type_id: i64) -> AppQuota {
        AppQuota {
            id: 1,
            app_id: "100234".to_string(),
            app_name: "order.service".to_string(),
            env_id: 2,
            org_id: 0,
            org_name: String::new(),
            env_name: "fat1".to_string(),
            spec_type_id,
            spec_type_name: "2c4g".to_string(),
            number: 2,
            audit: AuditFields::default(),
        }
    }

    fn environment(name: &str, dns: &str) -> Environment {
        Environment {
            id: 1,
            cmdb_env_id: 11,
            name: name.to_string(),
            nginx: String::new(),
            dns: dns.to_string(),
            docker_yard: String::new(),
            is_in_use: true,
            enable_ha: false,
            description: String::new(),
            insert_time: None,
        }
    }

    fn cmdb() -> FakeCmdb {
        FakeCmdb {
            quotas: vec![app_quota(3)],
            specs: vec![InstanceSpec {
                id: 3,
                name: "2c4g".to_string(),
                cpu: 2.0,
                memory: 4.0,
                disk: 50.0,
            }],
            environments: vec![environment("fat1", "10.0.0.53"), environment("uat", "")],
        }
    }

    #[test]
    fn can_resolve_quota_from_instance_spec() {
        let quota =
            tokio_test::block_on(resolve_app_quota(&cmdb(), "100234", "fat1", "high", "-Xmx3g"))
                .unwrap();

        assert_eq!(quota.limit_cpu(), Quantity("2000m".to_string()));
        assert_eq!(quota.limit_memory(), Quantity("4096Mi".to_string()));
        assert_eq!(quota.scope(), "high");
    }

    #[test]
    fn missing_quota_is_a_validation_error() {
        let result = tokio_test::block_on(resolve_app_quota(&cmdb(), "100234", "uat", "high", ""));

        assert!(matches!(result, Err(Error::ValidationError(_))));
    }

    #[test]
    fn unknown_instance_spec_is_a_validation_error() {
        let mut cmdb = cmdb();
        cmdb.quotas = vec![app_quota(9)];

        let result = tokio_test::block_on(resolve_app_quota(&cmdb, "100234", "fat1", "high", ""));

        assert!(matches!(result, Err(Error::ValidationError(_))));
    }

    #[test]
    fn unusable_instance_sizes_are_validation_errors() {
        let sizes = [
            (0.0, 4.0),
            (-1.0, 4.0),
            (2.0, 0.0),
            (2.0, -4.0),
            (f32::NAN, 4.0),
            (2.0, f32::INFINITY),
        ];

        for (cpu, memory) in sizes.iter() {
            let mut cmdb = cmdb();
            cmdb.specs[0].cpu = *cpu;
            cmdb.specs[0].memory = *memory;

            let result =
                tokio_test::block_on(resolve_app_quota(&cmdb, "100234", "fat1", "high", ""));

            assert!(
                matches!(result, Err(Error::ValidationError(_))),
                "cpu {} memory {} was accepted",
                cpu,
                memory
            );
        }
    }

    #[test]
    fn environment_dns_skips_blank_entries() {
        let cmdb = cmdb();

        assert_eq!(
            tokio_test::block_on(environment_dns(&cmdb, "fat1")).unwrap(),
            Some("10.0.0.53".to_string())
        );
        assert_eq!(tokio_test::block_on(environment_dns(&cmdb, "uat")).unwrap(), None);
        assert_eq!(tokio_test::block_on(environment_dns(&cmdb, "dev")).unwrap(), None);
    }

    #[test]
    fn request_takes_app_name_from_cmdb() {
        let app = App {
            id: 5,
            name: "order.service".to_string(),
            description: String::new(),
            service_type: String::new(),
            app_type: String::new(),
            owner: String::new(),
            developer: String::new(),
            developer_names: String::new(),
            tester: String::new(),
            tester_names: String::new(),
            department: String::new(),
            department_code: String::new(),
            cmdb_app_id: "100234".to_string(),
            enable_ha: false,
            env_url_map: HashMap::new(),
            insert_time: None,
            update_time: None,
        };
        let placement = InstancePlacement {
            app_id: "100234".to_string(),
            image: "registry.local/order:1.4.2".to_string(),
            pod_name: "order-service-0".to_string(),
            pod_ip: "10.2.3.4".to_string(),
            scope: "high".to_string(),
            java_opts: String::new(),
            oversubscribe_memory: true,
        };
        let quota = tokio_test::block_on(resolve_app_quota(&cmdb(), "100234", "fat1", "high", ""))
            .unwrap();

        let request = request_for(&app, &placement, Arc::new(quota));

        assert_eq!(request.app_name, "order.service");
        assert_eq!(request.pod_name, "order-service-0");
        assert_eq!(request.oversubscribe_memory, true);
        assert_eq!(request.dns_override, None);
    }
}
