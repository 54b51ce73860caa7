use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{
    Api, AttachParams, DeleteParams, ListParams, LogParams, ObjectMeta, PostParams,
    PropagationPolicy,
};
use kube::config::{
    AuthInfo, Cluster, Context, KubeConfigOptions, Kubeconfig, NamedAuthInfo, NamedCluster,
    NamedContext,
};
use kube::{Client, Config};
use log::{debug, info};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout, Duration};

use crate::utils::config::DeploymentContext;
use crate::utils::error::Error;
use crate::utils::selector::label_selector;
use crate::workload::builder::WorkloadDescriptor;
use crate::workload::service::build_service;

/// Most recent lines returned by `get_logs`.
pub const LOG_TAIL_LINES: i64 = 5000;
/// Byte cap for `get_logs`.
pub const LOG_LIMIT_BYTES: i64 = 1024 * 1024;

const NODE_HOSTNAME_LABEL: &str = "kubernetes.io/hostname";
const KUBECONFIG_ENTRY: &str = "workload-builder";
const EXEC_SUCCESS: &str = "Success";

/// Thin wrapper over the cluster api. Every call is bounded by the context's
/// request timeout; nothing is retried here.
pub struct OrchestratorGateway {
    client: Client,
    request_timeout: Duration,
}

impl OrchestratorGateway {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        OrchestratorGateway {
            client,
            request_timeout,
        }
    }

    /// Connects to the api server named in `context`, or to whatever the local
    /// kubeconfig / service account points at when none is given.
    pub async fn connect(context: &DeploymentContext) -> Result<Self, Error> {
        let config = match &context.api_server {
            Some(api_server) => {
                let kubeconfig = kubeconfig_for(context, api_server);
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|err| {
                        Error::ConfigError(format!("invalid api server {:?}: {}", api_server, err))
                    })?
            }
            None => Config::infer().await.map_err(|err| {
                Error::ConfigError(format!("unable to infer cluster config: {}", err))
            })?,
        };

        let client = Client::try_from(config)?;
        Ok(OrchestratorGateway::new(
            client,
            Duration::from_secs(context.request_timeout_secs),
        ))
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: operation.to_owned(),
                seconds: self.request_timeout.as_secs(),
            }),
        }
    }

    /// Submits a freshly built workload. Not idempotent: creating the same
    /// pod twice fails with a conflict from the api server.
    pub async fn create(&self, descriptor: WorkloadDescriptor) -> Result<Pod, Error> {
        let namespace = descriptor.namespace().to_owned();
        let name = descriptor.name().to_owned();
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);

        let pod = descriptor.into_pod();
        let created = self
            .bounded("create pod", async {
                api.create(&PostParams::default(), &pod)
                    .await
                    .map_err(Error::from)
            })
            .await?;

        info!("Pod created, namespace: {}, name: {}", namespace, name);
        Ok(created)
    }

    /// Deletes a pod. A graceful delete honours the pod's termination grace
    /// period, otherwise the pod is killed immediately.
    pub async fn delete(&self, namespace: &str, name: &str, graceful: bool) -> Result<(), Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            grace_period_seconds: if graceful { None } else { Some(0) },
            ..DeleteParams::default()
        };

        self.bounded("delete pod", async {
            api.delete(name, &params)
                .await
                .map(|_| ())
                .map_err(Error::from)
        })
        .await?;

        info!(
            "Pod deleted, namespace: {}, name: {}, graceful: {}",
            namespace, name, graceful
        );
        Ok(())
    }

    /// Pods in `namespace` matching every label in `labels`.
    pub async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        self.list_pods(api, labels).await
    }

    /// Same as `list`, across all namespaces.
    pub async fn list_all(&self, labels: &BTreeMap<String, String>) -> Result<Vec<Pod>, Error> {
        let api: Api<Pod> = Api::all(self.client.clone());
        self.list_pods(api, labels).await
    }

    async fn list_pods(
        &self,
        api: Api<Pod>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, Error> {
        let selector = label_selector(labels);
        debug!("Listing pods with selector {:?}", selector);

        let params = ListParams::default().labels(&selector);
        let pods = self
            .bounded("list pods", async { api.list(&params).await.map_err(Error::from) })
            .await?;
        Ok(pods.items)
    }

    /// Runs `command` in the pod's first container and returns `(stdout, stderr)`.
    /// A command that exits unsuccessfully fails with `ExecError`.
    pub async fn exec(
        &self,
        namespace: &str,
        name: &str,
        command: Vec<String>,
    ) -> Result<(String, String), Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        debug!("Exec in {}/{}: {:?}", namespace, name, command);

        self.bounded("exec", async {
            let params = AttachParams::default().stdout(true).stderr(true);
            let mut attached = api.exec(name, command, &params).await?;

            let stdout = attached.stdout();
            let stderr = attached.stderr();
            let (stdout, stderr) = futures::try_join!(read_all(stdout), read_all(stderr))?;
            check_exec_status(attached.await)?;

            Ok::<_, Error>((stdout, stderr))
        })
        .await
    }

    /// Container log, capped at `tail_lines` lines and `max_bytes` bytes.
    pub async fn get_logs(
        &self,
        namespace: &str,
        name: &str,
        tail_lines: i64,
        max_bytes: i64,
    ) -> Result<String, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: Some(tail_lines),
            limit_bytes: Some(max_bytes),
            ..LogParams::default()
        };

        self.bounded("get logs", async {
            api.logs(name, &params).await.map_err(Error::from)
        })
        .await
    }

    pub async fn create_namespace(&self, namespace: &str) -> Result<Namespace, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let body = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_owned()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };

        let created = self
            .bounded("create namespace", async {
                api.create(&PostParams::default(), &body)
                    .await
                    .map_err(Error::from)
            })
            .await?;
        info!("Namespace created: {}", namespace);
        Ok(created)
    }

    pub async fn create_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> Result<ConfigMap, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let body = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            data: Some(data),
            ..ConfigMap::default()
        };

        let created = self
            .bounded("create config map", async {
                api.create(&PostParams::default(), &body)
                    .await
                    .map_err(Error::from)
            })
            .await?;
        info!("ConfigMap created, namespace: {}, name: {}", namespace, name);
        Ok(created)
    }

    pub async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);

        self.bounded("get config map", async {
            api.get(name).await.map_err(|err| match err {
                kube::Error::Api(response) if response.code == 404 => {
                    Error::NotFound(format!("config map {}/{}", namespace, name))
                }
                err => Error::from(err),
            })
        })
        .await
    }

    pub async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..DeleteParams::default()
        };

        self.bounded("delete config map", async {
            api.delete(name, &params)
                .await
                .map(|_| ())
                .map_err(Error::from)
        })
        .await?;
        info!("ConfigMap deleted, namespace: {}, name: {}", namespace, name);
        Ok(())
    }

    /// The node registered under `address`, if any.
    pub async fn find_node_by_address(&self, address: &str) -> Result<Option<Node>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let selector = format!("{}={}", NODE_HOSTNAME_LABEL, address);
        let params = ListParams::default().labels(&selector).limit(1);

        let nodes = self
            .bounded("find node", async { api.list(&params).await.map_err(Error::from) })
            .await?;
        Ok(nodes.items.into_iter().next())
    }

    /// Creates the service fronting every pod of `app_name`.
    pub async fn create_service(&self, app_name: &str, namespace: &str) -> Result<Service, Error> {
        let service = build_service(app_name, namespace)?;
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);

        let created = self
            .bounded("create service", async {
                api.create(&PostParams::default(), &service)
                    .await
                    .map_err(Error::from)
            })
            .await?;
        info!(
            "Service created, namespace: {}, name: {}",
            namespace,
            created.metadata.name.as_deref().unwrap_or_default()
        );
        Ok(created)
    }
}

/// Single-entry kubeconfig pointing at `api_server`, authenticated with the
/// context's bearer token when one is set.
fn kubeconfig_for(context: &DeploymentContext, api_server: &str) -> Kubeconfig {
    Kubeconfig {
        clusters: vec![NamedCluster {
            name: KUBECONFIG_ENTRY.to_owned(),
            cluster: Cluster {
                server: api_server.to_owned(),
                insecure_skip_tls_verify: None,
                certificate_authority: None,
                certificate_authority_data: None,
                proxy_url: None,
                extensions: None,
            },
        }],
        auth_infos: vec![NamedAuthInfo {
            name: KUBECONFIG_ENTRY.to_owned(),
            auth_info: AuthInfo {
                token: context.bearer_token.clone(),
                ..AuthInfo::default()
            },
        }],
        contexts: vec![NamedContext {
            name: KUBECONFIG_ENTRY.to_owned(),
            context: Context {
                cluster: KUBECONFIG_ENTRY.to_owned(),
                user: KUBECONFIG_ENTRY.to_owned(),
                namespace: Some(context.namespace.clone()),
                extensions: None,
            },
        }],
        current_context: Some(KUBECONFIG_ENTRY.to_owned()),
        ..Kubeconfig::default()
    }
}

/// The api server reports how the command ended once the streams close; no
/// report at all is treated as success.
fn check_exec_status(status: Option<Status>) -> Result<(), Error> {
    let status = match status {
        Some(status) => status,
        None => return Ok(()),
    };
    if status.status.as_deref() == Some(EXEC_SUCCESS) {
        return Ok(());
    }

    let detail = status
        .message
        .or(status.reason)
        .unwrap_or_else(|| "command failed".to_owned());
    Err(Error::ExecError(detail))
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> Result<String, Error> {
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buffer).await?;
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
