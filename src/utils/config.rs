use clap::Args;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::error::Error;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_IMAGE_PULL_SECRET: &str = "dockeryardkey";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment a deployment runs against. Passed explicitly to the builder and
/// the gateway instead of living in process-wide state.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentContext {
    /// Free-text environment name, e.g. `fat1`, `uat`, `production`.
    pub environment: String,

    /// Cluster api server. `None` falls back to the local kubeconfig / in-cluster config.
    #[serde(default)]
    pub api_server: Option<String>,

    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_image_pull_secret")]
    pub image_pull_secret: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Emit the historical host alias list (a second, nameless `127.0.0.1`
    /// entry) instead of the `127.0.0.1` + `::1` pair.
    #[serde(default)]
    pub legacy_host_aliases: bool,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

fn default_image_pull_secret() -> String {
    DEFAULT_IMAGE_PULL_SECRET.to_owned()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Command line flags, each backed by a `WORKLOAD_*` variable, layered over
/// the optional JSON context file.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ContextOverrides {
    /// JSON file holding the deployment context
    #[arg(long = "config", value_name = "FILE", env = "WORKLOAD_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Target environment, e.g. fat1, uat, production
    #[arg(long = "env", value_name = "ENVIRONMENT", env = "WORKLOAD_ENV")]
    pub environment: Option<String>,

    /// Cluster api server url
    #[arg(long, env = "WORKLOAD_API_SERVER")]
    pub api_server: Option<String>,

    #[arg(long, env = "WORKLOAD_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    #[arg(long, env = "WORKLOAD_NAMESPACE")]
    pub namespace: Option<String>,

    #[arg(long, env = "WORKLOAD_IMAGE_PULL_SECRET")]
    pub image_pull_secret: Option<String>,

    /// Seconds before a cluster call is abandoned
    #[arg(long, env = "WORKLOAD_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Emit the historical host alias list
    #[arg(
        long,
        value_name = "BOOL",
        env = "WORKLOAD_LEGACY_HOST_ALIASES",
        action = clap::ArgAction::Set,
        value_parser = parse_flag
    )]
    pub legacy_host_aliases: Option<bool>,
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("invalid boolean '{}', expected true or false", value)),
    }
}

impl DeploymentContext {
    pub fn new(environment: &str) -> Self {
        DeploymentContext {
            environment: environment.to_owned(),
            api_server: None,
            bearer_token: None,
            namespace: default_namespace(),
            image_pull_secret: default_image_pull_secret(),
            request_timeout_secs: default_request_timeout_secs(),
            legacy_host_aliases: false,
        }
    }

    /// Reads a context from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        let context: DeploymentContext = serde_json::from_str(&raw)?;
        context.validate()
    }

    /// Loads the file named in `overrides` (when given) and applies the
    /// remaining flags and `WORKLOAD_*` variables on top.
    pub fn load(overrides: &ContextOverrides) -> Result<Self, Error> {
        let base = match &overrides.config_file {
            Some(path) => Some(Self::from_file(path)?),
            None => None,
        };
        Self::with_overrides(base, overrides)
    }

    fn with_overrides(base: Option<Self>, overrides: &ContextOverrides) -> Result<Self, Error> {
        let mut context = match (base, &overrides.environment) {
            (Some(mut context), Some(environment)) => {
                context.environment = environment.clone();
                context
            }
            (Some(context), None) => context,
            (None, Some(environment)) => DeploymentContext::new(environment),
            (None, None) => {
                return Err(Error::ConfigError(
                    "--env or WORKLOAD_ENV must name the target environment".to_owned(),
                ))
            }
        };

        if let Some(api_server) = &overrides.api_server {
            context.api_server = Some(api_server.clone());
        }
        if let Some(token) = &overrides.bearer_token {
            context.bearer_token = Some(token.clone());
        }
        if let Some(namespace) = &overrides.namespace {
            context.namespace = namespace.clone();
        }
        if let Some(secret) = &overrides.image_pull_secret {
            context.image_pull_secret = secret.clone();
        }
        if let Some(timeout) = overrides.request_timeout_secs {
            context.request_timeout_secs = timeout;
        }
        if let Some(legacy) = overrides.legacy_host_aliases {
            context.legacy_host_aliases = legacy;
        }

        context.validate()
    }

    fn validate(self) -> Result<Self, Error> {
        if self.environment.trim().is_empty() {
            return Err(Error::ConfigError("environment must not be empty".to_owned()));
        }
        if self.namespace.is_empty() {
            return Err(Error::ConfigError("namespace must not be empty".to_owned()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::ConfigError(
                "request timeout must be at least one second".to_owned(),
            ));
        }
        Ok(self)
    }
}
