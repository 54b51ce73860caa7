use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

use workload_builder::controllers::gateway::OrchestratorGateway;
use workload_builder::models::request::{DeploymentRequest, RequestManifest};
use workload_builder::utils::config::{ContextOverrides, DeploymentContext};
use workload_builder::utils::error::Error;
use workload_builder::workload::builder::WorkloadBuilder;

/// Builds the Pod manifest for a deployment request and optionally submits it.
#[derive(Debug, Parser)]
#[command(name = "workload-builder", version, about)]
struct Cli {
    /// JSON deployment request
    #[arg(required_unless_present = "schema")]
    request: Option<PathBuf>,

    /// Submit the built pod to the cluster
    #[arg(long)]
    apply: bool,

    /// Print the JSON schema of the request format and exit
    #[arg(long, conflicts_with = "apply")]
    schema: bool,

    #[command(flatten)]
    context: ContextOverrides,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run(Cli::parse()).await {
        error!("{}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    if cli.schema {
        let schema = schemars::schema_for!(RequestManifest);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let request_path = match &cli.request {
        Some(path) => path,
        None => return Err(Error::ConfigError("a request file is required".to_owned())),
    };
    let context = DeploymentContext::load(&cli.context)?;

    let manifest: RequestManifest =
        serde_json::from_str(&std::fs::read_to_string(request_path)?)?;
    let request = DeploymentRequest::from(manifest);

    // The builder never touches the network, so a dry run needs no cluster.
    let descriptor = WorkloadBuilder::new(context.clone())?.build(&request)?;
    println!("{}", serde_json::to_string_pretty(descriptor.pod())?);

    if cli.apply {
        let gateway = OrchestratorGateway::connect(&context).await?;
        let pod = gateway.create(descriptor).await?;
        info!(
            "Submitted {}",
            pod.metadata.name.as_deref().unwrap_or_default()
        );
    }

    Ok(())
}
