use k8s_openapi::api::core::v1::Namespace;
use gefyra_core::kubernetes::GetApi;
use kube::{api::ListParams, Api};
use log::{debug, error, info};

use crate::{
    bridge::RuntimeError, cli::GlobalArgs, config::ConfigContext, docker::DockerRuntime,
};

pub const CARGO_IMAGE: &str = "quay.io/gefyra/cargo:latest";

pub async fn check(global_args: GlobalArgs) -> anyhow::Result<()> {
    debug!("Probing: Docker");

    match probe_docker().await {
        Ok(()) => info!("Docker: Ok."),
        Err(error) => {
            debug!("{error}");
            error!("Docker does not seem to be working for Gefyra");
        }
    }

    debug!("Probing: Kubernetes");

    match probe_kubernetes(&global_args).await {
        Ok(()) => info!("Kubernetes: Ok."),
        Err(error) => {
            debug!("{error:#}");
            error!(
                "Kubernetes is not connected to a cluster or does not seem to be working for Gefyra"
            );
        }
    }

    Ok(())
}

async fn probe_docker() -> Result<(), RuntimeError> {
    let runtime = DockerRuntime::connect()?;

    runtime.list_containers().await?;
    runtime.pull_image(CARGO_IMAGE).await
}

async fn probe_kubernetes(global_args: &GlobalArgs) -> anyhow::Result<()> {
    let context = ConfigContext::new(
        global_args.kube_config.as_deref(),
        global_args.config.as_deref(),
        global_args.kube_context.as_deref(),
    )?;
    let client = context.create_client().await?;
    let namespace_api: Api<Namespace> = client.cluster_api();

    namespace_api.list(&ListParams::default().limit(1)).await?;

    Ok(())
}
