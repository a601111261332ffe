use anyhow::Context;
use log::debug;

use crate::{
    bridge::{BridgeOrchestrator, RunOutcome, RunRequest},
    cli::{GlobalArgs, RunArgs},
    config::ConfigContext,
    docker::DockerRuntime,
    kubernetes::KubeWorkloadResolver,
};

pub async fn run(global_args: GlobalArgs, args: RunArgs) -> anyhow::Result<()> {
    let context = ConfigContext::new(
        global_args.kube_config.as_deref(),
        global_args.config.as_deref(),
        global_args.kube_context.as_deref(),
    )?;
    let client = context
        .create_client()
        .await
        .context("Couldn't initialize k8s API client!")?;
    let runtime = DockerRuntime::connect().context("Couldn't connect to Docker!")?;
    let working_dir = std::env::current_dir().context("Couldn't read the working directory!")?;
    let orchestrator = BridgeOrchestrator::new(
        runtime.clone(),
        runtime,
        KubeWorkloadResolver::new(client),
        context.client_config().bridge_settings(working_dir),
    );

    let request = RunRequest {
        image: args.image,
        name: args.name,
        command: args.command,
        volumes: args.volumes,
        ports: args.ports,
        env: args.env,
        env_from: args.env_from,
        namespace: global_args.namespace,
        detach: args.detach,
        auto_remove: !args.no_rm,
    };
    let cancel = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            debug!("Couldn't listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };

    let outcome = orchestrator
        .run(request, cancel, |line| println!("{line}"))
        .await?;

    if let RunOutcome::Started(container) = outcome {
        debug!("'{container}' finished running");
    }

    Ok(())
}
