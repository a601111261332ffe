use std::{collections::HashMap, future::Future, net::IpAddr};

use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
        LogsOptions, RemoveContainerOptions, StartContainerOptions,
    },
    errors::Error as DockerError,
    exec::{CreateExecOptions, StartExecResults},
    image::CreateImageOptions,
    models::{HostConfig, PortBinding},
    network::InspectNetworkOptions,
    Docker,
};
use futures::{
    stream::{self, BoxStream},
    StreamExt, TryStreamExt,
};
use gefyra_core::mapping::{env::to_env_list, volumes::VolumeMapping};
use log::{debug, info, warn};

use crate::bridge::{ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeError, TunnelProbe};

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults().map_err(runtime_error)?;

        Ok(Self { docker })
    }

    pub async fn list_containers(&self) -> Result<usize, RuntimeError> {
        let containers = self
            .docker
            .list_containers(None::<ListContainersOptions<String>>)
            .await
            .map_err(runtime_error)?;

        Ok(containers.len())
    }

    pub async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!("Pulling image '{image}'...");

        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        self.docker
            .create_image(Some(options), None, None)
            .try_for_each(|progress| async move {
                if let Some(status) = progress.status {
                    debug!("{status}");
                }

                Ok(())
            })
            .await
            .map_err(runtime_error)
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, DockerError> {
        let options = spec.name.as_deref().map(|name| CreateContainerOptions {
            name,
            platform: None,
        });

        let response = self
            .docker
            .create_container(options, container_config(spec))
            .await?;

        Ok(response.id)
    }
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    let exposed_ports = spec
        .ports
        .keys()
        .map(|port| (format!("{port}/tcp"), HashMap::new()))
        .collect();
    let port_bindings = spec
        .ports
        .iter()
        .map(|(port, binding)| {
            let binding = PortBinding {
                host_ip: binding.ip().map(|ip| ip.to_owned()),
                host_port: Some(binding.port().to_string()),
            };

            (format!("{port}/tcp"), Some(vec![binding]))
        })
        .collect();

    Config {
        image: Some(spec.image.to_owned()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.to_owned()),
        env: Some(to_env_list(&spec.env)),
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            binds: Some(spec.volumes.iter().map(VolumeMapping::to_bind).collect()),
            port_bindings: Some(port_bindings),
            auto_remove: Some(spec.auto_remove),
            network_mode: Some(spec.network.to_owned()),
            dns: spec.dns.map(|dns| vec![dns.to_string()]),
            dns_search: Some(vec![spec.dns_search.to_owned()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn runtime_error(error: DockerError) -> RuntimeError {
    match error {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        DockerError::DockerResponseServerError {
            status_code: 409,
            message,
        } => RuntimeError::Conflict(message),
        other => RuntimeError::Api(other.to_string()),
    }
}

/// Awaits `start`; if it fails, `discard` runs before the start error is
/// returned, so that no stopped container is left behind.
async fn start_or_discard<S, D>(start: S, discard: D) -> Result<(), RuntimeError>
where
    S: Future<Output = Result<(), DockerError>>,
    D: Future<Output = Result<(), DockerError>>,
{
    let error = match start.await {
        Ok(()) => return Ok(()),
        Err(error) => runtime_error(error),
    };

    if let Err(discard_error) = discard.await {
        warn!("Couldn't remove the container that failed to start! {discard_error}");
    }

    Err(error)
}

/// Reassembles lines from log frames that don't necessarily end at a line break.
#[derive(Debug, Default)]
struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);

        let end = match self.partial.iter().rposition(|byte| *byte == b'\n') {
            Some(end) => end,
            None => return Vec::new(),
        };
        let rest = self.partial.split_off(end + 1);
        let complete = std::mem::replace(&mut self.partial, rest);

        String::from_utf8_lossy(&complete)
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }

        let rest = std::mem::take(&mut self.partial);

        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// stdout and stderr frames interleave, each keeps its own partial line
#[derive(Debug, Default)]
struct LogLines {
    stdout: LineBuffer,
    stderr: LineBuffer,
}

impl LogLines {
    fn push(&mut self, output: LogOutput) -> Vec<String> {
        match output {
            LogOutput::StdErr { message } => self.stderr.push(&message),
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                self.stdout.push(&message)
            }
            LogOutput::StdIn { .. } => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<String> {
        self.stdout
            .finish()
            .into_iter()
            .chain(self.stderr.finish())
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(runtime_error)
        {
            Ok(_) => Ok(true),
            Err(RuntimeError::NotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        let container = match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(runtime_error)
        {
            Ok(container) => container,
            Err(RuntimeError::NotFound(_)) => return Ok(None),
            Err(error) => return Err(error),
        };

        let networks = container
            .network_settings
            .and_then(|settings| settings.networks)
            .unwrap_or_default()
            .into_iter()
            .map(|(network, endpoint)| {
                let address = endpoint
                    .ip_address
                    .and_then(|ip| ip.parse::<IpAddr>().ok());

                (network, address)
            })
            .collect();

        let running = container
            .state
            .and_then(|state| state.running)
            .unwrap_or(false);

        Ok(Some(ContainerInfo { running, networks }))
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let id = match self.create_container(spec).await.map_err(runtime_error) {
            Ok(id) => id,
            Err(RuntimeError::NotFound(_)) => {
                self.pull_image(&spec.image).await?;
                self.create_container(spec).await.map_err(runtime_error)?
            }
            Err(error) => return Err(error),
        };

        let remove_options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        start_or_discard(
            self.docker
                .start_container(&id, None::<StartContainerOptions<String>>),
            self.docker.remove_container(&id, Some(remove_options)),
        )
        .await?;

        Ok(spec.name.to_owned().unwrap_or(id))
    }

    fn logs<'a>(&'a self, container: &'a str) -> BoxStream<'a, Result<String, RuntimeError>> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        self.docker
            .logs(container, Some(options))
            .map(Some)
            .chain(stream::once(async { None }))
            .scan(LogLines::default(), |lines, frame| {
                let batch: Vec<Result<String, RuntimeError>> = match frame {
                    Some(Ok(output)) => lines.push(output).into_iter().map(Ok).collect(),
                    Some(Err(error)) => vec![Err(runtime_error(error))],
                    None => lines.finish().into_iter().map(Ok).collect(),
                };

                std::future::ready(Some(batch))
            })
            .flat_map(stream::iter)
            .boxed()
    }
}

#[async_trait]
impl TunnelProbe for DockerRuntime {
    async fn probe(&self, container: &str, address: &str) -> Result<(), RuntimeError> {
        let exec = self
            .docker
            .create_exec(
                container,
                CreateExecOptions {
                    cmd: Some(vec!["ping", "-c", "1", "-W", "1", address]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(runtime_error)?;

        if let StartExecResults::Attached { mut output, .. } = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(runtime_error)?
        {
            while let Some(line) = output.next().await {
                debug!("{}", line.map_err(runtime_error)?);
            }
        }

        let inspected = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(runtime_error)?;

        match inspected.exit_code {
            Some(0) => Ok(()),
            code => Err(RuntimeError::Api(format!(
                "ping {address} exited with {}",
                code.map(|c| c.to_string()).unwrap_or("unknown code".to_owned())
            ))),
        }
    }
}
