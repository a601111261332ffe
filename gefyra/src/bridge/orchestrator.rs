use std::{future::Future, net::IpAddr};

use futures::StreamExt;
use gefyra_core::mapping::{
    env::{merge_env, parse_env_tokens, parse_remote_env, EnvMap},
    ports::{parse_port_mappings, PortMapping},
    volumes::{resolve_volumes, VolumeMapping},
    workload::WorkloadLocator,
    MappingError,
};
use log::{debug, info, warn};
use tokio::time::timeout;

use super::{
    BridgeError, BridgeSettings, ContainerRuntime, ContainerSpec, RunOutcome, RunRequest,
    RuntimeError, TunnelProbe, WorkloadResolver,
};

pub struct BridgeOrchestrator<R, P, W> {
    runtime: R,
    probe: P,
    resolver: W,
    settings: BridgeSettings,
}

struct ValidatedRequest {
    volumes: Vec<VolumeMapping>,
    ports: PortMapping,
    env: EnvMap,
    env_from: Option<WorkloadLocator>,
}

impl ValidatedRequest {
    fn from_request(request: &RunRequest) -> Result<Self, MappingError> {
        let volumes = request
            .volumes
            .iter()
            .map(|volume| volume.parse::<VolumeMapping>())
            .collect::<Result<Vec<VolumeMapping>, _>>()?;
        let env_from = request
            .env_from
            .as_deref()
            .map(|locator| locator.parse::<WorkloadLocator>())
            .transpose()?;

        Ok(Self {
            volumes,
            ports: parse_port_mappings(&request.ports)?,
            env: parse_env_tokens(&request.env)?,
            env_from,
        })
    }
}

impl<R, P, W> BridgeOrchestrator<R, P, W>
where
    R: ContainerRuntime,
    P: TunnelProbe,
    W: WorkloadResolver,
{
    pub fn new(runtime: R, probe: P, resolver: W, settings: BridgeSettings) -> Self {
        Self {
            runtime,
            probe,
            resolver,
            settings,
        }
    }

    /// Deploys the container and, unless detached, follows its output until
    /// the stream ends or `cancel` resolves.
    pub async fn run<F>(
        &self,
        request: RunRequest,
        cancel: impl Future<Output = ()>,
        on_line: F,
    ) -> Result<RunOutcome, BridgeError>
    where
        F: FnMut(&str),
    {
        let detach = request.detach;
        let outcome = self.deploy(request).await?;

        if let (false, RunOutcome::Started(container)) = (detach, &outcome) {
            self.stream_logs(container, cancel, on_line).await?;
        }

        Ok(outcome)
    }

    pub async fn deploy(&self, request: RunRequest) -> Result<RunOutcome, BridgeError> {
        let validated = ValidatedRequest::from_request(&request)?;
        let dns = self.check_readiness().await?;

        self.check_tunnel().await?;

        let volumes = resolve_volumes(validated.volumes, &self.settings.working_dir);
        let env = self
            .compose_env(&request.namespace, validated.env_from.as_ref(), validated.env)
            .await?;
        let spec = ContainerSpec {
            image: request.image,
            name: request.name,
            command: request.command,
            volumes,
            ports: validated.ports,
            env,
            auto_remove: request.auto_remove,
            network: self.settings.network_name.clone(),
            dns,
            dns_search: format!("{}.svc.cluster.local", request.namespace),
        };

        match self.runtime.run_container(&spec).await {
            Ok(container) => {
                info!(
                    "Container image '{}' started with name '{}' in Kubernetes namespace '{}'",
                    spec.image, container, request.namespace
                );

                Ok(RunOutcome::Started(container))
            }
            Err(RuntimeError::Conflict(reason)) => {
                debug!("{reason}");
                self.ensure_running(spec.name.as_deref(), reason).await?;
                warn!("This container is already deployed and running");

                Ok(RunOutcome::AlreadyRunning)
            }
            Err(error) => Err(BridgeError::Deploy(error.to_string())),
        }
    }

    /// A name conflict only counts as a deployed container if that container runs.
    async fn ensure_running(&self, name: Option<&str>, reason: String) -> Result<(), BridgeError> {
        let name = name.ok_or_else(|| BridgeError::Deploy(reason.clone()))?;
        let container = self
            .runtime
            .inspect_container(name)
            .await
            .map_err(BridgeError::Runtime)?;

        match container {
            Some(container) if container.running => Ok(()),
            Some(_) => Err(BridgeError::Deploy(format!(
                "Container '{name}' already exists but isn't running! Remove it and try again."
            ))),
            None => Err(BridgeError::Deploy(reason)),
        }
    }

    pub async fn stream_logs<F>(
        &self,
        container: &str,
        cancel: impl Future<Output = ()>,
        mut on_line: F,
    ) -> Result<(), BridgeError>
    where
        F: FnMut(&str),
    {
        let mut logs = self.runtime.logs(container);

        tokio::pin!(cancel);

        loop {
            tokio::select! {
                _ = &mut cancel => {
                    debug!("Stopped following '{container}' logs");
                    return Ok(());
                },
                line = logs.next() => match line {
                    Some(Ok(line)) => on_line(&line),
                    Some(Err(error)) => return Err(BridgeError::Stream(error.to_string())),
                    None => return Ok(()),
                },
            }
        }
    }

    /// Returns the cargo sidecar's address on the tunnel network, if it has
    /// one.
    async fn check_readiness(&self) -> Result<Option<IpAddr>, BridgeError> {
        let network = &self.settings.network_name;
        let cargo = &self.settings.cargo_container_name;

        if !self
            .runtime
            .network_exists(network)
            .await
            .map_err(BridgeError::Runtime)?
        {
            return Err(BridgeError::PreconditionMissing("network", network.to_owned()));
        }

        let cargo_info = self
            .runtime
            .inspect_container(cargo)
            .await
            .map_err(BridgeError::Runtime)?
            .ok_or_else(|| BridgeError::PreconditionMissing("cargo", cargo.to_owned()))?;

        Ok(cargo_info.address_on(network))
    }

    async fn check_tunnel(&self) -> Result<(), BridgeError> {
        let cargo = &self.settings.cargo_container_name;
        let address = &self.settings.probe_address;
        let attempts = self.settings.probe_attempts.max(1);
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            debug!("Probing {address} through '{cargo}' ({attempt}/{attempts})...");

            match timeout(self.settings.probe_timeout, self.probe.probe(cargo, address)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(error)) => last_failure = error.to_string(),
                Err(_) => {
                    last_failure = format!(
                        "no answer from {address} within {:?}",
                        self.settings.probe_timeout
                    )
                }
            }
        }

        Err(BridgeError::ProbeFailure(format!(
            "{last_failure} (after {attempts} attempts)"
        )))
    }

    async fn compose_env(
        &self,
        namespace: &str,
        locator: Option<&WorkloadLocator>,
        overrides: EnvMap,
    ) -> Result<EnvMap, BridgeError> {
        let Some(locator) = locator else {
            return Ok(overrides);
        };

        let (pod, container) = self.resolve_container(namespace, locator).await?;

        debug!("Copying environment from '{pod}/{container}' ({namespace})...");

        let raw_env = self
            .resolver
            .fetch_env(namespace, &pod, &container)
            .await
            .map_err(|error| BridgeError::RemoteFetch(error.to_string()))?;

        Ok(merge_env(parse_remote_env(&raw_env), overrides))
    }

    async fn resolve_container(
        &self,
        namespace: &str,
        locator: &WorkloadLocator,
    ) -> Result<(String, String), BridgeError> {
        let workload = format!("{}/{}", locator.workload_type, locator.name);
        let pods = self
            .resolver
            .resolve_pods(namespace, locator)
            .await
            .map_err(|error| BridgeError::RemoteFetch(error.to_string()))?;

        if pods.len() > 1 {
            warn!(
                "{workload} is backed by {} pods, using the first one by name",
                pods.len()
            );
        }

        let (pod, containers) = pods
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::RemoteFetch(format!("no pods found for {workload}")))?;

        let container = match &locator.container {
            Some(container) if containers.contains(container) => container.to_owned(),
            Some(container) => {
                return Err(BridgeError::RemoteFetch(format!(
                    "{container} was not found for {workload}"
                )))
            }
            None => containers
                .into_iter()
                .next()
                .ok_or_else(|| BridgeError::RemoteFetch(format!("{pod} has no containers")))?,
        };

        Ok((pod, container))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        net::{IpAddr, Ipv4Addr},
        path::PathBuf,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use futures::stream::{self, BoxStream, StreamExt};
    use gefyra_core::mapping::{ports::HostBinding, workload::WorkloadLocator};

    use crate::bridge::{
        BridgeError, BridgeSettings, ContainerInfo, ContainerRuntime, ContainerSpec, RemoteError,
        RunOutcome, RunRequest, RuntimeError, TunnelProbe, WorkloadResolver,
    };

    use super::BridgeOrchestrator;

    const CARGO_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(172, 30, 0, 2));

    #[derive(Default)]
    struct FakeRuntime {
        networks: Vec<String>,
        containers: BTreeMap<String, ContainerInfo>,
        run_error: Option<RuntimeError>,
        deployed: Mutex<Vec<ContainerSpec>>,
        log_lines: Vec<String>,
        endless_logs: bool,
    }

    impl FakeRuntime {
        fn ready() -> Self {
            let cargo = ContainerInfo {
                running: true,
                networks: BTreeMap::from([("gefyra".to_owned(), Some(CARGO_IP))]),
            };

            Self {
                networks: vec!["gefyra".to_owned()],
                containers: BTreeMap::from([("gefyra-cargo".to_owned(), cargo)]),
                ..Default::default()
            }
        }

        fn deployed(&self) -> Vec<ContainerSpec> {
            self.deployed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError> {
            Ok(self.networks.iter().any(|network| network == name))
        }

        async fn inspect_container(
            &self,
            name: &str,
        ) -> Result<Option<ContainerInfo>, RuntimeError> {
            Ok(self.containers.get(name).cloned())
        }

        async fn run_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
            if let Some(error) = &self.run_error {
                return Err(error.clone());
            }

            self.deployed.lock().unwrap().push(spec.clone());

            Ok(spec.name.clone().unwrap_or_else(|| "random-name".to_owned()))
        }

        fn logs<'a>(&'a self, _container: &'a str) -> BoxStream<'a, Result<String, RuntimeError>> {
            let lines = stream::iter(self.log_lines.clone().into_iter().map(Ok));

            match self.endless_logs {
                true => lines.chain(stream::pending()).boxed(),
                false => lines.boxed(),
            }
        }
    }

    #[derive(Default)]
    struct FakeProbe {
        failures: AtomicUsize,
        hang: bool,
        calls: AtomicUsize,
    }

    impl FakeProbe {
        fn failing(times: usize) -> Self {
            Self {
                failures: AtomicUsize::new(times),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl TunnelProbe for FakeProbe {
        async fn probe(&self, _container: &str, _address: &str) -> Result<(), RuntimeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.hang {
                std::future::pending::<()>().await;
            }

            match self.failures.load(Ordering::SeqCst) {
                0 => Ok(()),
                remaining => {
                    self.failures.store(remaining - 1, Ordering::SeqCst);
                    Err(RuntimeError::Api("100% packet loss".to_owned()))
                }
            }
        }
    }

    #[derive(Default)]
    struct FakeResolver {
        pods: BTreeMap<String, Vec<String>>,
        env: String,
        rejection: Option<String>,
        calls: AtomicUsize,
        fetched_from: Mutex<Option<(String, String)>>,
    }

    impl FakeResolver {
        fn worker() -> Self {
            Self {
                pods: BTreeMap::from([("worker".to_owned(), vec!["worker".to_owned()])]),
                env: "A=1\nB=2\n".to_owned(),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WorkloadResolver for FakeResolver {
        async fn resolve_pods(
            &self,
            _namespace: &str,
            _locator: &WorkloadLocator,
        ) -> Result<BTreeMap<String, Vec<String>>, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            Ok(self.pods.clone())
        }

        async fn fetch_env(
            &self,
            _namespace: &str,
            pod: &str,
            container: &str,
        ) -> Result<String, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(reason) = &self.rejection {
                return Err(RemoteError::Rejected(reason.to_owned()));
            }

            *self.fetched_from.lock().unwrap() = Some((pod.to_owned(), container.to_owned()));

            Ok(self.env.clone())
        }
    }

    fn settings() -> BridgeSettings {
        BridgeSettings {
            network_name: "gefyra".to_owned(),
            cargo_container_name: "gefyra-cargo".to_owned(),
            probe_address: "192.168.99.1".to_owned(),
            probe_attempts: 3,
            probe_timeout: Duration::from_secs(2),
            working_dir: PathBuf::from("/work"),
        }
    }

    fn request() -> RunRequest {
        RunRequest {
            image: "pyserver".to_owned(),
            name: Some("mypyserver".to_owned()),
            namespace: "default".to_owned(),
            detach: true,
            auto_remove: true,
            ..Default::default()
        }
    }

    fn orchestrator(
        runtime: FakeRuntime,
        probe: FakeProbe,
        resolver: FakeResolver,
    ) -> BridgeOrchestrator<FakeRuntime, FakeProbe, FakeResolver> {
        BridgeOrchestrator::new(runtime, probe, resolver, settings())
    }

    #[tokio::test]
    async fn missing_network_aborts_before_any_side_effect() {
        let runtime = FakeRuntime {
            networks: vec![],
            ..FakeRuntime::ready()
        };
        let orchestrator = orchestrator(runtime, FakeProbe::default(), FakeResolver::worker());
        let request = RunRequest {
            env_from: Some("pod/worker".to_owned()),
            ..request()
        };

        let error = orchestrator.deploy(request).await.unwrap_err();

        assert!(matches!(error, BridgeError::PreconditionMissing("network", _)));
        assert!(error.to_string().contains("Please run 'gefyra up' first."));
        assert_eq!(orchestrator.probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.resolver.calls(), 0);
        assert!(orchestrator.runtime.deployed().is_empty());
    }

    #[tokio::test]
    async fn missing_cargo_aborts_before_any_side_effect() {
        let runtime = FakeRuntime {
            containers: BTreeMap::new(),
            ..FakeRuntime::ready()
        };
        let orchestrator = orchestrator(runtime, FakeProbe::default(), FakeResolver::worker());

        let error = orchestrator.deploy(request()).await.unwrap_err();

        assert!(matches!(error, BridgeError::PreconditionMissing("cargo", _)));
        assert!(orchestrator.runtime.deployed().is_empty());
    }

    #[tokio::test]
    async fn composes_remote_env_with_local_overrides() {
        let orchestrator =
            orchestrator(FakeRuntime::ready(), FakeProbe::default(), FakeResolver::worker());
        let request = RunRequest {
            env_from: Some("pod/worker".to_owned()),
            env: vec!["B=3".to_owned()],
            ..request()
        };

        let outcome = orchestrator.deploy(request).await.unwrap();
        let deployed = orchestrator.runtime.deployed();

        assert_eq!(outcome, RunOutcome::Started("mypyserver".to_owned()));
        assert_eq!(
            deployed[0].env,
            BTreeMap::from([
                ("A".to_owned(), "1".to_owned()),
                ("B".to_owned(), "3".to_owned())
            ])
        );
        assert_eq!(
            *orchestrator.resolver.fetched_from.lock().unwrap(),
            Some(("worker".to_owned(), "worker".to_owned()))
        );
    }

    #[tokio::test]
    async fn container_spec_carries_dns_and_resolved_mappings() {
        let orchestrator =
            orchestrator(FakeRuntime::ready(), FakeProbe::default(), FakeResolver::default());
        let request = RunRequest {
            namespace: "shop".to_owned(),
            volumes: vec!["data:/data".to_owned(), "/abs:/abs".to_owned()],
            ports: vec!["8080:80".to_owned(), "127.0.0.1:9000:90".to_owned()],
            command: vec!["python".to_owned(), "main.py".to_owned()],
            ..request()
        };

        orchestrator.deploy(request).await.unwrap();
        let spec = orchestrator.runtime.deployed().remove(0);

        assert_eq!(spec.dns_search, "shop.svc.cluster.local");
        assert_eq!(spec.dns, Some(CARGO_IP));
        assert_eq!(spec.network, "gefyra");
        assert_eq!(spec.command, vec!["python", "main.py"]);
        assert_eq!(spec.volumes[0].host, PathBuf::from("/work/data"));
        assert_eq!(spec.volumes[1].host, PathBuf::from("/abs"));
        assert_eq!(spec.ports[&80u16], HostBinding::Port(8080));
        assert_eq!(
            spec.ports[&90u16],
            HostBinding::Address {
                ip: "127.0.0.1".to_owned(),
                port: 9000
            }
        );
    }

    fn conflicting(running: bool) -> FakeRuntime {
        let mut runtime = FakeRuntime {
            run_error: Some(RuntimeError::Conflict("name already in use".to_owned())),
            ..FakeRuntime::ready()
        };
        runtime.containers.insert(
            "mypyserver".to_owned(),
            ContainerInfo {
                running,
                ..Default::default()
            },
        );

        runtime
    }

    #[tokio::test]
    async fn deploy_conflict_is_reported_as_success() {
        let runtime = conflicting(true);
        let orchestrator = orchestrator(runtime, FakeProbe::default(), FakeResolver::default());
        let request = RunRequest {
            detach: false,
            ..request()
        };

        let outcome = orchestrator
            .run(request, std::future::pending(), |_| panic!("no logs expected"))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::AlreadyRunning);
    }

    #[tokio::test]
    async fn conflict_with_a_stopped_container_is_not_success() {
        let orchestrator =
            orchestrator(conflicting(false), FakeProbe::default(), FakeResolver::default());

        let error = orchestrator.deploy(request()).await.unwrap_err();

        assert!(matches!(error, BridgeError::Deploy(_)));
        assert!(error.to_string().contains("isn't running"), "{error}");
    }

    #[tokio::test]
    async fn conflict_without_a_container_is_not_success() {
        let runtime = FakeRuntime {
            run_error: Some(RuntimeError::Conflict("name already in use".to_owned())),
            ..FakeRuntime::ready()
        };
        let orchestrator = orchestrator(runtime, FakeProbe::default(), FakeResolver::default());

        assert!(matches!(
            orchestrator.deploy(request()).await,
            Err(BridgeError::Deploy(reason)) if reason == "name already in use"
        ));
    }

    #[tokio::test]
    async fn other_deploy_errors_are_fatal() {
        let runtime = FakeRuntime {
            run_error: Some(RuntimeError::Api("no space left on device".to_owned())),
            ..FakeRuntime::ready()
        };
        let orchestrator = orchestrator(runtime, FakeProbe::default(), FakeResolver::default());

        let error = orchestrator.deploy(request()).await.unwrap_err();

        assert!(matches!(error, BridgeError::Deploy(_)));
        assert!(error.to_string().contains("no space left on device"));
    }

    #[tokio::test]
    async fn remote_rejection_aborts_before_deploy() {
        let resolver = FakeResolver {
            rejection: Some("Forbidden".to_owned()),
            ..FakeResolver::worker()
        };
        let orchestrator = orchestrator(FakeRuntime::ready(), FakeProbe::default(), resolver);
        let request = RunRequest {
            env_from: Some("deploy/worker".to_owned()),
            ..request()
        };

        let error = orchestrator.deploy(request).await.unwrap_err();

        assert_eq!(
            error.to_string(),
            "Cannot copy environment from Pod: Forbidden"
        );
        assert!(orchestrator.runtime.deployed().is_empty());
    }

    #[tokio::test]
    async fn unknown_container_is_rejected() {
        let orchestrator =
            orchestrator(FakeRuntime::ready(), FakeProbe::default(), FakeResolver::worker());
        let request = RunRequest {
            env_from: Some("pod/worker/sidecar".to_owned()),
            ..request()
        };

        let error = orchestrator.deploy(request).await.unwrap_err();

        assert!(error
            .to_string()
            .contains("sidecar was not found for pod/worker"));
        assert!(orchestrator.runtime.deployed().is_empty());
    }

    #[tokio::test]
    async fn first_pod_by_name_wins_on_ambiguous_workloads() {
        let resolver = FakeResolver {
            pods: BTreeMap::from([
                ("api-b".to_owned(), vec!["api".to_owned()]),
                ("api-a".to_owned(), vec!["api".to_owned(), "proxy".to_owned()]),
            ]),
            ..FakeResolver::worker()
        };
        let orchestrator = orchestrator(FakeRuntime::ready(), FakeProbe::default(), resolver);
        let request = RunRequest {
            env_from: Some("deploy/api".to_owned()),
            ..request()
        };

        orchestrator.deploy(request).await.unwrap();

        assert_eq!(
            *orchestrator.resolver.fetched_from.lock().unwrap(),
            Some(("api-a".to_owned(), "api".to_owned()))
        );
    }

    #[tokio::test]
    async fn invalid_tokens_fail_before_remote_calls() {
        for request in [
            RunRequest {
                env_from: Some("service/foo".to_owned()),
                ..request()
            },
            RunRequest {
                ports: vec!["abc:80".to_owned()],
                ..request()
            },
            RunRequest {
                env: vec!["NOVALUE".to_owned()],
                ..request()
            },
            RunRequest {
                volumes: vec!["nocolon".to_owned()],
                ..request()
            },
        ] {
            let runtime = FakeRuntime {
                networks: vec![],
                ..FakeRuntime::ready()
            };
            let orchestrator = orchestrator(runtime, FakeProbe::default(), FakeResolver::worker());

            let error = orchestrator.deploy(request).await.unwrap_err();

            assert!(matches!(error, BridgeError::Validation(_)), "{error}");
            assert_eq!(orchestrator.resolver.calls(), 0);
        }
    }

    #[tokio::test]
    async fn probe_is_retried_before_giving_up() {
        let orchestrator =
            orchestrator(FakeRuntime::ready(), FakeProbe::failing(2), FakeResolver::default());

        orchestrator.deploy(request()).await.unwrap();

        assert_eq!(orchestrator.probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn probe_failure_aborts_without_deploying() {
        let orchestrator =
            orchestrator(FakeRuntime::ready(), FakeProbe::failing(5), FakeResolver::worker());

        let error = orchestrator.deploy(request()).await.unwrap_err();

        assert!(matches!(error, BridgeError::ProbeFailure(_)));
        assert!(error.to_string().contains("100% packet loss"));
        assert!(orchestrator.runtime.deployed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_times_out() {
        let probe = FakeProbe {
            hang: true,
            ..Default::default()
        };
        let orchestrator = orchestrator(FakeRuntime::ready(), probe, FakeResolver::default());

        let error = orchestrator.deploy(request()).await.unwrap_err();

        assert!(error.to_string().contains("no answer from 192.168.99.1"));
        assert_eq!(orchestrator.probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attached_run_streams_logs_until_the_end() {
        let runtime = FakeRuntime {
            log_lines: vec!["starting".to_owned(), "listening on :80".to_owned()],
            ..FakeRuntime::ready()
        };
        let orchestrator = orchestrator(runtime, FakeProbe::default(), FakeResolver::default());
        let request = RunRequest {
            detach: false,
            ..request()
        };
        let mut lines = Vec::new();

        orchestrator
            .run(request, std::future::pending(), |line| lines.push(line.to_owned()))
            .await
            .unwrap();

        assert_eq!(lines, vec!["starting", "listening on :80"]);
    }

    #[tokio::test(start_paused = true)]
    async fn log_streaming_stops_on_cancel() {
        let runtime = FakeRuntime {
            log_lines: vec!["starting".to_owned()],
            endless_logs: true,
            ..FakeRuntime::ready()
        };
        let orchestrator = orchestrator(runtime, FakeProbe::default(), FakeResolver::default());
        let request = RunRequest {
            detach: false,
            ..request()
        };
        let mut lines = Vec::new();

        let outcome = orchestrator
            .run(
                request,
                tokio::time::sleep(Duration::from_secs(1)),
                |line| lines.push(line.to_owned()),
            )
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Started("mypyserver".to_owned()));
        assert_eq!(lines, vec!["starting"]);
    }
}
