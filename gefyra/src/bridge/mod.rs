//! Running a local container wired into the cluster through the Gefyra
//! tunnel. The orchestrator only talks to the outside world through the
//! traits below, so the container runtime, the tunnel probe and the cluster
//! lookups can be swapped out.

use std::{collections::BTreeMap, net::IpAddr, path::PathBuf, time::Duration};

use async_trait::async_trait;
use futures::stream::BoxStream;
use gefyra_core::mapping::{
    env::EnvMap, ports::PortMapping, volumes::VolumeMapping, workload::WorkloadLocator, MappingError,
};
use thiserror::Error;

pub mod orchestrator;

pub use orchestrator::BridgeOrchestrator;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Gefyra {} '{}' not found. Please run 'gefyra up' first.", .0, .1)]
    PreconditionMissing(&'static str, String),
    #[error("Gefyra tunnel is not usable: {}", .0)]
    ProbeFailure(String),
    #[error("Cannot copy environment from Pod: {}", .0)]
    RemoteFetch(String),
    #[error("Couldn't deploy the container: {}", .0)]
    Deploy(String),
    #[error(transparent)]
    Validation(#[from] MappingError),
    #[error("Container runtime failed: {}", .0)]
    Runtime(RuntimeError),
    #[error("Log stream broke: {}", .0)]
    Stream(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("{}", .0)]
    Conflict(String),
    #[error("{}", .0)]
    NotFound(String),
    #[error("{}", .0)]
    Api(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{}", .0)]
    NotFound(String),
    #[error("{}", .0)]
    Rejected(String),
}

/// What the runtime knows about a container. Addresses are keyed by network name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    pub running: bool,
    pub networks: BTreeMap<String, Option<IpAddr>>,
}

impl ContainerInfo {
    pub fn address_on(&self, network: &str) -> Option<IpAddr> {
        self.networks.get(network).copied().flatten()
    }
}

/// Fully composed container definition handed over to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: Option<String>,
    pub command: Vec<String>,
    pub volumes: Vec<VolumeMapping>,
    pub ports: PortMapping,
    pub env: EnvMap,
    pub auto_remove: bool,
    pub network: String,
    pub dns: Option<IpAddr>,
    pub dns_search: String,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError>;
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError>;
    /// Creates and starts the container, returning its name or id.
    async fn run_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;
    fn logs<'a>(&'a self, container: &'a str) -> BoxStream<'a, Result<String, RuntimeError>>;
}

#[async_trait]
pub trait TunnelProbe: Send + Sync {
    /// A single reachability attempt of `address` from within `container`.
    async fn probe(&self, container: &str, address: &str) -> Result<(), RuntimeError>;
}

#[async_trait]
pub trait WorkloadResolver: Send + Sync {
    /// Pods backing the workload, each with its container names in
    /// declaration order.
    async fn resolve_pods(
        &self,
        namespace: &str,
        locator: &WorkloadLocator,
    ) -> Result<BTreeMap<String, Vec<String>>, RemoteError>;
    /// Raw `KEY=value` lines of the container's process environment.
    async fn fetch_env(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<String, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub network_name: String,
    pub cargo_container_name: String,
    pub probe_address: String,
    pub probe_attempts: u32,
    pub probe_timeout: Duration,
    pub working_dir: PathBuf,
}

/// Raw user input for a single `run`. Tokens are validated by the
/// orchestrator before anything remote is touched.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub image: String,
    pub name: Option<String>,
    pub command: Vec<String>,
    pub volumes: Vec<String>,
    pub ports: Vec<String>,
    pub env: Vec<String>,
    pub env_from: Option<String>,
    pub namespace: String,
    pub detach: bool,
    pub auto_remove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Started(String),
    AlreadyRunning,
}
