use async_trait::async_trait;
use ipnet::Ipv4Net;
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};

use crate::connection::{
    locks::KeyedLocks, validate_peer_id, ClientRegistration, ConnectionProvider, DestinationKey,
    Parameters, PeerConfig, PeerState, ProviderError, ProviderState, ValidationHints,
};

use self::{
    control::{ControlError, StowawayControl},
    peer_config::parse_peer_config,
    route::{next_free_proxy_port, ProxyRoute},
};

pub mod control;
pub mod peer_config;
pub mod route;

pub const PROVIDER_TYPE: &str = "stowaway";
pub const SUBNET_PARAMETER: &str = "subnet";

/// WireGuard based connection provider backed by a Stowaway deployment.
pub struct StowawayProvider<C> {
    control: C,
    state: RwLock<ProviderState>,
    peer_locks: KeyedLocks,
    /// proxy ports are shared by all peers
    allocation_lock: Mutex<()>,
}

impl<C: StowawayControl> StowawayProvider<C> {
    pub fn new(control: C) -> Self {
        Self {
            control,
            state: RwLock::new(ProviderState::default()),
            peer_locks: KeyedLocks::default(),
            allocation_lock: Mutex::new(()),
        }
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub async fn state(&self) -> ProviderState {
        *self.state.read().await
    }

    pub async fn peer_state(&self, peer_id: &str) -> Result<PeerState, ProviderError> {
        if !self.peer_exists(peer_id).await? {
            return Ok(PeerState::Unregistered);
        }

        let routes = self.peer_routes(peer_id).await?;

        Ok(match routes.is_empty() {
            true => PeerState::Registered,
            false => PeerState::Active,
        })
    }

    async fn set_state(&self, state: ProviderState) {
        let mut guard = self.state.write().await;

        if *guard != state {
            debug!("Stowaway provider state: {} -> {}", *guard, state);
            *guard = state;
        }
    }

    async fn ensure_available(&self) -> Result<(), ProviderError> {
        match *self.state.read().await {
            ProviderState::Degraded => Err(ProviderError::Unavailable(
                "Stowaway stopped responding!".to_owned(),
            )),
            ProviderState::Uninstalling => Err(ProviderError::Unavailable(
                "Stowaway is being uninstalled!".to_owned(),
            )),
            _ => Ok(()),
        }
    }

    async fn has_peer(&self, peer_id: &str) -> Result<bool, ProviderError> {
        let peers = self.control.list_peers().await?;

        Ok(peers.iter().any(|p| p == peer_id))
    }

    async fn peer_routes(&self, peer_id: &str) -> Result<Vec<ProxyRoute>, ProviderError> {
        let routes = self.control.list_routes().await?;

        Ok(routes.into_iter().filter(|r| r.peer_id == peer_id).collect())
    }

    async fn find_route(&self, key: &DestinationKey) -> Result<Option<ProxyRoute>, ProviderError> {
        let routes = self.control.list_routes().await?;

        Ok(routes.into_iter().find(|r| r.matches(key)))
    }
}

#[async_trait]
impl<C: StowawayControl> ConnectionProvider for StowawayProvider<C> {
    fn provider_type(&self) -> &'static str {
        PROVIDER_TYPE
    }

    async fn installed(&self, _config: Option<&Parameters>) -> Result<bool, ProviderError> {
        Ok(self.control.is_deployed().await?)
    }

    async fn install(&self, config: Option<&Parameters>) -> Result<(), ProviderError> {
        if self.control.is_deployed().await? {
            if self.state().await == ProviderState::Uninstalled {
                self.set_state(ProviderState::Installed).await;
            }

            return Ok(());
        }

        info!("Installing Stowaway...");
        self.set_state(ProviderState::Installing).await;

        if let Err(error) = self.control.deploy(config).await {
            self.set_state(ProviderState::Uninstalled).await;

            return Err(error.into());
        }

        self.set_state(ProviderState::Installed).await;
        info!("Stowaway installed!");

        Ok(())
    }

    async fn uninstall(&self, _config: Option<&Parameters>) -> Result<(), ProviderError> {
        if !self.control.is_deployed().await? {
            self.set_state(ProviderState::Uninstalled).await;

            return Ok(());
        }

        info!("Uninstalling Stowaway...");
        self.set_state(ProviderState::Uninstalling).await;

        match self.control.undeploy().await {
            Ok(()) | Err(ControlError::NotFound(_)) => {
                self.set_state(ProviderState::Uninstalled).await;
                info!("Stowaway uninstalled!");

                Ok(())
            }
            Err(error) => {
                self.set_state(ProviderState::Installed).await;

                Err(error.into())
            }
        }
    }

    async fn ready(&self) -> bool {
        let previous = self.state().await;
        let responsive = match self.control.is_deployed().await {
            Ok(false) => {
                if !matches!(previous, ProviderState::Installing | ProviderState::Uninstalling) {
                    self.set_state(ProviderState::Uninstalled).await;
                }

                return false;
            }
            Ok(true) => self.control.is_responsive().await.unwrap_or(false),
            Err(_) => false,
        };

        if responsive {
            self.set_state(ProviderState::Ready).await;

            return true;
        }

        if matches!(previous, ProviderState::Ready | ProviderState::Degraded) {
            warn!("Stowaway is not responding!");
            self.set_state(ProviderState::Degraded).await;
        }

        false
    }

    async fn add_peer(
        &self,
        peer_id: &str,
        parameters: Option<&Parameters>,
    ) -> Result<(), ProviderError> {
        validate_peer_id(peer_id)?;
        self.ensure_available().await?;

        let _guard = self.peer_locks.lock(peer_id).await;

        if self.has_peer(peer_id).await? {
            return Err(ProviderError::Conflict(peer_id.to_owned()));
        }

        info!("Adding peer '{peer_id}'...");
        self.control.create_peer(peer_id, parameters).await?;

        Ok(())
    }

    async fn remove_peer(&self, peer_id: &str) -> Result<(), ProviderError> {
        validate_peer_id(peer_id)?;
        self.ensure_available().await?;

        let _guard = self.peer_locks.lock(peer_id).await;

        for route in self.peer_routes(peer_id).await? {
            debug!("Removing route {} of peer '{peer_id}'...", route.entry_key());

            match self.control.delete_route(&route).await {
                Ok(()) | Err(ControlError::NotFound(_)) => (),
                Err(error) => return Err(error.into()),
            }
        }

        if !self.has_peer(peer_id).await? {
            return Ok(());
        }

        info!("Removing peer '{peer_id}'...");
        match self.control.delete_peer(peer_id).await {
            Ok(()) | Err(ControlError::NotFound(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn get_peer_config(&self, peer_id: &str) -> Result<PeerConfig, ProviderError> {
        validate_peer_id(peer_id)?;
        self.ensure_available().await?;

        if !self.has_peer(peer_id).await? {
            return Err(ProviderError::NotFound(peer_id.to_owned()));
        }

        let raw = self.control.read_peer_config(peer_id).await?;

        parse_peer_config(&raw)
    }

    async fn peer_exists(&self, peer_id: &str) -> Result<bool, ProviderError> {
        validate_peer_id(peer_id)?;
        self.ensure_available().await?;

        self.has_peer(peer_id).await
    }

    async fn add_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
        _parameters: Option<&Parameters>,
    ) -> Result<String, ProviderError> {
        let key = DestinationKey::parse(peer_id, destination_ip, destination_port)?;
        self.ensure_available().await?;

        let _guard = self.peer_locks.lock(peer_id).await;

        if !self.has_peer(peer_id).await? {
            return Err(ProviderError::NotFound(peer_id.to_owned()));
        }

        let namespace = self.control.namespace();

        if let Some(route) = self.find_route(&key).await? {
            return Ok(route.service_url(namespace));
        }

        let _allocation = self.allocation_lock.lock().await;
        let routes = self.control.list_routes().await?;
        let proxy_port = next_free_proxy_port(&routes).ok_or_else(|| {
            ProviderError::Internal("Stowaway ran out of proxy ports!".to_owned())
        })?;
        let route = ProxyRoute::new(&key, proxy_port);

        info!("Adding destination {key} (proxy port {proxy_port})...");
        self.control.write_route(&route).await?;

        Ok(route.service_url(namespace))
    }

    async fn remove_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<(), ProviderError> {
        let key = DestinationKey::parse(peer_id, destination_ip, destination_port)?;
        self.ensure_available().await?;

        let _guard = self.peer_locks.lock(peer_id).await;

        if let Some(route) = self.find_route(&key).await? {
            info!("Removing destination {key}...");

            match self.control.delete_route(&route).await {
                Ok(()) | Err(ControlError::NotFound(_)) => (),
                Err(error) => return Err(error.into()),
            }
        }

        Ok(())
    }

    async fn destination_exists(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<bool, ProviderError> {
        let key = DestinationKey::parse(peer_id, destination_ip, destination_port)?;
        self.ensure_available().await?;

        if !self.has_peer(peer_id).await? {
            return Ok(false);
        }

        Ok(self.find_route(&key).await?.is_some())
    }

    async fn get_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<String, ProviderError> {
        let key = DestinationKey::parse(peer_id, destination_ip, destination_port)?;
        self.ensure_available().await?;

        let route = match self.has_peer(peer_id).await? {
            true => self.find_route(&key).await?,
            false => None,
        };

        route
            .map(|route| route.service_url(self.control.namespace()))
            .ok_or_else(|| ProviderError::NotFound(key.to_string()))
    }

    async fn validate(
        &self,
        client: &ClientRegistration,
        hints: &ValidationHints,
    ) -> Result<(), ProviderError> {
        if !client.provider.is_empty() && client.provider != PROVIDER_TYPE {
            return Err(ProviderError::AdmissionDenied(format!(
                "Unsupported connection provider '{}'!",
                client.provider
            )));
        }

        validate_peer_id(&client.name)
            .map_err(|_| ProviderError::AdmissionDenied(format!(
                "'{}' can't be used as a peer name!",
                client.name
            )))?;

        let subnet = match client.parameters.get(SUBNET_PARAMETER) {
            Some(subnet) => subnet,
            None => return Ok(()),
        };
        let subnet: Ipv4Net = subnet.parse().map_err(|_| {
            ProviderError::AdmissionDenied(format!("'{subnet}' is not a valid IPv4 subnet!"))
        })?;

        let overlapping = hints
            .occupied_subnets
            .iter()
            .find(|occupied| occupied.contains(&subnet.network()) || subnet.contains(&occupied.network()));

        match overlapping {
            Some(occupied) => Err(ProviderError::AdmissionDenied(format!(
                "Subnet {subnet} overlaps with {occupied} which is already in use by another client!"
            ))),
            None => Ok(()),
        }
    }
}
