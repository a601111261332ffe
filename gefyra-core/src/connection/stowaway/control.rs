use async_trait::async_trait;
use thiserror::Error;

use crate::connection::{Parameters, ProviderError};

use super::route::ProxyRoute;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("Stowaway is unreachable! {}", .0)]
    Unreachable(String),
    #[error("'{}' doesn't exist on Stowaway!", .0)]
    NotFound(String),
    #[error("Stowaway rejected the request! {}", .0)]
    Rejected(String),
}

impl From<ControlError> for ProviderError {
    fn from(value: ControlError) -> Self {
        match value {
            ControlError::Unreachable(reason) => ProviderError::Unavailable(reason),
            ControlError::NotFound(name) => ProviderError::NotFound(name),
            ControlError::Rejected(reason) => ProviderError::Internal(reason),
        }
    }
}

/// The control surface of a deployed Stowaway proxy. This is the only source
/// of truth for peers and routes.
#[async_trait]
pub trait StowawayControl: Send + Sync {
    /// Namespace the proxy and its route services live in.
    fn namespace(&self) -> &str;

    async fn is_deployed(&self) -> Result<bool, ControlError>;
    async fn deploy(&self, config: Option<&Parameters>) -> Result<(), ControlError>;
    async fn undeploy(&self) -> Result<(), ControlError>;
    async fn is_responsive(&self) -> Result<bool, ControlError>;

    async fn list_peers(&self) -> Result<Vec<String>, ControlError>;
    async fn create_peer(
        &self,
        peer_id: &str,
        parameters: Option<&Parameters>,
    ) -> Result<(), ControlError>;
    async fn delete_peer(&self, peer_id: &str) -> Result<(), ControlError>;
    /// Raw WireGuard configuration of the peer.
    async fn read_peer_config(&self, peer_id: &str) -> Result<String, ControlError>;

    async fn list_routes(&self) -> Result<Vec<ProxyRoute>, ControlError>;
    /// Publishes the service clients reach the route through.
    async fn apply_route_service(&self, route: &ProxyRoute) -> Result<(), ControlError>;
    /// Records the route in the proxy configuration, after which `list_routes` reports it.
    async fn write_route_entry(&self, route: &ProxyRoute) -> Result<(), ControlError>;
    async fn delete_route(&self, route: &ProxyRoute) -> Result<(), ControlError>;

    /// A route is only listed once its service exists.
    async fn write_route(&self, route: &ProxyRoute) -> Result<(), ControlError> {
        self.apply_route_service(route).await?;
        self.write_route_entry(route).await
    }
}
