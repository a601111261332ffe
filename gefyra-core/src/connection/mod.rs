//! Connection providers manage tunnel peers and the destination routes scoped
//! to them inside the cluster-side proxy. One implementation exists per tunnel
//! technology.
//!
//! Idempotence policy shared by every implementation and by the operator:
//!
//! * `add_peer` fails with [`ProviderError::Conflict`] when the peer exists,
//! * `remove_peer` is idempotent and removes the peer's destinations,
//! * `add_destination` returns the existing route for an identical key,
//! * `remove_destination`, `install` and `uninstall` are idempotent.

use std::{collections::BTreeMap, fmt::Display, net::IpAddr};

use async_trait::async_trait;
use ipnet::Ipv4Net;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub mod locks;
pub mod stowaway;

pub type Parameters = BTreeMap<String, String>;

/// Values a local tunnel client needs to join, keyed `Section.Key`.
pub type PeerConfig = BTreeMap<String, String>;

static PEER_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("'{}' was not found!", .0)]
    NotFound(String),
    #[error("'{}' already exists!", .0)]
    Conflict(String),
    #[error("Connection provider is unavailable! {}", .0)]
    Unavailable(String),
    #[error("Invalid argument: {}", .0)]
    InvalidArgument(String),
    #[error("{}", .0)]
    AdmissionDenied(String),
    #[error("Connection provider failed! {}", .0)]
    Internal(String),
}

impl ProviderError {
    /// Only transient unavailability is worth redelivering.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderState {
    #[default]
    Uninstalled,
    Installing,
    Installed,
    Ready,
    Degraded,
    Uninstalling,
}

impl Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderState::Uninstalled => f.write_str("provider is not installed"),
            ProviderState::Installing => f.write_str("provider is being installed"),
            ProviderState::Installed => f.write_str("provider is installed"),
            ProviderState::Ready => f.write_str("provider is ready"),
            ProviderState::Degraded => f.write_str("provider stopped responding"),
            ProviderState::Uninstalling => f.write_str("provider is being uninstalled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Unregistered,
    Registered,
    /// registered with at least one destination
    Active,
}

/// The part of a client registration object a provider gets to judge.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistration {
    pub name: String,
    pub provider: String,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationHints {
    /// subnets already claimed by other registered clients
    pub occupied_subnets: Vec<Ipv4Net>,
}

/// Fully validated `(peer_id, destination_ip, destination_port)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey {
    pub peer_id: String,
    pub ip: IpAddr,
    pub port: u16,
}

impl DestinationKey {
    pub fn parse(peer_id: &str, ip: &str, port: i32) -> Result<Self, ProviderError> {
        validate_peer_id(peer_id)?;

        let ip = ip.parse().map_err(|_| {
            ProviderError::InvalidArgument(format!("'{ip}' is not a valid destination IP"))
        })?;
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| {
                ProviderError::InvalidArgument(format!("'{port}' is not a valid destination port"))
            })?;

        Ok(Self {
            peer_id: peer_id.to_owned(),
            ip,
            port,
        })
    }
}

impl Display for DestinationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}:{}", self.peer_id, self.ip, self.port)
    }
}

/// Peer ids end up in resource names, so they have to be DNS labels.
pub fn validate_peer_id(peer_id: &str) -> Result<(), ProviderError> {
    if PEER_ID_REGEX.is_match(peer_id) {
        Ok(())
    } else {
        Err(ProviderError::InvalidArgument(format!(
            "'{peer_id}' is not a valid peer id"
        )))
    }
}

#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    fn provider_type(&self) -> &'static str;

    /// Checks if the proxy component is present in the cluster.
    async fn installed(&self, config: Option<&Parameters>) -> Result<bool, ProviderError>;

    async fn install(&self, config: Option<&Parameters>) -> Result<(), ProviderError>;

    async fn uninstall(&self, config: Option<&Parameters>) -> Result<(), ProviderError>;

    /// Returns `true` if the proxy is installed and responsive. Never fails,
    /// transient unavailability yields `false`.
    async fn ready(&self) -> bool;

    async fn add_peer(&self, peer_id: &str, parameters: Option<&Parameters>)
        -> Result<(), ProviderError>;

    async fn remove_peer(&self, peer_id: &str) -> Result<(), ProviderError>;

    async fn get_peer_config(&self, peer_id: &str) -> Result<PeerConfig, ProviderError>;

    async fn peer_exists(&self, peer_id: &str) -> Result<bool, ProviderError>;

    /// Creates a route to the destination or returns the existing one.
    /// Returns the service URL reachable through the tunnel.
    async fn add_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
        parameters: Option<&Parameters>,
    ) -> Result<String, ProviderError>;

    async fn remove_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<(), ProviderError>;

    async fn destination_exists(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<bool, ProviderError>;

    async fn get_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<String, ProviderError>;

    /// Admission check for a client registration. Rejections are reported
    /// as [`ProviderError::AdmissionDenied`] with a readable reason.
    async fn validate(
        &self,
        client: &ClientRegistration,
        hints: &ValidationHints,
    ) -> Result<(), ProviderError>;
}
