use std::net::{IpAddr, SocketAddr};

use crate::connection::DestinationKey;

pub const PROXY_PORT_RANGE_START: u16 = 10000;
pub const PROXY_PORT_RANGE_END: u16 = 60000;

/// A destination route as Stowaway stores it in its proxy-route configmap.
///
/// Entries are keyed `<peer>.<ip>.<port>` (IPv6 colons written as `_`) and
/// valued `<ip>:<port>,<proxyPort>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub peer_id: String,
    pub destination_ip: IpAddr,
    pub destination_port: u16,
    pub proxy_port: u16,
}

impl ProxyRoute {
    pub fn new(key: &DestinationKey, proxy_port: u16) -> Self {
        Self {
            peer_id: key.peer_id.to_owned(),
            destination_ip: key.ip,
            destination_port: key.port,
            proxy_port,
        }
    }

    pub fn matches(&self, key: &DestinationKey) -> bool {
        self.peer_id == key.peer_id
            && self.destination_ip == key.ip
            && self.destination_port == key.port
    }

    pub fn entry_key(&self) -> String {
        let ip = self.destination_ip.to_string().replace(':', "_");

        format!("{}.{ip}.{}", self.peer_id, self.destination_port)
    }

    pub fn entry_value(&self) -> String {
        let target = SocketAddr::new(self.destination_ip, self.destination_port);

        format!("{target},{}", self.proxy_port)
    }

    pub fn from_entry(key: &str, value: &str) -> Option<Self> {
        let (peer_id, rest) = key.split_once('.')?;
        let (ip, port) = rest.rsplit_once('.')?;
        let destination_ip = ip.replace('_', ":").parse().ok()?;
        let destination_port = port.parse().ok()?;

        let (target, proxy_port) = value.split_once(',')?;
        let target: SocketAddr = target.trim().parse().ok()?;

        if target.ip() != destination_ip || target.port() != destination_port {
            return None;
        }

        Some(Self {
            peer_id: peer_id.to_owned(),
            destination_ip,
            destination_port,
            proxy_port: proxy_port.trim().parse().ok()?,
        })
    }

    pub fn service_name(&self) -> String {
        format!("gefyra-stowaway-proxy-{}", self.proxy_port)
    }

    pub fn service_url(&self, namespace: &str) -> String {
        format!(
            "{}.{namespace}.svc.cluster.local:{}",
            self.service_name(),
            self.proxy_port
        )
    }
}

/// Lowest proxy port not taken by any route.
pub fn next_free_proxy_port<'a>(routes: impl IntoIterator<Item = &'a ProxyRoute>) -> Option<u16> {
    let mut taken = routes.into_iter().map(|r| r.proxy_port).collect::<Vec<_>>();
    taken.sort_unstable();

    let mut candidate = PROXY_PORT_RANGE_START;
    for port in taken {
        if port < candidate {
            continue;
        }

        if port > candidate {
            break;
        }

        candidate = candidate.checked_add(1)?;
    }

    (candidate <= PROXY_PORT_RANGE_END).then_some(candidate)
}
