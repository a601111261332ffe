use std::{collections::BTreeMap, fmt::Display};

use super::MappingError;

/// Host side of a port mapping: either a bare host port or a port bound to a
/// specific host address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostBinding {
    Port(u16),
    Address { ip: String, port: u16 },
}

impl HostBinding {
    pub fn port(&self) -> u16 {
        match self {
            HostBinding::Port(port) => *port,
            HostBinding::Address { port, .. } => *port,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        match self {
            HostBinding::Port(_) => None,
            HostBinding::Address { ip, .. } => Some(ip),
        }
    }
}

impl Display for HostBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostBinding::Port(port) => write!(f, "{port}"),
            HostBinding::Address { ip, port } => write!(f, "{ip}:{port}"),
        }
    }
}

/// Container port -> host binding. Later tokens overwrite earlier ones with
/// the same container port.
pub type PortMapping = BTreeMap<u16, HostBinding>;

pub fn parse_port(field: &str) -> Result<u16, MappingError> {
    match field.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(MappingError::InvalidPort(field.to_owned())),
    }
}

/// Parses a single `[ip:]hostPort:containerPort` token into its container
/// port key and host binding.
pub fn parse_port_mapping(token: &str) -> Result<(u16, HostBinding), MappingError> {
    let fields = token.split(':').collect::<Vec<_>>();

    match fields.as_slice() {
        [host_port, container_port] => {
            let host_port = parse_port(host_port)?;
            let container_port = parse_port(container_port)?;

            Ok((container_port, HostBinding::Port(host_port)))
        }
        [ip, host_port, container_port] => {
            let host_port = parse_port(host_port)?;
            let container_port = parse_port(container_port)?;

            Ok((
                container_port,
                HostBinding::Address {
                    ip: (*ip).to_owned(),
                    port: host_port,
                },
            ))
        }
        _ => Err(MappingError::InvalidValue(token.to_owned())),
    }
}

/// Merges repeated mapping tokens, failing on the first invalid one.
pub fn parse_port_mappings<I, S>(tokens: I) -> Result<PortMapping, MappingError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut mapping = PortMapping::new();

    for token in tokens {
        let (container_port, binding) = parse_port_mapping(token.as_ref())?;

        mapping.insert(container_port, binding);
    }

    Ok(mapping)
}
