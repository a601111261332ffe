use std::{env::var, net::Ipv4Addr};

use gefyra_core::resources::stowaway::{StowawayRelease, StowawayReleaseBuilder};
use ipnet::Ipv4Net;
use thiserror::Error;

pub const DEFAULT_NAMESPACE: &str = "gefyra";
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;

#[derive(Debug, Error)]
pub enum OperatorConfigError {
    #[error("Env var unavailable: {}", .0)]
    VarUnset(&'static str),
    #[error("Env var {} contains an invalid value: {}", .0, .1)]
    InvalidValue(&'static str, String),
    #[error("Couldn't prepare the Stowaway release! {}", .0)]
    Release(String),
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub port: u16,
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub namespace: String,
    pub stowaway: StowawayRelease,
    /// the webhook only runs when a certificate is configured
    pub webhook: Option<WebhookConfig>,
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, OperatorConfigError> {
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, OperatorConfigError> {
        let namespace = lookup("GEFYRA_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned());

        let mut builder = StowawayReleaseBuilder::default();
        builder.namespace(namespace.to_owned());

        if let Some(image) = lookup("GEFYRA_STOWAWAY_IMAGE") {
            builder.image(image);
        }
        if let Some(tag) = lookup("GEFYRA_STOWAWAY_TAG") {
            builder.tag(tag);
        }
        if let Some(policy) = lookup("GEFYRA_STOWAWAY_IMAGE_PULLPOLICY") {
            builder.image_pull_policy(policy);
        }
        if let Some(port) = lookup("GEFYRA_WIREGUARD_EXT_PORT") {
            builder.wireguard_ext_port(parse_value("GEFYRA_WIREGUARD_EXT_PORT", &port)?);
        }
        if let Some(dns) = lookup("GEFYRA_STOWAWAY_PEER_DNS") {
            builder.peer_dns(dns);
        }
        if let Some(subnet) = lookup("GEFYRA_STOWAWAY_INTERNAL_SUBNET") {
            builder.internal_subnet(parse_subnet("GEFYRA_STOWAWAY_INTERNAL_SUBNET", &subnet)?);
        }
        if let Some(subnet) = lookup("GEFYRA_PEER_SUBNET") {
            builder.peer_subnet(parse_subnet("GEFYRA_PEER_SUBNET", &subnet)?);
        }
        if let Some(puid) = lookup("GEFYRA_STOWAWAY_PUID") {
            builder.puid(puid);
        }
        if let Some(pgid) = lookup("GEFYRA_STOWAWAY_PGID") {
            builder.pgid(pgid);
        }

        let stowaway = builder
            .build()
            .map_err(|err| OperatorConfigError::Release(err.to_string()))?;

        let webhook = match lookup("GEFYRA_WEBHOOK_CERT") {
            Some(cert_path) => Some(WebhookConfig {
                port: match lookup("GEFYRA_WEBHOOK_PORT") {
                    Some(port) => parse_value("GEFYRA_WEBHOOK_PORT", &port)?,
                    None => DEFAULT_WEBHOOK_PORT,
                },
                cert_path,
                key_path: lookup("GEFYRA_WEBHOOK_KEY")
                    .ok_or(OperatorConfigError::VarUnset("GEFYRA_WEBHOOK_KEY"))?,
            }),
            None => None,
        };

        Ok(Self {
            namespace,
            stowaway,
            webhook,
        })
    }
}

fn parse_value(key: &'static str, value: &str) -> Result<u16, OperatorConfigError> {
    value
        .parse()
        .map_err(|_| OperatorConfigError::InvalidValue(key, value.to_owned()))
}

/// Accepts both `192.168.99.0/24` and a bare network address (treated as /24).
fn parse_subnet(key: &'static str, value: &str) -> Result<Ipv4Net, OperatorConfigError> {
    let invalid = || OperatorConfigError::InvalidValue(key, value.to_owned());

    match value.parse::<Ipv4Net>() {
        Ok(net) => Ok(net),
        Err(_) => {
            let address = value.parse::<Ipv4Addr>().map_err(|_| invalid())?;

            Ipv4Net::new(address, 24).map_err(|_| invalid())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{OperatorConfig, OperatorConfigError, DEFAULT_WEBHOOK_PORT};

    fn config(vars: &[(&'static str, &str)]) -> Result<OperatorConfig, OperatorConfigError> {
        let vars: HashMap<_, _> = vars
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect();

        OperatorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_env() {
        let config = config(&[]).unwrap();

        assert_eq!(config.namespace, "gefyra");
        assert_eq!(config.stowaway.namespace, "gefyra");
        assert_eq!(config.stowaway.wireguard_ext_port, 31820);
        assert!(config.webhook.is_none());
    }

    #[test]
    fn env_overrides_release() {
        let config = config(&[
            ("GEFYRA_NAMESPACE", "bridge"),
            ("GEFYRA_STOWAWAY_TAG", "2.1.0"),
            ("GEFYRA_WIREGUARD_EXT_PORT", "31999"),
            ("GEFYRA_STOWAWAY_INTERNAL_SUBNET", "192.168.100.0"),
            ("GEFYRA_WEBHOOK_CERT", "/certs/tls.crt"),
            ("GEFYRA_WEBHOOK_KEY", "/certs/tls.key"),
        ])
        .unwrap();

        assert_eq!(config.stowaway.namespace, "bridge");
        assert!(config.stowaway.image_name().ends_with(":2.1.0"));
        assert_eq!(config.stowaway.wireguard_ext_port, 31999);
        assert_eq!(config.stowaway.internal_subnet.to_string(), "192.168.100.0/24");
        assert_eq!(config.webhook.unwrap().port, DEFAULT_WEBHOOK_PORT);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config(&[("GEFYRA_WIREGUARD_EXT_PORT", "99999")]),
            Err(OperatorConfigError::InvalidValue("GEFYRA_WIREGUARD_EXT_PORT", _))
        ));
        assert!(matches!(
            config(&[("GEFYRA_WEBHOOK_CERT", "/certs/tls.crt")]),
            Err(OperatorConfigError::VarUnset("GEFYRA_WEBHOOK_KEY"))
        ));
    }
}
