use std::net::Ipv4Addr;

use derive_builder::Builder;
use ipnet::Ipv4Net;
use kube::core::ObjectMeta;

use crate::STOWAWAY_NAME;

use super::labels::get_stowaway_labels;

pub mod configmap;
pub mod deployment;
pub mod rbac;
pub mod service;

pub const WIREGUARD_PORT: i32 = 51820;
pub const WIREGUARD_SERVICE_NAME: &str = "gefyra-stowaway-wireguard";

/// Everything needed to render the Stowaway proxy into a namespace.
#[derive(Debug, Clone, Builder)]
pub struct StowawayRelease {
    #[builder(setter(into))]
    pub namespace: String,
    #[builder(setter(into), default = "\"quay.io/gefyra/stowaway\".to_owned()")]
    pub image: String,
    #[builder(setter(into), default = "\"latest\".to_owned()")]
    pub tag: String,
    #[builder(setter(into), default = "\"IfNotPresent\".to_owned()")]
    pub image_pull_policy: String,
    /// node port the WireGuard endpoint is exposed on
    #[builder(default = "31820")]
    pub wireguard_ext_port: u16,
    #[builder(setter(into), default = "\"auto\".to_owned()")]
    pub peer_dns: String,
    #[builder(default = "default_subnet()")]
    pub internal_subnet: Ipv4Net,
    #[builder(default = "default_subnet()")]
    pub peer_subnet: Ipv4Net,
    #[builder(setter(into), default = "\"1000\".to_owned()")]
    pub puid: String,
    #[builder(setter(into), default = "\"1000\".to_owned()")]
    pub pgid: String,
}

fn default_subnet() -> Ipv4Net {
    Ipv4Net::new(Ipv4Addr::new(192, 168, 99, 0), 24).unwrap_or_default()
}

impl StowawayRelease {
    pub fn image_name(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    pub fn generate_stowaway_metadata(&self) -> ObjectMeta {
        ObjectMeta {
            labels: Some(get_stowaway_labels()),
            namespace: Some(self.namespace.to_owned()),
            name: Some(STOWAWAY_NAME.to_owned()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{StowawayRelease, StowawayReleaseBuilder};

    pub fn release() -> StowawayRelease {
        StowawayReleaseBuilder::default()
            .namespace("gefyra")
            .tag("2.0.0")
            .build()
            .unwrap()
    }

    #[test]
    fn builder_fills_defaults() {
        let release = release();

        assert_eq!(release.image_name(), "quay.io/gefyra/stowaway:2.0.0");
        assert_eq!(release.wireguard_ext_port, 31820);
        assert_eq!(release.peer_subnet.to_string(), "192.168.99.0/24");
    }

    #[test]
    fn builder_requires_namespace() {
        assert!(StowawayReleaseBuilder::default().build().is_err());
    }
}
