use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::core::ObjectMeta;

use crate::{
    connection::stowaway::route::ProxyRoute, resources::labels::get_stowaway_labels,
    STOWAWAY_PROXYROUTE_CONFIGMAP_NAME,
};

use super::StowawayRelease;

impl StowawayRelease {
    pub fn generate_proxy_route_configmap_metadata(&self) -> ObjectMeta {
        ObjectMeta {
            labels: Some(get_stowaway_labels()),
            namespace: Some(self.namespace.to_owned()),
            name: Some(STOWAWAY_PROXYROUTE_CONFIGMAP_NAME.to_owned()),
            ..Default::default()
        }
    }

    pub fn generate_proxy_route_configmap<'a>(
        &self,
        routes: impl IntoIterator<Item = &'a ProxyRoute>,
    ) -> ConfigMap {
        let data = routes
            .into_iter()
            .map(|route| (route.entry_key(), route.entry_value()))
            .collect::<BTreeMap<_, _>>();

        ConfigMap {
            metadata: self.generate_proxy_route_configmap_metadata(),
            data: Some(data),
            ..Default::default()
        }
    }
}

/// Reads routes back from the configmap, malformed entries are skipped.
pub fn parse_proxy_route_configmap(configmap: &ConfigMap) -> Vec<ProxyRoute> {
    configmap
        .data
        .iter()
        .flatten()
        .filter_map(|(key, value)| ProxyRoute::from_entry(key, value))
        .collect()
}
