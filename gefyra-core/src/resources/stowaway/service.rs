use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::util::intstr::IntOrString,
};
use kube::core::ObjectMeta;

use crate::{
    connection::stowaway::route::ProxyRoute,
    resources::labels::{get_proxy_route_labels, get_stowaway_labels},
};

use super::{StowawayRelease, WIREGUARD_PORT, WIREGUARD_SERVICE_NAME};

impl StowawayRelease {
    pub fn generate_wireguard_service(&self) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(WIREGUARD_SERVICE_NAME.to_owned()),
                ..self.generate_stowaway_metadata()
            },
            spec: Some(ServiceSpec {
                type_: Some("NodePort".to_owned()),
                selector: Some(get_stowaway_labels()),
                ports: Some(vec![ServicePort {
                    name: Some("wireguard".to_owned()),
                    port: WIREGUARD_PORT,
                    target_port: Some(IntOrString::Int(WIREGUARD_PORT)),
                    node_port: Some(self.wireguard_ext_port.into()),
                    protocol: Some("UDP".to_owned()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Cluster-internal service exposing a single proxy route.
    pub fn generate_proxy_route_service(&self, route: &ProxyRoute) -> Service {
        let port: i32 = route.proxy_port.into();

        Service {
            metadata: ObjectMeta {
                name: Some(route.service_name()),
                namespace: Some(self.namespace.to_owned()),
                labels: Some(get_proxy_route_labels(&route.peer_id)),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                selector: Some(get_stowaway_labels()),
                ports: Some(vec![ServicePort {
                    name: Some(format!("proxy-{port}")),
                    port,
                    target_port: Some(IntOrString::Int(port)),
                    protocol: Some("TCP".to_owned()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
