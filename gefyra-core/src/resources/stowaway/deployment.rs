use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Capabilities, ConfigMapVolumeSource, Container, ContainerPort, EnvVar,
            HostPathVolumeSource, PodSpec, PodTemplateSpec, ResourceRequirements,
            SecurityContext, ServiceAccount, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::LabelSelector},
};
use kube::core::ObjectMeta;

use crate::{
    helpers::RequireMetadata,
    resources::{labels::get_stowaway_labels, ResourceGenerationError},
    STOWAWAY_PROXYROUTE_CONFIGMAP_NAME,
};

use super::{StowawayRelease, WIREGUARD_PORT};

pub const PROXY_ROUTES_MOUNT_PATH: &str = "/stowaway/proxyroutes";
pub const CONTAINER_NAME: &str = "stowaway";

impl StowawayRelease {
    pub fn generate_deployment(
        &self,
        service_account: &ServiceAccount,
    ) -> Result<Deployment, ResourceGenerationError> {
        let labels = get_stowaway_labels();
        let service_account_name = service_account
            .require_name_or(ResourceGenerationError::DependentMissingMetadataName)?
            .to_owned();

        let pod_spec = PodSpec {
            service_account_name: Some(service_account_name),
            containers: vec![Container {
                name: CONTAINER_NAME.to_owned(),
                image: Some(self.image_name()),
                image_pull_policy: Some(self.image_pull_policy.to_owned()),
                // the node port service maps the external port onto this one
                ports: Some(vec![ContainerPort {
                    container_port: WIREGUARD_PORT,
                    protocol: Some("UDP".to_owned()),
                    ..Default::default()
                }]),
                resources: Some(ResourceRequirements {
                    requests: Some(quantities("0.1", "100Mi")),
                    limits: Some(quantities("0.75", "500Mi")),
                    ..Default::default()
                }),
                env: Some(self.generate_env()),
                security_context: Some(SecurityContext {
                    capabilities: Some(Capabilities {
                        add: Some(vec!["NET_ADMIN".to_owned()]),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                volume_mounts: Some(vec![
                    VolumeMount {
                        name: "proxyroutes".to_owned(),
                        mount_path: PROXY_ROUTES_MOUNT_PATH.to_owned(),
                        ..Default::default()
                    },
                    VolumeMount {
                        name: "host-libs".to_owned(),
                        mount_path: "/lib/modules".to_owned(),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }],
            volumes: Some(vec![
                Volume {
                    name: "proxyroutes".to_owned(),
                    config_map: Some(ConfigMapVolumeSource {
                        name: STOWAWAY_PROXYROUTE_CONFIGMAP_NAME.to_owned(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Volume {
                    name: "host-libs".to_owned(),
                    host_path: Some(HostPathVolumeSource {
                        path: "/lib/modules".to_owned(),
                        type_: Some("Directory".to_owned()),
                    }),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        Ok(Deployment {
            metadata: self.generate_stowaway_metadata(),
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_expressions: None,
                    match_labels: Some(labels.to_owned()),
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(pod_spec),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn generate_env(&self) -> Vec<EnvVar> {
        [
            ("PEERS", "1".to_owned()),
            ("SERVERPORT", self.wireguard_ext_port.to_string()),
            ("PUID", self.puid.to_owned()),
            ("PGID", self.pgid.to_owned()),
            ("PEERDNS", self.peer_dns.to_owned()),
            ("INTERNAL_SUBNET", self.internal_subnet.network().to_string()),
            ("SERVER_ALLOWEDIPS_PEER_1", self.peer_subnet.to_string()),
        ]
        .into_iter()
        .map(|(name, value)| EnvVar {
            name: name.to_owned(),
            value: Some(value),
            ..Default::default()
        })
        .collect()
    }
}

fn quantities(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_owned(), Quantity(cpu.to_owned())),
        ("memory".to_owned(), Quantity(memory.to_owned())),
    ])
}
