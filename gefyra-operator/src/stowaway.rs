use async_trait::async_trait;
use gefyra_core::{
    connection::{
        stowaway::{
            control::{ControlError, StowawayControl},
            route::ProxyRoute,
            SUBNET_PARAMETER,
        },
        Parameters,
    },
    kubernetes::{
        operations::{
            apply_resource, exec_text, find_running_pod, is_not_found, try_remove_resource,
            ExecError,
        },
        GetApi,
    },
    resources::{
        labels::{get_joined_stowaway_labels, ROUTE_PEER_LABEL},
        stowaway::{
            configmap::parse_proxy_route_configmap, deployment::CONTAINER_NAME, StowawayRelease,
            WIREGUARD_SERVICE_NAME,
        },
    },
    OPERATOR_FIELD_MANAGER, STOWAWAY_NAME, STOWAWAY_PROXYROUTE_CONFIGMAP_NAME,
};
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Service, ServiceAccount},
};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams},
    Client,
};
use log::{debug, warn};

const WIREGUARD_CONFIG_DIR: &str = "/config";
const PEER_DIR_PREFIX: &str = "peer_";

/// Stowaway control surface backed by the Kubernetes API. Peers live in the
/// WireGuard configuration of the Stowaway pod, routes in the proxy-route
/// configmap (mounted into the pod) plus one service per route.
pub struct KubeStowawayControl {
    client: Client,
    release: StowawayRelease,
}

impl KubeStowawayControl {
    pub fn new(client: Client, release: StowawayRelease) -> Self {
        Self { client, release }
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams::apply(OPERATOR_FIELD_MANAGER).force()
    }

    async fn stowaway_pod(&self) -> Result<String, ControlError> {
        find_running_pod(
            &self.client,
            &self.release.namespace,
            &get_joined_stowaway_labels(),
        )
        .await
        .map_err(kube_error)?
        .ok_or_else(|| ControlError::Unreachable("Stowaway pod is not running!".to_owned()))
    }

    async fn exec(&self, command: Vec<String>) -> Result<String, ControlError> {
        let pod = self.stowaway_pod().await?;

        exec_text(
            &self.client,
            &self.release.namespace,
            &pod,
            Some(CONTAINER_NAME),
            command,
        )
        .await
        .map_err(|err| match err {
            ExecError::Failed(reason) => ControlError::Rejected(reason),
            ExecError::Kube(err) => kube_error(err),
            err => ControlError::Unreachable(err.to_string()),
        })
    }

    async fn ensure_route_configmap(&self) -> Result<(), ControlError> {
        let api = self
            .client
            .namespaced_api::<ConfigMap>(&self.release.namespace);

        // existing routes must survive a redeploy
        if api
            .get_opt(STOWAWAY_PROXYROUTE_CONFIGMAP_NAME)
            .await
            .map_err(kube_error)?
            .is_some()
        {
            return Ok(());
        }

        let configmap = self.release.generate_proxy_route_configmap(std::iter::empty());
        apply_resource(&self.client, &configmap, &self.patch_params())
            .await
            .map_err(|err| ControlError::Rejected(err.to_string()))?;

        Ok(())
    }

    async fn patch_route_entry(
        &self,
        route: &ProxyRoute,
        value: Option<String>,
    ) -> Result<(), ControlError> {
        let api = self
            .client
            .namespaced_api::<ConfigMap>(&self.release.namespace);
        let patch = serde_json::json!({
            "data": { (route.entry_key()): value }
        });

        api.patch(
            STOWAWAY_PROXYROUTE_CONFIGMAP_NAME,
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(kube_error)?;

        Ok(())
    }
}

#[async_trait]
impl StowawayControl for KubeStowawayControl {
    fn namespace(&self) -> &str {
        &self.release.namespace
    }

    async fn is_deployed(&self) -> Result<bool, ControlError> {
        let deployment = self
            .client
            .namespaced_api::<Deployment>(&self.release.namespace)
            .get_opt(STOWAWAY_NAME)
            .await
            .map_err(kube_error)?;

        Ok(deployment.is_some())
    }

    async fn deploy(&self, config: Option<&Parameters>) -> Result<(), ControlError> {
        if let Some(config) = config {
            debug!("Ignoring install parameters: {config:?}");
        }

        let rejected = |err: anyhow::Error| ControlError::Rejected(err.to_string());
        let patch_params = self.patch_params();
        let service_account = self.release.generate_service_account();
        let deployment = self
            .release
            .generate_deployment(&service_account)
            .map_err(|err| ControlError::Rejected(err.to_string()))?;
        let service = self.release.generate_wireguard_service();

        apply_resource(&self.client, &service_account, &patch_params)
            .await
            .map_err(rejected)?;
        self.ensure_route_configmap().await?;
        apply_resource(&self.client, &deployment, &patch_params)
            .await
            .map_err(rejected)?;
        apply_resource(&self.client, &service, &patch_params)
            .await
            .map_err(rejected)?;

        Ok(())
    }

    async fn undeploy(&self) -> Result<(), ControlError> {
        let namespace = &self.release.namespace;
        let delete_params = DeleteParams::foreground();

        let service_api = self.client.namespaced_api::<Service>(namespace);
        let route_services = service_api
            .list(&ListParams::default().labels(ROUTE_PEER_LABEL))
            .await
            .map_err(kube_error)?;

        for service in route_services.items {
            if let Some(name) = service.metadata.name {
                try_remove_resource(&service_api, &name, &delete_params)
                    .await
                    .map_err(kube_error)?;
            }
        }

        try_remove_resource(&service_api, WIREGUARD_SERVICE_NAME, &delete_params)
            .await
            .map_err(kube_error)?;
        try_remove_resource(
            &self.client.namespaced_api::<Deployment>(namespace),
            STOWAWAY_NAME,
            &delete_params,
        )
        .await
        .map_err(kube_error)?;
        try_remove_resource(
            &self.client.namespaced_api::<ConfigMap>(namespace),
            STOWAWAY_PROXYROUTE_CONFIGMAP_NAME,
            &delete_params,
        )
        .await
        .map_err(kube_error)?;
        try_remove_resource(
            &self.client.namespaced_api::<ServiceAccount>(namespace),
            STOWAWAY_NAME,
            &delete_params,
        )
        .await
        .map_err(kube_error)?;

        Ok(())
    }

    async fn is_responsive(&self) -> Result<bool, ControlError> {
        match self.exec(command(["wg", "show", "wg0", "public-key"])).await {
            Ok(key) => Ok(!key.trim().is_empty()),
            Err(ControlError::Rejected(reason)) => {
                warn!("Stowaway health check failed! {reason}");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn list_peers(&self) -> Result<Vec<String>, ControlError> {
        let listing = self.exec(command(["ls", "-1", WIREGUARD_CONFIG_DIR])).await?;

        Ok(parse_peer_listing(&listing))
    }

    async fn create_peer(
        &self,
        peer_id: &str,
        parameters: Option<&Parameters>,
    ) -> Result<(), ControlError> {
        let mut add_peer = command(["bash", "add-peer.sh", peer_id]);

        if let Some(subnet) = parameters.and_then(|p| p.get(SUBNET_PARAMETER)) {
            add_peer.push(subnet.to_owned());
        }

        self.exec(add_peer).await?;

        Ok(())
    }

    async fn delete_peer(&self, peer_id: &str) -> Result<(), ControlError> {
        self.exec(command(["bash", "delete-peer.sh", peer_id]))
            .await?;

        Ok(())
    }

    async fn read_peer_config(&self, peer_id: &str) -> Result<String, ControlError> {
        let path = format!("{WIREGUARD_CONFIG_DIR}/{PEER_DIR_PREFIX}{peer_id}/{PEER_DIR_PREFIX}{peer_id}.conf");

        match self.exec(command(["cat", path.as_str()])).await {
            Err(ControlError::Rejected(_)) => Err(ControlError::NotFound(peer_id.to_owned())),
            result => result,
        }
    }

    async fn list_routes(&self) -> Result<Vec<ProxyRoute>, ControlError> {
        let configmap = self
            .client
            .namespaced_api::<ConfigMap>(&self.release.namespace)
            .get_opt(STOWAWAY_PROXYROUTE_CONFIGMAP_NAME)
            .await
            .map_err(kube_error)?;

        Ok(configmap
            .as_ref()
            .map(parse_proxy_route_configmap)
            .unwrap_or_default())
    }

    async fn apply_route_service(&self, route: &ProxyRoute) -> Result<(), ControlError> {
        let service = self.release.generate_proxy_route_service(route);

        apply_resource(&self.client, &service, &self.patch_params())
            .await
            .map_err(|err| ControlError::Rejected(err.to_string()))?;

        Ok(())
    }

    async fn write_route_entry(&self, route: &ProxyRoute) -> Result<(), ControlError> {
        self.ensure_route_configmap().await?;
        self.patch_route_entry(route, Some(route.entry_value()))
            .await
    }

    async fn delete_route(&self, route: &ProxyRoute) -> Result<(), ControlError> {
        self.patch_route_entry(route, None).await?;

        try_remove_resource(
            &self
                .client
                .namespaced_api::<Service>(&self.release.namespace),
            &route.service_name(),
            &DeleteParams::default(),
        )
        .await
        .map_err(kube_error)?;

        Ok(())
    }
}

fn command<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn kube_error(error: kube::Error) -> ControlError {
    if is_not_found(&error) {
        return ControlError::NotFound(error.to_string());
    }

    match error {
        kube::Error::Api(response) if (400..500).contains(&response.code) => {
            ControlError::Rejected(format!("{} ({})", response.message, response.reason))
        }
        other => ControlError::Unreachable(other.to_string()),
    }
}

fn parse_peer_listing(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.trim().strip_prefix(PEER_DIR_PREFIX))
        .filter(|peer| !peer.is_empty())
        .map(|peer| peer.to_owned())
        .collect()
}
