use std::collections::BTreeMap;

use async_trait::async_trait;
use gefyra_core::{
    kubernetes::{
        operations::{exec_text, is_not_found, ExecError},
        GetApi,
    },
    mapping::workload::{WorkloadLocator, WorkloadType},
};
use k8s_openapi::{
    api::{
        apps::v1::{Deployment, StatefulSet},
        core::v1::Pod,
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::{api::ListParams, Api, Client};

use crate::bridge::{RemoteError, WorkloadResolver};

pub struct KubeWorkloadResolver {
    client: Client,
}

impl KubeWorkloadResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn pods_by_selector(
        &self,
        namespace: &str,
        selector: Option<LabelSelector>,
        workload: &WorkloadLocator,
    ) -> Result<Vec<Pod>, RemoteError> {
        let labels = selector
            .and_then(|selector| selector.match_labels)
            .filter(|labels| !labels.is_empty())
            .ok_or_else(|| {
                RemoteError::Rejected(format!(
                    "{}/{} has no label selector",
                    workload.workload_type, workload.name
                ))
            })?;
        let selector = labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        let pod_api: Api<Pod> = self.client.namespaced_api(namespace);
        let pods = pod_api
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(remote_error)?;

        Ok(pods.items)
    }
}

fn remote_error(error: kube::Error) -> RemoteError {
    if is_not_found(&error) {
        return RemoteError::NotFound(error.to_string());
    }

    match error {
        kube::Error::Api(response) => RemoteError::Rejected(response.reason),
        other => RemoteError::Rejected(other.to_string()),
    }
}

fn pod_containers(pods: Vec<Pod>) -> BTreeMap<String, Vec<String>> {
    pods.into_iter()
        .filter_map(|pod| {
            let containers = pod
                .spec?
                .containers
                .into_iter()
                .map(|container| container.name)
                .collect();

            Some((pod.metadata.name?, containers))
        })
        .collect()
}

#[async_trait]
impl WorkloadResolver for KubeWorkloadResolver {
    async fn resolve_pods(
        &self,
        namespace: &str,
        locator: &WorkloadLocator,
    ) -> Result<BTreeMap<String, Vec<String>>, RemoteError> {
        let pods = match locator.workload_type {
            WorkloadType::Pod => {
                let pod_api: Api<Pod> = self.client.namespaced_api(namespace);

                vec![pod_api.get(&locator.name).await.map_err(remote_error)?]
            }
            WorkloadType::Deployment => {
                let api: Api<Deployment> = self.client.namespaced_api(namespace);
                let selector = api
                    .get(&locator.name)
                    .await
                    .map_err(remote_error)?
                    .spec
                    .map(|spec| spec.selector);

                self.pods_by_selector(namespace, selector, locator).await?
            }
            WorkloadType::StatefulSet => {
                let api: Api<StatefulSet> = self.client.namespaced_api(namespace);
                let selector = api
                    .get(&locator.name)
                    .await
                    .map_err(remote_error)?
                    .spec
                    .map(|spec| spec.selector);

                self.pods_by_selector(namespace, selector, locator).await?
            }
        };

        Ok(pod_containers(pods))
    }

    async fn fetch_env(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<String, RemoteError> {
        exec_text(&self.client, namespace, pod, Some(container), ["env"])
            .await
            .map_err(|error| match error {
                ExecError::Kube(error) => remote_error(error),
                other => RemoteError::Rejected(other.to_string()),
            })
    }
}
