use std::fmt::Debug;

use anyhow::anyhow;
use k8s_openapi::{
    api::core::v1::Pod,
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    serde::{de::DeserializeOwned, Serialize},
    NamespaceResourceScope,
};
use kube::{
    api::{AttachParams, DeleteParams, Patch, PatchParams},
    core::ObjectMeta,
    Api, Client, Resource,
};
use log::{debug, info};
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::{helpers::pretty_type_name, kubernetes::FromStatus};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Couldn't execute the command! {}", .0)]
    Kube(#[from] kube::Error),
    #[error("Couldn't read the remote process output! {}", .0)]
    Io(#[from] std::io::Error),
    #[error("Couldn't retrieve the remote process {}!", .0)]
    MissingStream(&'static str),
    #[error("Remote command failed! {}", .0)]
    Failed(String),
}

pub async fn apply_resource<T>(
    client: &Client,
    resource: &T,
    patch_params: &PatchParams,
) -> anyhow::Result<T>
where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Serialize
        + Clone
        + DeserializeOwned
        + Debug,
{
    let resource_name = resource
        .meta()
        .name
        .as_deref()
        .ok_or_else(|| anyhow!("{} is missing a name!", pretty_type_name::<T>()))?;
    let namespace = resource
        .meta()
        .namespace
        .as_deref()
        .ok_or_else(|| anyhow!("{} is missing a namespace!", pretty_type_name::<T>()))?;

    info!(
        "Applying '{resource_name}' {} resource...",
        pretty_type_name::<T>()
    );

    let resource_api: Api<T> = Api::namespaced(client.clone(), namespace);
    let applied = resource_api
        .patch(resource_name, patch_params, &Patch::Apply(resource))
        .await
        .map_err(|err| {
            anyhow!(
                "Unable to apply '{resource_name}' {} resource! {err}",
                pretty_type_name::<T>()
            )
        })?;

    Ok(applied)
}

pub async fn apply_crd(
    client: &Client,
    crd: &CustomResourceDefinition,
    patch_params: &PatchParams,
) -> anyhow::Result<()> {
    let crd_name = crd
        .metadata
        .name
        .as_ref()
        .ok_or_else(|| anyhow!("CRD is missing a name!"))?;
    let crd_apiversions = crd
        .spec
        .versions
        .iter()
        .map(|version| version.name.as_str())
        .collect::<Vec<&str>>()
        .join(", ");

    info!("Applying {crd_name} ({crd_apiversions}) CRD...");

    let crd_api: Api<CustomResourceDefinition> = Api::all(client.clone());
    crd_api
        .patch(crd_name, patch_params, &Patch::Apply(crd))
        .await
        .map_err(|err| anyhow!("Unable to apply {crd_name} ({crd_apiversions}) CRD! {err}"))?;

    Ok(())
}

pub async fn apply_resource_status<T, S>(
    client: &Client,
    status: S,
    name: &str,
    namespace: &str,
    patch_params: &PatchParams,
) -> Result<T, kube::Error>
where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + FromStatus<S>
        + Serialize
        + Clone
        + DeserializeOwned
        + Debug,
{
    let api: Api<T> = Api::namespaced(client.clone(), namespace);
    let mut object = T::from_status(status);

    // server-side apply needs the identity of the object in the body
    *object.meta_mut() = ObjectMeta {
        name: Some(name.to_owned()),
        namespace: Some(namespace.to_owned()),
        ..Default::default()
    };

    let mut status_patch = serde_json::to_value(&object).map_err(kube::Error::SerdeError)?;
    if let Some(patch) = status_patch.as_object_mut() {
        patch.insert("apiVersion".to_owned(), T::api_version(&()).into());
        patch.insert("kind".to_owned(), T::kind(&()).into());
    }

    api.patch_status(name, patch_params, &Patch::Apply(status_patch))
        .await
}

/// Deletes the resource, returns `false` if it was already gone.
pub async fn try_remove_resource<T>(
    api: &Api<T>,
    name: &str,
    delete_params: &DeleteParams,
) -> Result<bool, kube::Error>
where
    T: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, delete_params).await {
        Ok(_) => {
            info!("Removed '{name}' {}...", pretty_type_name::<T>());
            Ok(true)
        }
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

/// Runs a command inside a pod and returns its standard output. A non-zero
/// exit is reported with the collected standard error.
pub async fn exec_text<I, T>(
    client: &Client,
    namespace: &str,
    pod: &str,
    container: Option<&str>,
    command: I,
) -> Result<String, ExecError>
where
    I: IntoIterator<Item = T> + Debug,
    T: Into<String>,
{
    let pod_api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let attach_params = AttachParams {
        container: container.map(|c| c.to_owned()),
        stdout: true,
        stderr: true,
        ..Default::default()
    };

    debug!("Executing {command:?} in '{pod}' ({namespace})...");

    let mut exec = pod_api.exec(pod, command, &attach_params).await?;
    let mut stdout = exec.stdout().ok_or(ExecError::MissingStream("stdout"))?;
    let mut stderr = exec.stderr().ok_or(ExecError::MissingStream("stderr"))?;
    let status = exec.take_status().ok_or(ExecError::MissingStream("status"))?;

    let mut output = String::new();
    let mut error = String::new();
    let (stdout_read, stderr_read) = tokio::join!(
        stdout.read_to_string(&mut output),
        stderr.read_to_string(&mut error)
    );
    stdout_read?;
    stderr_read?;

    match status.await {
        Some(status) if status.status.as_deref() == Some("Failure") => Err(ExecError::Failed(
            match error.trim().is_empty() {
                true => status.message.unwrap_or_default(),
                false => error.trim().to_owned(),
            },
        )),
        _ => Ok(output),
    }
}

/// Picks a running pod matching the label selector.
pub async fn find_running_pod(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<Option<String>, kube::Error> {
    let pod_api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let pods = pod_api
        .list(&kube::api::ListParams::default().labels(selector))
        .await?;

    Ok(pods
        .items
        .iter()
        .filter(|pod| {
            pod.status
                .as_ref()
                .and_then(|status| status.phase.as_deref())
                == Some("Running")
        })
        .find_map(|pod| pod.metadata.name.to_owned()))
}
