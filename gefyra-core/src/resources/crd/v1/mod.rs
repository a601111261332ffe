use kube::{api::PatchParams, Client, CustomResourceExt};

use crate::kubernetes::operations::apply_crd;

use self::{bridge::GefyraBridge, client::GefyraClient};

pub mod bridge;
pub mod client;
pub mod condition;

pub async fn create_v1_crds(client: &Client, apply_params: &PatchParams) -> anyhow::Result<()> {
    apply_crd(client, &GefyraClient::crd(), apply_params).await?;
    apply_crd(client, &GefyraBridge::crd(), apply_params).await?;

    Ok(())
}
