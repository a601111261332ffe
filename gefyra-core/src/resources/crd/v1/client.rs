use std::{collections::BTreeMap, fmt::Display};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::connection::{ClientRegistration, Parameters, PeerConfig};

use super::condition::Condition;

/// A local client that wants to join the cluster network through a tunnel.
#[skip_serializing_none]
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "gefyra.dev",
    version = "v1",
    kind = "GefyraClient",
    namespaced,
    status = "GefyraClientStatus",
    derive = "Default",
    shortname = "gclient"
)]
pub struct GefyraClientSpec {
    /// connection provider, `stowaway` if empty
    #[serde(default)]
    pub provider: String,
    /// provider specific settings, e.g. the requested `subnet`
    #[serde(default)]
    pub provider_parameters: BTreeMap<String, String>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GefyraClientStatus {
    pub state: ClientState,
    /// values the local client needs to connect, keyed `Section.Key`
    pub provider_config: Option<PeerConfig>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum ClientState {
    #[default]
    Requested,
    Creating,
    Waiting,
    Active,
    Error,
}

impl Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientState::Requested => f.write_str("client was requested"),
            ClientState::Creating => f.write_str("peer is being created"),
            ClientState::Waiting => f.write_str("waiting for the connection provider"),
            ClientState::Active => f.write_str("peer is active"),
            ClientState::Error => f.write_str("an error occurred while creating the peer"),
        }
    }
}

impl GefyraClient {
    pub fn provider_parameters(&self) -> Option<&Parameters> {
        match self.spec.provider_parameters.is_empty() {
            true => None,
            false => Some(&self.spec.provider_parameters),
        }
    }

    pub fn to_registration(&self) -> ClientRegistration {
        ClientRegistration {
            name: self.metadata.name.to_owned().unwrap_or_default(),
            provider: self.spec.provider.to_owned(),
            parameters: self.spec.provider_parameters.to_owned(),
        }
    }
}
