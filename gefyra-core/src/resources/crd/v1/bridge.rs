use std::{collections::BTreeMap, fmt::Display};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::condition::Condition;

/// Routes traffic from inside the cluster to a destination behind a client's
/// tunnel.
#[skip_serializing_none]
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "gefyra.dev",
    version = "v1",
    kind = "GefyraBridge",
    namespaced,
    status = "GefyraBridgeStatus",
    derive = "Default",
    shortname = "gbridge"
)]
pub struct GefyraBridgeSpec {
    /// name of the GefyraClient the destination is reachable through
    pub client: String,
    /// address of the destination inside the client's network
    pub destination_ip: String,
    pub ports: Vec<i32>,
}

#[skip_serializing_none]
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GefyraBridgeStatus {
    pub state: BridgeState,
    /// destination the current routes point at
    pub destination_ip: Option<String>,
    /// destination port -> in-cluster service URL
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum BridgeState {
    #[default]
    Requested,
    Creating,
    Active,
    Error,
}

impl Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeState::Requested => f.write_str("bridge was requested"),
            BridgeState::Creating => f.write_str("routes are being created"),
            BridgeState::Active => f.write_str("routes are active"),
            BridgeState::Error => f.write_str("an error occurred while creating the routes"),
        }
    }
}
