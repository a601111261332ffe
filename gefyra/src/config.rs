use std::{
    fs::File,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context};
use gefyra_core::helpers::With;
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::BridgeSettings;

pub const DEFAULT_CONFIG_FILENAME: &str = "gefyra-config";
pub const KUBECONFIG_ENV_VAR: &str = "KUBECONFIG";

#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("Io error: {}", .0)]
    IoError(std::io::Error),
    #[error("Deserialization error: {}", .0)]
    DeserializationError(serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub network_name: String,
    pub cargo_container_name: String,
    pub probe_address: String,
    pub probe_attempts: u32,
    pub probe_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network_name: "gefyra".to_owned(),
            cargo_container_name: "gefyra-cargo".to_owned(),
            probe_address: "192.168.99.1".to_owned(),
            probe_attempts: 3,
            probe_timeout_secs: 2,
        }
    }
}

impl ClientConfig {
    /// A missing file yields the defaults; the file is never created.
    pub fn load_or_default(path: &Path) -> Result<Self, ClientConfigError> {
        debug!("Used config path: {path:?}");

        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => return Err(ClientConfigError::IoError(error)),
        };

        serde_yaml::from_reader(file).map_err(ClientConfigError::DeserializationError)
    }

    pub fn bridge_settings(&self, working_dir: PathBuf) -> BridgeSettings {
        BridgeSettings {
            network_name: self.network_name.to_owned(),
            cargo_container_name: self.cargo_container_name.to_owned(),
            probe_address: self.probe_address.to_owned(),
            probe_attempts: self.probe_attempts,
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            working_dir,
        }
    }
}

pub struct ConfigContext {
    kube_config: Kubeconfig,
    client_config: ClientConfig,
    kube_context_name: String,
}

impl ConfigContext {
    pub fn new(
        kube_config_path: Option<&Path>,
        client_config_path: Option<&Path>,
        kube_context: Option<&str>,
    ) -> anyhow::Result<Self> {
        let kube_config_path = match kube_config_path {
            Some(path) => path.to_owned(),
            None => std::env::var(KUBECONFIG_ENV_VAR)
                .map(|s| s.into())
                .or_else(|_| {
                    home::home_dir()
                        .map(|d| d.with(|d| d.push(".kube")).with(|d| d.push("config")))
                        .ok_or(anyhow!("Missing home dir!"))
                })?,
        };

        let kube_config =
            Kubeconfig::read_from(&kube_config_path).context("Couldn't load kubeconfig!")?;
        let client_config_path = match client_config_path {
            Some(path) => {
                if path.file_name().is_none() {
                    return Err(anyhow!("Gefyra config path is invalid!"));
                }

                path.into()
            }
            None => kube_config_path
                .as_path()
                .parent()
                .unwrap_or(Path::new(""))
                .to_owned()
                .with(|d| d.push(DEFAULT_CONFIG_FILENAME)),
        };
        let client_config = ClientConfig::load_or_default(&client_config_path)?;
        let kube_context_name = match kube_context {
            Some(name) => name.to_owned(),
            None => kube_config
                .current_context
                .as_ref()
                .ok_or(anyhow!(
                    "Current context isn't set! Desired context must be specified manually!"
                ))?
                .to_owned(),
        };

        Ok(Self {
            kube_config,
            client_config,
            kube_context_name,
        })
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.client_config
    }

    pub async fn create_client(&self) -> anyhow::Result<Client> {
        let config_options = KubeConfigOptions {
            context: Some(self.kube_context_name.to_owned()),
            ..Default::default()
        };

        let config =
            Config::from_custom_kubeconfig(self.kube_config.clone(), &config_options).await?;
        let client = Client::try_from(config)?;

        Ok(client)
    }
}
