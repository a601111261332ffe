use std::{process::exit, sync::Arc};

use gefyra_core::{
    connection::{stowaway::StowawayProvider, ConnectionProvider},
    resources::crd::v1::create_v1_crds,
    OPERATOR_FIELD_MANAGER,
};
use kube::{api::PatchParams, Client};
use log::{error, info};
use tokio::{join, select};

use crate::{
    config::OperatorConfig,
    controllers::{start_bridge_controller, start_client_controller},
    reconciler::context::ReconcilerContext,
    stowaway::KubeStowawayControl,
    webhook::serve_webhook,
};

mod config;
mod controllers;
mod helpers;
mod reconciler;
mod stowaway;
mod webhook;

#[tokio::main]
async fn main() {
    configure_logger();

    let config = get_config();
    let client = create_client().await;

    install_crds(&client).await;

    let provider: Arc<dyn ConnectionProvider> = Arc::new(StowawayProvider::new(
        KubeStowawayControl::new(client.clone(), config.stowaway.clone()),
    ));

    install_provider(provider.as_ref()).await;

    let webhook = config.webhook.clone();
    let context = Arc::new(ReconcilerContext {
        client,
        config,
        provider,
    });

    let controllers = async {
        join!(
            start_client_controller(context.clone()),
            start_bridge_controller(context.clone())
        )
    };

    match webhook {
        Some(webhook) => select! {
            _ = controllers => (),
            _ = serve_webhook(webhook, context.clone()) => (),
        },
        None => {
            info!("No webhook certificate configured, admission webhook disabled");
            controllers.await;
        }
    }

    info!("Operator stopped");
}

async fn create_client() -> Client {
    match Client::try_default().await {
        Ok(client) => client,
        Err(error) => {
            error!("Couldn't create client! {error:?}");
            exit(6)
        }
    }
}

fn get_config() -> OperatorConfig {
    match OperatorConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!("Couldn't retrieve operator configuration! {error:?}");
            exit(7)
        }
    }
}

async fn install_crds(client: &Client) {
    if let Err(error) = create_v1_crds(client, &PatchParams::apply(OPERATOR_FIELD_MANAGER)).await {
        error!("Couldn't install custom resource definitions! {error:?}");
        exit(8)
    }
}

async fn install_provider(provider: &dyn ConnectionProvider) {
    match provider.installed(None).await {
        Ok(true) => info!("Connection provider '{}' is installed", provider.provider_type()),
        Ok(false) => {
            if let Err(error) = provider.install(None).await {
                error!("Couldn't install the connection provider! {error}");
                exit(9)
            }
        }
        Err(error) => {
            error!("Couldn't check the connection provider! {error}");
            exit(9)
        }
    }
}

fn configure_logger() {
    env_logger::builder()
        .default_format()
        .format_module_path(false)
        .filter_level(log::LevelFilter::Info)
        .init()
}
