use std::sync::Arc;

use futures::StreamExt;
use gefyra_core::{
    kubernetes::GetApi,
    resources::crd::v1::{bridge::GefyraBridge, client::GefyraClient},
};
use kube::runtime::{watcher::Config, Controller};
use log::info;

use crate::{
    helpers::report_reconciliation,
    reconciler::{
        bridge::{reconcile_bridge, reconcile_bridge_error},
        client::{reconcile_client, reconcile_client_error},
        context::ReconcilerContext,
    },
};

pub async fn start_client_controller(context: Arc<ReconcilerContext>) {
    info!("Creating client controller...");

    let api = context
        .client
        .namespaced_api::<GefyraClient>(&context.config.namespace);
    let controller = Controller::new(api, Config::default())
        .shutdown_on_signal()
        .run(reconcile_client, reconcile_client_error, context.clone())
        .for_each(report_reconciliation);

    info!("Client controller created!");

    controller.await
}

pub async fn start_bridge_controller(context: Arc<ReconcilerContext>) {
    info!("Creating bridge controller...");

    let api = context
        .client
        .namespaced_api::<GefyraBridge>(&context.config.namespace);
    let controller = Controller::new(api, Config::default())
        .shutdown_on_signal()
        .run(reconcile_bridge, reconcile_bridge_error, context.clone())
        .for_each(report_reconciliation);

    info!("Bridge controller created!");

    controller.await
}
