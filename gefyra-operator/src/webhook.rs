use std::{convert::Infallible, sync::Arc};

use gefyra_core::{kubernetes::GetApi, resources::crd::v1::client::GefyraClient};
use kube::{
    api::ListParams,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use log::{info, warn};
use warp::{reply::Json, Filter};

use crate::{
    config::WebhookConfig,
    reconciler::{admission::admit_client, context::ReconcilerContext},
};

pub async fn serve_webhook(config: WebhookConfig, context: Arc<ReconcilerContext>) {
    let with_context = warp::any().map(move || context.clone());
    let client_validation = warp::post()
        .and(warp::path("client-validation"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_context)
        .and_then(client_validation_handler);

    info!("Serving admission webhook on port {}...", config.port);

    warp::serve(client_validation)
        .tls()
        .cert_path(&config.cert_path)
        .key_path(&config.key_path)
        .run(([0, 0, 0, 0], config.port))
        .await;
}

async fn client_validation_handler(
    review: AdmissionReview<GefyraClient>,
    context: Arc<ReconcilerContext>,
) -> Result<Json, Infallible> {
    let request: AdmissionRequest<GefyraClient> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            warn!("Received an invalid admission review! {err}");
            return Ok(warp::reply::json(
                &AdmissionResponse::invalid(err.to_string()).into_review(),
            ));
        }
    };

    let clients = match context
        .client
        .namespaced_api::<GefyraClient>(&context.config.namespace)
        .list(&ListParams::default())
        .await
    {
        Ok(clients) => clients.items,
        Err(err) => {
            let response = AdmissionResponse::from(&request)
                .deny(format!("Couldn't list registered clients! {err}"));

            return Ok(warp::reply::json(&response.into_review()));
        }
    };

    let response = admit_client(
        &request,
        &context.config.namespace,
        context.provider.as_ref(),
        &clients,
    ).await;

    Ok(warp::reply::json(&response.into_review()))
}
