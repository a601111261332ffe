use std::{sync::Arc, time::Duration};

use gefyra_core::{
    connection::{ConnectionProvider, ProviderError, ValidationHints},
    helpers::RequireMetadata,
    kubernetes::{operations::apply_resource_status, GetApi},
    resources::crd::v1::{
        client::{ClientState, GefyraClient, GefyraClientStatus},
        condition::{set_condition, Condition, PROVIDER_CONDITION, READY_CONDITION},
    },
    OPERATOR_FIELD_MANAGER,
};
use kube::{
    api::{ListParams, PatchParams},
    runtime::{
        controller::Action,
        finalizer::{finalizer, Error as FinalizerError, Event as FinalizerEvent},
    },
    CustomResourceExt,
};
use log::{info, warn};

use super::{
    admission::collect_hints, context::ReconcilerContext, error::ReconcilerError,
    get_error_action, RECONCILE_REQUEUE_SECS, WAITING_REQUEUE_SECS,
};

pub async fn reconcile_client(
    object: Arc<GefyraClient>,
    context: Arc<ReconcilerContext>,
) -> Result<Action, FinalizerError<ReconcilerError>> {
    let namespace = object
        .metadata
        .namespace
        .to_owned()
        .unwrap_or_else(|| context.config.namespace.to_owned());
    let client_api = context.client.namespaced_api::<GefyraClient>(&namespace);
    let finalizer_name = format!("{}/cleanup", GefyraClient::crd_name());

    finalizer(&client_api, &finalizer_name, object, |event| async {
        match event {
            FinalizerEvent::Apply(client) => try_reconcile(&client, &context).await,
            FinalizerEvent::Cleanup(client) => cleanup(&client, context.provider.as_ref()).await,
        }
    })
    .await
}

pub fn reconcile_client_error(
    _object: Arc<GefyraClient>,
    error: &FinalizerError<ReconcilerError>,
    _context: Arc<ReconcilerContext>,
) -> Action {
    get_error_action(error)
}

async fn try_reconcile(
    object: &GefyraClient,
    context: &ReconcilerContext,
) -> Result<Action, ReconcilerError> {
    let name = object.require_name_or(ReconcilerError::MissingObjectMetadata)?;
    let namespace = object.require_namespace_or(ReconcilerError::MissingObjectMetadata)?;
    let mut status = object.status.to_owned().unwrap_or_default();

    let hints = get_hints(name, namespace, context).await?;
    let reconcile_result = ensure_peer(object, context.provider.as_ref(), &hints, &mut status).await;

    if let Err(error) = &reconcile_result {
        mark_failed(&mut status, error);
    }

    let status_result = apply_resource_status::<GefyraClient, GefyraClientStatus>(
        &context.client,
        status,
        name,
        namespace,
        &PatchParams::apply(OPERATOR_FIELD_MANAGER).force(),
    )
    .await
    .map_err(ReconcilerError::KubeApiError);

    let action = reconcile_result?;
    status_result?;

    Ok(action)
}

async fn get_hints(
    name: &str,
    namespace: &str,
    context: &ReconcilerContext,
) -> Result<ValidationHints, ReconcilerError> {
    let clients = context
        .client
        .namespaced_api::<GefyraClient>(namespace)
        .list(&ListParams::default())
        .await
        .map_err(ReconcilerError::KubeApiError)?;

    Ok(collect_hints(name, namespace, &clients.items))
}

/// Registers the client as a peer and publishes its connection config.
pub async fn ensure_peer(
    object: &GefyraClient,
    provider: &dyn ConnectionProvider,
    hints: &ValidationHints,
    status: &mut GefyraClientStatus,
) -> Result<Action, ReconcilerError> {
    let name = object.require_name_or(ReconcilerError::MissingObjectMetadata)?;

    if !provider.ready().await {
        status.state = ClientState::Waiting;
        set_condition(
            &mut status.conditions,
            Condition::new(
                PROVIDER_CONDITION,
                false,
                "ProviderNotReady",
                "Waiting for the connection provider to become ready",
            ),
        );

        return Ok(Action::requeue(Duration::from_secs(WAITING_REQUEUE_SECS)));
    }

    set_condition(
        &mut status.conditions,
        Condition::new(PROVIDER_CONDITION, true, "ProviderReady", "Connection provider is ready"),
    );

    let exists = provider
        .peer_exists(name)
        .await
        .map_err(ReconcilerError::ProviderError)?;

    if !exists {
        provider
            .validate(&object.to_registration(), hints)
            .await
            .map_err(ReconcilerError::ProviderError)?;

        status.state = ClientState::Creating;
        info!("Registering peer for client '{name}'...");

        match provider.add_peer(name, object.provider_parameters()).await {
            Ok(()) => (),
            Err(ProviderError::Conflict(_)) => {
                warn!("Peer '{name}' was registered concurrently, continuing...")
            }
            Err(err) => return Err(ReconcilerError::ProviderError(err)),
        }
    }

    let config = provider
        .get_peer_config(name)
        .await
        .map_err(ReconcilerError::ProviderError)?;

    status.provider_config = Some(config);
    status.state = ClientState::Active;
    set_condition(
        &mut status.conditions,
        Condition::new(READY_CONDITION, true, "PeerActive", "Peer is registered"),
    );

    Ok(Action::requeue(Duration::from_secs(RECONCILE_REQUEUE_SECS)))
}

fn mark_failed(status: &mut GefyraClientStatus, error: &ReconcilerError) {
    match error.is_retryable() {
        true => set_condition(
            &mut status.conditions,
            Condition::new(PROVIDER_CONDITION, false, "ProviderUnavailable", error.to_string()),
        ),
        false => {
            status.state = ClientState::Error;
            set_condition(
                &mut status.conditions,
                Condition::new(READY_CONDITION, false, "Error", error.to_string()),
            );
        }
    }
}

pub async fn cleanup(
    object: &GefyraClient,
    provider: &dyn ConnectionProvider,
) -> Result<Action, ReconcilerError> {
    let name = object.require_name_or(ReconcilerError::MissingObjectMetadata)?;

    info!("Removing peer of client '{name}'...");
    provider
        .remove_peer(name)
        .await
        .map_err(ReconcilerError::ProviderError)?;

    Ok(Action::await_change())
}
