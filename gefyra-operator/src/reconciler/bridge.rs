use std::{borrow::Cow, collections::BTreeMap, sync::Arc, time::Duration};

use gefyra_core::{
    connection::ConnectionProvider,
    helpers::RequireMetadata,
    kubernetes::{operations::apply_resource_status, GetApi},
    resources::crd::v1::{
        bridge::{BridgeState, GefyraBridge, GefyraBridgeStatus},
        condition::{set_condition, Condition, READY_CONDITION},
    },
    OPERATOR_FIELD_MANAGER,
};
use kube::{
    api::PatchParams,
    runtime::{
        controller::Action,
        finalizer::{finalizer, Error as FinalizerError, Event as FinalizerEvent},
    },
    CustomResourceExt,
};
use log::info;

use super::{
    context::ReconcilerContext, error::ReconcilerError, get_error_action,
    RECONCILE_REQUEUE_SECS, WAITING_REQUEUE_SECS,
};

pub async fn reconcile_bridge(
    object: Arc<GefyraBridge>,
    context: Arc<ReconcilerContext>,
) -> Result<Action, FinalizerError<ReconcilerError>> {
    let namespace = object
        .metadata
        .namespace
        .to_owned()
        .unwrap_or_else(|| context.config.namespace.to_owned());
    let bridge_api = context.client.namespaced_api::<GefyraBridge>(&namespace);
    let finalizer_name = format!("{}/cleanup", GefyraBridge::crd_name());

    finalizer(&bridge_api, &finalizer_name, object, |event| async {
        match event {
            FinalizerEvent::Apply(bridge) => try_reconcile(&bridge, &context).await,
            FinalizerEvent::Cleanup(bridge) => cleanup(&bridge, context.provider.as_ref()).await,
        }
    })
    .await
}

pub fn reconcile_bridge_error(
    _object: Arc<GefyraBridge>,
    error: &FinalizerError<ReconcilerError>,
    _context: Arc<ReconcilerContext>,
) -> Action {
    get_error_action(error)
}

async fn try_reconcile(
    object: &GefyraBridge,
    context: &ReconcilerContext,
) -> Result<Action, ReconcilerError> {
    let name = object.require_name_or(ReconcilerError::MissingObjectMetadata)?;
    let namespace = object.require_namespace_or(ReconcilerError::MissingObjectMetadata)?;
    let mut status = object.status.to_owned().unwrap_or_default();

    let reconcile_result = ensure_routes(object, context.provider.as_ref(), &mut status).await;

    if let Err(error) = &reconcile_result {
        if !error.is_retryable() {
            status.state = BridgeState::Error;
            set_condition(
                &mut status.conditions,
                Condition::new(READY_CONDITION, false, "Error", error.to_string()),
            );
        }
    }

    let status_result = apply_resource_status::<GefyraBridge, GefyraBridgeStatus>(
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

/// Makes the provider's destinations match the bridge spec. Routes of ports
/// (or a destination address) no longer in the spec are removed.
pub async fn ensure_routes(
    object: &GefyraBridge,
    provider: &dyn ConnectionProvider,
    status: &mut GefyraBridgeStatus,
) -> Result<Action, ReconcilerError> {
    let spec = &object.spec;

    if spec.ports.is_empty() {
        return Err(ReconcilerError::InvalidObjectData(Cow::Borrowed("ports")));
    }

    let waiting = match provider.ready().await {
        false => Some("Waiting for the connection provider to become ready"),
        true => match provider
            .peer_exists(&spec.client)
            .await
            .map_err(ReconcilerError::ProviderError)?
        {
            false => Some("Waiting for the client to be registered"),
            true => None,
        },
    };

    if let Some(reason) = waiting {
        status.state = BridgeState::Creating;
        set_condition(
            &mut status.conditions,
            Condition::new(READY_CONDITION, false, "Waiting", reason),
        );

        return Ok(Action::requeue(Duration::from_secs(WAITING_REQUEUE_SECS)));
    }

    remove_stale_routes(object, provider, status).await?;

    status.state = BridgeState::Creating;
    status.destination_ip = Some(spec.destination_ip.to_owned());

    for port in &spec.ports {
        let url = provider
            .add_destination(&spec.client, &spec.destination_ip, *port, None)
            .await
            .map_err(ReconcilerError::ProviderError)?;

        status.routes.insert(port.to_string(), url);
    }

    info!(
        "Bridge to {} of client '{}' is routed through {} port(s)",
        spec.destination_ip,
        spec.client,
        status.routes.len()
    );

    status.state = BridgeState::Active;
    set_condition(
        &mut status.conditions,
        Condition::new(READY_CONDITION, true, "RoutesActive", "All routes are active"),
    );

    Ok(Action::requeue(Duration::from_secs(RECONCILE_REQUEUE_SECS)))
}

async fn remove_stale_routes(
    object: &GefyraBridge,
    provider: &dyn ConnectionProvider,
    status: &mut GefyraBridgeStatus,
) -> Result<(), ReconcilerError> {
    let spec = &object.spec;
    let previous_ip = match &status.destination_ip {
        Some(ip) => ip.to_owned(),
        None => return Ok(()),
    };
    let ip_changed = previous_ip != spec.destination_ip;
    let mut kept = BTreeMap::new();

    for (port, url) in std::mem::take(&mut status.routes) {
        let parsed = port.parse::<i32>().ok();
        let still_wanted = parsed.map(|p| spec.ports.contains(&p)).unwrap_or(false);

        if still_wanted && !ip_changed {
            kept.insert(port, url);
            continue;
        }

        if let Some(port) = parsed {
            info!("Removing stale route {previous_ip}:{port} of client '{}'...", spec.client);
            provider
                .remove_destination(&spec.client, &previous_ip, port)
                .await
                .map_err(ReconcilerError::ProviderError)?;
        }
    }

    status.routes = kept;

    Ok(())
}

pub async fn cleanup(
    object: &GefyraBridge,
    provider: &dyn ConnectionProvider,
) -> Result<Action, ReconcilerError> {
    let spec = &object.spec;
    let mut destinations = spec
        .ports
        .iter()
        .map(|port| (spec.destination_ip.to_owned(), *port))
        .collect::<Vec<_>>();

    if let Some(status) = &object.status {
        if let Some(ip) = &status.destination_ip {
            destinations.extend(
                status
                    .routes
                    .keys()
                    .filter_map(|port| port.parse::<i32>().ok())
                    .map(|port| (ip.to_owned(), port)),
            );
        }
    }

    destinations.sort();
    destinations.dedup();

    for (ip, port) in destinations {
        provider
            .remove_destination(&spec.client, &ip, port)
            .await
            .map_err(ReconcilerError::ProviderError)?;
    }

    Ok(Action::await_change())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use gefyra_core::{
        connection::ConnectionProvider,
        resources::crd::v1::bridge::{BridgeState, GefyraBridge, GefyraBridgeStatus},
    };

    use crate::reconciler::fake::FakeProvider;

    use super::{cleanup, ensure_routes};

    fn bridge(ip: &str, ports: &[i32]) -> GefyraBridge {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "gefyra.dev/v1",
            "kind": "GefyraBridge",
            "metadata": { "name": "bridge-a", "namespace": "gefyra" },
            "spec": { "client": "client-a", "destinationIp": ip, "ports": ports }
        }))
        .unwrap()
    }

    async fn provider_with_peer() -> FakeProvider {
        let provider = FakeProvider::default();
        provider.add_peer("client-a", None).await.unwrap();
        provider
    }

    #[tokio::test]
    async fn routes_every_port() {
        let provider = provider_with_peer().await;
        let mut status = GefyraBridgeStatus::default();

        ensure_routes(&bridge("192.168.99.2", &[8080, 9090]), &provider, &mut status)
            .await
            .unwrap();

        assert_eq!(status.state, BridgeState::Active);
        assert_eq!(status.routes.len(), 2);
        assert!(provider
            .destination_exists("client-a", "192.168.99.2", 9090)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn repeated_reconciliation_keeps_urls() {
        let provider = provider_with_peer().await;
        let object = bridge("192.168.99.2", &[8080]);
        let mut status = GefyraBridgeStatus::default();

        ensure_routes(&object, &provider, &mut status).await.unwrap();
        let first = status.routes.clone();
        ensure_routes(&object, &provider, &mut status).await.unwrap();

        assert_eq!(first, status.routes);
        assert_eq!(provider.destinations.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_ports_and_old_addresses_are_unrouted() {
        let provider = provider_with_peer().await;
        let mut status = GefyraBridgeStatus::default();

        ensure_routes(&bridge("192.168.99.2", &[8080, 9090]), &provider, &mut status)
            .await
            .unwrap();
        ensure_routes(&bridge("192.168.99.2", &[8080]), &provider, &mut status)
            .await
            .unwrap();

        assert!(!provider
            .destination_exists("client-a", "192.168.99.2", 9090)
            .await
            .unwrap());

        ensure_routes(&bridge("192.168.99.3", &[8080]), &provider, &mut status)
            .await
            .unwrap();

        assert!(!provider
            .destination_exists("client-a", "192.168.99.2", 8080)
            .await
            .unwrap());
        assert_eq!(provider.destinations.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn waits_for_the_client_peer() {
        let provider = FakeProvider::default();
        let mut status = GefyraBridgeStatus::default();

        ensure_routes(&bridge("192.168.99.2", &[8080]), &provider, &mut status)
            .await
            .unwrap();

        assert_eq!(status.state, BridgeState::Creating);
        assert!(status.routes.is_empty());
    }

    #[tokio::test]
    async fn invalid_destination_is_terminal() {
        let provider = provider_with_peer().await;
        let mut status = GefyraBridgeStatus::default();

        let error = ensure_routes(&bridge("not-an-ip", &[8080]), &provider, &mut status)
            .await
            .unwrap_err();

        assert!(!error.is_retryable());
        assert!(ensure_routes(&bridge("192.168.99.2", &[]), &provider, &mut status)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn cleanup_removes_all_routes() {
        let provider = provider_with_peer().await;
        let mut object = bridge("192.168.99.2", &[8080, 9090]);
        let mut status = GefyraBridgeStatus::default();
        ensure_routes(&object, &provider, &mut status).await.unwrap();
        object.status = Some(status);

        cleanup(&object, &provider).await.unwrap();

        assert!(provider.destinations.lock().unwrap().is_empty());

        provider.unavailable.store(true, Ordering::SeqCst);
        assert!(cleanup(&object, &provider).await.is_err());
    }
}
