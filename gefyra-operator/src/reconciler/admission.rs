use gefyra_core::{
    connection::{stowaway::SUBNET_PARAMETER, ConnectionProvider, ProviderError, ValidationHints},
    resources::crd::v1::client::GefyraClient,
};
use ipnet::Ipv4Net;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use log::{info, warn};

/// Subnets requested by every client other than `name` in `namespace`.
pub fn collect_hints(name: &str, namespace: &str, clients: &[GefyraClient]) -> ValidationHints {
    let occupied_subnets = clients
        .iter()
        .filter(|client| {
            client.metadata.name.as_deref() != Some(name)
                || client.metadata.namespace.as_deref() != Some(namespace)
        })
        .filter_map(|client| client.spec.provider_parameters.get(SUBNET_PARAMETER))
        .filter_map(|subnet| subnet.parse::<Ipv4Net>().ok())
        .collect();

    ValidationHints { occupied_subnets }
}

/// Peers are keyed by client name alone, so clients may only be registered
/// in the namespace the operator watches.
pub async fn admit_client(
    request: &AdmissionRequest<GefyraClient>,
    operator_namespace: &str,
    provider: &dyn ConnectionProvider,
    clients: &[GefyraClient],
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    if matches!(request.operation, Operation::Delete | Operation::Connect) {
        return response;
    }

    let namespace = request.namespace.as_deref().unwrap_or(operator_namespace);
    if namespace != operator_namespace {
        warn!("Denied client '{}' outside of '{operator_namespace}' ({namespace})", request.name);

        return response.deny(format!(
            "Gefyra clients must be created in the '{operator_namespace}' namespace!"
        ));
    }

    let object = match &request.object {
        Some(object) => object,
        None => return response,
    };

    let mut registration = object.to_registration();
    if registration.name.is_empty() {
        registration.name = request.name.to_owned();
    }

    let hints = collect_hints(&registration.name, namespace, clients);

    match provider.validate(&registration, &hints).await {
        Ok(()) => {
            info!("Admitted client '{}' ({namespace})", registration.name);
            response
        }
        Err(ProviderError::AdmissionDenied(reason)) => {
            warn!("Denied client '{}' ({namespace}): {reason}", registration.name);
            response.deny(reason)
        }
        Err(err) => {
            warn!("Couldn't validate client '{}'! {err}", registration.name);
            response.deny(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use gefyra_core::resources::crd::v1::client::GefyraClient;
    use kube::core::admission::{AdmissionRequest, AdmissionReview};

    use crate::reconciler::fake::FakeProvider;

    use super::{admit_client, collect_hints};

    fn client(name: &str, subnet: Option<&str>) -> GefyraClient {
        client_in("gefyra", name, subnet)
    }

    fn client_in(namespace: &str, name: &str, subnet: Option<&str>) -> GefyraClient {
        let mut parameters = serde_json::Map::new();
        if let Some(subnet) = subnet {
            parameters.insert("subnet".to_owned(), subnet.into());
        }

        serde_json::from_value(serde_json::json!({
            "apiVersion": "gefyra.dev/v1",
            "kind": "GefyraClient",
            "metadata": { "name": name, "namespace": namespace },
            "spec": { "provider": "stowaway", "providerParameters": parameters }
        }))
        .unwrap()
    }

    fn request(operation: &str, object: &GefyraClient) -> AdmissionRequest<GefyraClient> {
        let review: AdmissionReview<GefyraClient> = serde_json::from_value(serde_json::json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "0df28fbd-5f5f-11e8-bc74-36e6bb280816",
                "kind": { "group": "gefyra.dev", "version": "v1", "kind": "GefyraClient" },
                "resource": { "group": "gefyra.dev", "version": "v1", "resource": "gefyraclients" },
                "name": object.metadata.name,
                "namespace": object.metadata.namespace,
                "operation": operation,
                "userInfo": {},
                "object": object,
            }
        }))
        .unwrap();

        review.try_into().unwrap()
    }

    #[test]
    fn hints_skip_the_client_itself() {
        let clients = vec![
            client("client-a", Some("192.168.100.0/24")),
            client("client-b", Some("192.168.101.0/24")),
            client("client-c", Some("not-a-subnet")),
        ];

        let hints = collect_hints("client-a", "gefyra", &clients);

        assert_eq!(hints.occupied_subnets.len(), 1);
        assert_eq!(hints.occupied_subnets[0].to_string(), "192.168.101.0/24");
    }

    #[tokio::test]
    async fn overlapping_subnet_is_denied() {
        let provider = FakeProvider::default();
        let existing = vec![client("client-b", Some("192.168.101.0/24"))];
        let candidate = client("client-a", Some("192.168.101.0/24"));

        let response =
            admit_client(&request("CREATE", &candidate), "gefyra", &provider, &existing).await;

        assert!(!response.allowed);
        assert_eq!(provider.denied_subnets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn updating_a_client_keeps_its_own_subnet() {
        let provider = FakeProvider::default();
        let existing = vec![client("client-a", Some("192.168.101.0/24"))];
        let candidate = client("client-a", Some("192.168.101.0/24"));

        let response =
            admit_client(&request("UPDATE", &candidate), "gefyra", &provider, &existing).await;

        assert!(response.allowed);
    }

    #[tokio::test]
    async fn deletes_are_always_admitted() {
        let provider = FakeProvider::default();
        let existing = vec![client("client-b", Some("192.168.101.0/24"))];
        let candidate = client("client-a", Some("192.168.101.0/24"));

        let response =
            admit_client(&request("DELETE", &candidate), "gefyra", &provider, &existing).await;

        assert!(response.allowed);
    }

    #[tokio::test]
    async fn clients_outside_the_operator_namespace_are_denied() {
        let provider = FakeProvider::default();
        let existing = vec![client("client-a", Some("192.168.101.0/24"))];
        let candidate = client_in("team-b", "client-a", Some("192.168.101.0/24"));

        let response =
            admit_client(&request("CREATE", &candidate), "gefyra", &provider, &existing).await;

        assert!(!response.allowed);
        // denied before the provider saw it
        assert!(provider.denied_subnets.lock().unwrap().is_empty());
    }
}
