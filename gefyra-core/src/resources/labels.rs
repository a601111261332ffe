use std::collections::BTreeMap;

pub const ROUTE_PEER_LABEL: &str = "gefyra.dev/peer";

pub fn get_stowaway_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_owned(), "gefyra".to_owned()),
        ("app.kubernetes.io/component".to_owned(), "stowaway".to_owned()),
        ("app.kubernetes.io/managed-by".to_owned(), "gefyra-operator".to_owned()),
    ])
}

pub fn get_joined_stowaway_labels() -> String {
    "app.kubernetes.io/name=gefyra,\
    app.kubernetes.io/component=stowaway,\
    app.kubernetes.io/managed-by=gefyra-operator"
        .to_owned()
}

pub fn get_proxy_route_labels(peer_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_owned(), "gefyra".to_owned()),
        ("app.kubernetes.io/component".to_owned(), "stowaway-proxy-route".to_owned()),
        ("app.kubernetes.io/managed-by".to_owned(), "gefyra-operator".to_owned()),
        (ROUTE_PEER_LABEL.to_owned(), peer_id.to_owned()),
    ])
}
