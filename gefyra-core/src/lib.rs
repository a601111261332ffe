pub mod connection;
pub mod helpers;
pub mod kubernetes;
pub mod mapping;
pub mod resources;

pub const RESOURCE_GROUP: &str = "gefyra.dev";

pub const OPERATOR_FIELD_MANAGER: &str = "gefyra-operator";
pub const STOWAWAY_NAME: &str = "gefyra-stowaway";
pub const STOWAWAY_PROXYROUTE_CONFIGMAP_NAME: &str = "gefyra-stowaway-proxyroutes";
