use std::sync::Arc;

use gefyra_core::connection::ConnectionProvider;
use kube::Client;

use crate::config::OperatorConfig;

pub struct ReconcilerContext {
    pub client: Client,
    pub config: OperatorConfig,
    pub provider: Arc<dyn ConnectionProvider>,
}
