use k8s_openapi::api::core::v1::ServiceAccount;

use super::StowawayRelease;

impl StowawayRelease {
    pub fn generate_service_account(&self) -> ServiceAccount {
        ServiceAccount {
            metadata: self.generate_stowaway_metadata(),
            ..Default::default()
        }
    }
}
