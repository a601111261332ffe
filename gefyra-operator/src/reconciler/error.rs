use std::borrow::Cow;

use gefyra_core::connection::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Object is missing metadata!")]
    MissingObjectMetadata,
    #[error("'{}' resource contains invalid data!", .0)]
    InvalidObjectData(Cow<'static, str>),
    #[error("{}", .0)]
    ProviderError(ProviderError),
    #[error("Couldn't patch the resource! Reason: {}", .0)]
    KubeApiError(kube::Error),
}

impl ReconcilerError {
    /// Retryable errors are redelivered quickly, everything else is written
    /// to the object's status and retried on the slow schedule.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcilerError::ProviderError(err) => err.is_retryable(),
            ReconcilerError::KubeApiError(_) => true,
            ReconcilerError::MissingObjectMetadata | ReconcilerError::InvalidObjectData(_) => {
                false
            }
        }
    }
}
