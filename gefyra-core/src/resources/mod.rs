use std::borrow::Cow;

use thiserror::Error;

pub mod crd;
pub mod labels;
pub mod stowaway;

#[derive(Debug, Error)]
pub enum ResourceGenerationError {
    #[error("Resource contains invalid data ({})!", .0)]
    InvalidData(Cow<'static, str>),
    #[error("Provided dependent resource is missing a name!")]
    DependentMissingMetadataName,
    #[error("Provided dependent resource is missing a namespace!")]
    DependentMissingMetadataNamespace,
}
