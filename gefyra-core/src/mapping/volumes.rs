use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use super::MappingError;

/// A `host:container` bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMapping {
    pub host: PathBuf,
    pub container: String,
}

impl VolumeMapping {
    /// Joins a relative host path onto `base`. The container path is never
    /// touched.
    pub fn resolved(self, base: &Path) -> Self {
        if self.host.is_absolute() {
            return self;
        }

        Self {
            host: base.join(self.host),
            container: self.container,
        }
    }

    pub fn to_bind(&self) -> String {
        self.to_string()
    }
}

impl FromStr for VolumeMapping {
    type Err = MappingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // the host part may carry a drive letter, so split on the last colon
        match value.rsplit_once(':') {
            Some((host, container)) if !host.is_empty() && !container.is_empty() => Ok(Self {
                host: host.into(),
                container: container.to_owned(),
            }),
            _ => Err(MappingError::InvalidVolume(value.to_owned())),
        }
    }
}

impl Display for VolumeMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host.to_string_lossy(), self.container)
    }
}

pub fn resolve_volumes(volumes: Vec<VolumeMapping>, base: &Path) -> Vec<VolumeMapping> {
    volumes.into_iter().map(|v| v.resolved(base)).collect()
}
