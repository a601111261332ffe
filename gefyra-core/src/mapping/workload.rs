use std::{fmt::Display, str::FromStr};

use super::MappingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadType {
    Pod,
    Deployment,
    StatefulSet,
}

impl WorkloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadType::Pod => "pod",
            WorkloadType::Deployment => "deployment",
            WorkloadType::StatefulSet => "statefulset",
        }
    }
}

impl FromStr for WorkloadType {
    type Err = MappingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "po" | "pod" | "pods" => Ok(WorkloadType::Pod),
            "deploy" | "deployment" | "deployments" => Ok(WorkloadType::Deployment),
            "sts" | "statefulset" | "statefulsets" => Ok(WorkloadType::StatefulSet),
            other => Err(MappingError::UnknownWorkloadType(other.to_owned())),
        }
    }
}

impl Display for WorkloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<type>/<name>[/<container>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadLocator {
    pub workload_type: WorkloadType,
    pub name: String,
    pub container: Option<String>,
}

impl FromStr for WorkloadLocator {
    type Err = MappingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid_format = || MappingError::InvalidWorkloadFormat(value.to_owned());
        let parts = value.split('/').collect::<Vec<_>>();

        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid_format());
        }

        let (workload_type, name, container) = match parts.as_slice() {
            [workload_type, name] => (workload_type, name, None),
            [workload_type, name, container] => (workload_type, name, Some(container)),
            _ => return Err(invalid_format()),
        };

        Ok(WorkloadLocator {
            workload_type: workload_type.parse()?,
            name: (*name).to_owned(),
            container: container.map(|c| (*c).to_owned()),
        })
    }
}

impl Display for WorkloadLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.workload_type, self.name)?;

        if let Some(container) = &self.container {
            write!(f, "/{container}")?;
        }

        Ok(())
    }
}
