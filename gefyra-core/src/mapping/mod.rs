//! Parsers for the user-facing mapping grammars shared by the `run` and
//! `bridge` flows. Everything in here is pure: no cluster, runtime or CLI
//! framework is required to call it.

use thiserror::Error;

pub mod env;
pub mod ports;
pub mod volumes;
pub mod workload;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Invalid value {}", .0)]
    InvalidValue(String),
    #[error("Invalid port {} (use integer between 1 and 65535)", .0)]
    InvalidPort(String),
    #[error("Invalid environment variable '{}', use 'KEY=value'!", .0)]
    InvalidEnv(String),
    #[error("Invalid workload format '{}', use '<type>/<name>[/<container>]'!", .0)]
    InvalidWorkloadFormat(String),
    #[error("Unknown workload type {}", .0)]
    UnknownWorkloadType(String),
    #[error("Invalid volume '{}', use '<host path>:<container path>'!", .0)]
    InvalidVolume(String),
}
