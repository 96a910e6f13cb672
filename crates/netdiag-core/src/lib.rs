//! Netdiag Core - Shared types for the cluster network diagnostic
//!
//! This crate provides:
//! - The diagnostic error taxonomy with miette diagnostics
//! - Probe groups, probe instances and pairwise check results
//! - Data CIDR validation
//! - Builders for the Kubernetes resources a run creates

pub mod cidr;
pub mod constants;
pub mod error;
pub mod resources;
pub mod types;

// Re-export commonly used types
pub use cidr::{parse_cidr, DataCidr, DATA_CIDR_ENV};
pub use error::{NetdiagError, Result};
pub use types::{CheckResult, PairIndex, ProbeGroup, ProbeInstance};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::apps::v1::DaemonSet;
pub use k8s_openapi::api::core::v1::{Namespace, Pod, Service};

/// Serialize a resource to JSON
pub fn to_json<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_json::to_string(resource).map_err(|e| {
        NetdiagError::serialization(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a resource to YAML
pub fn to_yaml<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_yaml::to_string(resource).map_err(|e| {
        NetdiagError::serialization(
            format!("Failed to serialize to YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}
