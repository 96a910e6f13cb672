// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for every stage of a diagnostic run
#[derive(Error, Debug, Diagnostic)]
pub enum NetdiagError {
    /// Missing or malformed configuration input
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(netdiag::configuration), help("{suggestion}"))]
    Configuration {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Not enough probe instances to run a pairwise check
    #[error("Num of nodes less than 2: probe group '{group}' has {found} instance(s)")]
    #[diagnostic(
        code(netdiag::topology),
        help("Pairwise checks need at least 2 schedulable nodes. Check node taints and that every node can run the probe DaemonSet")
    )]
    Topology {
        #[allow(unused)]
        group: String,
        #[allow(unused)]
        found: usize,
    },

    /// Workload never became ready
    #[error("Timed out after {waited_secs}s waiting for {resource} to become ready")]
    #[diagnostic(
        code(netdiag::timeout),
        help("Inspect the probe pods with `kubectl get pods -n {namespace}`. Image pulls or unschedulable nodes are the usual cause")
    )]
    Timeout {
        #[allow(unused)]
        resource: String,
        #[allow(unused)]
        namespace: String,
        #[allow(unused)]
        waited_secs: u64,
    },

    /// Remote command failed, either at transport level or by exit code
    #[error("Command in pod '{instance}' failed: {cause}")]
    #[diagnostic(code(netdiag::execution), help("{hint}"))]
    Execution {
        #[allow(unused)]
        instance: String,
        #[allow(unused)]
        cause: String,
        #[allow(unused)]
        hint: String,
    },

    /// Probe output could not be interpreted
    #[error("Failed to parse probe output from pod '{instance}': {message}")]
    #[diagnostic(
        code(netdiag::parse),
        help("Run the probe manually inside the pod to inspect its raw output. Output was: {output}")
    )]
    Parse {
        #[allow(unused)]
        instance: String,
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        output: String,
    },

    /// Cluster API request failed
    #[error("Cluster API error: {message}")]
    #[diagnostic(
        code(netdiag::cluster_api),
        help("Verify the API server address and credentials. `kubectl proxy` exposes the API on http://127.0.0.1:8001")
    )]
    ClusterApi {
        #[allow(unused)]
        message: String,
    },

    /// Resource already present on create
    #[error("Resource already exists: {resource_key}")]
    #[diagnostic(code(netdiag::already_exists))]
    AlreadyExists {
        #[allow(unused)]
        resource_key: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(netdiag::serialization),
        help("This is likely a bug. Please report it with the full error details")
    )]
    Serialization {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for netdiag operations
pub type Result<T> = std::result::Result<T, NetdiagError>;

impl NetdiagError {
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn topology(group: impl Into<String>, found: usize) -> Self {
        Self::Topology {
            group: group.into(),
            found,
        }
    }

    pub fn timeout(resource: impl Into<String>, namespace: impl Into<String>, waited_secs: u64) -> Self {
        Self::Timeout {
            resource: resource.into(),
            namespace: namespace.into(),
            waited_secs,
        }
    }

    pub fn execution(instance: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Execution {
            instance: instance.into(),
            cause: cause.into(),
            hint: "Check that the probe pod is running and reachable with `kubectl exec`".to_string(),
        }
    }

    /// Replace the hint of an execution error; other variants pass through unchanged
    pub fn with_hint(self, new_hint: impl Into<String>) -> Self {
        match self {
            Self::Execution {
                instance, cause, ..
            } => Self::Execution {
                instance,
                cause,
                hint: new_hint.into(),
            },
            other => other,
        }
    }

    pub fn parse(
        instance: impl Into<String>,
        message: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self::Parse {
            instance: instance.into(),
            message: message.into(),
            output: output.into(),
        }
    }

    pub fn cluster_api(message: impl Into<String>) -> Self {
        Self::ClusterApi {
            message: message.into(),
        }
    }

    pub fn already_exists(resource_key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource_key: resource_key.into(),
        }
    }

    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source,
        }
    }

    /// Whether this error is an `AlreadyExists` conflict
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_hint_rewrites_execution() {
        let err = NetdiagError::execution("pod-a", "exit code 1")
            .with_hint("check if CNI is configured correctly");
        match err {
            NetdiagError::Execution { instance, hint, .. } => {
                assert_eq!(instance, "pod-a");
                assert_eq!(hint, "check if CNI is configured correctly");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_with_hint_leaves_other_variants() {
        let err = NetdiagError::topology("basic", 1).with_hint("ignored");
        assert!(matches!(err, NetdiagError::Topology { found: 1, .. }));
    }

    #[test]
    fn test_topology_message() {
        let err = NetdiagError::topology("hostnetwork", 1);
        assert!(err.to_string().contains("less than 2"));
    }
}
