pub mod bandwidth;
pub mod connectivity;
pub mod iperf;
pub mod pairs;

pub use bandwidth::PairwiseScan;
pub use pairs::{require_pair, unordered_pairs};

use crate::config::ProbeSettings;
use crate::traits::RemoteRunner;
use netdiag_core::NetdiagError;
use std::sync::Arc;

pub(crate) const CNI_HINT: &str = "check if CNI is configured correctly";
pub(crate) const HOST_NETWORK_HINT: &str = "check if HostNetwork is configured correctly";

/// Drives connectivity and bandwidth probes across probe instances
pub struct PairwiseOrchestrator {
    runner: Arc<dyn RemoteRunner>,
    namespace: String,
    settings: ProbeSettings,
}

impl PairwiseOrchestrator {
    pub fn new(runner: Arc<dyn RemoteRunner>, namespace: &str, settings: ProbeSettings) -> Self {
        Self {
            runner,
            namespace: namespace.to_string(),
            settings,
        }
    }
}

/// Error for a probe from `client` that could not reach `target`
pub(crate) fn unreachable(client: &str, target: &str, err: NetdiagError, hint: &str) -> NetdiagError {
    let cause = match err {
        NetdiagError::Execution { cause, .. } => cause,
        other => other.to_string(),
    };
    NetdiagError::execution(
        client,
        format!("pod {} can't connect to pod {}: {}", client, target, cause),
    )
    .with_hint(hint)
}
