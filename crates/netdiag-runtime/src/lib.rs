//! Netdiag Runtime - Drives a diagnostic run against a cluster
//!
//! Deploys the probe DaemonSets, waits for them, runs pairwise probes
//! through a `RemoteRunner` and reports results. Cluster access goes through
//! the `ClusterApi` trait; `ApiClient` and `KubectlRunner` are the shipped
//! adapters and `mock` holds in-memory doubles for tests.

pub mod api_client;
pub mod cleanup;
pub mod command;
pub mod config;
pub mod context;
pub mod deployer;
pub mod discovery;
pub mod dns;
pub mod kubectl;
pub mod mock;
pub mod orchestrator;
pub mod poller;
pub mod reporter;
pub mod status;
pub mod traits;

// Re-export primary types
pub use api_client::{ApiClient, ClusterConfig};
pub use config::{DiagnosticConfig, ParsePolicy, ProbeSettings};
pub use context::{DiagnosticRun, Suite};
pub use kubectl::KubectlRunner;
pub use status::{ConsoleStatus, SilentStatus};
pub use traits::{ClusterApi, RemoteRunner, StatusReporter, StepOutcome};

pub use cleanup::teardown;
pub use deployer::{desired_workload, DeployOutcome, Deployment, WorkloadDeployer};
pub use discovery::list_instances;
pub use dns::DnsChecker;
pub use orchestrator::{PairwiseOrchestrator, PairwiseScan};
pub use poller::{is_daemon_set_ready, ReadinessPoller};
pub use reporter::{BandwidthSummary, Reporter};

pub use mock::{MockCluster, MockFetch, MockRunner, RecordingStatus};
